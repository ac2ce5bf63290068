//! Patient-level holdout and cross-validation folds
//!
//! Patients, never rows, are partitioned. The holdout group is the top
//! `test_percent` of hash space; fold `i` is the half-open interval
//! `[(test_percent / K) * i, (test_percent / K) * (i + 1))`. With
//! `test_percent < 0.5` this leaves a band of hash space belonging to no
//! group; those patients are excluded from both training and testing and
//! reported as unassigned.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Instant;

use crate::algorithm::split::hash::patient_hash;
use crate::config::{EncounterSchema, validate_split_params};
use crate::error::{PipelineError, Result};
use crate::executor::{QueryExecutor, run_query};
use crate::query::{Query, patient_universe};
use crate::utils::arrow::string_values;
use crate::utils::logging::{log_operation_complete, log_operation_start, log_warning};

const COMPONENT: &str = "patient-splitter";

/// Group a patient was assigned to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatientGroup {
    /// Reserved holdout group
    Test,
    /// Training fold with the given index
    Fold(usize),
    /// Hash fell between the fold region and the holdout region
    Unassigned,
}

/// Where the evaluation rows of a training run come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestSource {
    /// Every fold is used for training; evaluate on the reserved holdout group
    HoldoutGroup,
    /// Evaluate on the folds left out of training
    ExcludedFolds(BTreeSet<usize>),
}

impl fmt::Display for TestSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HoldoutGroup => write!(f, "holdout group"),
            Self::ExcludedFolds(folds) => write!(f, "excluded folds {folds:?}"),
        }
    }
}

/// Immutable assignment of patients to the holdout group and training folds
#[derive(Debug, Clone, PartialEq)]
pub struct FoldAssignment {
    test_percent: f64,
    test_group: BTreeSet<String>,
    train_folds: Vec<BTreeSet<String>>,
    unassigned: BTreeSet<String>,
}

impl FoldAssignment {
    /// Partition `universe` into a holdout group and `folds` training folds
    ///
    /// Duplicate identifiers in the universe are collapsed.
    pub fn split<I, S>(universe: I, test_percent: f64, folds: usize) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        validate_split_params(test_percent, folds)?;

        let mut assignment = Self {
            test_percent,
            test_group: BTreeSet::new(),
            train_folds: vec![BTreeSet::new(); folds],
            unassigned: BTreeSet::new(),
        };

        for identifier in universe {
            let identifier = identifier.into();
            match assign_group(patient_hash(&identifier), test_percent, folds) {
                PatientGroup::Test => assignment.test_group.insert(identifier),
                PatientGroup::Fold(i) => assignment.train_folds[i].insert(identifier),
                PatientGroup::Unassigned => assignment.unassigned.insert(identifier),
            };
        }

        Ok(assignment)
    }

    /// Share of hash space reserved for the holdout group
    #[must_use]
    pub fn test_percent(&self) -> f64 {
        self.test_percent
    }

    /// Number of training folds
    #[must_use]
    pub fn num_folds(&self) -> usize {
        self.train_folds.len()
    }

    /// Patients of the reserved holdout group
    #[must_use]
    pub fn test_group(&self) -> &BTreeSet<String> {
        &self.test_group
    }

    /// Patients of every training fold, by index
    #[must_use]
    pub fn train_folds(&self) -> &[BTreeSet<String>] {
        &self.train_folds
    }

    /// Patients whose hash fell in no interval
    #[must_use]
    pub fn unassigned(&self) -> &BTreeSet<String> {
        &self.unassigned
    }

    /// Group of a patient, `Unassigned` for identifiers outside the universe too
    #[must_use]
    pub fn group_of(&self, patient_id: &str) -> PatientGroup {
        if self.test_group.contains(patient_id) {
            return PatientGroup::Test;
        }
        self.train_folds
            .iter()
            .position(|fold| fold.contains(patient_id))
            .map_or(PatientGroup::Unassigned, PatientGroup::Fold)
    }

    /// Check a training fold selection: non-empty and within `0..K`
    pub fn validate_fold_selection(&self, train_folds: &BTreeSet<usize>) -> Result<()> {
        if train_folds.is_empty() {
            return Err(PipelineError::invalid_config(
                "at least one training fold must be selected",
            ));
        }
        if let Some(&bad) = train_folds.iter().find(|&&i| i >= self.num_folds()) {
            return Err(PipelineError::invalid_config(format!(
                "fold index {bad} is out of range for {} folds",
                self.num_folds()
            )));
        }
        Ok(())
    }

    /// Union of the selected training folds
    pub fn train_patients(&self, train_folds: &BTreeSet<usize>) -> Result<BTreeSet<String>> {
        self.validate_fold_selection(train_folds)?;
        Ok(train_folds
            .iter()
            .flat_map(|&i| self.train_folds[i].iter().cloned())
            .collect())
    }

    /// Decide where evaluation rows come from for a training fold selection
    pub fn test_source(&self, train_folds: &BTreeSet<usize>) -> Result<TestSource> {
        self.validate_fold_selection(train_folds)?;
        let excluded: BTreeSet<usize> = (0..self.num_folds())
            .filter(|i| !train_folds.contains(i))
            .collect();
        Ok(if excluded.is_empty() {
            TestSource::HoldoutGroup
        } else {
            TestSource::ExcludedFolds(excluded)
        })
    }

    /// Patients evaluated under `source`
    #[must_use]
    pub fn test_patients(&self, source: &TestSource) -> BTreeSet<String> {
        match source {
            TestSource::HoldoutGroup => self.test_group.clone(),
            TestSource::ExcludedFolds(folds) => folds
                .iter()
                .filter_map(|&i| self.train_folds.get(i))
                .flat_map(|fold| fold.iter().cloned())
                .collect(),
        }
    }

    /// Patient count per group, for logging
    #[must_use]
    pub fn group_sizes(&self) -> BTreeMap<String, usize> {
        let mut sizes = BTreeMap::new();
        sizes.insert("test".to_string(), self.test_group.len());
        for (i, fold) in self.train_folds.iter().enumerate() {
            sizes.insert(format!("fold_{i}"), fold.len());
        }
        sizes.insert("unassigned".to_string(), self.unassigned.len());
        sizes
    }
}

/// Group for a hash value, using the interval bounds verbatim
///
/// The holdout region takes precedence where it overlaps the fold region,
/// which only happens for `test_percent > 0.5`.
#[must_use]
pub fn assign_group(hash: f64, test_percent: f64, folds: usize) -> PatientGroup {
    if hash >= 1.0 - test_percent {
        return PatientGroup::Test;
    }
    #[allow(clippy::cast_precision_loss)]
    let width = test_percent / folds as f64;
    (0..folds)
        .find(|&i| {
            #[allow(clippy::cast_precision_loss)]
            let i = i as f64;
            hash >= width * i && hash < width * (1.0 + i)
        })
        .map_or(PatientGroup::Unassigned, PatientGroup::Fold)
}

/// Builds fold assignments from the patients of the record store
pub struct PatientSplitter<'a, E: QueryExecutor + ?Sized> {
    executor: &'a E,
    patient_id_column: String,
    universe_query: Query,
}

impl<'a, E: QueryExecutor + ?Sized> PatientSplitter<'a, E> {
    /// Create a splitter over `executor`; the universe is every patient with
    /// a clean admission
    pub fn new(executor: &'a E, schema: &EncounterSchema) -> Self {
        Self {
            executor,
            patient_id_column: schema.patient_id.clone(),
            universe_query: patient_universe(schema),
        }
    }

    /// Replace the universe query; its result must contain the patient id column
    #[must_use]
    pub fn with_universe_query(mut self, query: Query) -> Self {
        self.universe_query = query;
        self
    }

    /// Distinct patient identifiers returned by the universe query
    pub fn universe(&self) -> Result<BTreeSet<String>> {
        let batch = run_query(self.executor, COMPONENT, &self.universe_query)?;
        Ok(string_values(&batch, &self.patient_id_column)?
            .into_iter()
            .flatten()
            .collect())
    }

    /// Split the patient universe; parameters are validated before any query
    pub fn split(&self, test_percent: f64, folds: usize) -> Result<FoldAssignment> {
        validate_split_params(test_percent, folds)?;
        let start = Instant::now();
        log_operation_start(COMPONENT, "Assigning patients to holdout and training folds");

        let universe = self.universe()?;
        let assignment = FoldAssignment::split(universe, test_percent, folds)?;

        log::info!("[{COMPONENT}] Group sizes: {:?}", assignment.group_sizes());
        if !assignment.unassigned().is_empty() {
            log_warning(
                COMPONENT,
                &format!(
                    "{} patients fall between the fold and holdout regions and are excluded",
                    assignment.unassigned().len()
                ),
            );
        }
        let assigned = assignment.test_group().len()
            + assignment.train_folds().iter().map(BTreeSet::len).sum::<usize>();
        log_operation_complete(COMPONENT, "assigned", assigned, Some(start.elapsed()));
        Ok(assignment)
    }
}
