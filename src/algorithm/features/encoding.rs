//! Target encoding of the hospital service
//!
//! The encoding is fit on admissions of training patients only and then
//! applied to every clean admission. Services seen at most `rare_threshold`
//! times in training are pooled into a single `"Other"` category, whose mean
//! doubles as the fallback for services never seen in training.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use crate::algorithm::features::outcome::capped_los;
use crate::config::EncounterSchema;
use crate::error::{PipelineError, Result};
use crate::executor::{QueryExecutor, run_query};
use crate::models::{AdmissionKey, admissions_from_batch, ensure_unique_keys};
use crate::query::{admission_services, admissions_for_patients};
use crate::query::sql::render_case_when;
use crate::utils::logging::{log_operation_complete, log_operation_start, log_warning};

const COMPONENT: &str = "service-encoder";

/// Category that rare services are pooled into
pub const OTHER_CATEGORY: &str = "Other";

/// Fitted mapping from hospital service to mean length of stay
#[derive(Debug, Clone, PartialEq)]
pub struct EncodingTable {
    means: BTreeMap<String, f64>,
    counts: BTreeMap<String, usize>,
    fallback: f64,
}

impl EncodingTable {
    /// Fit the table from `(service bucket, length of stay)` observations
    ///
    /// A category present in the data as `"Other"` shares its row with the
    /// pooled rare categories.
    pub fn fit<'a, I>(observations: I, rare_threshold: usize) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, i64)>,
    {
        let observations: Vec<(&str, i64)> = observations.into_iter().collect();
        if observations.is_empty() {
            return Err(PipelineError::insufficient_data(
                "no training admissions to fit the service encoding on",
            ));
        }

        let mut raw_counts: BTreeMap<&str, usize> = BTreeMap::new();
        for &(category, _) in &observations {
            *raw_counts.entry(category).or_default() += 1;
        }

        let mut sums: BTreeMap<String, (i64, usize)> = BTreeMap::new();
        for &(category, los) in &observations {
            let label = if raw_counts[&category] <= rare_threshold {
                OTHER_CATEGORY
            } else {
                category
            };
            let entry = sums.entry(label.to_string()).or_default();
            entry.0 += los;
            entry.1 += 1;
        }

        #[allow(clippy::cast_precision_loss)]
        let means: BTreeMap<String, f64> = sums
            .iter()
            .map(|(category, (sum, n))| (category.clone(), *sum as f64 / *n as f64))
            .collect();
        let counts = sums
            .into_iter()
            .map(|(category, (_, n))| (category, n))
            .collect();

        #[allow(clippy::cast_precision_loss)]
        let fallback = match means.get(OTHER_CATEGORY) {
            Some(mean) => *mean,
            None => {
                let total: i64 = observations.iter().map(|(_, los)| los).sum();
                total as f64 / observations.len() as f64
            }
        };

        Ok(Self {
            means,
            counts,
            fallback,
        })
    }

    /// Encoded value of a service bucket; unknown buckets take the fallback
    #[must_use]
    pub fn encode(&self, category: &str) -> f64 {
        self.means.get(category).copied().unwrap_or(self.fallback)
    }

    /// Mean length of stay per retained category
    #[must_use]
    pub fn means(&self) -> &BTreeMap<String, f64> {
        &self.means
    }

    /// Training admissions behind each retained category
    #[must_use]
    pub fn counts(&self) -> &BTreeMap<String, usize> {
        &self.counts
    }

    /// Value used for categories absent from the table
    #[must_use]
    pub fn fallback(&self) -> f64 {
        self.fallback
    }

    /// Render the table as a SQL `CASE WHEN` over `column`
    pub fn to_sql_case(&self, column: &str) -> Result<String> {
        render_case_when(
            column,
            self.means
                .iter()
                .map(|(category, mean)| (category.as_str(), *mean)),
            self.fallback,
        )
    }
}

/// Fits and applies the hospital-service target encoding
pub struct CategoricalTargetEncoder<'a, E: QueryExecutor + ?Sized> {
    executor: &'a E,
    schema: &'a EncounterSchema,
    max_los_days: Option<i64>,
}

impl<'a, E: QueryExecutor + ?Sized> CategoricalTargetEncoder<'a, E> {
    /// Create an encoder; means are taken over length of stay capped at `max_los_days`
    pub fn new(executor: &'a E, schema: &'a EncounterSchema, max_los_days: Option<i64>) -> Self {
        Self {
            executor,
            schema,
            max_los_days,
        }
    }

    /// Fit the encoding on admissions of `train_patients`
    pub fn fit(
        &self,
        train_patients: &BTreeSet<String>,
        rare_threshold: usize,
    ) -> Result<EncodingTable> {
        if train_patients.is_empty() {
            return Err(PipelineError::insufficient_data(
                "training patient set is empty",
            ));
        }
        let start = Instant::now();
        log_operation_start(
            COMPONENT,
            &format!("Fitting service encoding on {} patients", train_patients.len()),
        );

        let batch = run_query(
            self.executor,
            COMPONENT,
            &admissions_for_patients("service_encoding_fit", self.schema, train_patients),
        )?;
        let admissions = admissions_from_batch(&batch, self.schema, true, COMPONENT)?;
        let returned = admissions.len();
        let training: Vec<_> = admissions
            .into_iter()
            .filter(|admission| train_patients.contains(&admission.patient_id))
            .collect();
        if training.len() < returned {
            log_warning(
                COMPONENT,
                &format!(
                    "Dropped {} rows of patients outside the training set",
                    returned - training.len()
                ),
            );
        }

        let table = EncodingTable::fit(
            training.iter().map(|admission| {
                (
                    admission.service_bucket(),
                    capped_los(admission.los_days(), self.max_los_days),
                )
            }),
            rare_threshold,
        )?;

        log::debug!(
            "[{COMPONENT}] Retained categories {:?}, fallback {:.3}",
            table.counts(),
            table.fallback()
        );
        log_operation_complete(COMPONENT, "fitted", table.means().len(), Some(start.elapsed()));
        Ok(table)
    }

    /// Score every clean admission with `table`
    pub fn apply(&self, table: &EncodingTable) -> Result<BTreeMap<AdmissionKey, f64>> {
        let start = Instant::now();
        log_operation_start(COMPONENT, "Applying service encoding to all admissions");

        let batch = run_query(
            self.executor,
            COMPONENT,
            &admission_services("service_encoding_apply", self.schema),
        )?;
        let admissions = admissions_from_batch(&batch, self.schema, true, COMPONENT)?;
        ensure_unique_keys(&admissions, COMPONENT)?;
        let encoded: BTreeMap<AdmissionKey, f64> = admissions
            .iter()
            .map(|admission| (admission.key(), table.encode(admission.service_bucket())))
            .collect();

        log_operation_complete(COMPONENT, "encoded", encoded.len(), Some(start.elapsed()));
        Ok(encoded)
    }
}
