//! Joins outcome, utilization and encoding into train and test tables

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use crate::algorithm::features::encoding::{CategoricalTargetEncoder, EncodingTable};
use crate::algorithm::features::outcome::{OutcomeExtractor, OutcomeTable};
use crate::algorithm::features::utilization::{HistoricalUtilizationBuilder, UtilizationTable};
use crate::algorithm::split::{FoldAssignment, TestSource};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::executor::QueryExecutor;
use crate::models::{AdmissionKey, FeatureRow, FeatureTable};
use crate::utils::logging::{log_operation_complete, log_operation_start};

const COMPONENT: &str = "feature-assembler";

/// Train and test tables of one training run
#[derive(Debug, Clone)]
pub struct AssembledTables {
    /// Rows of patients in the selected training folds
    pub train: FeatureTable,
    /// Rows of the evaluation patients
    pub test: FeatureTable,
    /// Where the evaluation rows came from
    pub test_source: TestSource,
    /// Encoding fitted on the training patients
    pub encoding: EncodingTable,
}

impl AssembledTables {
    /// Ordered feature columns handed to the trainer
    #[must_use]
    pub fn feature_columns(&self) -> Vec<String> {
        self.train.feature_columns()
    }
}

/// Inner join of the per-admission tables on the admission key
///
/// Every key must be present in all three tables.
pub fn join_features(
    outcomes: &OutcomeTable,
    utilization: &UtilizationTable,
    encoded: &BTreeMap<AdmissionKey, f64>,
) -> Result<Vec<FeatureRow>> {
    let keys: BTreeSet<&AdmissionKey> = outcomes
        .keys()
        .chain(utilization.rows.keys())
        .chain(encoded.keys())
        .collect();

    keys.into_iter()
        .map(|key| -> Result<FeatureRow> {
            let missing = |table: &str| {
                PipelineError::key_violation(format!("admission {key} has no {table} row"))
            };
            Ok(FeatureRow {
                key: key.clone(),
                los: *outcomes.get(key).ok_or_else(|| missing("outcome"))?,
                utilization: *utilization
                    .rows
                    .get(key)
                    .ok_or_else(|| missing("utilization"))?,
                mean_service_los: *encoded.get(key).ok_or_else(|| missing("encoding"))?,
            })
        })
        .collect()
}

/// Builds feature tables for a fold selection
pub struct FeatureTableAssembler<'a, E: QueryExecutor + ?Sized> {
    executor: &'a E,
    config: &'a PipelineConfig,
}

impl<'a, E: QueryExecutor + ?Sized> FeatureTableAssembler<'a, E> {
    /// Create an assembler over `executor`
    pub fn new(executor: &'a E, config: &'a PipelineConfig) -> Self {
        Self { executor, config }
    }

    /// Assemble train and test tables, training on `train_folds`
    pub fn assemble(
        &self,
        assignment: &FoldAssignment,
        train_folds: &BTreeSet<usize>,
    ) -> Result<AssembledTables> {
        let test_source = assignment.test_source(train_folds)?;
        let train_patients = assignment.train_patients(train_folds)?;
        let test_patients = assignment.test_patients(&test_source);

        let start = Instant::now();
        log_operation_start(
            COMPONENT,
            &format!("Assembling features, training on folds {train_folds:?}"),
        );
        log::info!("[{COMPONENT}] Test rows come from the {test_source}");

        let schema = &self.config.schema;
        let outcomes = OutcomeExtractor::new(self.executor, schema).extract(self.config.max_los_days)?;
        let utilization = HistoricalUtilizationBuilder::new(self.executor, schema)
            .build(self.config.lookback_days, &self.config.history_suffix)?;
        let encoder = CategoricalTargetEncoder::new(self.executor, schema, self.config.max_los_days);
        let encoding = encoder.fit(&train_patients, self.config.rare_threshold)?;
        let encoded = encoder.apply(&encoding)?;

        let rows = join_features(&outcomes, &utilization, &encoded)?;
        let (train_rows, test_rows): (Vec<FeatureRow>, Vec<FeatureRow>) = rows
            .into_iter()
            .filter(|row| {
                train_patients.contains(&row.key.patient_id)
                    || test_patients.contains(&row.key.patient_id)
            })
            .partition(|row| train_patients.contains(&row.key.patient_id));

        let build = |rows: &[FeatureRow]| {
            FeatureTable::from_rows(
                rows,
                &schema.patient_id,
                &schema.admit_time,
                &utilization.suffix,
            )
        };
        let train = build(&train_rows)?;
        let test = build(&test_rows)?;

        log::info!(
            "[{COMPONENT}] Train rows: {}, test rows: {}",
            train.num_rows(),
            test.num_rows()
        );
        log_operation_complete(
            COMPONENT,
            "assembled",
            train.num_rows() + test.num_rows(),
            Some(start.elapsed()),
        );

        Ok(AssembledTables {
            train,
            test,
            test_source,
            encoding,
        })
    }
}
