//! End-to-end pipeline over one record store

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::algorithm::features::{
    AssembledTables, CategoricalTargetEncoder, EncodingTable, FeatureTableAssembler,
    HistoricalUtilizationBuilder, OutcomeExtractor, OutcomeTable, UtilizationTable,
};
use crate::algorithm::split::{FoldAssignment, PatientSplitter};
use crate::algorithm::training::{ModelTrainer, TrainingReport, cross_validate, full_train};
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::executor::QueryExecutor;
use crate::models::AdmissionKey;
use crate::utils::io::write_csv;

/// Length-of-stay pipeline bound to a borrowed executor and a configuration
pub struct LosPipeline<'a, E: QueryExecutor + ?Sized> {
    executor: &'a E,
    config: PipelineConfig,
}

impl<'a, E: QueryExecutor + ?Sized> LosPipeline<'a, E> {
    /// Create a pipeline; the configuration is validated up front
    pub fn new(executor: &'a E, config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        log::debug!("{config}");
        Ok(Self { executor, config })
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Split the patient universe into holdout group and folds
    pub fn split(&self) -> Result<FoldAssignment> {
        PatientSplitter::new(self.executor, &self.config.schema)
            .split(self.config.test_percent, self.config.folds)
    }

    /// Length of stay per clean admission
    pub fn outcomes(&self) -> Result<OutcomeTable> {
        OutcomeExtractor::new(self.executor, &self.config.schema).extract(self.config.max_los_days)
    }

    /// Prior utilization per clean admission
    pub fn utilization(&self) -> Result<UtilizationTable> {
        HistoricalUtilizationBuilder::new(self.executor, &self.config.schema)
            .build(self.config.lookback_days, &self.config.history_suffix)
    }

    fn encoder(&self) -> CategoricalTargetEncoder<'_, E> {
        CategoricalTargetEncoder::new(self.executor, &self.config.schema, self.config.max_los_days)
    }

    /// Fit the service encoding on the patients of `train_folds`
    pub fn fit_encoder(
        &self,
        assignment: &FoldAssignment,
        train_folds: &BTreeSet<usize>,
    ) -> Result<EncodingTable> {
        let train_patients = assignment.train_patients(train_folds)?;
        self.encoder().fit(&train_patients, self.config.rare_threshold)
    }

    /// Encode every clean admission with a fitted table
    pub fn apply_encoder(
        &self,
        table: &EncodingTable,
    ) -> Result<BTreeMap<AdmissionKey, f64>> {
        self.encoder().apply(table)
    }

    /// Train and test tables for a fold selection
    pub fn training_datasets(
        &self,
        assignment: &FoldAssignment,
        train_folds: &BTreeSet<usize>,
    ) -> Result<AssembledTables> {
        FeatureTableAssembler::new(self.executor, &self.config).assemble(assignment, train_folds)
    }

    /// Train on every fold and evaluate on the holdout group
    pub fn full_train<T: ModelTrainer>(
        &self,
        assignment: &FoldAssignment,
        trainer: &T,
    ) -> Result<(AssembledTables, TrainingReport<T::Model>)> {
        full_train(self.executor, &self.config, assignment, trainer)
    }

    /// Leave-one-fold-out cross-validation
    pub fn cross_validate<T: ModelTrainer>(
        &self,
        assignment: &FoldAssignment,
        trainer: &T,
    ) -> Result<Vec<TrainingReport<T::Model>>> {
        cross_validate(self.executor, &self.config, assignment, trainer)
    }
}

/// Write `train.csv` and `test.csv` into `dir`, creating it if needed
pub fn cache_tables(tables: &AssembledTables, dir: &Path) -> Result<(PathBuf, PathBuf)> {
    std::fs::create_dir_all(dir)?;
    let train_path = dir.join("train.csv");
    let test_path = dir.join("test.csv");
    write_csv(&train_path, tables.train.batch())?;
    write_csv(&test_path, tables.test.batch())?;
    log::info!(
        "Cached feature tables to {} and {}",
        train_path.display(),
        test_path.display()
    );
    Ok((train_path, test_path))
}
