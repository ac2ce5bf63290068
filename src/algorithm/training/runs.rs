//! Full training and cross-validation runs

use std::collections::BTreeSet;
use std::time::Instant;

use crate::algorithm::features::{AssembledTables, FeatureTableAssembler};
use crate::algorithm::split::{FoldAssignment, TestSource};
use crate::algorithm::training::metrics::RegressionMetrics;
use crate::algorithm::training::model::{ModelTrainer, Regressor};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::executor::QueryExecutor;
use crate::models::FeatureTable;
use crate::utils::logging::{log_operation_complete, log_operation_start, log_warning};

const COMPONENT: &str = "training";

/// Outcome of one training run
#[derive(Debug, Clone)]
pub struct TrainingReport<M> {
    /// Folds the model was trained on
    pub train_folds: BTreeSet<usize>,
    /// Where the evaluation rows came from
    pub test_source: TestSource,
    /// Feature columns in the order given to the trainer
    pub feature_columns: Vec<String>,
    /// Metrics on the training rows
    pub train_metrics: RegressionMetrics,
    /// Metrics on the evaluation rows, `None` when there were none
    pub test_metrics: Option<RegressionMetrics>,
    /// Fitted model
    pub model: M,
}

fn training_error(source: anyhow::Error) -> PipelineError {
    PipelineError::Training {
        source: source.into(),
    }
}

/// Score `model` on `table`; `None` for an empty table
pub fn evaluate<M: Regressor>(
    model: &M,
    table: &FeatureTable,
    feature_columns: &[String],
) -> Result<Option<RegressionMetrics>> {
    if table.is_empty() {
        return Ok(None);
    }
    let features = table.feature_matrix(feature_columns)?;
    let predicted = model.predict(&features).map_err(training_error)?;
    let actual = table.outcome_values()?;
    RegressionMetrics::compute(&actual, &predicted).map(Some)
}

/// Assemble tables for `train_folds`, fit `trainer` and evaluate
pub fn train_on_folds<E, T>(
    executor: &E,
    config: &PipelineConfig,
    assignment: &FoldAssignment,
    train_folds: &BTreeSet<usize>,
    trainer: &T,
) -> Result<(AssembledTables, TrainingReport<T::Model>)>
where
    E: QueryExecutor + ?Sized,
    T: ModelTrainer,
{
    let tables = FeatureTableAssembler::new(executor, config).assemble(assignment, train_folds)?;
    if tables.train.is_empty() {
        return Err(PipelineError::insufficient_data(format!(
            "no training rows for folds {train_folds:?}"
        )));
    }

    let feature_columns = tables.feature_columns();
    let model = trainer
        .fit(&tables.train, &feature_columns, tables.train.outcome_column())
        .map_err(training_error)?;

    let train_metrics = evaluate(&model, &tables.train, &feature_columns)?
        .ok_or_else(|| PipelineError::insufficient_data("no training rows to score"))?;
    let test_metrics = evaluate(&model, &tables.test, &feature_columns)?;

    log::info!("[{COMPONENT}] Train: {train_metrics}");
    match &test_metrics {
        Some(metrics) => log::info!("[{COMPONENT}] Test ({}): {metrics}", tables.test_source),
        None => log_warning(
            COMPONENT,
            &format!("No test rows from the {}", tables.test_source),
        ),
    }

    let report = TrainingReport {
        train_folds: train_folds.clone(),
        test_source: tables.test_source.clone(),
        feature_columns,
        train_metrics,
        test_metrics,
        model,
    };
    Ok((tables, report))
}

/// Train on every fold and evaluate on the holdout group
pub fn full_train<E, T>(
    executor: &E,
    config: &PipelineConfig,
    assignment: &FoldAssignment,
    trainer: &T,
) -> Result<(AssembledTables, TrainingReport<T::Model>)>
where
    E: QueryExecutor + ?Sized,
    T: ModelTrainer,
{
    let start = Instant::now();
    log_operation_start(COMPONENT, "Full training run on all folds");
    let all_folds: BTreeSet<usize> = (0..assignment.num_folds()).collect();
    let result = train_on_folds(executor, config, assignment, &all_folds, trainer)?;
    log_operation_complete(COMPONENT, "trained on", result.0.train.num_rows(), Some(start.elapsed()));
    Ok(result)
}

/// Leave-one-fold-out cross-validation; report `i` evaluates on fold `i`
pub fn cross_validate<E, T>(
    executor: &E,
    config: &PipelineConfig,
    assignment: &FoldAssignment,
    trainer: &T,
) -> Result<Vec<TrainingReport<T::Model>>>
where
    E: QueryExecutor + ?Sized,
    T: ModelTrainer,
{
    let folds = assignment.num_folds();
    if folds < 2 {
        return Err(PipelineError::invalid_config(format!(
            "cross-validation needs at least two folds, got {folds}"
        )));
    }

    let start = Instant::now();
    log_operation_start(COMPONENT, &format!("Cross-validating over {folds} folds"));
    let reports = (0..folds)
        .map(|held_out| {
            let train_folds: BTreeSet<usize> = (0..folds).filter(|&i| i != held_out).collect();
            train_on_folds(executor, config, assignment, &train_folds, trainer)
                .map(|(_, report)| report)
        })
        .collect::<Result<Vec<_>>>()?;
    log_operation_complete(COMPONENT, "cross-validated", reports.len(), Some(start.elapsed()));
    Ok(reports)
}
