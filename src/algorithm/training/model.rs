//! Trainer and model seams for downstream regressors

use crate::models::FeatureTable;

/// A fitted regression model
pub trait Regressor {
    /// Predict one value per row of a row-major feature matrix
    fn predict(&self, features: &[Vec<f64>]) -> anyhow::Result<Vec<f64>>;
}

/// Fits a regressor on an assembled training table
pub trait ModelTrainer {
    /// Model produced by [`ModelTrainer::fit`]
    type Model: Regressor;

    /// Fit on `train`, reading `feature_columns` in order and the `outcome_column`
    fn fit(
        &self,
        train: &FeatureTable,
        feature_columns: &[String],
        outcome_column: &str,
    ) -> anyhow::Result<Self::Model>;
}

/// Trainer whose model always predicts the training mean
#[derive(Debug, Clone, Copy, Default)]
pub struct MeanBaseline;

/// Model fitted by [`MeanBaseline`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeanModel {
    /// Mean outcome of the training rows
    pub mean: f64,
}

impl Regressor for MeanModel {
    fn predict(&self, features: &[Vec<f64>]) -> anyhow::Result<Vec<f64>> {
        Ok(vec![self.mean; features.len()])
    }
}

impl ModelTrainer for MeanBaseline {
    type Model = MeanModel;

    fn fit(
        &self,
        train: &FeatureTable,
        _feature_columns: &[String],
        outcome_column: &str,
    ) -> anyhow::Result<MeanModel> {
        let outcomes = train.column_f64(outcome_column)?;
        anyhow::ensure!(!outcomes.is_empty(), "cannot fit a baseline on an empty table");
        #[allow(clippy::cast_precision_loss)]
        let mean = outcomes.iter().sum::<f64>() / outcomes.len() as f64;
        Ok(MeanModel { mean })
    }
}
