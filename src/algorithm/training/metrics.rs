//! Regression metrics reported after training

use std::fmt;

use crate::error::{PipelineError, Result};

/// Metrics of one set of predictions
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegressionMetrics {
    /// Rows evaluated
    pub rows: usize,
    /// 1 - Var(residual) / Var(actual)
    pub explained_variance: f64,
    /// Mean squared error
    pub mse: f64,
}

impl RegressionMetrics {
    /// Compute metrics of `predicted` against `actual`
    pub fn compute(actual: &[f64], predicted: &[f64]) -> Result<Self> {
        Ok(Self {
            rows: actual.len(),
            explained_variance: explained_variance(actual, predicted)?,
            mse: mean_squared_error(actual, predicted)?,
        })
    }
}

impl fmt::Display for RegressionMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rows={} explained_variance={:.4} mse={:.4}",
            self.rows, self.explained_variance, self.mse
        )
    }
}

fn check_lengths(actual: &[f64], predicted: &[f64]) -> Result<()> {
    if actual.is_empty() {
        return Err(PipelineError::insufficient_data(
            "no rows to compute metrics on",
        ));
    }
    if actual.len() != predicted.len() {
        return Err(PipelineError::key_violation(format!(
            "{} outcomes but {} predictions",
            actual.len(),
            predicted.len()
        )));
    }
    Ok(())
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: impl Iterator<Item = f64> + Clone) -> f64 {
    let n = values.clone().count();
    values.sum::<f64>() / n as f64
}

#[allow(clippy::cast_precision_loss)]
fn variance(values: &[f64]) -> f64 {
    let m = mean(values.iter().copied());
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64
}

/// Mean squared error
pub fn mean_squared_error(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    check_lengths(actual, predicted)?;
    Ok(mean(
        actual
            .iter()
            .zip(predicted)
            .map(|(a, p)| (a - p).powi(2)),
    ))
}

/// Explained variance score
///
/// A constant outcome scores 1.0 when predicted exactly and 0.0 otherwise.
pub fn explained_variance(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    check_lengths(actual, predicted)?;
    let residuals: Vec<f64> = actual.iter().zip(predicted).map(|(a, p)| a - p).collect();
    let residual_variance = variance(&residuals);
    let actual_variance = variance(actual);
    if actual_variance == 0.0 {
        return Ok(if residual_variance == 0.0 { 1.0 } else { 0.0 });
    }
    Ok(1.0 - residual_variance / actual_variance)
}
