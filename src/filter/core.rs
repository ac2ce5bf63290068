//! Core filtering functionality for record batches

use arrow::array::BooleanArray;
use arrow::compute::filter_record_batch as arrow_filter_record_batch;
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;

use crate::error::Result;
use crate::filter::expr::{Expr, evaluate_expr};

/// Filter a record batch based on a boolean mask
///
/// # Arguments
/// * `batch` - The record batch to filter
/// * `mask` - The boolean mask indicating which rows to keep
///
/// # Returns
/// A new record batch with only rows where mask is true
pub fn filter_record_batch(batch: &RecordBatch, mask: &BooleanArray) -> Result<RecordBatch> {
    if batch.num_rows() != mask.len() {
        return Err(ArrowError::InvalidArgumentError(format!(
            "Mask length ({}) doesn't match batch row count ({})",
            mask.len(),
            batch.num_rows()
        ))
        .into());
    }

    Ok(arrow_filter_record_batch(batch, mask)?)
}

/// Keep only the rows of `batch` matching `expr`
pub fn filter_by_expr(batch: &RecordBatch, expr: &Expr) -> Result<RecordBatch> {
    if matches!(expr, Expr::AlwaysTrue) {
        return Ok(batch.clone());
    }
    let mask = evaluate_expr(batch, expr)?;
    filter_record_batch(batch, &mask)
}
