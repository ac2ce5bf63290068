//! Utilities for working with Arrow arrays.
//!
//! Columns returned by a query executor are located by name and, when the
//! store hands back a compatible but different type, cast to the type the
//! pipeline expects.

use arrow::array::{Array, ArrayRef, StringArray};
use arrow::compute::kernels::cast::{can_cast_types, cast};
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use log::debug;

use crate::error::{PipelineError, Result};

/// Get a column from a record batch by name
pub fn get_column<'a>(batch: &'a RecordBatch, column_name: &str) -> Result<&'a ArrayRef> {
    let idx = batch
        .schema()
        .index_of(column_name)
        .map_err(|_| PipelineError::ColumnNotFound {
            column: column_name.to_string(),
        })?;
    Ok(batch.column(idx))
}

/// Get a column, casting it to `expected_type` when it has another type
///
/// # Returns
///
/// * `Ok(ArrayRef)` - The column array (converted if necessary)
/// * `Err(PipelineError)` - If the column is missing or the cast is not supported
pub fn get_column_as(
    batch: &RecordBatch,
    column_name: &str,
    expected_type: &DataType,
) -> Result<ArrayRef> {
    let column = get_column(batch, column_name)?;
    let actual_type = column.data_type();

    if actual_type == expected_type {
        return Ok(column.clone());
    }

    if !can_cast_types(actual_type, expected_type) {
        return Err(PipelineError::InvalidDataType {
            column: column_name.to_string(),
            expected: format!("{expected_type:?}"),
        });
    }

    debug!("Converting column '{column_name}' from {actual_type:?} to {expected_type:?}");
    Ok(cast(column, expected_type)?)
}

/// Downcast a column to a specific array type with clear error messages
///
/// # Type Parameters
///
/// * `A` - The target array type to downcast to
pub fn downcast_array<'a, A: Array + 'static>(
    array: &'a ArrayRef,
    column_name: &str,
    expected_type_name: &str,
) -> Result<&'a A> {
    array
        .as_any()
        .downcast_ref::<A>()
        .ok_or_else(|| PipelineError::InvalidDataType {
            column: column_name.to_string(),
            expected: expected_type_name.to_string(),
        })
}

/// Get a column as owned UTF-8 values, `None` for nulls
pub fn string_values(batch: &RecordBatch, column_name: &str) -> Result<Vec<Option<String>>> {
    let column = get_column_as(batch, column_name, &DataType::Utf8)?;
    let array = downcast_array::<StringArray>(&column, column_name, "String")?;
    Ok(array
        .iter()
        .map(|value| value.map(str::to_string))
        .collect())
}
