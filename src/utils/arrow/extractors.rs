//! Timestamp extraction from Arrow arrays
//!
//! Admission and discharge times may arrive as dates, timestamps of any
//! unit, or text, depending on the record store.

use arrow::array::{
    Array, ArrayRef, Date32Array, Date64Array, LargeStringArray, StringArray,
    TimestampMicrosecondArray, TimestampMillisecondArray, TimestampNanosecondArray,
    TimestampSecondArray,
};
use arrow::datatypes::{DataType, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::{NaiveDate, NaiveDateTime};

use crate::error::{PipelineError, Result};
use crate::utils::arrow::array_utils::get_column;

/// Text layouts accepted for timestamp columns
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d-%m-%Y", "%Y/%m/%d", "%d/%m/%Y"];

/// Extract a timestamp from an Arrow array at the specified index, handling nulls
///
/// # Returns
/// `Some(NaiveDateTime)` if the value exists and can be interpreted, otherwise `None`
#[must_use]
pub fn arrow_array_to_datetime(array: &ArrayRef, index: usize) -> Option<NaiveDateTime> {
    if array.is_null(index) {
        return None;
    }

    match array.data_type() {
        DataType::Date32 => array
            .as_any()
            .downcast_ref::<Date32Array>()?
            .value_as_datetime(index),
        DataType::Date64 => array
            .as_any()
            .downcast_ref::<Date64Array>()?
            .value_as_datetime(index),
        DataType::Timestamp(TimeUnit::Second, _) => array
            .as_any()
            .downcast_ref::<TimestampSecondArray>()?
            .value_as_datetime(index),
        DataType::Timestamp(TimeUnit::Millisecond, _) => array
            .as_any()
            .downcast_ref::<TimestampMillisecondArray>()?
            .value_as_datetime(index),
        DataType::Timestamp(TimeUnit::Microsecond, _) => array
            .as_any()
            .downcast_ref::<TimestampMicrosecondArray>()?
            .value_as_datetime(index),
        DataType::Timestamp(TimeUnit::Nanosecond, _) => array
            .as_any()
            .downcast_ref::<TimestampNanosecondArray>()?
            .value_as_datetime(index),
        DataType::Utf8 => parse_datetime(array.as_any().downcast_ref::<StringArray>()?.value(index)),
        DataType::LargeUtf8 => {
            parse_datetime(array.as_any().downcast_ref::<LargeStringArray>()?.value(index))
        }
        _ => None,
    }
}

/// Parse a timestamp or a bare date (taken as midnight)
#[must_use]
pub fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

/// Extract every value of a timestamp column
///
/// Nulls stay `None`; a non-null value that cannot be interpreted is an error.
pub fn datetime_values(batch: &RecordBatch, column_name: &str) -> Result<Vec<Option<NaiveDateTime>>> {
    let array = get_column(batch, column_name)?;
    (0..array.len())
        .map(|i| {
            if array.is_null(i) {
                return Ok(None);
            }
            arrow_array_to_datetime(array, i)
                .map(Some)
                .ok_or_else(|| PipelineError::InvalidDataType {
                    column: column_name.to_string(),
                    expected: "date, timestamp or timestamp text".to_string(),
                })
        })
        .collect()
}
