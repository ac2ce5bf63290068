//! Arrow data handling utilities
//!
//! Helpers for locating, casting and extracting typed values from the
//! record batches returned by query executors.

pub mod array_utils;
pub mod extractors;

// Re-export commonly used functions for convenience
pub use array_utils::{downcast_array, get_column, get_column_as, string_values};
pub use extractors::{arrow_array_to_datetime, datetime_values, parse_datetime};
