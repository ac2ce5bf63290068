//! Data models for admissions and assembled feature tables

pub mod admission;
pub mod feature_table;

pub use admission::{Admission, AdmissionKey, admissions_from_batch, ensure_unique_keys};
pub use feature_table::{
    FeatureRow, FeatureTable, MEAN_SERVICE_LOS_COLUMN, OUTCOME_COLUMN, UtilizationCounts,
};
