//! Leakage-safe feature pipeline for predicting inpatient length of stay.
//!
//! Patients are split into a holdout group and training folds by a stable
//! hash of their identifier. Outcome, prior-utilization and target-encoded
//! service features are built through a borrowed [`QueryExecutor`] and
//! joined into train and test tables for a downstream regressor.

pub mod algorithm;
pub mod config;
pub mod error;
pub mod executor;
pub mod filter;
pub mod models;
pub mod pipeline;
pub mod query;
pub mod utils;

// Core types
pub use config::{EncounterSchema, PipelineConfig};
pub use error::{PipelineError, Result};
pub use pipeline::{LosPipeline, cache_tables};

// Record store access
pub use executor::{InMemoryExecutor, ParquetExecutor, QueryExecutor, SqlTextExecutor};
pub use query::Query;

// Splitting and features
pub use algorithm::features::{AssembledTables, EncodingTable, OutcomeTable, UtilizationTable};
pub use algorithm::split::{FoldAssignment, PatientGroup, TestSource, patient_hash};
pub use algorithm::training::{
    MeanBaseline, ModelTrainer, RegressionMetrics, Regressor, TrainingReport,
};
pub use models::{AdmissionKey, FeatureTable};

// Arrow types
pub use arrow::record_batch::RecordBatch;
