//! Error handling for the length-of-stay pipeline.

use arrow::error::ArrowError;
use parquet::errors::ParquetError;

/// Boxed source error carried by upstream failures
pub type BoxedSource = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by the pipeline components
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Rejected parameters, surfaced before any query is issued
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Not enough training data to fit a component
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// The query executor failed; never retried
    #[error("Query '{template}' issued by {component} failed: {source}")]
    UpstreamQuery {
        /// Component that issued the query
        component: &'static str,
        /// Template name of the failing query
        template: &'static str,
        /// Underlying executor error
        #[source]
        source: BoxedSource,
    },

    /// Row keys disagree between tables that must be row-aligned
    #[error("Key consistency violation: {0}")]
    KeyConsistencyViolation(String),

    /// The model trainer failed to fit or predict
    #[error("Model training failed: {source}")]
    Training {
        /// Underlying trainer error
        #[source]
        source: BoxedSource,
    },

    /// A required column is missing from a result table
    #[error("Column '{column}' not found")]
    ColumnNotFound {
        /// Column name
        column: String,
    },

    /// A column has an unexpected Arrow type
    #[error("Column '{column}' is not a {expected} array")]
    InvalidDataType {
        /// Column name
        column: String,
        /// Human-readable expected type
        expected: String,
    },

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    /// Parquet error
    #[error("Parquet error: {0}")]
    Parquet(#[from] ParquetError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

impl PipelineError {
    /// Shorthand for an invalid configuration error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration(message.into())
    }

    /// Shorthand for an insufficient data error
    pub fn insufficient_data(message: impl Into<String>) -> Self {
        Self::InsufficientData(message.into())
    }

    /// Shorthand for a key consistency violation
    pub fn key_violation(message: impl Into<String>) -> Self {
        Self::KeyConsistencyViolation(message.into())
    }
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;
