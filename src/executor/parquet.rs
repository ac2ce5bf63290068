//! Record store backed by Parquet extracts

use std::path::Path;
use std::time::Instant;

use arrow::record_batch::RecordBatch;

use crate::error::{PipelineError, Result};
use crate::executor::{InMemoryExecutor, QueryExecutor};
use crate::query::Query;
use crate::utils::io::load_parquet_path;
use crate::utils::logging::{log_operation_complete, log_operation_start};

/// Loads tables from Parquet files and evaluates queries in memory
#[derive(Debug, Default)]
pub struct ParquetExecutor {
    inner: InMemoryExecutor,
}

impl ParquetExecutor {
    /// Create an executor serving `table` from a Parquet file or directory
    pub fn open(table: &str, path: &Path) -> Result<Self> {
        Self::default().with_table(table, path)
    }

    /// Load another table from a Parquet file or directory
    pub fn with_table(self, table: &str, path: &Path) -> Result<Self> {
        let start = Instant::now();
        log_operation_start("parquet-executor", &format!("Loading table '{table}'"));

        let batches = load_parquet_path(path)?;
        let rows = batches.iter().map(RecordBatch::num_rows).sum::<usize>();
        let inner = self
            .inner
            .with_batches(table, &batches)
            .map_err(|e| {
                PipelineError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("{e:#} ({})", path.display()),
                ))
            })?;

        log_operation_complete("parquet-executor", "loaded", rows, Some(start.elapsed()));
        Ok(Self { inner })
    }
}

impl QueryExecutor for ParquetExecutor {
    fn execute(&self, query: &Query) -> anyhow::Result<RecordBatch> {
        self.inner.execute(query)
    }
}
