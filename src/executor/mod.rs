//! Query execution against the encounter record store
//!
//! The pipeline never talks to a database directly. Every component builds
//! a typed [`Query`] and hands it to a borrowed [`QueryExecutor`], which
//! returns the full result as one Arrow record batch.

pub mod memory;
pub mod parquet;
pub mod sql_text;

use std::time::Instant;

use arrow::record_batch::RecordBatch;

use crate::error::{PipelineError, Result};
use crate::query::Query;

pub use memory::InMemoryExecutor;
pub use parquet::ParquetExecutor;
pub use sql_text::SqlTextExecutor;

/// Executes typed queries and returns the complete result table
pub trait QueryExecutor {
    /// Run `query` and return every matching row
    fn execute(&self, query: &Query) -> anyhow::Result<RecordBatch>;
}

impl<T: QueryExecutor + ?Sized> QueryExecutor for &T {
    fn execute(&self, query: &Query) -> anyhow::Result<RecordBatch> {
        (**self).execute(query)
    }
}

/// Run a query on behalf of `component`, tagging failures with the template name
pub fn run_query<E: QueryExecutor + ?Sized>(
    executor: &E,
    component: &'static str,
    query: &Query,
) -> Result<RecordBatch> {
    let start = Instant::now();
    log::debug!("[{component}] {query}");
    let batch = executor
        .execute(query)
        .map_err(|source| PipelineError::UpstreamQuery {
            component,
            template: query.name,
            source: source.into(),
        })?;
    log::debug!(
        "[{component}] Query '{}' returned {} rows in {:?}",
        query.name,
        batch.num_rows(),
        start.elapsed()
    );
    Ok(batch)
}
