//! Adapter for executors that only accept SQL text

use arrow::record_batch::RecordBatch;

use crate::executor::QueryExecutor;
use crate::query::Query;

/// Renders each typed query to SQL and passes the text to a client function
///
/// The client is typically a thin wrapper over a database connection that
/// fetches all rows and converts them to a record batch.
pub struct SqlTextExecutor<F> {
    client: F,
}

impl<F> SqlTextExecutor<F>
where
    F: Fn(&str) -> anyhow::Result<RecordBatch>,
{
    /// Wrap a SQL text client
    pub fn new(client: F) -> Self {
        Self { client }
    }
}

impl<F> QueryExecutor for SqlTextExecutor<F>
where
    F: Fn(&str) -> anyhow::Result<RecordBatch>,
{
    fn execute(&self, query: &Query) -> anyhow::Result<RecordBatch> {
        let sql = query.to_sql()?;
        log::debug!("Executing '{}': {sql}", query.name);
        (self.client)(&sql)
    }
}
