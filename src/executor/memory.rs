//! In-memory record store over named Arrow tables

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use anyhow::{Context, anyhow};
use arrow::array::UInt32Array;
use arrow::compute::{concat_batches, take_record_batch};
use arrow::record_batch::RecordBatch;
use arrow::row::{RowConverter, SortField};

use crate::executor::QueryExecutor;
use crate::filter::filter_by_expr;
use crate::query::Query;

/// Evaluates typed queries against tables held in memory
#[derive(Debug, Default)]
pub struct InMemoryExecutor {
    tables: HashMap<String, RecordBatch>,
    executed: Mutex<Vec<String>>,
}

impl InMemoryExecutor {
    /// Create an executor with no tables
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `batch` under `name`, replacing any previous table
    #[must_use]
    pub fn with_table(mut self, name: &str, batch: RecordBatch) -> Self {
        self.tables.insert(name.to_string(), batch);
        self
    }

    /// Register the concatenation of `batches` under `name`
    pub fn with_batches(self, name: &str, batches: &[RecordBatch]) -> anyhow::Result<Self> {
        let first = batches
            .first()
            .ok_or_else(|| anyhow!("No record batches supplied for table '{name}'"))?;
        let table = concat_batches(&first.schema(), batches)
            .with_context(|| format!("Failed to concatenate batches of table '{name}'"))?;
        Ok(self.with_table(name, table))
    }

    /// Names of the queries executed so far, in order
    #[must_use]
    pub fn executed_queries(&self) -> Vec<String> {
        self.executed
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }

    fn record(&self, query: &Query) {
        if let Ok(mut log) = self.executed.lock() {
            log.push(query.name.to_string());
        }
    }
}

impl QueryExecutor for InMemoryExecutor {
    fn execute(&self, query: &Query) -> anyhow::Result<RecordBatch> {
        self.record(query);

        let table = self
            .tables
            .get(&query.table)
            .ok_or_else(|| anyhow!("Unknown table '{}'", query.table))?;

        let filtered = filter_by_expr(table, &query.filter)?;

        let schema = filtered.schema();
        let indices = query
            .columns
            .iter()
            .map(|column| {
                schema
                    .index_of(column)
                    .with_context(|| format!("Unknown column '{column}' in '{}'", query.table))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        let projected = filtered.project(&indices)?;

        if query.distinct {
            distinct_rows(&projected)
        } else {
            Ok(projected)
        }
    }
}

/// Keep the first occurrence of every distinct row
fn distinct_rows(batch: &RecordBatch) -> anyhow::Result<RecordBatch> {
    let fields = batch
        .schema()
        .fields()
        .iter()
        .map(|field| SortField::new(field.data_type().clone()))
        .collect();
    let converter = RowConverter::new(fields)?;
    let rows = converter.convert_columns(batch.columns())?;

    let mut seen = HashSet::with_capacity(rows.num_rows());
    let keep = (0..rows.num_rows())
        .filter(|&i| seen.insert(rows.row(i)))
        .map(u32::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(take_record_batch(batch, &UInt32Array::from(keep))?)
}
