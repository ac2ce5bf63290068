//! Typed queries against the encounter record store
//!
//! A [`Query`] names a table, a column projection and a filter expression.
//! Executors either evaluate it directly against Arrow data or render it to
//! SQL text with [`Query::to_sql`].

pub mod sql;

use std::collections::BTreeSet;
use std::fmt;

use crate::config::EncounterSchema;
use crate::error::Result;
use crate::filter::{Expr, LiteralValue};

/// A projection-and-filter query over one table
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// Template name, reported when the query fails
    pub name: &'static str,
    /// Source table
    pub table: String,
    /// Projected columns, in output order
    pub columns: Vec<String>,
    /// Row filter
    pub filter: Expr,
    /// Whether duplicate output rows are removed
    pub distinct: bool,
}

impl Query {
    /// Create a query selecting `columns` from `table` with no filter
    pub fn select(name: &'static str, table: &str, columns: &[&str]) -> Self {
        Self {
            name,
            table: table.to_string(),
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
            filter: Expr::AlwaysTrue,
            distinct: false,
        }
    }

    /// Add a conjunct to the filter
    #[must_use]
    pub fn and_where(mut self, expr: Expr) -> Self {
        self.filter = match self.filter {
            Expr::AlwaysTrue => expr,
            Expr::And(mut exprs) => {
                exprs.push(expr);
                Expr::And(exprs)
            }
            other => Expr::And(vec![other, expr]),
        };
        self
    }

    /// Remove duplicate output rows
    #[must_use]
    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Render the query as SQL text
    pub fn to_sql(&self) -> Result<String> {
        let columns = self
            .columns
            .iter()
            .map(|c| sql::validate_identifier(c))
            .collect::<Result<Vec<_>>>()?;
        let mut text = format!(
            "SELECT {}{} FROM {}",
            if self.distinct { "DISTINCT " } else { "" },
            columns.join(", "),
            sql::validate_identifier(&self.table)?
        );
        if !matches!(self.filter, Expr::AlwaysTrue) {
            text.push_str(" WHERE ");
            text.push_str(&sql::render_expr(&self.filter)?);
        }
        Ok(text)
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_sql() {
            Ok(text) => write!(f, "{}: {text}", self.name),
            Err(_) => write!(f, "{}: <unrenderable> {:?}", self.name, self.filter),
        }
    }
}

/// Filter selecting clean admissions: inpatient class with both timestamps present
#[must_use]
pub fn clean_admission_filter(schema: &EncounterSchema) -> Expr {
    Expr::And(vec![
        Expr::Eq(
            schema.patient_class.clone(),
            LiteralValue::String(schema.inpatient_class.clone()),
        ),
        Expr::IsNotNull(schema.admit_time.clone()),
        Expr::IsNotNull(schema.discharge_time.clone()),
    ])
}

/// Distinct patients with at least one clean admission
#[must_use]
pub fn patient_universe(schema: &EncounterSchema) -> Query {
    Query::select("patient_universe", &schema.table, &[schema.patient_id.as_str()])
        .and_where(clean_admission_filter(schema))
        .distinct()
}

/// Identifier and timestamps of every clean admission
#[must_use]
pub fn admission_times(name: &'static str, schema: &EncounterSchema) -> Query {
    Query::select(
        name,
        &schema.table,
        &[schema.patient_id.as_str(), schema.admit_time.as_str(), schema.discharge_time.as_str()],
    )
    .and_where(clean_admission_filter(schema))
}

/// Clean admissions including the hospital service
#[must_use]
pub fn admission_services(name: &'static str, schema: &EncounterSchema) -> Query {
    Query::select(
        name,
        &schema.table,
        &[
            schema.patient_id.as_str(),
            schema.admit_time.as_str(),
            schema.discharge_time.as_str(),
            schema.hospital_service.as_str(),
        ],
    )
    .and_where(clean_admission_filter(schema))
}

/// Clean admissions restricted to the given patients
#[must_use]
pub fn admissions_for_patients(
    name: &'static str,
    schema: &EncounterSchema,
    patients: &BTreeSet<String>,
) -> Query {
    admission_services(name, schema).and_where(Expr::in_strings(&schema.patient_id, patients))
}
