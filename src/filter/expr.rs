//! Expression-based filtering for query results
//!
//! Filters are evaluated against Arrow record batches with SQL `WHERE`
//! semantics: a comparison against a null cell never matches.

use std::collections::HashSet;

use arrow::array::{
    Array, ArrayRef, BooleanArray, Float64Array, Int32Array, Int64Array, LargeStringArray,
    StringArray,
};
use arrow::compute::{and, is_not_null, is_null, not, or};
use arrow::record_batch::RecordBatch;

use crate::error::{PipelineError, Result};

/// Represents a filter expression of a typed query
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Column equals a literal value
    Eq(String, LiteralValue),

    /// Column not equals a literal value
    NotEq(String, LiteralValue),

    /// Column is in a set of values
    In(String, Vec<LiteralValue>),

    /// Column is null
    IsNull(String),

    /// Column is not null
    IsNotNull(String),

    /// Logical AND of expressions
    And(Vec<Expr>),

    /// Logical OR of expressions
    Or(Vec<Expr>),

    /// Logical NOT of an expression
    Not(Box<Expr>),

    /// Always evaluates to true
    AlwaysTrue,

    /// Always evaluates to false
    AlwaysFalse,
}

/// Represents a literal value that can be used in filter expressions
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    /// Integer value
    Int(i64),

    /// Floating point value
    Float(f64),

    /// String value
    String(String),
}

impl From<&str> for LiteralValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for LiteralValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for LiteralValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl Expr {
    /// `column IN (values...)` over string literals
    pub fn in_strings<'a>(column: &str, values: impl IntoIterator<Item = &'a String>) -> Self {
        Self::In(
            column.to_string(),
            values.into_iter().cloned().map(LiteralValue::String).collect(),
        )
    }
}

/// Evaluate an expression against a record batch
///
/// # Returns
/// A boolean mask with one entry per row, `true` where the row matches
pub fn evaluate_expr(batch: &RecordBatch, expr: &Expr) -> Result<BooleanArray> {
    match expr {
        Expr::AlwaysTrue => Ok(BooleanArray::from(vec![true; batch.num_rows()])),
        Expr::AlwaysFalse => Ok(BooleanArray::from(vec![false; batch.num_rows()])),
        Expr::And(exprs) => {
            let mut result = BooleanArray::from(vec![true; batch.num_rows()]);
            for expr in exprs {
                let mask = evaluate_expr(batch, expr)?;
                result = and(&result, &mask)?;
            }
            Ok(result)
        }
        Expr::Or(exprs) => {
            let mut result = BooleanArray::from(vec![false; batch.num_rows()]);
            for expr in exprs {
                let mask = evaluate_expr(batch, expr)?;
                result = or(&result, &mask)?;
            }
            Ok(result)
        }
        Expr::Not(expr) => Ok(not(&evaluate_expr(batch, expr)?)?),
        Expr::Eq(col_name, value) => {
            evaluate_in(column(batch, col_name)?, col_name, std::slice::from_ref(value))
        }
        Expr::NotEq(col_name, value) => {
            let column = column(batch, col_name)?;
            let eq = evaluate_in(column, col_name, std::slice::from_ref(value))?;
            Ok(and(&not(&eq)?, &is_not_null(column.as_ref())?)?)
        }
        Expr::In(col_name, values) => evaluate_in(column(batch, col_name)?, col_name, values),
        Expr::IsNull(col_name) => Ok(is_null(column(batch, col_name)?.as_ref())?),
        Expr::IsNotNull(col_name) => Ok(is_not_null(column(batch, col_name)?.as_ref())?),
    }
}

fn column<'a>(batch: &'a RecordBatch, col_name: &str) -> Result<&'a ArrayRef> {
    batch
        .schema()
        .index_of(col_name)
        .map(|idx| batch.column(idx))
        .map_err(|_| PipelineError::ColumnNotFound {
            column: col_name.to_string(),
        })
}

/// Membership test of every row of `column` against a literal set
fn evaluate_in(column: &ArrayRef, col_name: &str, values: &[LiteralValue]) -> Result<BooleanArray> {
    if let Some(array) = column.as_any().downcast_ref::<StringArray>() {
        let wanted = string_literals(col_name, values)?;
        return Ok(mask_rows(array, |i| wanted.contains(array.value(i))));
    }
    if let Some(array) = column.as_any().downcast_ref::<LargeStringArray>() {
        let wanted = string_literals(col_name, values)?;
        return Ok(mask_rows(array, |i| wanted.contains(array.value(i))));
    }
    if let Some(array) = column.as_any().downcast_ref::<Int64Array>() {
        let wanted = int_literals(col_name, values)?;
        return Ok(mask_rows(array, |i| wanted.contains(&array.value(i))));
    }
    if let Some(array) = column.as_any().downcast_ref::<Int32Array>() {
        let wanted = int_literals(col_name, values)?;
        return Ok(mask_rows(array, |i| wanted.contains(&i64::from(array.value(i)))));
    }
    if let Some(array) = column.as_any().downcast_ref::<Float64Array>() {
        let wanted = values
            .iter()
            .map(|value| match value {
                LiteralValue::Float(f) => Ok(*f),
                #[allow(clippy::cast_precision_loss)]
                LiteralValue::Int(n) => Ok(*n as f64),
                LiteralValue::String(_) => Err(literal_mismatch(col_name, "numeric", value)),
            })
            .collect::<Result<Vec<_>>>()?;
        return Ok(mask_rows(array, |i| wanted.contains(&array.value(i))));
    }
    Err(PipelineError::InvalidDataType {
        column: col_name.to_string(),
        expected: "string or numeric".to_string(),
    })
}

fn mask_rows(array: &dyn Array, matches: impl Fn(usize) -> bool) -> BooleanArray {
    (0..array.len())
        .map(|i| Some(!array.is_null(i) && matches(i)))
        .collect()
}

fn string_literals<'a>(col_name: &str, values: &'a [LiteralValue]) -> Result<HashSet<&'a str>> {
    values
        .iter()
        .map(|value| match value {
            LiteralValue::String(s) => Ok(s.as_str()),
            other => Err(literal_mismatch(col_name, "string", other)),
        })
        .collect()
}

fn int_literals(col_name: &str, values: &[LiteralValue]) -> Result<HashSet<i64>> {
    values
        .iter()
        .map(|value| match value {
            LiteralValue::Int(n) => Ok(*n),
            other => Err(literal_mismatch(col_name, "integer", other)),
        })
        .collect()
}

fn literal_mismatch(col_name: &str, expected: &str, value: &LiteralValue) -> PipelineError {
    PipelineError::invalid_config(format!(
        "literal {value:?} cannot be compared with {expected} column '{col_name}'"
    ))
}
