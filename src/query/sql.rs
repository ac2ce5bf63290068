//! SQL text rendering for typed queries
//!
//! Identifier lists and categories are substituted as quoted literals,
//! numbers are checked to be finite before formatting, and table or column
//! names must be plain identifiers.

use std::fmt::Write as _;

use crate::error::{PipelineError, Result};
use crate::filter::{Expr, LiteralValue};

/// Check that `name` is a plain SQL identifier (`[A-Za-z_][A-Za-z0-9_]*`)
pub fn validate_identifier(name: &str) -> Result<&str> {
    let mut chars = name.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(name)
    } else {
        Err(PipelineError::invalid_config(format!(
            "'{name}' is not a valid SQL identifier"
        )))
    }
}

/// Quote a string literal, doubling embedded single quotes
#[must_use]
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Format a float for query text; NaN and infinities are rejected
pub fn format_float(value: f64) -> Result<String> {
    if value.is_finite() {
        Ok(format!("{value:?}"))
    } else {
        Err(PipelineError::invalid_config(format!(
            "non-finite value {value} cannot be substituted into a query"
        )))
    }
}

/// Render a literal value
pub fn render_literal(value: &LiteralValue) -> Result<String> {
    match value {
        LiteralValue::Int(n) => Ok(n.to_string()),
        LiteralValue::Float(f) => format_float(*f),
        LiteralValue::String(s) => Ok(quote_literal(s)),
    }
}

/// Render a filter expression as a `WHERE` predicate
pub fn render_expr(expr: &Expr) -> Result<String> {
    Ok(match expr {
        Expr::Eq(col, value) => format!("{} = {}", validate_identifier(col)?, render_literal(value)?),
        Expr::NotEq(col, value) => {
            format!("{} <> {}", validate_identifier(col)?, render_literal(value)?)
        }
        Expr::In(_, values) if values.is_empty() => "1 = 0".to_string(),
        Expr::In(col, values) => {
            let rendered = values
                .iter()
                .map(render_literal)
                .collect::<Result<Vec<_>>>()?;
            format!("{} IN ({})", validate_identifier(col)?, rendered.join(", "))
        }
        Expr::IsNull(col) => format!("{} IS NULL", validate_identifier(col)?),
        Expr::IsNotNull(col) => format!("{} IS NOT NULL", validate_identifier(col)?),
        Expr::And(exprs) if exprs.is_empty() => "1 = 1".to_string(),
        Expr::And(exprs) => join_exprs(exprs, " AND ")?,
        Expr::Or(exprs) if exprs.is_empty() => "1 = 0".to_string(),
        Expr::Or(exprs) => join_exprs(exprs, " OR ")?,
        Expr::Not(inner) => format!("NOT ({})", render_expr(inner)?),
        Expr::AlwaysTrue => "1 = 1".to_string(),
        Expr::AlwaysFalse => "1 = 0".to_string(),
    })
}

fn join_exprs(exprs: &[Expr], separator: &str) -> Result<String> {
    let parts = exprs
        .iter()
        .map(|expr| render_expr(expr).map(|sql| format!("({sql})")))
        .collect::<Result<Vec<_>>>()?;
    Ok(parts.join(separator))
}

/// Render a `CASE WHEN` expression mapping `column` values to numbers
///
/// `NULL` and empty values map through the `""` entry when one is present.
pub fn render_case_when<'a>(
    column: &str,
    mapping: impl IntoIterator<Item = (&'a str, f64)>,
    fallback: f64,
) -> Result<String> {
    let column = validate_identifier(column)?;
    let mut sql = String::from("CASE");
    for (category, value) in mapping {
        let value = format_float(value)?;
        if category.is_empty() {
            let _ = write!(sql, " WHEN {column} IS NULL OR {column} = '' THEN {value}");
        } else {
            let _ = write!(sql, " WHEN {column} = {} THEN {value}", quote_literal(category));
        }
    }
    let _ = write!(sql, " ELSE {} END", format_float(fallback)?);
    Ok(sql)
}
