//! Filtering of Arrow record batches by typed query expressions

pub mod core;
pub mod expr;

pub use core::{filter_by_expr, filter_record_batch};
pub use expr::{Expr, LiteralValue, evaluate_expr};
