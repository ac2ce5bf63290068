//! Algorithm implementations for the length-of-stay pipeline
//!
//! Patient splitting, feature engineering over clean admissions, and the
//! training runs that consume the assembled tables.

pub mod features;
pub mod split;
pub mod training;
