//! Deterministic patient-level splitting

pub mod folds;
pub mod hash;

pub use folds::{FoldAssignment, PatientGroup, PatientSplitter, TestSource, assign_group};
pub use hash::patient_hash;
