//! Feature engineering over clean admissions

pub mod assembler;
pub mod encoding;
pub mod outcome;
pub mod utilization;

pub use assembler::{AssembledTables, FeatureTableAssembler, join_features};
pub use encoding::{CategoricalTargetEncoder, EncodingTable, OTHER_CATEGORY};
pub use outcome::{OutcomeExtractor, OutcomeTable, capped_los};
pub use utilization::{HistoricalUtilizationBuilder, UtilizationTable, compute_utilization};
