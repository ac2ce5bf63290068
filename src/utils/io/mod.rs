//! IO utilities for file operations

pub mod csv;
pub mod parquet;

// Re-export commonly used functions for convenience
pub use csv::write_csv;
pub use parquet::{
    find_parquet_files, load_parquet_files_parallel, load_parquet_path, read_parquet,
    validate_directory,
};
