//! Parquet file operations
//!
//! Reading encounter extracts stored as a single Parquet file or as a
//! directory of Parquet files.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Instant;

use arrow::record_batch::RecordBatch;
use itertools::Itertools;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use rayon::prelude::*;

use crate::error::{PipelineError, Result};
use crate::utils::logging::{log_operation_complete, log_operation_start, log_warning};

/// Default batch size for Parquet reading
pub const DEFAULT_BATCH_SIZE: usize = 16384;

const COMPONENT: &str = "parquet";

/// Validates that a directory exists and is a directory
pub fn validate_directory(dir: &Path) -> Result<()> {
    if !dir.is_dir() {
        return Err(PipelineError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Directory does not exist: {}", dir.display()),
        )));
    }
    Ok(())
}

/// Read a parquet file into Arrow record batches
pub fn read_parquet(path: &Path) -> Result<Vec<RecordBatch>> {
    let start = Instant::now();
    log_operation_start(COMPONENT, &format!("Reading {}", path.display()));

    let file = File::open(path).map_err(|e| {
        PipelineError::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to open file {}: {e}", path.display()),
        ))
    })?;

    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?
        .with_batch_size(DEFAULT_BATCH_SIZE)
        .build()?;

    let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;

    log_operation_complete(COMPONENT, "read", batches.len(), Some(start.elapsed()));
    Ok(batches)
}

/// Find all Parquet files in a directory, sorted by name
pub fn find_parquet_files(dir: &Path) -> Result<Vec<PathBuf>> {
    validate_directory(dir)?;

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "parquet") {
            files.push(path);
        }
    }

    if files.is_empty() {
        log_warning(
            COMPONENT,
            &format!("No Parquet files found in {}", dir.display()),
        );
    }
    Ok(files.into_iter().sorted().collect_vec())
}

/// Load all parquet files from a directory in parallel
///
/// Batches keep the file order of [`find_parquet_files`].
pub fn load_parquet_files_parallel(dir: &Path) -> Result<Vec<RecordBatch>> {
    let parquet_files = find_parquet_files(dir)?;

    let per_file = parquet_files
        .par_iter()
        .map(|path| read_parquet(path))
        .collect::<Result<Vec<_>>>()?;

    let batches = per_file.into_iter().flatten().collect_vec();
    log::info!(
        "Loaded {} batches from {} Parquet files",
        batches.len(),
        parquet_files.len()
    );
    Ok(batches)
}

/// Load a Parquet file, or every Parquet file of a directory
pub fn load_parquet_path(path: &Path) -> Result<Vec<RecordBatch>> {
    if path.is_dir() {
        load_parquet_files_parallel(path)
    } else {
        read_parquet(path)
    }
}
