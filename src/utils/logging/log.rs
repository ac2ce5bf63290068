//! Logging utilities
//!
//! Standardized log lines for pipeline steps.

use std::time::Duration;

/// Log the start of a pipeline step
///
/// # Arguments
/// * `component` - Component performing the step
/// * `operation` - Description of the operation
pub fn log_operation_start(component: &str, operation: &str) {
    log::info!("[{component}] {operation}");
}

/// Log the completion of a pipeline step
///
/// # Arguments
/// * `component` - Component that performed the step
/// * `operation` - Description of the operation, in past tense
/// * `items` - Number of items produced
/// * `elapsed` - Optional elapsed time
pub fn log_operation_complete(
    component: &str,
    operation: &str,
    items: usize,
    elapsed: Option<Duration>,
) {
    if let Some(duration) = elapsed {
        log::info!("[{component}] Successfully {operation} {items} items in {duration:?}");
    } else {
        log::info!("[{component}] Successfully {operation} {items} items");
    }
}

/// Log a warning with consistent format
///
/// # Arguments
/// * `component` - Component raising the warning
/// * `message` - Warning message
pub fn log_warning(component: &str, message: &str) {
    log::warn!("[{component}] {message}");
}
