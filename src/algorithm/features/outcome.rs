//! Length-of-stay outcome per clean admission

use std::collections::BTreeMap;
use std::time::Instant;

use crate::config::EncounterSchema;
use crate::error::{PipelineError, Result};
use crate::executor::{QueryExecutor, run_query};
use crate::models::{Admission, AdmissionKey, admissions_from_batch, ensure_unique_keys};
use crate::query::admission_times;
use crate::utils::logging::{log_operation_complete, log_operation_start};

const COMPONENT: &str = "outcome";

/// Outcome keyed by admission: length of stay in days
pub type OutcomeTable = BTreeMap<AdmissionKey, i64>;

/// Apply the optional cap to a length of stay
#[must_use]
pub fn capped_los(los_days: i64, max_days: Option<i64>) -> i64 {
    match max_days {
        Some(max_days) => los_days.min(max_days),
        None => los_days,
    }
}

/// Build an outcome table from admissions
pub fn outcomes_from_admissions(
    admissions: &[Admission],
    max_days: Option<i64>,
) -> Result<OutcomeTable> {
    ensure_unique_keys(admissions, COMPONENT)?;
    Ok(admissions
        .iter()
        .map(|admission| (admission.key(), capped_los(admission.los_days(), max_days)))
        .collect())
}

/// Reads clean admissions and derives their length of stay
pub struct OutcomeExtractor<'a, E: QueryExecutor + ?Sized> {
    executor: &'a E,
    schema: &'a EncounterSchema,
}

impl<'a, E: QueryExecutor + ?Sized> OutcomeExtractor<'a, E> {
    /// Create an extractor over `executor`
    pub fn new(executor: &'a E, schema: &'a EncounterSchema) -> Self {
        Self { executor, schema }
    }

    /// Extract the outcome table, capping length of stay at `max_days` when set
    pub fn extract(&self, max_days: Option<i64>) -> Result<OutcomeTable> {
        if let Some(max_days) = max_days {
            if max_days < 0 {
                return Err(PipelineError::invalid_config(format!(
                    "length-of-stay cap must not be negative, got {max_days}"
                )));
            }
        }
        let start = Instant::now();
        log_operation_start(COMPONENT, "Extracting length of stay for clean admissions");

        let batch = run_query(
            self.executor,
            COMPONENT,
            &admission_times("outcome_los", self.schema),
        )?;
        let admissions = admissions_from_batch(&batch, self.schema, false, COMPONENT)?;
        let table = outcomes_from_admissions(&admissions, max_days)?;

        log_operation_complete(COMPONENT, "extracted", table.len(), Some(start.elapsed()));
        Ok(table)
    }
}
