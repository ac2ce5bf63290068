//! Prior-utilization features from a per-patient self-join
//!
//! For each clean admission L, every other clean admission R of the same
//! patient that was discharged strictly before L's admission, with fewer
//! than `lookback_days` calendar days between R's discharge date and L's
//! admission date, counts as history.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use rustc_hash::FxHashMap;

use crate::config::EncounterSchema;
use crate::error::{PipelineError, Result};
use crate::executor::{QueryExecutor, run_query};
use crate::models::{
    Admission, AdmissionKey, UtilizationCounts, admissions_from_batch, ensure_unique_keys,
};
use crate::query::admission_services;
use crate::utils::logging::{log_operation_complete, log_operation_start};

const COMPONENT: &str = "utilization";

/// Prior utilization per admission, with the suffix of its feature columns
#[derive(Debug, Clone, PartialEq)]
pub struct UtilizationTable {
    /// Suffix appended to the feature column names
    pub suffix: String,
    /// Lookback window the counts were computed with
    pub lookback_days: i64,
    /// Counts per admission; admissions without history hold zeros
    pub rows: BTreeMap<AdmissionKey, UtilizationCounts>,
}

/// Compute utilization counts for every admission
///
/// `NumberAdmissions` counts distinct gap lengths rather than admissions, so
/// two prior stays ending the same number of days before the index count
/// once.
#[must_use]
pub fn compute_utilization(
    admissions: &[Admission],
    lookback_days: i64,
) -> BTreeMap<AdmissionKey, UtilizationCounts> {
    let mut by_patient: FxHashMap<&str, Vec<&Admission>> = FxHashMap::default();
    for admission in admissions {
        by_patient
            .entry(admission.patient_id.as_str())
            .or_default()
            .push(admission);
    }

    let mut rows = BTreeMap::new();
    for history in by_patient.values() {
        for index in history {
            let mut gaps = BTreeSet::new();
            let mut services = BTreeSet::new();
            let mut inpatient_days = 0i64;

            for prior in history
                .iter()
                .filter(|prior| prior.discharge_time < index.admit_time)
            {
                let gap = (index.admit_time.date() - prior.discharge_time.date()).num_days();
                if gap >= lookback_days {
                    continue;
                }
                gaps.insert(gap);
                if let Some(service) = &prior.hospital_service {
                    services.insert(service.as_str());
                }
                inpatient_days += prior.los_days();
            }

            rows.insert(
                index.key(),
                UtilizationCounts {
                    number_admissions: count(gaps.len()),
                    number_admission_types: count(services.len()),
                    inpatient_days,
                },
            );
        }
    }
    rows
}

fn count(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// Builds prior-utilization features from clean admissions
pub struct HistoricalUtilizationBuilder<'a, E: QueryExecutor + ?Sized> {
    executor: &'a E,
    schema: &'a EncounterSchema,
}

impl<'a, E: QueryExecutor + ?Sized> HistoricalUtilizationBuilder<'a, E> {
    /// Create a builder over `executor`
    pub fn new(executor: &'a E, schema: &'a EncounterSchema) -> Self {
        Self { executor, schema }
    }

    /// Build the utilization table for a lookback window in days
    pub fn build(&self, lookback_days: i64, suffix: &str) -> Result<UtilizationTable> {
        if lookback_days < 1 {
            return Err(PipelineError::invalid_config(format!(
                "lookback window must be at least one day, got {lookback_days}"
            )));
        }
        let start = Instant::now();
        log_operation_start(
            COMPONENT,
            &format!("Building prior utilization over {lookback_days} days"),
        );

        let batch = run_query(
            self.executor,
            COMPONENT,
            &admission_services("utilization_history", self.schema),
        )?;
        let admissions = admissions_from_batch(&batch, self.schema, true, COMPONENT)?;
        ensure_unique_keys(&admissions, COMPONENT)?;
        let rows = compute_utilization(&admissions, lookback_days);

        let with_history = rows
            .values()
            .filter(|counts| **counts != UtilizationCounts::default())
            .count();
        log::debug!(
            "[{COMPONENT}] {with_history} of {} admissions have prior utilization",
            rows.len()
        );
        log_operation_complete(COMPONENT, "built", rows.len(), Some(start.elapsed()));

        Ok(UtilizationTable {
            suffix: suffix.to_string(),
            lookback_days,
            rows,
        })
    }
}
