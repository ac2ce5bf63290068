//! Clean inpatient admissions as typed rows

use std::collections::BTreeSet;
use std::fmt;

use arrow::record_batch::RecordBatch;
use chrono::NaiveDateTime;

use crate::config::EncounterSchema;
use crate::error::{PipelineError, Result};
use crate::utils::arrow::{datetime_values, string_values};
use crate::utils::logging::log_warning;

/// Row key shared by every per-admission table
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AdmissionKey {
    /// Patient identifier
    pub patient_id: String,
    /// Admission timestamp (index time)
    pub admit_time: NaiveDateTime,
}

impl AdmissionKey {
    /// Create a key
    pub fn new(patient_id: impl Into<String>, admit_time: NaiveDateTime) -> Self {
        Self {
            patient_id: patient_id.into(),
            admit_time,
        }
    }
}

impl fmt::Display for AdmissionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.patient_id, self.admit_time)
    }
}

/// One clean inpatient encounter
#[derive(Debug, Clone, PartialEq)]
pub struct Admission {
    /// Patient identifier
    pub patient_id: String,
    /// Admission timestamp
    pub admit_time: NaiveDateTime,
    /// Discharge timestamp
    pub discharge_time: NaiveDateTime,
    /// Hospital service as stored, when present and requested
    pub hospital_service: Option<String>,
}

impl Admission {
    /// Row key of this admission
    #[must_use]
    pub fn key(&self) -> AdmissionKey {
        AdmissionKey::new(self.patient_id.clone(), self.admit_time)
    }

    /// Length of stay in whole calendar days between admit and discharge dates
    #[must_use]
    pub fn los_days(&self) -> i64 {
        (self.discharge_time.date() - self.admit_time.date()).num_days()
    }

    /// Service bucket used for target encoding; null and empty share `""`
    #[must_use]
    pub fn service_bucket(&self) -> &str {
        self.hospital_service.as_deref().unwrap_or("")
    }
}

/// Convert a query result into admissions
///
/// Rows missing a patient identifier or either timestamp are skipped with a
/// warning. The hospital service column is read only when `with_service`.
pub fn admissions_from_batch(
    batch: &RecordBatch,
    schema: &EncounterSchema,
    with_service: bool,
    component: &str,
) -> Result<Vec<Admission>> {
    let patient_ids = string_values(batch, &schema.patient_id)?;
    let admit_times = datetime_values(batch, &schema.admit_time)?;
    let discharge_times = datetime_values(batch, &schema.discharge_time)?;
    let services = if with_service {
        Some(string_values(batch, &schema.hospital_service)?)
    } else {
        None
    };

    let mut admissions = Vec::with_capacity(batch.num_rows());
    let mut skipped = 0usize;
    for row in 0..batch.num_rows() {
        let (Some(patient_id), Some(admit_time), Some(discharge_time)) = (
            patient_ids[row].clone(),
            admit_times[row],
            discharge_times[row],
        ) else {
            skipped += 1;
            continue;
        };
        let hospital_service = services
            .as_ref()
            .and_then(|values| values[row].clone());
        admissions.push(Admission {
            patient_id,
            admit_time,
            discharge_time,
            hospital_service,
        });
    }

    if skipped > 0 {
        log_warning(
            component,
            &format!("Skipped {skipped} admissions without identifier or timestamps"),
        );
    }
    Ok(admissions)
}

/// Fail when two admissions share a (patient, admit time) key
pub fn ensure_unique_keys(admissions: &[Admission], component: &str) -> Result<()> {
    let mut seen = BTreeSet::new();
    for admission in admissions {
        let key = admission.key();
        if !seen.insert(key.clone()) {
            return Err(PipelineError::key_violation(format!(
                "{component}: duplicate admission key {key}"
            )));
        }
    }
    Ok(())
}
