//! Configuration for the length-of-stay pipeline.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::query::sql::validate_identifier;

/// Default number of cross-validation folds
pub const DEFAULT_FOLDS: usize = 3;
/// Default share of hash space reserved for the holdout group
pub const DEFAULT_TEST_PERCENT: f64 = 0.2;
/// Default lookback window for prior utilization, in days
pub const DEFAULT_LOOKBACK_DAYS: i64 = 365;
/// Default cap on length of stay, in days
pub const DEFAULT_MAX_LOS_DAYS: i64 = 40;
/// Default count at or below which a hospital service is pooled into "Other"
pub const DEFAULT_RARE_THRESHOLD: usize = 30;
/// Default suffix of the historical-utilization columns
pub const DEFAULT_HISTORY_SUFFIX: &str = "_1Y";

/// Column names of the encounter table in the record store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncounterSchema {
    /// Table holding one row per encounter
    pub table: String,
    /// Patient identifier column
    pub patient_id: String,
    /// Admission timestamp column
    pub admit_time: String,
    /// Discharge timestamp column
    pub discharge_time: String,
    /// Patient class column
    pub patient_class: String,
    /// Value of the patient class column marking inpatient encounters
    pub inpatient_class: String,
    /// Hospital service column
    pub hospital_service: String,
}

impl Default for EncounterSchema {
    fn default() -> Self {
        Self {
            table: "encounters".to_string(),
            patient_id: "PATIENT_ID".to_string(),
            admit_time: "ADMIT_TIME".to_string(),
            discharge_time: "DISCHARGE_TIME".to_string(),
            patient_class: "PAT_CLASS".to_string(),
            inpatient_class: "Inpatient".to_string(),
            hospital_service: "HOSP_SERVICE".to_string(),
        }
    }
}

impl EncounterSchema {
    /// Check that every table and column name is safe to splice into query text
    pub fn validate(&self) -> Result<()> {
        for name in [
            &self.table,
            &self.patient_id,
            &self.admit_time,
            &self.discharge_time,
            &self.patient_class,
            &self.hospital_service,
        ] {
            validate_identifier(name)?;
        }
        Ok(())
    }
}

/// Configuration for a training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Number of training folds
    pub folds: usize,
    /// Share of hash space reserved for the holdout group, in (0, 1)
    pub test_percent: f64,
    /// Lookback window for prior utilization, in days
    pub lookback_days: i64,
    /// Cap applied to length of stay; `None` disables the cap
    pub max_los_days: Option<i64>,
    /// Services with at most this many training admissions are pooled into "Other"
    pub rare_threshold: usize,
    /// Suffix appended to historical-utilization column names
    pub history_suffix: String,
    /// Encounter table layout
    pub schema: EncounterSchema,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            folds: DEFAULT_FOLDS,
            test_percent: DEFAULT_TEST_PERCENT,
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            max_los_days: Some(DEFAULT_MAX_LOS_DAYS),
            rare_threshold: DEFAULT_RARE_THRESHOLD,
            history_suffix: DEFAULT_HISTORY_SUFFIX.to_string(),
            schema: EncounterSchema::default(),
        }
    }
}

impl PipelineConfig {
    /// Create a configuration with default settings
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration from a JSON file; missing keys take their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the fold layout
    #[must_use]
    pub fn with_folds(mut self, folds: usize, test_percent: f64) -> Self {
        self.folds = folds;
        self.test_percent = test_percent;
        self
    }

    /// Set the lookback window and column suffix for prior utilization
    #[must_use]
    pub fn with_lookback(mut self, days: i64, suffix: impl Into<String>) -> Self {
        self.lookback_days = days;
        self.history_suffix = suffix.into();
        self
    }

    /// Set or disable the length-of-stay cap
    #[must_use]
    pub fn with_max_los(mut self, max_days: Option<i64>) -> Self {
        self.max_los_days = max_days;
        self
    }

    /// Set the rare-category pooling threshold
    #[must_use]
    pub fn with_rare_threshold(mut self, threshold: usize) -> Self {
        self.rare_threshold = threshold;
        self
    }

    /// Set the encounter table layout
    #[must_use]
    pub fn with_schema(mut self, schema: EncounterSchema) -> Self {
        self.schema = schema;
        self
    }

    /// Reject configurations that would make the run meaningless
    pub fn validate(&self) -> Result<()> {
        validate_split_params(self.test_percent, self.folds)?;
        if self.lookback_days < 1 {
            return Err(PipelineError::invalid_config(format!(
                "lookback window must be at least one day, got {}",
                self.lookback_days
            )));
        }
        if let Some(max_days) = self.max_los_days {
            if max_days < 0 {
                return Err(PipelineError::invalid_config(format!(
                    "length-of-stay cap must not be negative, got {max_days}"
                )));
            }
        }
        if !self.history_suffix.is_empty() {
            validate_identifier(&format!("Inpatient_Days{}", self.history_suffix))?;
        }
        self.schema.validate()
    }
}

/// Validate the holdout share and fold count of a split
pub fn validate_split_params(test_percent: f64, folds: usize) -> Result<()> {
    if !(test_percent > 0.0 && test_percent < 1.0) {
        return Err(PipelineError::invalid_config(format!(
            "test fraction must lie in (0, 1), got {test_percent}"
        )));
    }
    if folds < 1 {
        return Err(PipelineError::invalid_config(
            "at least one training fold is required",
        ));
    }
    Ok(())
}

impl fmt::Display for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Pipeline Configuration:")?;
        writeln!(f, "  Folds: {}", self.folds)?;
        writeln!(f, "  Test Fraction: {}", self.test_percent)?;
        writeln!(f, "  Lookback Days: {}", self.lookback_days)?;
        match self.max_los_days {
            Some(max_days) => writeln!(f, "  LOS Cap: {max_days} days")?,
            None => writeln!(f, "  LOS Cap: disabled")?,
        }
        writeln!(f, "  Rare Service Threshold: {}", self.rare_threshold)?;
        writeln!(f, "  History Suffix: {}", self.history_suffix)?;
        writeln!(f, "  Encounter Table: {}", self.schema.table)?;
        Ok(())
    }
}
