//! Assembled feature tables handed to model training
//!
//! A feature table is an Arrow record batch whose first two columns are the
//! admission key, followed by the outcome column and then every feature in
//! a fixed order.

use std::collections::BTreeSet;
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, Float64Array, Int64Array, StringArray, TimestampMillisecondArray,
};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;

use crate::error::{PipelineError, Result};
use crate::models::admission::AdmissionKey;
use crate::utils::arrow::{downcast_array, get_column_as, string_values};

/// Outcome column name
pub const OUTCOME_COLUMN: &str = "LOS";
/// Target-encoded hospital service column name
pub const MEAN_SERVICE_LOS_COLUMN: &str = "meanServiceLOS";

/// Name of the prior-admission count column for `suffix`
#[must_use]
pub fn number_admissions_column(suffix: &str) -> String {
    format!("Number_Admissions{suffix}")
}

/// Name of the distinct prior-service count column for `suffix`
#[must_use]
pub fn number_admission_types_column(suffix: &str) -> String {
    format!("Number_Admission_Types{suffix}")
}

/// Name of the prior inpatient-days column for `suffix`
#[must_use]
pub fn inpatient_days_column(suffix: &str) -> String {
    format!("Inpatient_Days{suffix}")
}

/// Prior utilization aggregates of one admission
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UtilizationCounts {
    /// Distinct prior gap-days within the lookback window
    pub number_admissions: i64,
    /// Distinct prior hospital services within the lookback window
    pub number_admission_types: i64,
    /// Sum of prior lengths of stay within the lookback window
    pub inpatient_days: i64,
}

/// One joined row of the feature table
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    /// Admission key
    pub key: AdmissionKey,
    /// Outcome: length of stay in days
    pub los: i64,
    /// Prior utilization features
    pub utilization: UtilizationCounts,
    /// Target-encoded hospital service
    pub mean_service_los: f64,
}

/// Row-aligned feature table keyed by (patient, admit time)
#[derive(Debug, Clone)]
pub struct FeatureTable {
    batch: RecordBatch,
    patient_id_column: String,
    admit_time_column: String,
}

impl FeatureTable {
    /// Build a table from joined rows
    ///
    /// # Arguments
    /// * `rows` - Joined rows, in output order
    /// * `patient_id_column` / `admit_time_column` - Key column names
    /// * `suffix` - Suffix of the utilization feature columns
    pub fn from_rows(
        rows: &[FeatureRow],
        patient_id_column: &str,
        admit_time_column: &str,
        suffix: &str,
    ) -> Result<Self> {
        let schema = Schema::new(vec![
            Field::new(patient_id_column, DataType::Utf8, false),
            Field::new(
                admit_time_column,
                DataType::Timestamp(TimeUnit::Millisecond, None),
                false,
            ),
            Field::new(OUTCOME_COLUMN, DataType::Int64, false),
            Field::new(number_admissions_column(suffix), DataType::Int64, false),
            Field::new(number_admission_types_column(suffix), DataType::Int64, false),
            Field::new(inpatient_days_column(suffix), DataType::Int64, false),
            Field::new(MEAN_SERVICE_LOS_COLUMN, DataType::Float64, false),
        ]);

        let columns: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from_iter_values(
                rows.iter().map(|r| r.key.patient_id.as_str()),
            )),
            Arc::new(TimestampMillisecondArray::from_iter_values(
                rows.iter().map(|r| r.key.admit_time.and_utc().timestamp_millis()),
            )),
            Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.los))),
            Arc::new(Int64Array::from_iter_values(
                rows.iter().map(|r| r.utilization.number_admissions),
            )),
            Arc::new(Int64Array::from_iter_values(
                rows.iter().map(|r| r.utilization.number_admission_types),
            )),
            Arc::new(Int64Array::from_iter_values(
                rows.iter().map(|r| r.utilization.inpatient_days),
            )),
            Arc::new(Float64Array::from_iter_values(
                rows.iter().map(|r| r.mean_service_los),
            )),
        ];

        Ok(Self {
            batch: RecordBatch::try_new(Arc::new(schema), columns)?,
            patient_id_column: patient_id_column.to_string(),
            admit_time_column: admit_time_column.to_string(),
        })
    }

    /// The underlying record batch
    #[must_use]
    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    /// Number of admissions in the table
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    /// Whether the table has no rows
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.batch.num_rows() == 0
    }

    /// Name of the outcome column
    #[must_use]
    pub fn outcome_column(&self) -> &str {
        OUTCOME_COLUMN
    }

    /// Feature columns in table order: everything except the key and outcome
    #[must_use]
    pub fn feature_columns(&self) -> Vec<String> {
        self.batch
            .schema()
            .fields()
            .iter()
            .map(|field| field.name().clone())
            .filter(|name| {
                name != &self.patient_id_column
                    && name != &self.admit_time_column
                    && name != OUTCOME_COLUMN
            })
            .collect()
    }

    /// Values of a numeric column as `f64`
    pub fn column_f64(&self, name: &str) -> Result<Vec<f64>> {
        let column = get_column_as(&self.batch, name, &DataType::Float64)?;
        let values = downcast_array::<Float64Array>(&column, name, "Float64")?;
        if values.null_count() > 0 {
            return Err(PipelineError::InvalidDataType {
                column: name.to_string(),
                expected: "non-null numeric".to_string(),
            });
        }
        Ok(values.values().to_vec())
    }

    /// Outcome values as `f64`
    pub fn outcome_values(&self) -> Result<Vec<f64>> {
        self.column_f64(OUTCOME_COLUMN)
    }

    /// Row-major feature matrix for `features`
    pub fn feature_matrix(&self, features: &[String]) -> Result<Vec<Vec<f64>>> {
        let columns = features
            .iter()
            .map(|name| self.column_f64(name))
            .collect::<Result<Vec<_>>>()?;
        Ok((0..self.num_rows())
            .map(|row| columns.iter().map(|column| column[row]).collect())
            .collect())
    }

    /// Distinct patients present in the table
    pub fn patient_ids(&self) -> Result<BTreeSet<String>> {
        Ok(string_values(&self.batch, &self.patient_id_column)?
            .into_iter()
            .flatten()
            .collect())
    }
}
