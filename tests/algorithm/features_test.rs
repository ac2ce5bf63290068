//! Tests for outcome and prior-utilization extraction

use std::sync::Arc;

use arrow::array::StringArray;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use los_pipeline::algorithm::features::{HistoricalUtilizationBuilder, OutcomeExtractor};
use los_pipeline::models::UtilizationCounts;
use los_pipeline::{EncounterSchema, InMemoryExecutor, PipelineError};

use crate::utils::{executor, inpatient, outpatient};

#[test]
fn test_outcome_cap() {
    let stays = [inpatient("PAT021", 0, 60, Some("Rehab"))];
    let executor = executor(&stays);
    let schema = EncounterSchema::default();
    let extractor = OutcomeExtractor::new(&executor, &schema);

    let capped = extractor.extract(Some(40)).unwrap();
    assert_eq!(capped.values().copied().collect::<Vec<_>>(), vec![40]);

    let uncapped = extractor.extract(None).unwrap();
    assert_eq!(uncapped.values().copied().collect::<Vec<_>>(), vec![60]);
}

#[test]
fn test_outcome_skips_unclean_rows() {
    let executor = executor(&[
        inpatient("PAT021", 0, 3, None),
        outpatient("PAT021", 20),
        outpatient("PAT025", 1),
    ]);
    let schema = EncounterSchema::default();
    let table = OutcomeExtractor::new(&executor, &schema).extract(Some(40)).unwrap();
    assert_eq!(table.len(), 1);
}

#[test]
fn test_duplicate_admission_keys_are_rejected() {
    let stay = inpatient("PAT021", 0, 3, Some("Medicine"));
    let executor = executor(&[stay.clone(), stay]);
    let schema = EncounterSchema::default();
    assert!(matches!(
        OutcomeExtractor::new(&executor, &schema).extract(Some(40)),
        Err(PipelineError::KeyConsistencyViolation(_))
    ));
}

#[test]
fn test_single_admission_patient_is_zero_filled() {
    let executor = executor(&[
        inpatient("PAT021", 0, 3, Some("Medicine")),
        inpatient("PAT025", 0, 3, Some("Medicine")),
        inpatient("PAT025", 10, 2, Some("Surgery")),
    ]);
    let schema = EncounterSchema::default();
    let table = HistoricalUtilizationBuilder::new(&executor, &schema)
        .build(365, "_1Y")
        .unwrap();

    assert_eq!(table.rows.len(), 3);
    let single = table
        .rows
        .iter()
        .find(|(key, _)| key.patient_id == "PAT021")
        .map(|(_, counts)| *counts)
        .unwrap();
    assert_eq!(single, UtilizationCounts::default());

    let later = table
        .rows
        .iter()
        .filter(|(key, _)| key.patient_id == "PAT025")
        .map(|(_, counts)| *counts)
        .max_by_key(|counts| counts.inpatient_days)
        .unwrap();
    assert_eq!(
        later,
        UtilizationCounts {
            number_admissions: 1,
            number_admission_types: 1,
            inpatient_days: 3,
        }
    );
}

#[test]
fn test_lookback_window_limits_history() {
    let executor = executor(&[
        inpatient("PAT021", 0, 5, Some("Medicine")),
        inpatient("PAT021", 400, 2, Some("Surgery")),
    ]);
    let schema = EncounterSchema::default();
    let builder = HistoricalUtilizationBuilder::new(&executor, &schema);

    let year = builder.build(365, "_1Y").unwrap();
    assert!(year.rows.values().all(|c| *c == UtilizationCounts::default()));

    let two_years = builder.build(730, "_2Y").unwrap();
    assert_eq!(two_years.suffix, "_2Y");
    assert_eq!(
        two_years.rows.values().map(|c| c.inpatient_days).sum::<i64>(),
        5
    );
}

#[test]
fn test_lookback_must_be_positive() {
    let executor = executor(&[inpatient("PAT021", 0, 5, None)]);
    let schema = EncounterSchema::default();
    assert!(matches!(
        HistoricalUtilizationBuilder::new(&executor, &schema).build(0, "_0D"),
        Err(PipelineError::InvalidConfiguration(_))
    ));
    assert!(executor.executed_queries().is_empty());
}

#[test]
fn test_text_timestamps_with_fractional_seconds() {
    let text = |name: &str| Field::new(name, DataType::Utf8, true);
    let batch = RecordBatch::try_new(
        Arc::new(Schema::new(vec![
            text("PATIENT_ID"),
            text("ADMIT_TIME"),
            text("DISCHARGE_TIME"),
            text("PAT_CLASS"),
            text("HOSP_SERVICE"),
        ])),
        vec![
            Arc::new(StringArray::from(vec!["PAT021", "PAT025"])),
            Arc::new(StringArray::from(vec![
                "2021-01-01 08:00:00.000",
                "2021-01-05T23:59:59.500",
            ])),
            Arc::new(StringArray::from(vec![
                "2021-01-03 10:15:00.123",
                "2021-01-06 00:00:00",
            ])),
            Arc::new(StringArray::from(vec!["Inpatient", "Inpatient"])),
            Arc::new(StringArray::from(vec![Some("Medicine"), None])),
        ],
    )
    .unwrap();
    let executor = InMemoryExecutor::new().with_table("encounters", batch);
    let schema = EncounterSchema::default();

    let table = OutcomeExtractor::new(&executor, &schema).extract(Some(40)).unwrap();
    let mut los: Vec<i64> = table.values().copied().collect();
    los.sort_unstable();
    assert_eq!(los, vec![1, 2]);
}
