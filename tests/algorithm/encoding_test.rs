//! Tests for the hospital-service target encoding

use std::collections::BTreeSet;

use anyhow::anyhow;
use los_pipeline::algorithm::features::{CategoricalTargetEncoder, OTHER_CATEGORY};
use los_pipeline::{EncounterSchema, PipelineError, SqlTextExecutor};

use crate::utils::{
    Encounter, FOLD_0, FOLD_1, TEST_GROUP, encounters_batch, executor, inpatient, outpatient,
};

fn training_patients() -> BTreeSet<String> {
    FOLD_0
        .iter()
        .chain(&FOLD_1)
        .map(|id| (*id).to_string())
        .collect()
}

/// Training patients stay 2 days in Medicine and 4 in Surgery; test
/// patients have a long-stay service seen nowhere else
fn skewed_encounters() -> Vec<Encounter> {
    let mut encounters = Vec::new();
    for patient in FOLD_0.iter().chain(&FOLD_1) {
        encounters.push(inpatient(patient, 0, 2, Some("Medicine")));
        encounters.push(inpatient(patient, 10, 4, Some("Surgery")));
    }
    for patient in TEST_GROUP {
        encounters.push(inpatient(patient, 0, 30, Some("Burn")));
        encounters.push(inpatient(patient, 50, 39, Some("Medicine")));
    }
    encounters
}

#[test]
fn test_fit_never_sees_test_patients() {
    let executor = executor(&skewed_encounters());
    let schema = EncounterSchema::default();
    let encoder = CategoricalTargetEncoder::new(&executor, &schema, Some(40));

    let table = encoder.fit(&training_patients(), 0).unwrap();

    assert!(!table.means().contains_key("Burn"));
    assert!((table.encode("Medicine") - 2.0).abs() < 1e-12);
    assert!((table.encode("Surgery") - 4.0).abs() < 1e-12);
    assert!((table.fallback() - 3.0).abs() < 1e-12);

    let encoded = encoder.apply(&table).unwrap();
    assert_eq!(encoded.len(), 16);
    let burn = encoded
        .iter()
        .filter(|(key, _)| TEST_GROUP.contains(&key.patient_id.as_str()))
        .filter(|(key, _)| key.admit_time == crate::utils::base_time());
    for (_, value) in burn {
        assert!((value - 3.0).abs() < 1e-12);
    }
}

#[test]
fn test_fit_rechecks_training_membership_locally() {
    // A store that ignores the pushed-down patient filter
    let batch = encounters_batch(&skewed_encounters());
    let executor = SqlTextExecutor::new(move |_sql: &str| Ok(batch.clone()));
    let schema = EncounterSchema::default();
    let encoder = CategoricalTargetEncoder::new(&executor, &schema, Some(40));

    let table = encoder.fit(&training_patients(), 0).unwrap();
    assert!(!table.means().contains_key("Burn"));
    assert!((table.encode("Medicine") - 2.0).abs() < 1e-12);
}

#[test]
fn test_rare_services_pool_into_other() {
    let mut encounters = Vec::new();
    let mut patients = BTreeSet::new();
    for (service, count, los) in [("A", 5, 2), ("B", 10, 8), ("C", 40, 3), ("D", 100, 6)] {
        for i in 0..count {
            let patient = format!("{service}{i:03}");
            encounters.push(inpatient(&patient, 0, los, Some(service)));
            patients.insert(patient);
        }
    }
    let executor = executor(&encounters);
    let schema = EncounterSchema::default();
    let table = CategoricalTargetEncoder::new(&executor, &schema, Some(40))
        .fit(&patients, 30)
        .unwrap();

    assert_eq!(table.means().len(), 3);
    assert_eq!(table.counts()[OTHER_CATEGORY], 15);
    assert!((table.means()[OTHER_CATEGORY] - 6.0).abs() < 1e-12);
    assert!((table.means()["C"] - 3.0).abs() < 1e-12);
    assert!((table.means()["D"] - 6.0).abs() < 1e-12);
    assert!((table.fallback() - 6.0).abs() < 1e-12);
}

#[test]
fn test_means_use_capped_length_of_stay() {
    let executor = executor(&[inpatient("PAT021", 0, 60, Some("Rehab"))]);
    let schema = EncounterSchema::default();
    let patients: BTreeSet<String> = ["PAT021".to_string()].into();

    let capped = CategoricalTargetEncoder::new(&executor, &schema, Some(40))
        .fit(&patients, 0)
        .unwrap();
    assert!((capped.encode("Rehab") - 40.0).abs() < 1e-12);

    let uncapped = CategoricalTargetEncoder::new(&executor, &schema, None)
        .fit(&patients, 0)
        .unwrap();
    assert!((uncapped.encode("Rehab") - 60.0).abs() < 1e-12);
}

#[test]
fn test_null_and_empty_services_share_a_bucket() {
    let encounters = vec![
        inpatient("PAT021", 0, 2, None),
        inpatient("PAT025", 0, 4, Some("")),
        inpatient("PAT029", 0, 9, Some("Medicine")),
    ];
    let executor = executor(&encounters);
    let schema = EncounterSchema::default();
    let patients: BTreeSet<String> = FOLD_0.iter().map(|id| (*id).to_string()).collect();

    let table = CategoricalTargetEncoder::new(&executor, &schema, None)
        .fit(&patients, 0)
        .unwrap();
    assert_eq!(table.counts()[""], 2);
    assert!((table.encode("") - 3.0).abs() < 1e-12);
}

#[test]
fn test_empty_training_data_is_insufficient() {
    let executor = executor(&[outpatient("PAT021", 0), inpatient("PAT003", 0, 2, None)]);
    let schema = EncounterSchema::default();
    let encoder = CategoricalTargetEncoder::new(&executor, &schema, Some(40));

    assert!(matches!(
        encoder.fit(&BTreeSet::new(), 30),
        Err(PipelineError::InsufficientData(_))
    ));
    assert!(executor.executed_queries().is_empty());

    let only_outpatient: BTreeSet<String> = ["PAT021".to_string()].into();
    assert!(matches!(
        encoder.fit(&only_outpatient, 30),
        Err(PipelineError::InsufficientData(_))
    ));
}

#[test]
fn test_executor_failure_names_component_and_template() {
    let executor = SqlTextExecutor::new(|_sql: &str| Err(anyhow!("connection reset")));
    let schema = EncounterSchema::default();
    let result = CategoricalTargetEncoder::new(&executor, &schema, Some(40))
        .fit(&training_patients(), 30);

    match result {
        Err(PipelineError::UpstreamQuery {
            component,
            template,
            source,
        }) => {
            assert_eq!(component, "service-encoder");
            assert_eq!(template, "service_encoding_fit");
            assert!(source.to_string().contains("connection reset"));
        }
        other => panic!("expected an upstream query failure, got {other:?}"),
    }
}

#[test]
fn test_encoding_renders_as_case_expression() {
    let executor = executor(&skewed_encounters());
    let schema = EncounterSchema::default();
    let table = CategoricalTargetEncoder::new(&executor, &schema, Some(40))
        .fit(&training_patients(), 0)
        .unwrap();
    assert_eq!(
        table.to_sql_case("HOSP_SERVICE").unwrap(),
        "CASE WHEN HOSP_SERVICE = 'Medicine' THEN 2.0 \
         WHEN HOSP_SERVICE = 'Surgery' THEN 4.0 ELSE 3.0 END"
    );
}
