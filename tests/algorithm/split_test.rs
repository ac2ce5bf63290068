//! Tests for patient-level splitting

use std::collections::BTreeSet;

use los_pipeline::algorithm::split::{FoldAssignment, PatientGroup, PatientSplitter};
use los_pipeline::filter::Expr;
use los_pipeline::{EncounterSchema, PipelineError, Query};
use proptest::prelude::*;

use crate::utils::{
    FOLD_0, FOLD_1, TEST_GROUP, UNASSIGNED, executor, fixture_encounters, fixture_patients,
    inpatient, outpatient,
};

fn set(ids: &[&str]) -> BTreeSet<String> {
    ids.iter().map(|id| (*id).to_string()).collect()
}

#[test]
fn test_fixture_membership_matches_precomputed_hashes() {
    let assignment = FoldAssignment::split(fixture_patients(), 0.2, 2).unwrap();

    assert_eq!(assignment.test_group(), &set(&TEST_GROUP));
    assert_eq!(assignment.train_folds()[0], set(&FOLD_0));
    assert_eq!(assignment.train_folds()[1], set(&FOLD_1));
    assert_eq!(assignment.unassigned(), &set(&UNASSIGNED));

    assert_eq!(assignment.group_of("PAT003"), PatientGroup::Test);
    assert_eq!(assignment.group_of("PAT025"), PatientGroup::Fold(0));
    assert_eq!(assignment.group_of("PAT031"), PatientGroup::Fold(1));
    assert_eq!(assignment.group_of("PAT002"), PatientGroup::Unassigned);
}

#[test]
fn test_splitter_reads_clean_admission_universe() {
    let mut encounters = fixture_encounters();
    // Only non-clean rows for this patient
    encounters.push(outpatient("PAT999", 5));
    let executor = executor(&encounters);
    let schema = EncounterSchema::default();

    let splitter = PatientSplitter::new(&executor, &schema);
    let universe = splitter.universe().unwrap();
    assert_eq!(universe, set(&fixture_patients()));

    let assignment = splitter.split(0.2, 2).unwrap();
    assert!(!assignment.test_group().contains("PAT999"));
    assert_eq!(assignment.test_group(), &set(&TEST_GROUP));
    assert_eq!(
        executor.executed_queries(),
        vec!["patient_universe".to_string(), "patient_universe".to_string()]
    );
}

#[test]
fn test_invalid_parameters_fail_before_any_query() {
    let executor = executor(&fixture_encounters());
    let schema = EncounterSchema::default();
    let splitter = PatientSplitter::new(&executor, &schema);

    for (test_percent, folds) in [(0.0, 2), (1.0, 2), (1.5, 2), (0.2, 0)] {
        assert!(matches!(
            splitter.split(test_percent, folds),
            Err(PipelineError::InvalidConfiguration(_))
        ));
    }
    assert!(executor.executed_queries().is_empty());
}

#[test]
fn test_custom_universe_query() {
    let encounters = vec![
        inpatient("PAT003", 0, 2, Some("Medicine")),
        inpatient("PAT021", 0, 2, Some("Surgery")),
        inpatient("PAT031", 0, 2, Some("Surgery")),
    ];
    let executor = executor(&encounters);
    let schema = EncounterSchema::default();
    let query = Query::select("surgical_patients", "encounters", &["PATIENT_ID"])
        .and_where(Expr::Eq("HOSP_SERVICE".into(), "Surgery".into()))
        .distinct();

    let assignment = PatientSplitter::new(&executor, &schema)
        .with_universe_query(query)
        .split(0.2, 2)
        .unwrap();

    assert!(assignment.test_group().is_empty());
    assert_eq!(assignment.train_folds()[0], set(&["PAT021"]));
    assert_eq!(assignment.train_folds()[1], set(&["PAT031"]));
}

proptest! {
    #[test]
    fn test_every_identifier_lands_in_at_most_one_group(
        ids in proptest::collection::btree_set("[A-Z]{3}[0-9]{1,6}", 0..200),
        test_percent in 0.01f64..0.99,
        folds in 1usize..8,
    ) {
        let assignment = FoldAssignment::split(ids.iter().cloned(), test_percent, folds).unwrap();

        let mut seen = BTreeSet::new();
        let groups = std::iter::once(assignment.test_group())
            .chain(assignment.train_folds())
            .chain(std::iter::once(assignment.unassigned()));
        for group in groups {
            for id in group {
                prop_assert!(seen.insert(id.clone()), "{} assigned twice", id);
            }
        }
        prop_assert_eq!(&seen, &ids);

        let again = FoldAssignment::split(ids.iter().cloned(), test_percent, folds).unwrap();
        prop_assert_eq!(again, assignment);
    }
}
