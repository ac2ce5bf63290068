//! End-to-end tests over the ten-patient fixture

use std::collections::BTreeSet;
use std::fs::File;

use los_pipeline::algorithm::training::cross_validate;
use los_pipeline::{
    FoldAssignment, LosPipeline, MeanBaseline, ParquetExecutor, PipelineConfig, PipelineError,
    TestSource, cache_tables,
};
use parquet::arrow::ArrowWriter;

use crate::utils::{
    FOLD_0, FOLD_1, TEST_GROUP, encounters_batch, executor, fixture_encounters,
};

fn ids(groups: &[&[&str]]) -> BTreeSet<String> {
    groups
        .iter()
        .flat_map(|group| group.iter().map(|id| (*id).to_string()))
        .collect()
}

fn config() -> PipelineConfig {
    PipelineConfig::default().with_folds(2, 0.2)
}

#[test]
fn test_all_folds_evaluate_on_holdout_group() {
    let executor = executor(&fixture_encounters());
    let pipeline = LosPipeline::new(&executor, config()).unwrap();
    let assignment = pipeline.split().unwrap();

    let tables = pipeline
        .training_datasets(&assignment, &[0, 1].into())
        .unwrap();

    assert_eq!(tables.test_source, TestSource::HoldoutGroup);
    assert_eq!(tables.train.patient_ids().unwrap(), ids(&[&FOLD_0, &FOLD_1]));
    assert_eq!(tables.test.patient_ids().unwrap(), ids(&[&TEST_GROUP]));
    assert_eq!(tables.train.num_rows(), 12);
    assert_eq!(tables.test.num_rows(), 4);
    assert_eq!(
        tables.feature_columns(),
        vec![
            "Number_Admissions_1Y",
            "Number_Admission_Types_1Y",
            "Inpatient_Days_1Y",
            "meanServiceLOS"
        ]
    );
}

#[test]
fn test_partial_selection_evaluates_on_excluded_folds() {
    let executor = executor(&fixture_encounters());
    let pipeline = LosPipeline::new(&executor, config()).unwrap();
    let assignment = pipeline.split().unwrap();

    let tables = pipeline
        .training_datasets(&assignment, &[0].into())
        .unwrap();

    assert_eq!(tables.test_source, TestSource::ExcludedFolds([1].into()));
    assert_eq!(tables.train.patient_ids().unwrap(), ids(&[&FOLD_0]));
    assert_eq!(tables.test.patient_ids().unwrap(), ids(&[&FOLD_1]));
    // Only fold 0 patients contribute to the encoding
    assert_eq!(tables.encoding.counts().values().sum::<usize>(), 6);
}

#[test]
fn test_bad_fold_selection_fails_before_queries() {
    let executor = executor(&fixture_encounters());
    let pipeline = LosPipeline::new(&executor, config()).unwrap();
    let assignment = FoldAssignment::split(crate::utils::fixture_patients(), 0.2, 2).unwrap();

    for selection in [BTreeSet::new(), [2].into(), [0, 5].into()] {
        assert!(matches!(
            pipeline.training_datasets(&assignment, &selection),
            Err(PipelineError::InvalidConfiguration(_))
        ));
    }
    assert!(executor.executed_queries().is_empty());
}

#[test]
fn test_invalid_configuration_is_rejected_up_front() {
    let executor = executor(&fixture_encounters());
    assert!(LosPipeline::new(&executor, PipelineConfig::default().with_folds(0, 0.2)).is_err());
    assert!(LosPipeline::new(&executor, PipelineConfig::default().with_lookback(0, "_0D")).is_err());
}

#[test]
fn test_full_train_with_baseline() {
    let executor = executor(&fixture_encounters());
    let pipeline = LosPipeline::new(&executor, config()).unwrap();
    let assignment = pipeline.split().unwrap();

    let (tables, report) = pipeline.full_train(&assignment, &MeanBaseline).unwrap();

    assert_eq!(report.test_source, TestSource::HoldoutGroup);
    assert_eq!(report.train_folds, [0, 1].into());
    assert_eq!(report.train_metrics.rows, tables.train.num_rows());
    assert!(report.train_metrics.explained_variance.abs() < 1e-9);
    let test_metrics = report.test_metrics.unwrap();
    assert_eq!(test_metrics.rows, 4);
    assert!(test_metrics.mse >= 0.0);
}

#[test]
fn test_cross_validation_holds_out_each_fold() {
    let executor = executor(&fixture_encounters());
    let pipeline = LosPipeline::new(&executor, config()).unwrap();
    let assignment = pipeline.split().unwrap();

    let reports = pipeline.cross_validate(&assignment, &MeanBaseline).unwrap();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].test_source, TestSource::ExcludedFolds([0].into()));
    assert_eq!(reports[1].test_source, TestSource::ExcludedFolds([1].into()));
    assert_eq!(reports[0].train_folds, [1].into());

    let single = FoldAssignment::split(crate::utils::fixture_patients(), 0.2, 1).unwrap();
    assert!(matches!(
        cross_validate(&executor, &config(), &single, &MeanBaseline),
        Err(PipelineError::InvalidConfiguration(_))
    ));
}

#[test]
fn test_parquet_store_and_csv_cache() {
    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path().join("encounters");
    std::fs::create_dir_all(&data_dir).unwrap();

    let batch = encounters_batch(&fixture_encounters());
    let (first, second) = (batch.slice(0, 10), batch.slice(10, batch.num_rows() - 10));
    for (name, part) in [("part-0.parquet", first), ("part-1.parquet", second)] {
        let file = File::create(data_dir.join(name)).unwrap();
        let mut writer = ArrowWriter::try_new(file, part.schema(), None).unwrap();
        writer.write(&part).unwrap();
        writer.close().unwrap();
    }

    let executor = ParquetExecutor::open("encounters", &data_dir).unwrap();
    let pipeline = LosPipeline::new(&executor, config()).unwrap();
    let assignment = pipeline.split().unwrap();
    assert_eq!(assignment.test_group(), &ids(&[&TEST_GROUP]));

    let (tables, _) = pipeline.full_train(&assignment, &MeanBaseline).unwrap();
    let (train_path, test_path) = cache_tables(&tables, &dir.path().join("cache")).unwrap();

    let train_csv = std::fs::read_to_string(train_path).unwrap();
    assert!(train_csv.starts_with(
        "PATIENT_ID,ADMIT_TIME,LOS,Number_Admissions_1Y,Number_Admission_Types_1Y,\
         Inpatient_Days_1Y,meanServiceLOS"
    ));
    assert_eq!(train_csv.lines().count(), 13);
    let test_csv = std::fs::read_to_string(test_path).unwrap();
    assert_eq!(test_csv.lines().count(), 5);
}
