use std::io::Write;
use std::sync::Arc;

use diabetes_dashboard::data::aggregate::group_mean;
use diabetes_dashboard::data::dashboard::{ChartData, DashboardPipeline};
use diabetes_dashboard::data::filter::{apply_filters, FilterSelection};
use diabetes_dashboard::data::loader::{load_file, LoadError};
use diabetes_dashboard::data::model::{
    CategoricalField, CategoryValue, HealthDataset, NumericField, Record,
};
use tempfile::NamedTempFile;

fn patient(gender: &str, age_group: &str, diabetes: bool) -> Record {
    Record {
        gender: gender.to_string(),
        age_group: age_group.to_string(),
        smoking_history: "never".to_string(),
        hypertension: false,
        heart_disease: false,
        hba1c_level: 5.8,
        diabetes,
    }
}

fn three_patients() -> Vec<Record> {
    vec![
        patient("Male", "50-65", true),
        patient("Female", "50-65", false),
        patient("Male", "65+", true),
    ]
}

#[test]
fn test_end_to_end_age_group_rates() {
    let records = three_patients();
    let selection = FilterSelection::new()
        .with(CategoricalField::Gender, ["Male", "Female"])
        .with(CategoricalField::AgeGroup, ["50-65", "65+"]);

    let filtered = apply_filters(&records, &selection);
    assert_eq!(filtered.len(), 3);

    let table =
        group_mean(filtered, &[CategoricalField::AgeGroup], NumericField::Diabetes).unwrap();
    let rows: Vec<(String, f64)> = table
        .rows
        .iter()
        .map(|r| (r.key[0].to_string(), r.mean))
        .collect();
    assert_eq!(
        rows,
        vec![("50-65".to_string(), 0.5), ("65+".to_string(), 1.0)]
    );
}

#[test]
fn test_single_gender_narrows_output() {
    let records = three_patients();
    let selection = FilterSelection::new().with(CategoricalField::Gender, ["Male"]);

    let filtered = apply_filters(&records, &selection);
    assert_eq!(filtered.len(), 2);

    let table = group_mean(filtered, &[CategoricalField::Gender], NumericField::Diabetes).unwrap();
    assert_eq!(table.rows.len(), 1);
    assert_eq!(table.rows[0].key, vec![CategoryValue::from("Male")]);
    assert_eq!(table.rows[0].mean, 1.0);
}

#[test]
fn test_filtered_records_satisfy_every_constraint() {
    let mut records = three_patients();
    records.push(Record {
        smoking_history: "current".to_string(),
        hypertension: true,
        ..patient("Female", "35-50", true)
    });
    let selection = FilterSelection::new()
        .with(CategoricalField::Gender, ["Female"])
        .with(CategoricalField::SmokingHistory, ["current", "never"])
        .with(CategoricalField::Hypertension, [true, false]);

    let filtered = apply_filters(&records, &selection);
    assert!(filtered.iter().all(|r| records.iter().any(|x| x == *r)));
    for field in [
        CategoricalField::Gender,
        CategoricalField::SmokingHistory,
        CategoricalField::Hypertension,
    ] {
        let accepted = selection.get(field).unwrap();
        assert!(filtered.iter().all(|r| accepted.contains(&r.category(field))));
    }
    assert_eq!(filtered.len(), 2);
}

#[test]
fn test_concurrent_sessions_share_one_dataset() {
    let dataset = Arc::new(HealthDataset::from_records(three_patients()));
    let pipeline = DashboardPipeline::new(Arc::clone(&dataset));
    let expected = pipeline.on_selection_changed(&pipeline.default_selection()).unwrap();

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let pipeline = &pipeline;
                scope.spawn(move || {
                    // Each session owns its selection.
                    let selection = if i % 2 == 0 {
                        pipeline.default_selection()
                    } else {
                        FilterSelection::new().with(CategoricalField::Gender, ["Male"])
                    };
                    (i, pipeline.on_selection_changed(&selection).unwrap())
                })
            })
            .collect();

        for handle in handles {
            let (i, snapshot) = handle.join().unwrap();
            if i % 2 == 0 {
                assert_eq!(snapshot, expected);
            } else {
                assert_eq!(snapshot.filtered_count, 2);
            }
        }
    });

    assert_eq!(dataset.len(), 3);
}

#[test]
fn test_load_csv_file_and_summarise() {
    let mut tmp = NamedTempFile::with_suffix(".csv").unwrap();
    write!(
        tmp,
        "gender,age,age_group,hypertension,heart_disease,smoking_history,\
         bmi,HbA1c_level,blood_glucose_level,diabetes\n\
         Female,80.0,65+,0,1,never,25.19,6.6,140,0\n\
         Male,28.0,18-35,0,0,never,27.32,5.7,158,0\n\
         Male,76.0,65+,1,1,current,20.14,7.0,200,1\n"
    )
    .unwrap();

    let dataset = load_file(tmp.path()).unwrap();
    assert_eq!(dataset.len(), 3);

    let pipeline = DashboardPipeline::new(Arc::new(dataset));
    let snapshot = pipeline.on_selection_changed(&pipeline.default_selection()).unwrap();
    let ChartData::Rates(cross) = &snapshot.chart("hypertension_heart_disease").unwrap().data else {
        panic!("expected a rate table");
    };
    assert_eq!(
        cross.mean_for(&[CategoryValue::Flag(true), CategoryValue::Flag(true)]),
        Some(1.0)
    );
    assert_eq!(
        cross.mean_for(&[CategoryValue::Flag(false), CategoryValue::Flag(true)]),
        Some(0.0)
    );
}

#[test]
fn test_load_parquet_file() {
    use arrow::array::{ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray};
    use arrow::record_batch::RecordBatch;
    use parquet::arrow::ArrowWriter;

    let batch = RecordBatch::try_from_iter(vec![
        ("gender", Arc::new(StringArray::from(vec!["Female", "Male"])) as ArrayRef),
        ("age_group", Arc::new(StringArray::from(vec!["50-65", "65+"])) as ArrayRef),
        ("smoking_history", Arc::new(StringArray::from(vec!["never", "former"])) as ArrayRef),
        ("hypertension", Arc::new(Int64Array::from(vec![0, 1])) as ArrayRef),
        ("heart_disease", Arc::new(BooleanArray::from(vec![false, false])) as ArrayRef),
        ("HbA1c_level", Arc::new(Float64Array::from(vec![5.0, 8.2])) as ArrayRef),
        ("diabetes", Arc::new(Int64Array::from(vec![0, 1])) as ArrayRef),
    ])
    .unwrap();

    let tmp = NamedTempFile::with_suffix(".parquet").unwrap();
    let mut writer = ArrowWriter::try_new(tmp.reopen().unwrap(), batch.schema(), None).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();

    let dataset = load_file(tmp.path()).unwrap();
    assert_eq!(dataset.len(), 2);
    assert_eq!(dataset.records[1].smoking_history, "former");
    assert!(dataset.records[1].hypertension && dataset.records[1].diabetes);
}

#[test]
fn test_missing_column_is_fatal_and_named() {
    let mut tmp = NamedTempFile::with_suffix(".csv").unwrap();
    write!(
        tmp,
        "gender,age_group,hypertension,heart_disease,HbA1c_level,diabetes\nMale,65+,0,0,6.0,1\n"
    )
    .unwrap();

    let err = load_file(tmp.path()).unwrap_err();
    assert!(matches!(&err, LoadError::MissingColumn(c) if c == "smoking_history"));
}
