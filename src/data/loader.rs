use std::io::Read;
use std::path::Path;

use arrow::array::{
    Array, ArrayRef, AsArray, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array,
};
use arrow::compute::cast;
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;
use thiserror::Error;

use super::model::{parse_flag, HealthDataset, Record, REQUIRED_COLUMNS};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("missing required column '{0}'")]
    MissingColumn(String),

    #[error("row {row}: invalid value '{value}' in column '{column}'")]
    InvalidValue {
        row: usize,
        column: String,
        value: String,
    },

    #[error("unsupported file extension: .{0}")]
    UnsupportedExtension(String),
}

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load patient records from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`     – header row naming at least the required columns
/// * `.json`    – `[{ "gender": "Male", "diabetes": 1, ... }, ...]`
/// * `.parquet` – one column per field, as written by Pandas or Polars
pub fn load_file(path: &Path) -> Result<HealthDataset, LoadError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let dataset = match ext.as_str() {
        "csv" => load_csv(std::fs::File::open(path)?)?,
        "json" => load_json(std::fs::File::open(path)?)?,
        "parquet" | "pq" => load_parquet(std::fs::File::open(path)?)?,
        other => return Err(LoadError::UnsupportedExtension(other.to_string())),
    };

    log::info!(
        "Loaded {} records from {}",
        dataset.len(),
        path.display()
    );
    Ok(dataset)
}

fn check_columns(mut present: impl FnMut(&str) -> bool) -> Result<(), LoadError> {
    match REQUIRED_COLUMNS.iter().find(|col| !present(col)) {
        Some(missing) => Err(LoadError::MissingColumn(missing.to_string())),
        None => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row with column names, one record per line.
/// Columns beyond the required ones are ignored; fields are trimmed.
pub fn load_csv<R: Read>(input: R) -> Result<HealthDataset, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(input);
    let headers = reader.headers()?.clone();
    check_columns(|col| headers.iter().any(|h| h == col))?;

    let mut records = Vec::new();
    let mut raw = csv::StringRecord::new();
    while reader.read_record(&mut raw)? {
        let row_no = records.len();
        let record: Record = raw
            .deserialize(Some(&headers))
            .map_err(|e| csv_row_error(e, row_no, &headers, &raw))?;
        records.push(ensure_finite(record, row_no)?);
    }

    Ok(HealthDataset::from_records(records))
}

/// Turn a deserialisation failure into an error naming row, column and value.
///
/// Errors raised by the flag deserialiser carry no field index, so the flag
/// cells are re-checked by header position to find the culprit.
fn csv_row_error(
    err: csv::Error,
    row_no: usize,
    headers: &csv::StringRecord,
    raw: &csv::StringRecord,
) -> LoadError {
    let csv::ErrorKind::Deserialize { err: de, .. } = err.kind() else {
        return LoadError::Csv(err);
    };
    log::warn!("CSV row {row_no}: {de}");

    let culprit = match de.field() {
        Some(field) => Some(field as usize),
        None => FLAG_COLUMNS.iter().find_map(|col| {
            let idx = headers.iter().position(|h| h == *col)?;
            parse_flag(raw.get(idx)?).is_none().then_some(idx)
        }),
    };
    match culprit {
        Some(idx) => LoadError::InvalidValue {
            row: row_no,
            column: headers.get(idx).unwrap_or("?").to_string(),
            value: raw.get(idx).unwrap_or("").to_string(),
        },
        None => LoadError::Csv(err),
    }
}

const FLAG_COLUMNS: [&str; 3] = ["hypertension", "heart_disease", "diabetes"];

/// NaN and infinite HbA1c readings are rejected like any other bad cell.
fn ensure_finite(record: Record, row: usize) -> Result<Record, LoadError> {
    if record.hba1c_level.is_finite() {
        Ok(record)
    } else {
        Err(invalid(row, "HbA1c_level", record.hba1c_level.to_string()))
    }
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented, `df.to_json(orient='records')`):
///
/// ```json
/// [
///   { "gender": "Female", "age_group": "50-65", "smoking_history": "never",
///     "hypertension": 0, "heart_disease": 0, "HbA1c_level": 6.6, "diabetes": 1 },
///   ...
/// ]
/// ```
pub fn load_json<R: Read>(input: R) -> Result<HealthDataset, LoadError> {
    let root: JsonValue = serde_json::from_reader(input)?;
    let rows = match root {
        JsonValue::Array(rows) => rows,
        other => {
            return Err(LoadError::InvalidValue {
                row: 0,
                column: "<root>".to_string(),
                value: format!("expected a JSON array, got {}", json_kind(&other)),
            })
        }
    };

    let mut records = Vec::with_capacity(rows.len());
    for (i, row) in rows.into_iter().enumerate() {
        let Some(obj) = row.as_object() else {
            return Err(LoadError::InvalidValue {
                row: i,
                column: "<row>".to_string(),
                value: format!("expected a JSON object, got {}", json_kind(&row)),
            });
        };
        check_columns(|col| obj.contains_key(col))?;

        let record: Record = serde_json::from_value(row).map_err(|e| LoadError::InvalidValue {
            row: i,
            column: "<row>".to_string(),
            value: e.to_string(),
        })?;
        records.push(ensure_finite(record, i)?);
    }

    Ok(HealthDataset::from_records(records))
}

fn json_kind(v: &JsonValue) -> &'static str {
    match v {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file with one column per record field.
///
/// Text columns may be Utf8, LargeUtf8 or dictionary-encoded (pandas
/// `category`, Polars `Categorical`); flag columns may be Boolean, any
/// integer or float type holding 0/1, or text; `HbA1c_level` any numeric type.
pub fn load_parquet<R>(input: R) -> Result<HealthDataset, LoadError>
where
    R: parquet::file::reader::ChunkReader + 'static,
{
    let builder = ParquetRecordBatchReaderBuilder::try_new(input)?;
    {
        let schema = builder.schema();
        check_columns(|col| schema.index_of(col).is_ok())?;
    }
    let reader = builder.build()?;

    let mut records = Vec::new();
    for batch_result in reader {
        let batch = batch_result?;
        records_from_batch(&batch, records.len(), &mut records)?;
    }

    Ok(HealthDataset::from_records(records))
}

/// Append the rows of one record batch. `first_row` numbers rows in errors.
pub(crate) fn records_from_batch(
    batch: &RecordBatch,
    first_row: usize,
    out: &mut Vec<Record>,
) -> Result<(), LoadError> {
    let gender = &column(batch, "gender")?;
    let age_group = &column(batch, "age_group")?;
    let smoking = &column(batch, "smoking_history")?;
    let hypertension = &column(batch, "hypertension")?;
    let heart_disease = &column(batch, "heart_disease")?;
    let hba1c = &column(batch, "HbA1c_level")?;
    let diabetes = &column(batch, "diabetes")?;

    out.reserve(batch.num_rows());
    for row in 0..batch.num_rows() {
        let at = first_row + row;
        let record = Record {
            gender: extract_text(gender, row, at, "gender")?,
            age_group: extract_text(age_group, row, at, "age_group")?,
            smoking_history: extract_text(smoking, row, at, "smoking_history")?,
            hypertension: extract_flag(hypertension, row, at, "hypertension")?,
            heart_disease: extract_flag(heart_disease, row, at, "heart_disease")?,
            hba1c_level: extract_f64(hba1c, row, at, "HbA1c_level")?,
            diabetes: extract_flag(diabetes, row, at, "diabetes")?,
        };
        out.push(ensure_finite(record, at)?);
    }
    Ok(())
}

// -- Arrow helpers --

/// Look up a column by name, decoding dictionary-encoded columns to their values.
fn column(batch: &RecordBatch, name: &str) -> Result<ArrayRef, LoadError> {
    let col = batch
        .schema()
        .index_of(name)
        .map(|i| batch.column(i).clone())
        .map_err(|_| LoadError::MissingColumn(name.to_string()))?;
    match col.data_type() {
        DataType::Dictionary(_, values) => Ok(cast(&col, values)?),
        _ => Ok(col),
    }
}

fn invalid(at: usize, column: &str, value: impl Into<String>) -> LoadError {
    LoadError::InvalidValue {
        row: at,
        column: column.to_string(),
        value: value.into(),
    }
}

fn extract_text(col: &ArrayRef, row: usize, at: usize, name: &str) -> Result<String, LoadError> {
    if col.is_null(row) {
        return Err(invalid(at, name, "<null>"));
    }
    match col.data_type() {
        DataType::Utf8 => Ok(col.as_string::<i32>().value(row).to_string()),
        DataType::LargeUtf8 => Ok(col.as_string::<i64>().value(row).to_string()),
        other => Err(invalid(at, name, format!("expected text, got {other:?}"))),
    }
}

fn extract_f64(col: &ArrayRef, row: usize, at: usize, name: &str) -> Result<f64, LoadError> {
    if col.is_null(row) {
        return Err(invalid(at, name, "<null>"));
    }
    let any = col.as_any();
    if let Some(arr) = any.downcast_ref::<Float64Array>() {
        Ok(arr.value(row))
    } else if let Some(arr) = any.downcast_ref::<Float32Array>() {
        Ok(arr.value(row) as f64)
    } else if let Some(arr) = any.downcast_ref::<Int64Array>() {
        Ok(arr.value(row) as f64)
    } else if let Some(arr) = any.downcast_ref::<Int32Array>() {
        Ok(arr.value(row) as f64)
    } else {
        Err(invalid(at, name, format!("expected a number, got {:?}", col.data_type())))
    }
}

fn extract_flag(col: &ArrayRef, row: usize, at: usize, name: &str) -> Result<bool, LoadError> {
    if col.is_null(row) {
        return Err(invalid(at, name, "<null>"));
    }
    if let Some(arr) = col.as_any().downcast_ref::<BooleanArray>() {
        return Ok(arr.value(row));
    }
    if matches!(col.data_type(), DataType::Utf8 | DataType::LargeUtf8) {
        let text = extract_text(col, row, at, name)?;
        return parse_flag(&text).ok_or_else(|| invalid(at, name, text));
    }
    let v = extract_f64(col, row, at, name)?;
    if v == 0.0 {
        Ok(false)
    } else if v == 1.0 {
        Ok(true)
    } else {
        Err(invalid(at, name, v.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::data::model::{CategoricalField, CategoryValue};

    const HEADER: &str = "gender,age,age_group,hypertension,heart_disease,smoking_history,\
                          bmi,HbA1c_level,blood_glucose_level,diabetes";

    #[test]
    fn test_load_csv_ignores_extra_columns() {
        let csv = format!(
            "{HEADER}\n\
             Female,54.0,50-65,0,0,never,27.32,6.6,140,0\n\
             Male,70.0,65+,1,0,former,30.1,7.5,200,1\n"
        );
        let ds = load_csv(csv.as_bytes()).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.records[0].gender, "Female");
        assert_eq!(ds.records[1].hba1c_level, 7.5);
        assert!(ds.records[1].hypertension);
        assert!(ds.records[1].diabetes);
        let ages = &ds.unique_values[&CategoricalField::AgeGroup];
        assert!(ages.contains(&CategoryValue::from("65+")));
    }

    #[test]
    fn test_load_csv_missing_column_is_named() {
        let csv = "gender,age_group,smoking_history,hypertension,heart_disease,diabetes\n\
                   Male,65+,never,0,0,1\n";
        let err = load_csv(csv.as_bytes()).unwrap_err();
        assert!(matches!(&err, LoadError::MissingColumn(c) if c == "HbA1c_level"));
        assert_eq!(err.to_string(), "missing required column 'HbA1c_level'");
    }

    #[test]
    fn test_load_csv_invalid_flag() {
        let csv = format!("{HEADER}\nFemale,54.0,50-65,0,0,never,27.32,6.6,140,2\n");
        let err = load_csv(csv.as_bytes()).unwrap_err();
        match err {
            LoadError::InvalidValue { row, column, value } => {
                assert_eq!(row, 0);
                assert_eq!(column, "diabetes");
                assert_eq!(value, "2");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_load_csv_textual_flag_names_cell() {
        let csv = "gender,age_group,smoking_history,hypertension,heart_disease,\
                   HbA1c_level,diabetes\n\
                   Female,50-65,never,0,0,5.0,0\n\
                   Male,65+,never,yes,0,6.0,1\n";
        let err = load_csv(csv.as_bytes()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "row 1: invalid value 'yes' in column 'hypertension'"
        );
    }

    #[test]
    fn test_load_csv_rejects_non_finite_hba1c() {
        for bad in ["NaN", "inf"] {
            let csv = format!("{HEADER}\nFemale,54.0,50-65,0,0,never,27.32,{bad},140,0\n");
            let err = load_csv(csv.as_bytes()).unwrap_err();
            let column = match &err {
                LoadError::InvalidValue { row: 0, column, .. } => column.as_str(),
                other => panic!("{bad}: unexpected error: {other}"),
            };
            assert_eq!(column, "HbA1c_level");
        }
    }

    #[test]
    fn test_load_csv_header_only_is_empty() {
        let ds = load_csv(format!("{HEADER}\n").as_bytes()).unwrap();
        assert!(ds.is_empty());
    }

    #[test]
    fn test_load_json() {
        let json = r#"[
            {"gender":"Male","age_group":"65+","smoking_history":"never",
             "hypertension":true,"heart_disease":0,"HbA1c_level":6.0,"diabetes":1}
        ]"#;
        let ds = load_json(json.as_bytes()).unwrap();
        assert_eq!(ds.len(), 1);
        assert!(ds.records[0].hypertension);
    }

    #[test]
    fn test_load_json_rejects_out_of_range_hba1c() {
        let json = r#"[{"gender":"Male","age_group":"65+","smoking_history":"never",
             "hypertension":0,"heart_disease":0,"HbA1c_level":1e400,"diabetes":1}]"#;
        let err = load_json(json.as_bytes()).unwrap_err();
        // JSON has no NaN/inf literals; overflowing numbers fail at parse time.
        assert!(matches!(err, LoadError::Json(_)), "{err}");
    }

    #[test]
    fn test_load_json_missing_column() {
        let json = r#"[{"gender":"Male","age_group":"65+","smoking_history":"never",
             "hypertension":0,"heart_disease":0,"HbA1c_level":6.0}]"#;
        let err = load_json(json.as_bytes()).unwrap_err();
        assert!(matches!(err, LoadError::MissingColumn(c) if c == "diabetes"));
    }

    #[test]
    fn test_load_file_unsupported_extension() {
        let err = load_file(Path::new("records.xlsx")).unwrap_err();
        assert!(matches!(err, LoadError::UnsupportedExtension(e) if e == "xlsx"));
    }

    #[test]
    fn test_records_from_batch_accepts_mixed_flag_types() {
        use arrow::array::StringArray;

        let batch = RecordBatch::try_from_iter(vec![
            ("gender", Arc::new(StringArray::from(vec!["Male", "Female"])) as ArrayRef),
            ("age_group", Arc::new(StringArray::from(vec!["65+", "18-35"])) as ArrayRef),
            ("smoking_history", Arc::new(StringArray::from(vec!["never", "current"])) as ArrayRef),
            ("hypertension", Arc::new(BooleanArray::from(vec![true, false])) as ArrayRef),
            ("heart_disease", Arc::new(Int64Array::from(vec![0, 1])) as ArrayRef),
            ("HbA1c_level", Arc::new(Float32Array::from(vec![6.5f32, 5.0])) as ArrayRef),
            ("diabetes", Arc::new(Int32Array::from(vec![1, 0])) as ArrayRef),
        ])
        .unwrap();

        let mut out = Vec::new();
        records_from_batch(&batch, 0, &mut out).unwrap();
        assert_eq!(out.len(), 2);
        assert!(out[0].hypertension && out[0].diabetes && !out[0].heart_disease);
        assert!(out[1].heart_disease);
        assert_eq!(out[0].hba1c_level, 6.5);
    }

    fn batch_with(age_group: ArrayRef, hba1c: Vec<f64>) -> RecordBatch {
        use arrow::array::StringArray;

        let n = hba1c.len();
        RecordBatch::try_from_iter(vec![
            ("gender", Arc::new(StringArray::from(vec!["Female"; n])) as ArrayRef),
            ("age_group", age_group),
            ("smoking_history", Arc::new(StringArray::from(vec!["never"; n])) as ArrayRef),
            ("hypertension", Arc::new(Int64Array::from(vec![0; n])) as ArrayRef),
            ("heart_disease", Arc::new(Int64Array::from(vec![0; n])) as ArrayRef),
            ("HbA1c_level", Arc::new(Float64Array::from(hba1c)) as ArrayRef),
            ("diabetes", Arc::new(Int64Array::from(vec![1; n])) as ArrayRef),
        ])
        .unwrap()
    }

    #[test]
    fn test_records_from_batch_rejects_nan() {
        use arrow::array::StringArray;

        let ages = Arc::new(StringArray::from(vec!["65+", "65+"])) as ArrayRef;
        let batch = batch_with(ages, vec![6.0, f64::NAN]);
        let err = records_from_batch(&batch, 10, &mut Vec::new()).unwrap_err();
        match err {
            LoadError::InvalidValue { row, column, value } => {
                assert_eq!((row, column.as_str(), value.as_str()), (11, "HbA1c_level", "NaN"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_load_parquet_dictionary_text_column() {
        use arrow::array::DictionaryArray;
        use arrow::datatypes::Int32Type;
        use parquet::arrow::ArrowWriter;

        let ages: DictionaryArray<Int32Type> = vec!["50-65", "65+", "50-65"].into_iter().collect();
        let batch = batch_with(Arc::new(ages), vec![5.5, 6.5, 7.5]);

        let file = tempfile::NamedTempFile::with_suffix(".parquet").unwrap();
        let mut writer =
            ArrowWriter::try_new(file.reopen().unwrap(), batch.schema(), None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let ds = load_parquet(file.reopen().unwrap()).unwrap();
        assert_eq!(ds.len(), 3);
        assert_eq!(ds.records[1].age_group, "65+");
        assert_eq!(ds.unique_values[&CategoricalField::AgeGroup].len(), 2);
    }
}
