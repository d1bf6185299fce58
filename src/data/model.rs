use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ---------------------------------------------------------------------------
// CategoryValue – a single cell in a categorical column
// ---------------------------------------------------------------------------

/// A value of a categorical field: free text (`gender`, `age_group`, ...)
/// or a 0/1 flag (`hypertension`, `heart_disease`, `diabetes`).
///
/// Must be `Ord` because selections and group keys live in `BTreeSet` /
/// `BTreeMap`. Flags sort before text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CategoryValue {
    Flag(bool),
    Text(String),
}

impl fmt::Display for CategoryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategoryValue::Flag(b) => write!(f, "{}", u8::from(*b)),
            CategoryValue::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for CategoryValue {
    fn from(s: &str) -> Self {
        CategoryValue::Text(s.to_string())
    }
}

impl From<bool> for CategoryValue {
    fn from(b: bool) -> Self {
        CategoryValue::Flag(b)
    }
}

// ---------------------------------------------------------------------------
// Field names
// ---------------------------------------------------------------------------

/// Fields that can be used as a filter or a group-by key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CategoricalField {
    Gender,
    AgeGroup,
    SmokingHistory,
    Hypertension,
    HeartDisease,
    Diabetes,
}

impl CategoricalField {
    /// Fields offered as sidebar filters, in display order.
    pub const FILTERABLE: [CategoricalField; 5] = [
        CategoricalField::Gender,
        CategoricalField::AgeGroup,
        CategoricalField::SmokingHistory,
        CategoricalField::Hypertension,
        CategoricalField::HeartDisease,
    ];

    pub const ALL: [CategoricalField; 6] = [
        CategoricalField::Gender,
        CategoricalField::AgeGroup,
        CategoricalField::SmokingHistory,
        CategoricalField::Hypertension,
        CategoricalField::HeartDisease,
        CategoricalField::Diabetes,
    ];

    /// Column name in the source table.
    pub fn column_name(self) -> &'static str {
        match self {
            CategoricalField::Gender => "gender",
            CategoricalField::AgeGroup => "age_group",
            CategoricalField::SmokingHistory => "smoking_history",
            CategoricalField::Hypertension => "hypertension",
            CategoricalField::HeartDisease => "heart_disease",
            CategoricalField::Diabetes => "diabetes",
        }
    }

    /// Human-readable label for axes and filter headers.
    pub fn label(self) -> &'static str {
        match self {
            CategoricalField::Gender => "Gender",
            CategoricalField::AgeGroup => "Age Group",
            CategoricalField::SmokingHistory => "Smoking History",
            CategoricalField::Hypertension => "Hypertension",
            CategoricalField::HeartDisease => "Heart Disease",
            CategoricalField::Diabetes => "Diabetes Status",
        }
    }
}

impl fmt::Display for CategoricalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

/// Fields that can be averaged or summarised as a distribution.
/// Flags count as 0.0 / 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumericField {
    Diabetes,
    Hypertension,
    HeartDisease,
    HbA1cLevel,
}

impl NumericField {
    pub fn column_name(self) -> &'static str {
        match self {
            NumericField::Diabetes => "diabetes",
            NumericField::Hypertension => "hypertension",
            NumericField::HeartDisease => "heart_disease",
            NumericField::HbA1cLevel => "HbA1c_level",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            NumericField::Diabetes => "Diabetes Rate",
            NumericField::Hypertension => "Hypertension Rate",
            NumericField::HeartDisease => "Heart Disease Rate",
            NumericField::HbA1cLevel => "HbA1c Level",
        }
    }
}

impl fmt::Display for NumericField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

/// Columns every table source must provide.
pub const REQUIRED_COLUMNS: [&str; 7] = [
    "gender",
    "age_group",
    "smoking_history",
    "hypertension",
    "heart_disease",
    "HbA1c_level",
    "diabetes",
];

// ---------------------------------------------------------------------------
// Record – one patient row
// ---------------------------------------------------------------------------

/// A single patient record (one row of the source table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub gender: String,
    pub age_group: String,
    pub smoking_history: String,
    #[serde(serialize_with = "ser_flag", deserialize_with = "de_flag")]
    pub hypertension: bool,
    #[serde(serialize_with = "ser_flag", deserialize_with = "de_flag")]
    pub heart_disease: bool,
    #[serde(rename = "HbA1c_level")]
    pub hba1c_level: f64,
    #[serde(serialize_with = "ser_flag", deserialize_with = "de_flag")]
    pub diabetes: bool,
}

impl Record {
    /// Value of a categorical field for this record.
    pub fn category(&self, field: CategoricalField) -> CategoryValue {
        match field {
            CategoricalField::Gender => CategoryValue::Text(self.gender.clone()),
            CategoricalField::AgeGroup => CategoryValue::Text(self.age_group.clone()),
            CategoricalField::SmokingHistory => CategoryValue::Text(self.smoking_history.clone()),
            CategoricalField::Hypertension => CategoryValue::Flag(self.hypertension),
            CategoricalField::HeartDisease => CategoryValue::Flag(self.heart_disease),
            CategoricalField::Diabetes => CategoryValue::Flag(self.diabetes),
        }
    }

    /// Whether this record's value for `field` is one of `accepted`.
    /// Avoids cloning the text for the common filter path.
    pub fn matches(&self, field: CategoricalField, accepted: &BTreeSet<CategoryValue>) -> bool {
        let text = |s: &str| accepted.iter().any(|v| matches!(v, CategoryValue::Text(t) if t == s));
        let flag = |b: bool| accepted.contains(&CategoryValue::Flag(b));
        match field {
            CategoricalField::Gender => text(&self.gender),
            CategoricalField::AgeGroup => text(&self.age_group),
            CategoricalField::SmokingHistory => text(&self.smoking_history),
            CategoricalField::Hypertension => flag(self.hypertension),
            CategoricalField::HeartDisease => flag(self.heart_disease),
            CategoricalField::Diabetes => flag(self.diabetes),
        }
    }

    /// Value of a numeric field for this record.
    pub fn numeric(&self, field: NumericField) -> f64 {
        let flag = |b: bool| if b { 1.0 } else { 0.0 };
        match field {
            NumericField::Diabetes => flag(self.diabetes),
            NumericField::Hypertension => flag(self.hypertension),
            NumericField::HeartDisease => flag(self.heart_disease),
            NumericField::HbA1cLevel => self.hba1c_level,
        }
    }
}

// -- 0/1 flag (de)serialisation shared by the CSV and JSON loaders --

fn ser_flag<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u8(u8::from(*value))
}

fn de_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    struct FlagVisitor;

    impl serde::de::Visitor<'_> for FlagVisitor {
        type Value = bool;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a 0/1 or true/false flag")
        }

        fn visit_bool<E: serde::de::Error>(self, v: bool) -> Result<bool, E> {
            Ok(v)
        }

        fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<bool, E> {
            match v {
                0 => Ok(false),
                1 => Ok(true),
                other => Err(E::custom(format!("flag must be 0 or 1, got {other}"))),
            }
        }

        fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<bool, E> {
            self.visit_i64(i64::try_from(v).unwrap_or(i64::MAX))
        }

        fn visit_f64<E: serde::de::Error>(self, v: f64) -> Result<bool, E> {
            if v == 0.0 {
                Ok(false)
            } else if v == 1.0 {
                Ok(true)
            } else {
                Err(E::custom(format!("flag must be 0 or 1, got {v}")))
            }
        }

        fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<bool, E> {
            parse_flag(v).ok_or_else(|| E::custom(format!("'{v}' is not a 0/1 flag")))
        }
    }

    deserializer.deserialize_any(FlagVisitor)
}

/// Parse a textual flag: `0`/`1`, `true`/`false` (any case), `0.0`/`1.0`.
pub fn parse_flag(s: &str) -> Option<bool> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("true") {
        return Some(true);
    }
    if s.eq_ignore_ascii_case("false") {
        return Some(false);
    }
    match s.parse::<f64>() {
        Ok(v) if v == 0.0 => Some(false),
        Ok(v) if v == 1.0 => Some(true),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// HealthDataset – the complete loaded dataset
// ---------------------------------------------------------------------------

/// The full parsed dataset with the observed values of every categorical field.
#[derive(Debug, Clone, Default)]
pub struct HealthDataset {
    /// All records, in source order. Never mutated after construction.
    pub records: Vec<Record>,
    /// For each categorical field the sorted set of observed values.
    pub unique_values: BTreeMap<CategoricalField, BTreeSet<CategoryValue>>,
}

impl HealthDataset {
    /// Build the value index from the loaded records.
    pub fn from_records(records: Vec<Record>) -> Self {
        let mut unique_values: BTreeMap<CategoricalField, BTreeSet<CategoryValue>> =
            BTreeMap::new();

        for rec in &records {
            for field in CategoricalField::ALL {
                unique_values
                    .entry(field)
                    .or_default()
                    .insert(rec.category(field));
            }
        }

        HealthDataset {
            records,
            unique_values,
        }
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the dataset is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
