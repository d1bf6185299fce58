use std::collections::BTreeMap;

use thiserror::Error;

use super::model::{CategoricalField, CategoryValue, NumericField, Record};

#[derive(Debug, Error, PartialEq)]
pub enum AggregateError {
    #[error("group-by needs at least one key field")]
    NoKeyFields,
}

// ---------------------------------------------------------------------------
// Group-by mean
// ---------------------------------------------------------------------------

/// One aggregate result: a key tuple and the mean of the value field.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    /// One value per key field, in key-field order.
    pub key: Vec<CategoryValue>,
    pub mean: f64,
    /// Number of records in the group. Always at least 1.
    pub count: usize,
}

/// Output of [`group_mean`]: rows sorted by key tuple, keys unique.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryTable {
    pub key_fields: Vec<CategoricalField>,
    pub value_field: NumericField,
    pub rows: Vec<SummaryRow>,
}

impl SummaryTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Mean for an exact key tuple, if that group was observed.
    pub fn mean_for(&self, key: &[CategoryValue]) -> Option<f64> {
        self.rows.iter().find(|r| r.key == key).map(|r| r.mean)
    }
}

/// Partition `records` by the values of `key_fields` and average `value_field`
/// within each partition.
///
/// Only observed key tuples produce rows, so no group is ever empty and an
/// empty input yields an empty table.
pub fn group_mean<'a, I>(
    records: I,
    key_fields: &[CategoricalField],
    value_field: NumericField,
) -> Result<SummaryTable, AggregateError>
where
    I: IntoIterator<Item = &'a Record>,
{
    if key_fields.is_empty() {
        return Err(AggregateError::NoKeyFields);
    }

    // key → (sum, count)
    let mut groups: BTreeMap<Vec<CategoryValue>, (f64, usize)> = BTreeMap::new();
    for rec in records {
        let key: Vec<CategoryValue> = key_fields.iter().map(|f| rec.category(*f)).collect();
        let entry = groups.entry(key).or_insert((0.0, 0));
        entry.0 += rec.numeric(value_field);
        entry.1 += 1;
    }

    let rows = groups
        .into_iter()
        .map(|(key, (sum, count))| SummaryRow {
            key,
            mean: sum / count as f64,
            count,
        })
        .collect();

    Ok(SummaryTable {
        key_fields: key_fields.to_vec(),
        value_field,
        rows,
    })
}

// ---------------------------------------------------------------------------
// Group-wise distribution (box plot statistics)
// ---------------------------------------------------------------------------

/// Box-plot statistics of one group.
#[derive(Debug, Clone, PartialEq)]
pub struct DistributionRow {
    pub key: CategoryValue,
    pub count: usize,
    /// Smallest value within 1.5·IQR below Q1.
    pub lower_whisker: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    /// Largest value within 1.5·IQR above Q3.
    pub upper_whisker: f64,
    pub mean: f64,
    /// Values outside the whiskers, ascending.
    pub outliers: Vec<f64>,
}

/// Per observed value of `key_field`, summarise the distribution of `value_field`.
///
/// Non-finite values are ignored; a group holding nothing else is omitted.
pub fn group_distribution<'a, I>(
    records: I,
    key_field: CategoricalField,
    value_field: NumericField,
) -> Vec<DistributionRow>
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut groups: BTreeMap<CategoryValue, Vec<f64>> = BTreeMap::new();
    for rec in records {
        let value = rec.numeric(value_field);
        if value.is_finite() {
            groups.entry(rec.category(key_field)).or_default().push(value);
        }
    }

    groups
        .into_iter()
        .map(|(key, mut values)| {
            values.sort_by(f64::total_cmp);
            summarize(key, &values)
        })
        .collect()
}

/// `values` must be sorted and non-empty.
fn summarize(key: CategoryValue, values: &[f64]) -> DistributionRow {
    let q1 = quantile(values, 0.25);
    let median = quantile(values, 0.5);
    let q3 = quantile(values, 0.75);
    let iqr = q3 - q1;
    let low_fence = q1 - 1.5 * iqr;
    let high_fence = q3 + 1.5 * iqr;

    let (inside, outliers): (Vec<f64>, Vec<f64>) = values
        .iter()
        .partition(|v| **v >= low_fence && **v <= high_fence);
    // The box itself always lies inside the fences, so `inside` is non-empty.
    let lower_whisker = inside.first().copied().unwrap_or(q1);
    let upper_whisker = inside.last().copied().unwrap_or(q3);

    DistributionRow {
        key,
        count: values.len(),
        lower_whisker,
        q1,
        median,
        q3,
        upper_whisker,
        mean: values.iter().sum::<f64>() / values.len() as f64,
        outliers,
    }
}

/// Quantile with linear interpolation between closest ranks.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}
