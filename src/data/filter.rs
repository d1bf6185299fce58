use std::collections::{BTreeMap, BTreeSet};

use super::model::{CategoricalField, CategoryValue, HealthDataset, Record};

// ---------------------------------------------------------------------------
// Filter selection: which values are accepted per field
// ---------------------------------------------------------------------------

/// Per-field selection state: maps field → set of accepted values.
///
/// * Field absent → no constraint.
/// * Field present with an empty set → nothing accepted, every record fails.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSelection {
    fields: BTreeMap<CategoricalField, BTreeSet<CategoryValue>>,
}

impl FilterSelection {
    /// A selection with no constraints at all.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every filterable field constrained to all of its observed values,
    /// i.e. nothing is hidden until the user narrows a field.
    pub fn all_observed(dataset: &HealthDataset) -> Self {
        let fields = CategoricalField::FILTERABLE
            .iter()
            .map(|field| {
                let vals = dataset.unique_values.get(field).cloned().unwrap_or_default();
                (*field, vals)
            })
            .collect();
        Self { fields }
    }

    /// Builder-style variant of [`FilterSelection::set`].
    pub fn with<I, V>(mut self, field: CategoricalField, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<CategoryValue>,
    {
        self.set(field, values.into_iter().map(Into::into).collect());
        self
    }

    /// Replace the accepted set of a field. An empty set rejects everything.
    pub fn set(&mut self, field: CategoricalField, values: BTreeSet<CategoryValue>) {
        self.fields.insert(field, values);
    }

    /// Drop the constraint on a field entirely.
    pub fn remove(&mut self, field: CategoricalField) -> Option<BTreeSet<CategoryValue>> {
        self.fields.remove(&field)
    }

    /// Accepted set of a field, `None` when the field is unconstrained.
    pub fn get(&self, field: CategoricalField) -> Option<&BTreeSet<CategoryValue>> {
        self.fields.get(&field)
    }

    /// Add `value` if absent, remove it if present. Returns whether it is now accepted.
    pub fn toggle(&mut self, field: CategoricalField, value: &CategoryValue) -> bool {
        let selected = self.fields.entry(field).or_default();
        if selected.remove(value) {
            false
        } else {
            selected.insert(value.clone());
            true
        }
    }

    /// Whether a record satisfies every constraint (predicate conjunction).
    pub fn allows(&self, record: &Record) -> bool {
        self.fields
            .iter()
            .all(|(field, accepted)| !accepted.is_empty() && record.matches(*field, accepted))
    }
}

/// Keep the records that satisfy `selection`, preserving input order.
pub fn apply_filters<'a, I>(records: I, selection: &FilterSelection) -> Vec<&'a Record>
where
    I: IntoIterator<Item = &'a Record>,
{
    records
        .into_iter()
        .filter(|rec| selection.allows(rec))
        .collect()
}
