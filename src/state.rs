use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::color::ColorMap;
use crate::data::dashboard::{DashboardPipeline, DashboardSnapshot};
use crate::data::filter::FilterSelection;
use crate::data::model::{CategoricalField, CategoryValue, HealthDataset};

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full UI state, independent of rendering.
#[derive(Default)]
pub struct AppState {
    /// Pipeline over the loaded dataset (None until a file is loaded).
    pub pipeline: Option<DashboardPipeline>,

    /// Per-field filter selections.
    pub selection: FilterSelection,

    /// Chart summaries for the current selection (cached until it changes).
    pub snapshot: Option<DashboardSnapshot>,

    /// Colour maps for every field a chart colours by.
    pub color_maps: BTreeMap<CategoricalField, ColorMap>,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,
}

impl AppState {
    pub fn dataset(&self) -> Option<&Arc<HealthDataset>> {
        self.pipeline.as_ref().map(|p| p.dataset())
    }

    /// Ingest a newly loaded dataset, initialise filters and colours.
    pub fn set_dataset(&mut self, dataset: HealthDataset) {
        let pipeline = DashboardPipeline::new(Arc::new(dataset));
        self.selection = pipeline.default_selection();

        self.color_maps = pipeline
            .charts()
            .iter()
            .filter_map(|spec| spec.color)
            .filter_map(|field| {
                let values = pipeline.dataset().unique_values.get(&field)?;
                Some((field, ColorMap::new(field, values)))
            })
            .collect();

        self.pipeline = Some(pipeline);
        self.status_message = None;
        self.refilter();
    }

    /// Recompute the chart summaries after a selection change.
    pub fn refilter(&mut self) {
        let Some(pipeline) = &self.pipeline else {
            return;
        };
        match pipeline.on_selection_changed(&self.selection) {
            Ok(snapshot) => self.snapshot = Some(snapshot),
            Err(e) => {
                log::error!("Failed to summarise selection: {e}");
                self.status_message = Some(format!("Error: {e}"));
                self.snapshot = None;
            }
        }
    }

    /// Records passing the current selection.
    pub fn visible_count(&self) -> usize {
        self.snapshot.as_ref().map_or(0, |s| s.filtered_count)
    }

    /// Toggle a single value in a field's selection.
    pub fn toggle_filter_value(&mut self, field: CategoricalField, value: &CategoryValue) {
        // An unconstrained field starts from "everything accepted".
        if self.selection.get(field).is_none() {
            if let Some(all_vals) = self.observed_values(field) {
                self.selection.set(field, all_vals);
            }
        }
        self.selection.toggle(field, value);
        self.refilter();
    }

    fn observed_values(&self, field: CategoricalField) -> Option<BTreeSet<CategoryValue>> {
        self.dataset()?.unique_values.get(&field).cloned()
    }

    /// Select all observed values of a field.
    pub fn select_all(&mut self, field: CategoricalField) {
        let Some(all_vals) = self.observed_values(field) else {
            return;
        };
        self.selection.set(field, all_vals);
        self.refilter();
    }

    /// Deselect every value of a field, hiding all records.
    pub fn select_none(&mut self, field: CategoricalField) {
        self.selection.set(field, Default::default());
        self.refilter();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::tests::record;

    fn loaded() -> AppState {
        let mut state = AppState::default();
        state.set_dataset(HealthDataset::from_records(vec![
            record("Male", "50-65", true),
            record("Female", "50-65", false),
            record("Male", "65+", true),
        ]));
        state
    }

    #[test]
    fn test_set_dataset_shows_everything() {
        let state = loaded();
        assert_eq!(state.visible_count(), 3);
        assert!(state.color_maps.contains_key(&CategoricalField::HeartDisease));
        assert!(state.color_maps.contains_key(&CategoricalField::Diabetes));
    }

    #[test]
    fn test_toggle_and_select_all_none() {
        let mut state = loaded();
        state.toggle_filter_value(CategoricalField::Gender, &CategoryValue::from("Female"));
        assert_eq!(state.visible_count(), 2);

        state.select_none(CategoricalField::AgeGroup);
        assert_eq!(state.visible_count(), 0);

        state.select_all(CategoricalField::AgeGroup);
        state.select_all(CategoricalField::Gender);
        assert_eq!(state.visible_count(), 3);
    }

    #[test]
    fn test_toggle_on_unconstrained_field_hides_only_that_value() {
        let mut state = loaded();
        state.selection.remove(CategoricalField::AgeGroup);
        state.toggle_filter_value(CategoricalField::AgeGroup, &CategoryValue::from("65+"));
        assert_eq!(state.visible_count(), 2);
    }

    #[test]
    fn test_unloaded_state_is_inert() {
        let mut state = AppState::default();
        state.select_all(CategoricalField::Gender);
        state.refilter();
        assert!(state.snapshot.is_none());
        assert_eq!(state.visible_count(), 0);
    }
}
