use std::sync::Arc;

use super::aggregate::{
    group_distribution, group_mean, AggregateError, DistributionRow, SummaryTable,
};
use super::filter::{apply_filters, FilterSelection};
use super::model::{CategoricalField, HealthDataset, NumericField, Record};

// ---------------------------------------------------------------------------
// Chart catalogue
// ---------------------------------------------------------------------------

/// How a chart presents its summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    /// One bar per value of `x`.
    Bar,
    /// Bars per value of `x`, side by side per value of `color`.
    GroupedBar,
    /// One box per value of `x`.
    Box,
}

/// Display hints handed to the renderer together with the summary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartSpec {
    pub id: &'static str,
    pub title: &'static str,
    pub kind: ChartKind,
    pub x: CategoricalField,
    pub color: Option<CategoricalField>,
    pub value: NumericField,
}

impl ChartSpec {
    /// Group-by key fields: the x field, then the colour field if any.
    pub fn key_fields(&self) -> Vec<CategoricalField> {
        std::iter::once(self.x).chain(self.color).collect()
    }

    pub fn x_label(&self) -> &'static str {
        self.x.label()
    }

    pub fn y_label(&self) -> &'static str {
        self.value.label()
    }
}

/// The charts of the dashboard, in page order.
pub const CHARTS: [ChartSpec; 5] = [
    ChartSpec {
        id: "age_group",
        title: "Diabetes Prevalence by Age Group",
        kind: ChartKind::Bar,
        x: CategoricalField::AgeGroup,
        color: None,
        value: NumericField::Diabetes,
    },
    ChartSpec {
        id: "gender",
        title: "Diabetes Prevalence by Gender",
        kind: ChartKind::Bar,
        x: CategoricalField::Gender,
        color: None,
        value: NumericField::Diabetes,
    },
    ChartSpec {
        id: "smoking_history",
        title: "Diabetes Rate by Smoking History",
        kind: ChartKind::Bar,
        x: CategoricalField::SmokingHistory,
        color: None,
        value: NumericField::Diabetes,
    },
    ChartSpec {
        id: "hba1c",
        title: "HbA1c Level Distribution by Diabetes Status",
        kind: ChartKind::Box,
        x: CategoricalField::Diabetes,
        color: Some(CategoricalField::Diabetes),
        value: NumericField::HbA1cLevel,
    },
    ChartSpec {
        id: "hypertension_heart_disease",
        title: "Diabetes by Hypertension and Heart Disease",
        kind: ChartKind::GroupedBar,
        x: CategoricalField::Hypertension,
        color: Some(CategoricalField::HeartDisease),
        value: NumericField::Diabetes,
    },
];

// ---------------------------------------------------------------------------
// Snapshot: every chart's summary for one selection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum ChartData {
    Rates(SummaryTable),
    Distribution(Vec<DistributionRow>),
}

impl ChartData {
    pub fn is_empty(&self) -> bool {
        match self {
            ChartData::Rates(table) => table.is_empty(),
            ChartData::Distribution(rows) => rows.is_empty(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartSummary {
    pub spec: ChartSpec,
    pub data: ChartData,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSnapshot {
    /// Records passing the selection.
    pub filtered_count: usize,
    pub charts: Vec<ChartSummary>,
}

impl DashboardSnapshot {
    pub fn chart(&self, id: &str) -> Option<&ChartSummary> {
        self.charts.iter().find(|c| c.spec.id == id)
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Derives per-chart summaries from a shared, read-only record set.
///
/// Holds no per-session state: every call to
/// [`DashboardPipeline::on_selection_changed`] is a pure function of the
/// dataset and the selection passed in, so one pipeline may serve any
/// number of sessions or threads.
#[derive(Debug, Clone)]
pub struct DashboardPipeline {
    dataset: Arc<HealthDataset>,
    charts: Vec<ChartSpec>,
}

impl DashboardPipeline {
    pub fn new(dataset: Arc<HealthDataset>) -> Self {
        Self::with_charts(dataset, CHARTS.to_vec())
    }

    pub fn with_charts(dataset: Arc<HealthDataset>, charts: Vec<ChartSpec>) -> Self {
        Self { dataset, charts }
    }

    pub fn dataset(&self) -> &Arc<HealthDataset> {
        &self.dataset
    }

    pub fn charts(&self) -> &[ChartSpec] {
        &self.charts
    }

    /// Initial selection: every filterable field set to all observed values.
    pub fn default_selection(&self) -> FilterSelection {
        FilterSelection::all_observed(&self.dataset)
    }

    /// Recompute every chart for a new selection.
    pub fn on_selection_changed(
        &self,
        selection: &FilterSelection,
    ) -> Result<DashboardSnapshot, AggregateError> {
        let filtered = apply_filters(&self.dataset.records, selection);
        log::debug!(
            "Selection changed: {} of {} records pass",
            filtered.len(),
            self.dataset.len()
        );

        let charts = self
            .charts
            .iter()
            .map(|spec| {
                Ok(ChartSummary {
                    spec: *spec,
                    data: summarize_chart(spec, &filtered)?,
                })
            })
            .collect::<Result<Vec<_>, AggregateError>>()?;

        Ok(DashboardSnapshot {
            filtered_count: filtered.len(),
            charts,
        })
    }
}

fn summarize_chart(spec: &ChartSpec, filtered: &[&Record]) -> Result<ChartData, AggregateError> {
    let records = filtered.iter().copied();
    match spec.kind {
        ChartKind::Bar | ChartKind::GroupedBar => {
            group_mean(records, &spec.key_fields(), spec.value).map(ChartData::Rates)
        }
        ChartKind::Box => Ok(ChartData::Distribution(group_distribution(
            records, spec.x, spec.value,
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::tests::record;
    use crate::data::model::CategoryValue;

    fn pipeline() -> DashboardPipeline {
        let mut records = vec![
            record("Male", "50-65", true),
            record("Female", "50-65", false),
            record("Male", "65+", true),
        ];
        records[2].hypertension = true;
        records[2].hba1c_level = 7.2;
        DashboardPipeline::new(Arc::new(HealthDataset::from_records(records)))
    }

    #[test]
    fn test_default_selection_produces_every_chart() {
        let p = pipeline();
        let snap = p.on_selection_changed(&p.default_selection()).unwrap();
        assert_eq!(snap.filtered_count, 3);
        assert_eq!(snap.charts.len(), CHARTS.len());

        let ChartData::Rates(age) = &snap.chart("age_group").unwrap().data else {
            panic!("age group chart should be a rate table");
        };
        assert_eq!(age.mean_for(&[CategoryValue::from("50-65")]), Some(0.5));
        assert_eq!(age.mean_for(&[CategoryValue::from("65+")]), Some(1.0));

        let ChartData::Rates(cross) = &snap.chart("hypertension_heart_disease").unwrap().data else {
            panic!("cross chart should be a rate table");
        };
        assert_eq!(
            cross.key_fields,
            vec![CategoricalField::Hypertension, CategoricalField::HeartDisease]
        );
        let (no, yes) = (CategoryValue::Flag(false), CategoryValue::Flag(true));
        assert_eq!(cross.mean_for(&[yes, no.clone()]), Some(1.0));
        assert_eq!(cross.mean_for(&[no.clone(), no]), Some(0.5));
    }

    #[test]
    fn test_box_chart_groups_by_diabetes() {
        let p = pipeline();
        let snap = p.on_selection_changed(&p.default_selection()).unwrap();
        let ChartData::Distribution(rows) = &snap.chart("hba1c").unwrap().data else {
            panic!("hba1c chart should be a distribution");
        };
        let keys: Vec<&CategoryValue> = rows.iter().map(|r| &r.key).collect();
        assert_eq!(keys, vec![&CategoryValue::Flag(false), &CategoryValue::Flag(true)]);
        assert_eq!(rows[1].count, 2);
    }

    #[test]
    fn test_empty_selection_gives_empty_charts() {
        let p = pipeline();
        let mut selection = p.default_selection();
        selection.set(CategoricalField::Gender, Default::default());
        let snap = p.on_selection_changed(&selection).unwrap();
        assert_eq!(snap.filtered_count, 0);
        assert!(snap.charts.iter().all(|c| c.data.is_empty()));
    }

    #[test]
    fn test_snapshots_are_independent_of_call_order() {
        let p = pipeline();
        let narrow = FilterSelection::new().with(CategoricalField::Gender, ["Male"]);
        let first = p.on_selection_changed(&p.default_selection()).unwrap();
        let _ = p.on_selection_changed(&narrow).unwrap();
        let again = p.on_selection_changed(&p.default_selection()).unwrap();
        assert_eq!(first, again);
    }
}
