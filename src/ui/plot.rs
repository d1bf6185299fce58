use std::collections::BTreeSet;
use std::ops::RangeInclusive;

use eframe::egui::{self, Color32, RichText, ScrollArea, Stroke, Ui};
use egui_extras::{Column, TableBuilder};
use egui_plot::{Bar, BarChart, BoxElem, BoxPlot, BoxSpread, GridMark, Legend, Plot, Points};

use crate::color::generate_palette;
use crate::data::aggregate::{DistributionRow, SummaryTable};
use crate::data::dashboard::{ChartData, ChartKind, ChartSpec, ChartSummary};
use crate::data::model::CategoryValue;
use crate::state::AppState;

use super::value_label;

// ---------------------------------------------------------------------------
// Dashboard (central panel)
// ---------------------------------------------------------------------------

/// Render every chart of the current snapshot in the central panel.
pub fn dashboard(ui: &mut Ui, state: &AppState, chart_height: f32) {
    let Some(snapshot) = &state.snapshot else {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("Open a file to view the dashboard  (File → Open…)");
        });
        return;
    };

    ui.heading("Diabetes Analytics Dashboard");
    ui.label("Analyze diabetes trends by demographic and health factors.");
    ui.separator();

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            for chart in &snapshot.charts {
                ui.push_id(chart.spec.id, |ui: &mut Ui| {
                    chart_section(ui, chart, state, chart_height);
                });
                ui.add_space(12.0);
            }
        });
}

fn chart_section(ui: &mut Ui, chart: &ChartSummary, state: &AppState, height: f32) {
    ui.strong(RichText::new(chart.spec.title).size(16.0));

    if chart.data.is_empty() {
        ui.label(RichText::new("No records match the current filters").italics());
        return;
    }

    match &chart.data {
        ChartData::Rates(table) => {
            rate_chart(ui, &chart.spec, table, state, height);
            egui::CollapsingHeader::new("Summary table")
                .default_open(false)
                .show(ui, |ui: &mut Ui| rate_table(ui, table));
        }
        ChartData::Distribution(rows) => {
            box_chart(ui, &chart.spec, rows, state, height);
            egui::CollapsingHeader::new("Summary table")
                .default_open(false)
                .show(ui, |ui: &mut Ui| distribution_table(ui, &chart.spec, rows));
        }
    }
}

// ---------------------------------------------------------------------------
// Bar charts
// ---------------------------------------------------------------------------

/// Plain or grouped bars of group-wise rates. Grouped charts get one series
/// per value of the colour field, offset around each x category.
fn rate_chart(ui: &mut Ui, spec: &ChartSpec, table: &SummaryTable, state: &AppState, height: f32) {
    // Rows are sorted by key, so the first key component is already ordered.
    let mut categories: Vec<CategoryValue> = table.rows.iter().map(|r| r.key[0].clone()).collect();
    categories.dedup();

    let series: Vec<Option<CategoryValue>> = match (spec.kind, spec.color) {
        (ChartKind::GroupedBar, Some(_)) => table
            .rows
            .iter()
            .filter_map(|r| r.key.get(1).cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(Some)
            .collect(),
        _ => vec![None],
    };

    let n_series = series.len() as f64;
    let bar_width = 0.8 / n_series;
    let default_color = generate_palette(1)[0];
    let labels: Vec<String> = categories.iter().map(value_label).collect();

    Plot::new(spec.id)
        .height(height)
        .legend(Legend::default())
        .x_axis_label(spec.x_label())
        .y_axis_label(spec.y_label())
        .x_axis_formatter(category_axis(labels))
        .include_y(0.0)
        .include_y(1.0)
        .allow_drag(false)
        .allow_scroll(false)
        .allow_zoom(false)
        .show(ui, |plot_ui| {
            for (s_idx, s) in series.iter().enumerate() {
                let offset = (s_idx as f64 - (n_series - 1.0) / 2.0) * bar_width;

                let bars: Vec<Bar> = table
                    .rows
                    .iter()
                    .filter(|r| s.as_ref().map_or(true, |v| r.key.get(1) == Some(v)))
                    .filter_map(|r| {
                        let x = categories.iter().position(|c| *c == r.key[0])? as f64;
                        Some(
                            Bar::new(x + offset, r.mean)
                                .width(bar_width * 0.95)
                                .name(format!("{} (n = {})", value_label(&r.key[0]), r.count)),
                        )
                    })
                    .collect();

                let (name, color) = match (s, spec.color) {
                    (Some(v), Some(field)) => (
                        format!("{} = {}", field.label(), value_label(v)),
                        state
                            .color_maps
                            .get(&field)
                            .map_or(default_color, |cm| cm.color_for(v)),
                    ),
                    _ => (spec.y_label().to_string(), default_color),
                };

                plot_ui.bar_chart(BarChart::new(bars).name(name).color(color));
            }
        });
}

fn rate_table(ui: &mut Ui, table: &SummaryTable) {
    let mut builder = TableBuilder::new(ui).striped(true);
    for _ in &table.key_fields {
        builder = builder.column(Column::auto().at_least(100.0));
    }
    builder = builder.column(Column::auto().at_least(90.0)).column(Column::remainder());

    builder
        .header(20.0, |mut header| {
            for field in &table.key_fields {
                header.col(|ui| {
                    ui.strong(field.label());
                });
            }
            header.col(|ui| {
                ui.strong(table.value_field.label());
            });
            header.col(|ui| {
                ui.strong("Records");
            });
        })
        .body(|body| {
            body.rows(18.0, table.rows.len(), |mut row| {
                let summary = &table.rows[row.index()];
                for value in &summary.key {
                    row.col(|ui| {
                        ui.label(value_label(value));
                    });
                }
                row.col(|ui| {
                    ui.label(format!("{:.3}", summary.mean));
                });
                row.col(|ui| {
                    ui.label(summary.count.to_string());
                });
            });
        });
}

// ---------------------------------------------------------------------------
// Box plot
// ---------------------------------------------------------------------------

fn box_chart(
    ui: &mut Ui,
    spec: &ChartSpec,
    rows: &[DistributionRow],
    state: &AppState,
    height: f32,
) {
    let default_color = generate_palette(1)[0];
    let labels: Vec<String> = rows.iter().map(|r| value_label(&r.key)).collect();

    Plot::new(spec.id)
        .height(height)
        .legend(Legend::default())
        .x_axis_label(spec.x_label())
        .y_axis_label(spec.y_label())
        .x_axis_formatter(category_axis(labels))
        .allow_drag(false)
        .allow_scroll(false)
        .allow_zoom(false)
        .show(ui, |plot_ui| {
            for (i, row) in rows.iter().enumerate() {
                let x = i as f64;
                let color = spec
                    .color
                    .and_then(|field| state.color_maps.get(&field))
                    .map_or(default_color, |cm| cm.color_for(&row.key));
                let name = format!("{} = {}", spec.x_label(), value_label(&row.key));

                let elem = BoxElem::new(
                    x,
                    BoxSpread::new(
                        row.lower_whisker,
                        row.q1,
                        row.median,
                        row.q3,
                        row.upper_whisker,
                    ),
                )
                .name(&name)
                .box_width(0.5)
                .fill(color.gamma_multiply(0.4))
                .stroke(Stroke::new(1.5, color));
                plot_ui.box_plot(BoxPlot::new(vec![elem]).name(&name).color(color));

                if !row.outliers.is_empty() {
                    let points: Vec<[f64; 2]> = row.outliers.iter().map(|&v| [x, v]).collect();
                    plot_ui.points(Points::new(points).name(&name).color(color).radius(2.0));
                }
            }
        });
}

fn distribution_table(ui: &mut Ui, spec: &ChartSpec, rows: &[DistributionRow]) {
    const HEADERS: [&str; 7] = ["Records", "Min*", "Q1", "Median", "Q3", "Max*", "Mean"];

    TableBuilder::new(ui)
        .striped(true)
        .column(Column::auto().at_least(100.0))
        .columns(Column::auto().at_least(60.0), HEADERS.len())
        .header(20.0, |mut header| {
            header.col(|ui| {
                ui.strong(spec.x_label());
            });
            for h in HEADERS {
                header.col(|ui| {
                    ui.strong(h);
                });
            }
        })
        .body(|body| {
            body.rows(18.0, rows.len(), |mut row| {
                let r = &rows[row.index()];
                row.col(|ui| {
                    ui.label(value_label(&r.key));
                });
                row.col(|ui| {
                    ui.label(r.count.to_string());
                });
                for v in [r.lower_whisker, r.q1, r.median, r.q3, r.upper_whisker, r.mean] {
                    row.col(|ui| {
                        ui.label(format!("{v:.2}"));
                    });
                }
            });
        });
    ui.label(
        RichText::new("* whisker ends; outliers drawn as points")
            .small()
            .color(Color32::GRAY),
    );
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// X-axis formatter mapping integer positions to category labels.
fn category_axis(labels: Vec<String>) -> impl Fn(GridMark, &RangeInclusive<f64>) -> String {
    move |mark, _range| {
        let idx = mark.value.round();
        if idx < 0.0 || (mark.value - idx).abs() > 1e-6 {
            return String::new();
        }
        labels.get(idx as usize).cloned().unwrap_or_default()
    }
}
