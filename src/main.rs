use anyhow::{Context, Result};
use diabetes_dashboard::app::DashboardApp;
use diabetes_dashboard::config::DashboardConfig;
use diabetes_dashboard::data::loader;
use diabetes_dashboard::state::AppState;
use eframe::egui;

fn main() -> Result<()> {
    env_logger::init();

    let config = DashboardConfig::from_env()?;

    // A startup file that fails to load aborts before any window is shown.
    let mut state = AppState::default();
    if let Some(path) = &config.data_path {
        let dataset = loader::load_file(path)
            .with_context(|| format!("loading {}", path.display()))?;
        state.set_dataset(dataset);
    } else {
        log::info!("No data file configured; waiting for File → Open…");
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size(config.window_size)
            .with_min_inner_size(config.min_window_size),
        ..Default::default()
    };

    eframe::run_native(
        "Diabetes Analytics Dashboard",
        options,
        Box::new(move |_cc| Ok(Box::new(DashboardApp::new(state, config)))),
    )
    .map_err(|e| anyhow::anyhow!("running the dashboard window: {e}"))
}
