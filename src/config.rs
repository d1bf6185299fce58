use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Names the JSON config file.
pub const CONFIG_ENV: &str = "DIABETES_DASHBOARD_CONFIG";
/// Names the data file; overrides the config file.
pub const DATA_ENV: &str = "DIABETES_DASHBOARD_DATA";
/// Loaded from the working directory when nothing else names a data file.
pub const DEFAULT_DATA_FILE: &str = "diabetes_clean.csv";

// ---------------------------------------------------------------------------
// Dashboard configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Data file loaded at startup.
    pub data_path: Option<PathBuf>,
    pub window_size: [f32; 2],
    pub min_window_size: [f32; 2],
    /// Height of each chart in the central panel, in points.
    pub chart_height: f32,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            data_path: None,
            window_size: [1200.0, 800.0],
            min_window_size: [600.0, 400.0],
            chart_height: 260.0,
        }
    }
}

impl DashboardConfig {
    /// Resolve the configuration from the process environment and arguments.
    pub fn from_env() -> Result<Self> {
        let config_file = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        let cli_path = std::env::args_os().nth(1).map(PathBuf::from);
        let env_path = std::env::var_os(DATA_ENV).map(PathBuf::from);
        Self::resolve(config_file.as_deref(), env_path, cli_path)
    }

    /// Precedence, lowest first: defaults, config file, `env_path`, `cli_path`.
    /// Falls back to [`DEFAULT_DATA_FILE`] if it exists and nothing else is set.
    pub fn resolve(
        config_file: Option<&Path>,
        env_path: Option<PathBuf>,
        cli_path: Option<PathBuf>,
    ) -> Result<Self> {
        let mut config = match config_file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        if let Some(path) = cli_path.or(env_path) {
            config.data_path = Some(path);
        }
        if config.data_path.is_none() && Path::new(DEFAULT_DATA_FILE).exists() {
            config.data_path = Some(PathBuf::from(DEFAULT_DATA_FILE));
        }

        log::debug!("Resolved config: {config:?}");
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("parsing config file {}", path.display()))
    }
}
