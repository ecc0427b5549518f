use std::path::PathBuf;

use directories::ProjectDirs;
use serde::Deserialize;

/// Application configuration loaded from TOML config file.
/// All fields have sensible defaults — the config file is optional.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Dataset CSV to open when the CLI passes none.
    pub dataset: Option<PathBuf>,
    /// Root directory the `dir`/`stem` columns resolve against.
    pub samples_root: PathBuf,
    /// Default scatter axes.
    pub x_axis: String,
    pub y_axis: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            dataset: None,
            samples_root: PathBuf::from("Samples"),
            x_axis: "duration".to_string(),
            y_axis: "tempo".to_string(),
        }
    }
}

impl AppConfig {
    /// Load config from `~/.config/samplescope/config.toml`.
    /// Returns default config if file doesn't exist.
    /// Logs a warning if the file exists but can't be parsed.
    pub fn load() -> Self {
        let config_path = Self::config_path();
        match config_path {
            Some(path) if path.exists() => match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<AppConfig>(&contents) {
                    Ok(config) => {
                        log::info!("Loaded config from {}", path.display());
                        config
                    }
                    Err(e) => {
                        log::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                        Self::default()
                    }
                },
                Err(e) => {
                    log::warn!("Failed to read {}: {}. Using defaults.", path.display(), e);
                    Self::default()
                }
            },
            _ => {
                log::debug!("No config file found, using defaults");
                Self::default()
            }
        }
    }

    /// Get the config file path.
    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", crate::APP_NAME)
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

/// Default dataset path: `ap/samples_data.csv` under the working
/// directory, where the ingestion tools write it.
pub fn default_dataset_path() -> PathBuf {
    PathBuf::from("ap").join("samples_data.csv")
}
