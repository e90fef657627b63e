//! Grid defaults persisted as TOML in the platform config directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::usecase::engine::model::EngineSettings;
use crate::usecase::services::chips::DEFAULT_DATE_FORMAT;
use crate::usecase::services::option_resolver::DEFAULT_OPTION_PAGE_SIZE;
use crate::usecase::services::query_sync::QueryDefaults;

const APP_QUALIFIER: &str = "com";
const APP_ORG: &str = "hellhbbd";
const APP_NAME: &str = "admin-grid";
const CONFIG_FILENAME: &str = "settings.toml";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("could not determine settings path")]
    NoConfigDir,
    #[error("failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("failed to write settings file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSettings {
    pub default_limit: u32,
    pub max_limit: u32,
    pub page_size_options: Vec<u32>,
    pub option_page_size: u32,
    pub live_search_debounce_ms: u64,
    pub staged_search_debounce_ms: u64,
    pub date_display_format: String,
    pub log_level: String,
}

impl Default for GridSettings {
    fn default() -> Self {
        let defaults = QueryDefaults::default();
        Self {
            default_limit: defaults.limit,
            max_limit: defaults.max_limit,
            page_size_options: vec![10, 20, 50, 100],
            option_page_size: DEFAULT_OPTION_PAGE_SIZE,
            live_search_debounce_ms: 400,
            staged_search_debounce_ms: 300,
            date_display_format: DEFAULT_DATE_FORMAT.to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl GridSettings {
    pub fn engine_settings(&self) -> EngineSettings {
        let max_limit = self.max_limit.max(1);
        EngineSettings {
            defaults: QueryDefaults {
                limit: self.default_limit.clamp(1, max_limit),
                max_limit,
            },
            option_page_size: self.option_page_size.max(1),
            live_search_delay: Duration::from_millis(self.live_search_debounce_ms),
            staged_search_delay: Duration::from_millis(self.staged_search_debounce_ms),
            date_format: self.date_display_format.clone(),
        }
    }

    /// Page-size choices within `max_limit`, always including the default.
    pub fn page_sizes(&self) -> Vec<u32> {
        let engine = self.engine_settings();
        let mut sizes: Vec<u32> = self
            .page_size_options
            .iter()
            .copied()
            .filter(|size| *size > 0 && *size <= engine.defaults.max_limit)
            .collect();
        sizes.push(engine.defaults.limit);
        sizes.sort_unstable();
        sizes.dedup();
        sizes
    }
}

pub fn settings_path() -> Option<PathBuf> {
    ProjectDirs::from(APP_QUALIFIER, APP_ORG, APP_NAME)
        .map(|dirs| dirs.config_dir().join(CONFIG_FILENAME))
}

/// Strict load: a missing file is an error too.
pub fn read_settings(path: &Path) -> Result<GridSettings, SettingsError> {
    let content = fs::read_to_string(path).map_err(|source| SettingsError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| SettingsError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Falls back to defaults when the file is missing or unreadable.
pub fn load_settings_from(path: &Path) -> GridSettings {
    match read_settings(path) {
        Ok(settings) => {
            tracing::info!(path = %path.display(), "loaded settings");
            settings
        }
        Err(SettingsError::Read { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!(path = %path.display(), "no settings file found, using defaults");
            GridSettings::default()
        }
        Err(err) => {
            tracing::warn!(error = %err, "using default settings");
            GridSettings::default()
        }
    }
}

pub fn load_settings() -> GridSettings {
    let Some(path) = settings_path() else {
        tracing::warn!("could not determine settings path, using defaults");
        return GridSettings::default();
    };
    load_settings_from(&path)
}

pub fn save_settings_to(path: &Path, settings: &GridSettings) -> Result<(), SettingsError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| SettingsError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let content = toml::to_string_pretty(settings)?;
    fs::write(path, content).map_err(|source| SettingsError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!(path = %path.display(), "saved settings");
    Ok(())
}

pub fn save_settings(settings: &GridSettings) -> Result<(), SettingsError> {
    let path = settings_path().ok_or(SettingsError::NoConfigDir)?;
    save_settings_to(&path, settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_fills_in_defaults() {
        let parsed: GridSettings = toml::from_str("default_limit = 25\n").expect("valid toml");
        assert_eq!(parsed.default_limit, 25);
        assert_eq!(parsed.max_limit, 100);
        assert_eq!(parsed.live_search_debounce_ms, 400);
    }

    #[test]
    fn engine_settings_clamp_default_limit() {
        let settings = GridSettings {
            default_limit: 500,
            max_limit: 50,
            ..GridSettings::default()
        };
        let engine = settings.engine_settings();
        assert_eq!(engine.defaults.limit, 50);
        assert_eq!(engine.staged_search_delay, Duration::from_millis(300));
        assert_eq!(settings.page_sizes(), vec![10, 20, 50]);
    }
}
