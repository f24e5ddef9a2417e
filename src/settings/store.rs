//! JSON file persistence for settings
//!
//! The file is a flat key/value record. Any key may be absent or invalid;
//! each one falls back to its default independently.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info, warn};

use super::model::{phase_seconds_in_range, Settings};

/// Errors that can occur while persisting settings
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to create settings directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write settings file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Reads and writes the settings record at a fixed path
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load settings, falling back to defaults for anything missing or invalid
    pub fn load(&self) -> Settings {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = ?self.path, "no settings file, using defaults");
                return Settings::default();
            }
            Err(e) => {
                warn!(path = ?self.path, error = %e, "failed to read settings, using defaults");
                return Settings::default();
            }
        };

        match serde_json::from_str::<Value>(&content) {
            Ok(value) => {
                let settings = settings_from_value(&value);
                debug!(?settings, "settings loaded");
                settings
            }
            Err(e) => {
                warn!(path = ?self.path, error = %e, "malformed settings file, using defaults");
                Settings::default()
            }
        }
    }

    /// Write settings atomically (temp file then rename)
    pub fn save(&self, settings: &Settings) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let content = serde_json::to_string_pretty(settings)?;
        let tmp_path = self.path.with_extension("json.tmp");

        fs::write(&tmp_path, content).map_err(|source| StoreError::Write {
            path: tmp_path.clone(),
            source,
        })?;
        fs::rename(&tmp_path, &self.path).map_err(|source| StoreError::Write {
            path: self.path.clone(),
            source,
        })?;

        debug!(path = ?self.path, "settings saved");
        Ok(())
    }
}

/// Build settings from a possibly partial record
fn settings_from_value(value: &Value) -> Settings {
    let defaults = Settings::default();
    let number = |key: &str| {
        value
            .get(key)
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok())
    };

    let mut settings = Settings {
        work_seconds: number("work_seconds")
            .filter(|s| phase_seconds_in_range(*s))
            .unwrap_or(defaults.work_seconds),
        rest_seconds: number("rest_seconds")
            .filter(|s| phase_seconds_in_range(*s))
            .unwrap_or(defaults.rest_seconds),
        total_sets: number("total_sets")
            .filter(|s| *s >= 1)
            .unwrap_or(defaults.total_sets),
        prep_enabled: value
            .get("prep_enabled")
            .and_then(Value::as_bool)
            .unwrap_or(defaults.prep_enabled),
    };

    if let Some(clamp) = settings.clamp_to_cap() {
        warn!(
            requested = clamp.requested,
            applied = clamp.applied,
            "stored set count exceeds session cap, clamped"
        );
    }

    settings
}
