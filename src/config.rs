//! Configuration loading and management

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Overrides the data directory (default `~/.local/share/interval-timer`)
pub const DATA_DIR_ENV: &str = "INTERVAL_TIMER_DATA_DIR";

/// Command line used to play cue sounds, e.g. `paplay` or `aplay -q`.
/// When unset the terminal bell is used.
pub const CUE_COMMAND_ENV: &str = "INTERVAL_TIMER_CUE_COMMAND";

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the Unix domain socket for IPC
    pub socket_path: PathBuf,

    /// Directory for runtime data
    pub data_dir: PathBuf,

    /// Persisted user settings
    pub settings_path: PathBuf,

    /// Directory holding `<cue-name>.wav` files
    pub sound_dir: PathBuf,

    /// External sound command, if configured
    pub cue_command: Option<String>,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        let data_dir = match std::env::var_os(DATA_DIR_ENV) {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => {
                let home = std::env::var("HOME").context("HOME is not set")?;
                PathBuf::from(&home)
                    .join(".local")
                    .join("share")
                    .join("interval-timer")
            }
        };

        let cue_command = std::env::var(CUE_COMMAND_ENV)
            .ok()
            .filter(|command| !command.trim().is_empty());

        Ok(Self::with_data_dir(&data_dir, cue_command))
    }

    /// Derive all paths from a data directory
    pub fn with_data_dir(data_dir: &Path, cue_command: Option<String>) -> Self {
        Self {
            socket_path: data_dir.join("timer.sock"),
            settings_path: data_dir.join("settings.json"),
            sound_dir: data_dir.join("sounds"),
            data_dir: data_dir.to_path_buf(),
            cue_command,
        }
    }

    /// Ensure data directory exists
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir).with_context(|| {
            format!("failed to create data directory {}", self.data_dir.display())
        })?;
        Ok(())
    }
}
