//! Platform-specific directory management
//!
//! Follows the XDG Base Directory Specification on Linux and the standard
//! locations on macOS.
//!
//! Environment variables override the defaults:
//! - `RADAR_CONFIG_DIR` - config directory (holds `config.toml`)
//! - `RADAR_DATA_DIR` - data directory (holds the default database)

use std::env;
use std::path::PathBuf;

use crate::config::defaults::{CONFIG_FILE, DEFAULT_DB_FILE};

/// Environment variable names for directory overrides
pub const ENV_CONFIG_DIR: &str = "RADAR_CONFIG_DIR";
pub const ENV_DATA_DIR: &str = "RADAR_DATA_DIR";

/// Application name used in directory paths
const APP_NAME: &str = "radar";

/// Platform-specific directory provider
#[derive(Debug, Clone)]
pub struct RadarDirs {
    config_dir: PathBuf,
    data_dir: PathBuf,
}

impl RadarDirs {
    /// Resolve directories from the environment, then platform defaults
    #[must_use]
    pub fn new() -> Self {
        Self {
            config_dir: resolve(ENV_CONFIG_DIR, dirs::config_dir, &[".config"]),
            data_dir: resolve(ENV_DATA_DIR, dirs::data_dir, &[".local", "share"]),
        }
    }

    /// Use explicit directories
    #[must_use]
    pub fn with_dirs(config_dir: impl Into<PathBuf>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            data_dir: data_dir.into(),
        }
    }

    /// Config directory
    ///
    /// - Linux: `$XDG_CONFIG_HOME/radar` or `~/.config/radar`
    /// - macOS: `~/Library/Application Support/radar`
    #[must_use]
    pub fn config_dir(&self) -> PathBuf {
        self.config_dir.clone()
    }

    /// Data directory
    ///
    /// - Linux: `$XDG_DATA_HOME/radar` or `~/.local/share/radar`
    /// - macOS: `~/Library/Application Support/radar`
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone()
    }

    /// Path to `config.toml`
    #[must_use]
    pub fn global_config_path(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE)
    }

    /// Database used when neither the CLI nor the config names one
    #[must_use]
    pub fn default_db_path(&self) -> PathBuf {
        self.data_dir.join(DEFAULT_DB_FILE)
    }
}

impl Default for RadarDirs {
    fn default() -> Self {
        Self::new()
    }
}

fn resolve(var: &str, platform: fn() -> Option<PathBuf>, home_fallback: &[&str]) -> PathBuf {
    if let Ok(path) = env::var(var) {
        return PathBuf::from(path);
    }

    platform().map(|p| p.join(APP_NAME)).unwrap_or_else(|| {
        let base = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home_fallback
            .iter()
            .fold(base, |acc, part| acc.join(part))
            .join(APP_NAME)
    })
}
