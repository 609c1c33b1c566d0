//! Global configuration management
//!
//! Reads settings from `config.toml` in the config directory: where the
//! database lives, how to reach the change-management system, and how deep
//! dependency graphs expand.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::defaults::{DEFAULT_GRAPH_MAX_DEPTH, NOTIFY_MAX_RETRIES, NOTIFY_TIMEOUT_SECS};
use crate::error::ConfigError;
use crate::infra::dirs::RadarDirs;

/// Global configuration for radar
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Database settings
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Change-management notifier settings
    #[serde(default)]
    pub notifier: NotifierConfig,

    /// Dependency graph settings
    #[serde(default)]
    pub graph: GraphConfig,
}

/// Database settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database file
    pub path: Option<PathBuf>,
}

/// Change-management notifier settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifierConfig {
    /// Base URL; notifications are disabled when unset
    pub url: Option<String>,

    /// Per-request timeout in seconds
    pub timeout_secs: Option<u64>,

    /// Retries after the first failed attempt
    pub max_retries: Option<u32>,
}

/// Dependency graph settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Dependency levels expanded below the requested build
    pub max_depth: Option<usize>,
}

impl GlobalConfig {
    /// Load configuration from the config directory
    ///
    /// A missing file yields the defaults; an invalid one is an error.
    pub fn load(dirs: &RadarDirs) -> Result<Self, ConfigError> {
        Self::load_from_path(&dirs.global_config_path())
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.display().to_string(),
            error: e.to_string(),
        })
    }

    /// Save configuration to a specific path, creating parent directories
    pub fn save_to_path(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
                path: parent.display().to_string(),
                error: e.to_string(),
            })?;
        }

        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::WriteError {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;

        fs::write(path, content).map_err(|e| ConfigError::WriteError {
            path: path.display().to_string(),
            error: e.to_string(),
        })
    }

    /// Effective database path: explicit override, then config, then default
    #[must_use]
    pub fn db_path(&self, dirs: &RadarDirs, cli_override: Option<&Path>) -> PathBuf {
        cli_override
            .map(Path::to_path_buf)
            .or_else(|| self.database.path.clone())
            .unwrap_or_else(|| dirs.default_db_path())
    }

    /// Change-management base URL, if notifications are enabled
    #[must_use]
    pub fn notifier_url(&self) -> Option<&str> {
        self.notifier.url.as_deref().filter(|u| !u.trim().is_empty())
    }

    /// Effective notifier timeout in seconds
    #[must_use]
    pub fn notifier_timeout_secs(&self) -> u64 {
        self.notifier.timeout_secs.unwrap_or(NOTIFY_TIMEOUT_SECS)
    }

    /// Effective notifier retry count
    #[must_use]
    pub fn notifier_max_retries(&self) -> u32 {
        self.notifier.max_retries.unwrap_or(NOTIFY_MAX_RETRIES)
    }

    /// Effective graph depth limit
    #[must_use]
    pub fn graph_max_depth(&self) -> usize {
        self.graph.max_depth.unwrap_or(DEFAULT_GRAPH_MAX_DEPTH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = GlobalConfig::default();
        assert!(config.database.path.is_none());
        assert!(config.notifier_url().is_none());
        assert_eq!(config.graph_max_depth(), DEFAULT_GRAPH_MAX_DEPTH);
        assert_eq!(config.notifier_max_retries(), NOTIFY_MAX_RETRIES);
    }

    #[test]
    fn test_load_missing_file_returns_default() {
        let temp_dir = TempDir::new().unwrap();
        let config = GlobalConfig::load_from_path(&temp_dir.path().join("config.toml")).unwrap();
        assert!(config.notifier.url.is_none());
    }

    #[test]
    fn test_load_valid_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        let content = r#"
[notifier]
url = "https://ecm.example.com/api"
max_retries = 5

[graph]
max_depth = 4
"#;
        fs::write(&config_path, content).unwrap();

        let config = GlobalConfig::load_from_path(&config_path).unwrap();
        assert_eq!(config.notifier_url(), Some("https://ecm.example.com/api"));
        assert_eq!(config.notifier_max_retries(), 5);
        assert_eq!(config.notifier_timeout_secs(), NOTIFY_TIMEOUT_SECS);
        assert_eq!(config.graph_max_depth(), 4);
    }

    #[test]
    fn test_load_invalid_toml_returns_error() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, "invalid toml [[[").unwrap();

        assert!(matches!(
            GlobalConfig::load_from_path(&config_path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn test_blank_url_disables_notifier() {
        let mut config = GlobalConfig::default();
        config.notifier.url = Some("  ".to_string());
        assert!(config.notifier_url().is_none());
    }

    #[test]
    fn test_db_path_precedence() {
        let dirs = RadarDirs::with_dirs("/cfg", "/data");
        let mut config = GlobalConfig::default();
        assert_eq!(config.db_path(&dirs, None), PathBuf::from("/data/radar.db"));

        config.database.path = Some(PathBuf::from("/srv/radar.db"));
        assert_eq!(config.db_path(&dirs, None), PathBuf::from("/srv/radar.db"));
        assert_eq!(
            config.db_path(&dirs, Some(Path::new("/tmp/x.db"))),
            PathBuf::from("/tmp/x.db")
        );
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.toml");

        let mut config = GlobalConfig::default();
        config.notifier.url = Some("http://localhost:9000".to_string());
        config.graph.max_depth = Some(3);
        config.save_to_path(&config_path).unwrap();

        let loaded = GlobalConfig::load_from_path(&config_path).unwrap();
        assert_eq!(loaded.notifier_url(), Some("http://localhost:9000"));
        assert_eq!(loaded.graph_max_depth(), 3);
    }
}
