//! Configuration for the login sensor.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration for the login sensor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Port the beacon endpoint listens on
    pub port: u16,

    /// Append-only CSV file receiving every record
    pub csv_path: PathBuf,

    /// SQLite database receiving the queryable subset
    pub store_path: PathBuf,

    /// Path for ingest statistics and other state
    pub data_path: PathBuf,

    /// Extra attempts per sink after a failed write
    pub sink_retries: u32,

    /// Emit logs as JSON lines
    pub json_logs: bool,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("synheart-login-sensor");

        Self {
            port: 8787,
            csv_path: data_dir.join("login_behavior.csv"),
            store_path: data_dir.join("login_behavior.db"),
            data_path: data_dir,
            sink_retries: 1,
            json_logs: false,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .map_err(|e| ConfigError::IoError(e.to_string()))?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("synheart-login-sensor")
            .join("config.json")
    }

    /// Path of the persisted ingest statistics.
    pub fn stats_path(&self) -> PathBuf {
        self.data_path.join("ingest_stats.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        let dirs = [
            Some(self.data_path.as_path()),
            self.csv_path.parent(),
            self.store_path.parent(),
        ];
        for dir in dirs.into_iter().flatten() {
            if dir.as_os_str().is_empty() {
                continue;
            }
            std::fs::create_dir_all(dir).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.port, 8787);
        assert_eq!(config.sink_retries, 1);
        assert!(config.csv_path.ends_with("login_behavior.csv"));
        assert!(config.store_path.starts_with(&config.data_path));
        assert!(!config.json_logs);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{"port": 9000}"#).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.sink_retries, 1);
    }

    #[test]
    fn test_ensure_directories() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            csv_path: dir.path().join("out").join("rows.csv"),
            store_path: dir.path().join("db").join("rows.db"),
            data_path: dir.path().join("state"),
            ..Config::default()
        };

        config.ensure_directories().unwrap();
        assert!(dir.path().join("out").is_dir());
        assert!(dir.path().join("db").is_dir());
        assert!(dir.path().join("state").is_dir());
    }
}
