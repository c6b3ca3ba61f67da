// Configuration module for Page Gate
//
// This module handles loading and managing the gate configuration

use crate::error::{PageGateError, Result};
use crate::storage::StorageKind;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Gate configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// API configuration
    #[serde(default)]
    pub api: ApiConfig,
    /// Storage configuration
    #[serde(default)]
    pub storage: StorageConfig,
    /// Content configuration
    #[serde(default)]
    pub content: ContentConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API bind address
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Backend kind
    #[serde(default)]
    pub kind: StorageKind,
    /// SQLite database path (sql backend only)
    #[serde(default = "default_database_path")]
    pub database_path: String,
    /// Timeout applied to every store call, in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Run audit updates in the background instead of awaiting them
    #[serde(default = "default_false")]
    pub detach_audit: bool,
}

/// Content configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentConfig {
    /// Directories searched in order for `{page}.html`
    #[serde(default = "default_content_directories")]
    pub directories: Vec<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (json, text)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default values
fn default_bind_address() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_database_path() -> String {
    "data/page_gate.db".to_string()
}

fn default_timeout_ms() -> u64 {
    2000
}

fn default_content_directories() -> Vec<PathBuf> {
    vec![PathBuf::from(".."), PathBuf::from("protected-content")]
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_false() -> bool {
    false
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            kind: StorageKind::default(),
            database_path: default_database_path(),
            timeout_ms: default_timeout_ms(),
            detach_audit: default_false(),
        }
    }
}

impl StorageConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            directories: default_content_directories(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path)
            .map_err(|e| PageGateError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&config_str)?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let config_str = toml::to_string_pretty(self)?;

        fs::write(path, config_str)
            .map_err(|e| PageGateError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }
}

/// Write a default configuration file at the given path if it doesn't exist
pub fn ensure_default_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    if !path.as_ref().exists() {
        let default_config = Config::default();
        default_config.to_file(&path)?;
        return Ok(default_config);
    }

    Config::from_file(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [storage]
            kind = "memory"
            timeout_ms = 250
            "#,
        )
        .unwrap();

        assert_eq!(config.storage.kind, StorageKind::Memory);
        assert_eq!(config.storage.timeout(), Duration::from_millis(250));
        assert_eq!(config.storage.database_path, "data/page_gate.db");
        assert!(!config.storage.detach_audit);
        assert_eq!(config.api.bind_address, "127.0.0.1:8080");
        assert_eq!(config.content.directories.len(), 2);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_ensure_default_config_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page_gate.toml");

        let written = ensure_default_config(&path).unwrap();
        assert!(path.exists());

        let loaded = ensure_default_config(&path).unwrap();
        assert_eq!(loaded.storage.kind, written.storage.kind);
        assert_eq!(loaded.api.bind_address, written.api.bind_address);
    }

    #[test]
    fn test_invalid_config_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "[storage]\nkind = 5\n").unwrap();

        match Config::from_file(&path) {
            Err(PageGateError::Config(msg)) => assert!(msg.contains("parse")),
            other => panic!("expected config error, got {:?}", other),
        }
    }
}
