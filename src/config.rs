//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use crate::store::{Backend, Connection, ConnectionOptions};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub connection: ConnectionConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Store connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default)]
    pub backend: Backend,

    #[serde(default = "default_database")]
    pub database: String,

    /// Pretty-print width for the document file
    #[serde(default)]
    pub indent: Option<usize>,

    #[serde(default)]
    pub sort_keys: bool,
}

fn default_database() -> String {
    dirs::data_local_dir()
        .map(|p| p.join("cosmosql").join("store.json").to_string_lossy().to_string())
        .unwrap_or_else(|| "./cosmosql.json".to_string())
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            database: default_database(),
            indent: None,
            sort_keys: false,
        }
    }
}

impl ConnectionConfig {
    /// Connection descriptor handed to a store
    pub fn connection(&self) -> Connection {
        Connection {
            database: self.database.clone(),
            options: ConnectionOptions {
                indent: self.indent,
                sort_keys: self.sort_keys,
            },
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
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
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("cosmosql").join("config.toml")),
            Some(PathBuf::from("./cosmosql.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        // Connection overrides
        if let Some(backend) = lookup("COSMOSQL_BACKEND") {
            match backend.parse() {
                Ok(b) => self.connection.backend = b,
                Err(e) => tracing::warn!("Ignoring COSMOSQL_BACKEND: {}", e),
            }
        }
        if let Some(database) = lookup("COSMOSQL_DATABASE") {
            self.connection.database = database;
        }

        // Logging overrides
        if let Some(level) = lookup("COSMOSQL_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("COSMOSQL_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# CosmoSQL Configuration
#
# Environment variables override these settings:
# - COSMOSQL_BACKEND
# - COSMOSQL_DATABASE
# - COSMOSQL_LOG_LEVEL
# - COSMOSQL_LOG_FORMAT

[connection]
# Storage backend: json (document file) or sqlite
backend = "json"

# Document file path, or SQLite database path
database = "./cosmosql.json"

# Pretty-print the document file with this many spaces (omit for compact)
# indent = 2

# Write document file keys in sorted order
sort_keys = false

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_file_parses() {
        let config: Config = toml::from_str(&generate_default_config()).unwrap();
        assert_eq!(config.connection.backend, Backend::Json);
        assert_eq!(config.connection.database, "./cosmosql.json");
        assert_eq!(config.connection.indent, None);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [connection]
            backend = "sqlite"
            indent = 4
            "#,
        )
        .unwrap();
        assert_eq!(config.connection.backend, Backend::Sqlite);
        assert_eq!(config.connection.indent, Some(4));
        assert!(!config.connection.sort_keys);
        assert_eq!(config.logging.format, "pretty");

        let connection = config.connection.connection();
        assert_eq!(connection.options.indent, Some(4));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("COSMOSQL_BACKEND", "sqlite"),
            ("COSMOSQL_DATABASE", "/tmp/x.db"),
            ("COSMOSQL_LOG_FORMAT", "json"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|name| vars.get(name).map(|v| v.to_string()));
        assert_eq!(config.connection.backend, Backend::Sqlite);
        assert_eq!(config.connection.database, "/tmp/x.db");
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_invalid_backend_override_ignored() {
        let mut config = Config::default();
        config.apply_overrides(|name| (name == "COSMOSQL_BACKEND").then(|| "mongo".to_string()));
        assert_eq!(config.connection.backend, Backend::Json);
    }

    #[test]
    fn test_load_errors() {
        let dir = tempdir().unwrap();
        let missing = Config::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(missing, ConfigError::Io { .. }));

        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[connection\nbackend = 1").unwrap();
        let bad = Config::load(&path).unwrap_err();
        assert!(matches!(bad, ConfigError::Parse { .. }));
    }
}
