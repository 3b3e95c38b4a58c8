//! Configuration structures for deserialisation.
//!
//! These structures map directly to the JSON configuration file format.

use std::path::PathBuf;

use serde::Deserialize;

use crate::error::ConfigError;

/// Log levels accepted in `logging.level`.
pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Root configuration structure.
///
/// This is the top-level structure that matches the JSON config file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Optional JSON schema reference (ignored during parsing).
    #[serde(rename = "$schema", default)]
    _schema: Option<String>,

    /// Optional comment field (ignored during parsing).
    #[serde(rename = "_comment", default)]
    _comment: Option<String>,

    /// Server identity overrides.
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any validation checks fail.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let level = self.logging.level.to_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::ValidationError {
                message: format!(
                    "Invalid log level '{}'. Must be one of: {}",
                    self.logging.level,
                    LOG_LEVELS.join(", ")
                ),
            });
        }

        if let Some(name) = &self.server.name {
            if name.trim().is_empty() {
                return Err(ConfigError::ValidationError {
                    message: "server.name must not be empty".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Overrides for what the hosted service reports about itself.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Name reported in `serverInfo`. Default: the service's own name.
    #[serde(default)]
    pub name: Option<String>,

    /// Instructions returned from `initialize`. Default: the service's own.
    #[serde(default)]
    pub instructions: Option<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file. When unset, logs go to stderr.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_config() {
        let json = r"{}";
        let config: Config = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_ok());
        assert!(config.server.name.is_none());
        assert!(config.logging.file.is_none());
    }

    #[test]
    fn parse_full_config() {
        let json = r#"{
            "$schema": "https://json-schema.org/draft/2020-12/schema",
            "_comment": "Test config",
            "server": {
                "name": "movies",
                "instructions": "Use search before booking."
            },
            "logging": {
                "level": "debug",
                "file": "/tmp/umcp.log"
            }
        }"#;

        let config: Config = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.name.as_deref(), Some("movies"));
        assert_eq!(
            config.server.instructions.as_deref(),
            Some("Use search before booking.")
        );
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.file, Some(PathBuf::from("/tmp/umcp.log")));
    }

    #[test]
    fn logging_config_defaults() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "warn");
        assert!(config.file.is_none());
    }

    #[test]
    fn log_level_is_case_insensitive() {
        let config: Config = serde_json::from_str(r#"{"logging": {"level": "INFO"}}"#).unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn reject_invalid_log_level() {
        let config: Config = serde_json::from_str(r#"{"logging": {"level": "loud"}}"#).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn reject_blank_server_name() {
        let config: Config = serde_json::from_str(r#"{"server": {"name": "  "}}"#).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn reject_unknown_fields() {
        let json = r#"{
            "unknown_field": "value"
        }"#;

        let result: Result<Config, _> = serde_json::from_str(json);
        assert!(result.is_err());

        let result: Result<Config, _> = serde_json::from_str(r#"{"server": {"port": 1}}"#);
        assert!(result.is_err());
    }
}
