//! Configuration management
//!
//! Handles loading, validation, and merging of configuration from:
//! - TOML files
//! - CLI arguments
//!
//! Every section is optional in the file; missing sections and keys take
//! their defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::input::DeliverySettings;

pub mod types;

pub use types::{DeliveryConfig, LoggingConfig, LoopbackConfig};

/// Largest response timeout accepted, in milliseconds
pub const MAX_RESPONSE_TIMEOUT_MS: u64 = 60_000;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Delivery configuration
    #[serde(default)]
    pub delivery: DeliveryConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Loopback demo configuration
    #[serde(default)]
    pub loopback: LoopbackConfig,
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path))?;

        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;

        config.validate()?;
        Ok(config)
    }

    /// Create default configuration
    pub fn default_config() -> Self {
        Config {
            delivery: DeliveryConfig::default(),
            logging: LoggingConfig::default(),
            loopback: LoopbackConfig::default(),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.delivery.response_timeout_ms == 0 {
            anyhow::bail!("response_timeout_ms must be greater than 0");
        }
        if self.delivery.response_timeout_ms > MAX_RESPONSE_TIMEOUT_MS {
            anyhow::bail!(
                "response_timeout_ms ({}) cannot exceed {}",
                self.delivery.response_timeout_ms,
                MAX_RESPONSE_TIMEOUT_MS
            );
        }

        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!("Invalid log level: {}", self.logging.level),
        }

        match self.logging.format.as_str() {
            "pretty" | "compact" | "json" => {}
            _ => anyhow::bail!("Invalid log format: {}", self.logging.format),
        }

        if self.loopback.surfaces == 0 {
            anyhow::bail!("loopback.surfaces must be at least 1");
        }
        if self.loopback.client_consume_every == 0 {
            anyhow::bail!("loopback.client_consume_every must be at least 1");
        }

        Ok(())
    }

    /// Override config with CLI arguments
    pub fn with_overrides(
        mut self,
        timeout_ms: Option<u64>,
        log_format: Option<String>,
        log_file: Option<PathBuf>,
    ) -> Self {
        if let Some(timeout_ms) = timeout_ms {
            self.delivery.response_timeout_ms = timeout_ms;
        }
        if let Some(format) = log_format {
            self.logging.format = format;
        }
        if log_file.is_some() {
            self.logging.log_file = log_file;
        }

        self
    }

    /// Delivery settings for [`InputSender`](crate::input::InputSender)
    pub fn to_delivery_settings(&self) -> DeliverySettings {
        DeliverySettings {
            response_timeout: Duration::from_millis(self.delivery.response_timeout_ms),
            max_acks_per_drain: self.delivery.max_acks_per_drain,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default_config();
        assert_eq!(config.delivery.response_timeout_ms, 5000);
        assert_eq!(config.delivery.max_acks_per_drain, 256);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
        assert_eq!(
            config.to_delivery_settings(),
            DeliverySettings::default()
        );
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[delivery]\nresponse_timeout_ms = 250\n\n[loopback]\nsurfaces = 7"
        )
        .unwrap();

        let config = Config::load(file.path().to_str().unwrap()).unwrap();

        assert_eq!(config.delivery.response_timeout_ms, 250);
        assert_eq!(config.delivery.max_acks_per_drain, 256);
        assert_eq!(config.loopback.surfaces, 7);
        assert_eq!(config.loopback.events_per_surface, 200);
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[delivery]\nresponse_timeout_ms = 0").unwrap();

        let err = Config::load(file.path().to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("response_timeout_ms"));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");

        let err = Config::load(path.to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_config_validation_invalid_log_level() {
        let mut config = Config::default_config();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_invalid_log_format() {
        let mut config = Config::default_config();
        config.logging.format = "xml".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_timeout_bounds() {
        let mut config = Config::default_config();
        config.delivery.response_timeout_ms = MAX_RESPONSE_TIMEOUT_MS + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overrides() {
        let config = Config::default_config().with_overrides(
            Some(100),
            Some("json".to_string()),
            Some(PathBuf::from("/tmp/input.log")),
        );

        assert_eq!(config.delivery.response_timeout_ms, 100);
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.logging.log_file, Some(PathBuf::from("/tmp/input.log")));
        assert_eq!(
            config.to_delivery_settings().response_timeout,
            Duration::from_millis(100)
        );

        let untouched = Config::default_config().with_overrides(None, None, None);
        assert_eq!(untouched.delivery.response_timeout_ms, 5000);
    }
}
