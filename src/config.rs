// Configuration File Support
//
// This module provides configuration file parsing for the gatekeeper.
// Supports TOML format with environment variable overrides.
// Configuration files are loaded from XDG config directory: ~/.config/tribe-gatekeeper/config.toml

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::cache::CacheConfig;
use crate::quota::QuotaConfig;
use crate::rate_limit::RateLimitConfig;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// Document store configuration
    pub store: StoreConfig,

    /// Expiring cache configuration
    pub cache: CacheConfig,

    /// Service quota configuration
    pub quota: QuotaConfig,

    /// Per-user rate limit configuration
    pub rate_limit: RateLimitConfig,

    /// Metrics configuration
    pub metrics: MetricsConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

/// Document store configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct StoreConfig {
    /// JSON snapshot persisted between runs; in-memory only when unset
    pub snapshot_path: Option<String>,
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MetricsConfig {
    /// Whether to serve metrics in daemon mode
    pub enabled: bool,

    /// Port for metrics server
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9090,
        }
    }
}

impl Config {
    /// Load configuration from the default XDG config directory
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    /// If the config file does not exist, returns default configuration.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    ///
    /// Environment overrides are applied whether or not the file exists.
    /// Runs before logging is set up, so it does not log.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed, or
    /// if the resulting configuration is invalid.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file from {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file from {:?}", path))?
        } else {
            Self::default()
        };

        let config = config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path
    ///
    /// Returns `~/.config/tribe-gatekeeper/config.toml` on Linux
    pub fn config_path() -> PathBuf {
        if let Some(proj_dirs) = directories::ProjectDirs::from("com", "tribe", "tribe-gatekeeper")
        {
            proj_dirs.config_dir().join("config.toml")
        } else {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home)
                .join(".config")
                .join("tribe-gatekeeper")
                .join("config.toml")
        }
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Environment variables take precedence over config file values:
    /// - TRIBE_LOG_LEVEL
    /// - TRIBE_LOG_FORMAT
    /// - TRIBE_STORE_PATH
    /// - TRIBE_RATE_LIMIT_ENABLED
    /// - TRIBE_METRICS_ENABLED
    /// - TRIBE_METRICS_PORT
    /// - TRIBE_SWEEP_INTERVAL_SECS
    fn apply_env_overrides(self) -> Self {
        self.apply_overrides_from(|name| std::env::var(name).ok())
    }

    /// Apply overrides read through `lookup`; unparseable values are ignored
    fn apply_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        // Logging overrides
        if let Some(level) = lookup("TRIBE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("TRIBE_LOG_FORMAT") {
            self.logging.format = format;
        }

        // Store overrides
        if let Some(path) = lookup("TRIBE_STORE_PATH") {
            self.store.snapshot_path = Some(path);
        }

        // Limit overrides
        if let Some(enabled) = lookup("TRIBE_RATE_LIMIT_ENABLED") {
            self.rate_limit.enabled = enabled.parse().unwrap_or(self.rate_limit.enabled);
        }
        if let Some(interval) = lookup("TRIBE_SWEEP_INTERVAL_SECS") {
            if let Ok(interval) = interval.parse::<u64>() {
                if interval >= 60 {
                    self.cache.sweep_interval_secs = interval;
                }
            }
        }

        // Metrics overrides
        if let Some(enabled) = lookup("TRIBE_METRICS_ENABLED") {
            self.metrics.enabled = enabled.parse().unwrap_or(self.metrics.enabled);
        }
        if let Some(port) = lookup("TRIBE_METRICS_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.metrics.port = port;
            }
        }

        self
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        // Validate logging level
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                self.logging.level
            ),
        }

        // Validate logging format
        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" | "compact" => {}
            _ => anyhow::bail!(
                "Invalid log format: {}. Must be one of: json, pretty, compact",
                self.logging.format
            ),
        }

        if let Some(path) = &self.store.snapshot_path {
            if path.trim().is_empty() {
                anyhow::bail!("Store snapshot path must not be empty");
            }
        }

        self.cache.validate()?;
        self.quota.validate()?;
        self.rate_limit.validate()?;

        // Validate metrics configuration
        if self.metrics.port == 0 {
            anyhow::bail!("Metrics port must be > 0");
        }

        Ok(())
    }

    /// Convert log level string to tracing::Level
    pub fn log_level(&self) -> Result<tracing::Level> {
        self.logging
            .level
            .to_lowercase()
            .parse()
            .map_err(|e| anyhow::anyhow!("Failed to parse log level: {}", e))
    }
}
