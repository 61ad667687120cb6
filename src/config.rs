// Configuration File Support
//
// This module provides configuration file parsing for the Postgen service.
// Supports TOML format with environment variable overrides.
// Configuration files are loaded from the XDG config directory: ~/.config/postgen/config.toml

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::generation::GeneratorConfig;
use crate::rate_limit::{RateLimitPreset, RateLimitSettings, MAX_WINDOW_MS};
use crate::usage::{MonthBoundary, PlanLimits};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// HTTP server configuration
    pub server: ServerConfig,

    /// Plan limits and quota enforcement
    pub plans: PlansConfig,

    /// Rate limiter configuration
    pub rate_limit: RateLimitSettings,

    /// Language-model provider configuration
    pub generator: GeneratorConfig,

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

impl LoggingConfig {
    pub fn tracing_level(&self) -> Result<tracing::Level> {
        self.level
            .to_lowercase()
            .parse()
            .map_err(|e| anyhow::anyhow!("Failed to parse log level: {}", e))
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid listen address {}:{}", self.host, self.port))
    }
}

/// Plan and quota configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlansConfig {
    /// Monthly generations per plan
    pub limits: PlanLimits,

    /// Timezone of the monthly reset
    pub month_boundary: MonthBoundary,

    /// Check quota and record in one store operation
    pub strict_enforcement: bool,

    /// Where quota-exceeded responses send the user
    pub upgrade_url: String,
}

impl Default for PlansConfig {
    fn default() -> Self {
        Self {
            limits: PlanLimits::default(),
            month_boundary: MonthBoundary::Local,
            strict_enforcement: false,
            upgrade_url: "/pricing".to_string(),
        }
    }
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MetricsConfig {
    /// Whether to expose /metrics
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
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
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed or
    /// fails validation. If the config file does not exist, returns the
    /// default configuration with environment overrides applied.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file from {:?}", path))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file from {:?}", path))?;
            tracing::info!("Loaded configuration from {:?}", path);
            config
        } else {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            Config::default()
        };

        let config = config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path
    ///
    /// Returns `~/.config/postgen/config.toml` on Linux/Mac
    pub fn config_path() -> PathBuf {
        if let Some(proj_dirs) = directories::ProjectDirs::from("com", "postgen", "Postgen") {
            proj_dirs.config_dir().join("config.toml")
        } else {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config").join("postgen").join("config.toml")
        }
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Environment variables take precedence over config file values:
    /// - POSTGEN_LOG_LEVEL
    /// - POSTGEN_LOG_FORMAT
    /// - POSTGEN_HOST
    /// - POSTGEN_PORT
    /// - POSTGEN_RATE_LIMIT_ENABLED
    /// - POSTGEN_STRICT_QUOTA
    /// - POSTGEN_MONTH_BOUNDARY (local, utc)
    /// - POSTGEN_GENERATOR_API_BASE
    /// - POSTGEN_GENERATOR_API_KEY
    /// - POSTGEN_GENERATOR_MODEL
    /// - POSTGEN_METRICS_ENABLED
    pub fn apply_env_overrides(mut self) -> Self {
        if let Ok(level) = std::env::var("POSTGEN_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("POSTGEN_LOG_FORMAT") {
            self.logging.format = format;
        }

        if let Ok(host) = std::env::var("POSTGEN_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("POSTGEN_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                if port > 0 {
                    self.server.port = port;
                }
            }
        }

        if let Ok(enabled) = std::env::var("POSTGEN_RATE_LIMIT_ENABLED") {
            self.rate_limit.enabled = enabled.parse().unwrap_or(self.rate_limit.enabled);
        }
        if let Ok(strict) = std::env::var("POSTGEN_STRICT_QUOTA") {
            self.plans.strict_enforcement =
                strict.parse().unwrap_or(self.plans.strict_enforcement);
        }
        if let Ok(boundary) = std::env::var("POSTGEN_MONTH_BOUNDARY") {
            match boundary.to_lowercase().as_str() {
                "local" => self.plans.month_boundary = MonthBoundary::Local,
                "utc" => self.plans.month_boundary = MonthBoundary::Utc,
                _ => {}
            }
        }

        if let Ok(base) = std::env::var("POSTGEN_GENERATOR_API_BASE") {
            self.generator.api_base = base;
        }
        if let Ok(key) = std::env::var("POSTGEN_GENERATOR_API_KEY") {
            if !key.is_empty() {
                self.generator.api_key = Some(key);
            }
        }
        if let Ok(model) = std::env::var("POSTGEN_GENERATOR_MODEL") {
            self.generator.model = model;
        }

        if let Ok(enabled) = std::env::var("POSTGEN_METRICS_ENABLED") {
            self.metrics.enabled = enabled.parse().unwrap_or(self.metrics.enabled);
        }

        self
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                self.logging.level
            ),
        }

        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" | "compact" => {}
            _ => anyhow::bail!(
                "Invalid log format: {}. Must be one of: json, pretty, compact",
                self.logging.format
            ),
        }

        if self.server.port == 0 {
            anyhow::bail!("Server port must be > 0");
        }
        self.server.socket_addr()?;

        if self.plans.limits.pro < self.plans.limits.free {
            anyhow::bail!(
                "Pro plan limit ({}) must not be below the free plan limit ({})",
                self.plans.limits.pro,
                self.plans.limits.free
            );
        }

        if self.rate_limit.sweep_interval_secs == 0 {
            anyhow::bail!("Rate limit sweep interval must be > 0");
        }
        for preset in RateLimitPreset::ALL {
            let limit = self.rate_limit.presets.get(preset);
            if limit.window_ms == 0 {
                anyhow::bail!("Rate limit window for '{}' must be > 0", preset.prefix());
            }
            if limit.window_ms > MAX_WINDOW_MS {
                anyhow::bail!(
                    "Rate limit window for '{}' must be at most one year ({} ms)",
                    preset.prefix(),
                    MAX_WINDOW_MS
                );
            }
            if limit.max_requests == 0 {
                anyhow::bail!("Rate limit for '{}' must allow at least one request", preset.prefix());
            }
        }

        if self.generator.api_base.is_empty() {
            anyhow::bail!("Generator API base URL must not be empty");
        }
        if self.generator.model.is_empty() {
            anyhow::bail!("Generator model must not be empty");
        }
        if self.generator.timeout_secs == 0 {
            anyhow::bail!("Generator timeout must be > 0");
        }

        Ok(())
    }

    /// Convert log level string to tracing::Level
    pub fn log_level(&self) -> Result<tracing::Level> {
        self.logging.tracing_level()
    }
}
