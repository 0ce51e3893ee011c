//! Configuration management for AudioWatch
//!
//! This module defines the main `Config` struct and its sub-structs,
//! responsible for holding all application settings. It uses the `figment`
//! crate to load configuration from an `audiowatch.toml` file and merge it
//! with environment variables and command-line arguments.

use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::cli::Cli;

/// The main configuration struct for the application.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// The logging level for the application.
    pub log_level: String,
    /// Configuration for periodic metrics logging.
    pub metrics: MetricsConfig,
    /// Configuration for notification throttling.
    pub throttle: ThrottleConfig,
    /// Configuration for the push transport.
    pub transport: TransportConfig,
}

/// Configuration for periodic metrics logging.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MetricsConfig {
    /// Log captured metrics to the console periodically.
    pub log_metrics: bool,
    /// The interval at which to log the metrics, in seconds.
    pub log_aggregation_seconds: u64,
}

/// Configuration for notification throttling.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ThrottleConfig {
    /// Minimum seconds between two delivered notifications for the same
    /// (subject, issue) slot.
    pub window_seconds: u64,
}

/// Configuration for the push transport. At least one endpoint must be set;
/// the connection-addressed `push_url` wins when both are present.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TransportConfig {
    /// Base URL of a connection-addressed push endpoint.
    pub push_url: Option<String>,
    /// URL of a generic message-send webhook.
    pub webhook_url: Option<String>,
    /// Timeout for one delivery attempt in seconds.
    pub timeout_seconds: u64,
}

impl Config {
    /// Loads the application configuration by layering sources: built-in
    /// defaults, the TOML file, `AUDIOWATCH_`-prefixed environment
    /// variables, and command-line arguments.
    pub fn load(cli: &Cli) -> Result<Self> {
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| "audiowatch.toml".into());

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_path))
            // Allow overriding with environment variables, e.g. AUDIOWATCH_LOG_LEVEL=debug
            .merge(Env::prefixed("AUDIOWATCH_"))
            .merge(cli.clone())
            .extract()?;
        Ok(config)
    }
}

// Provide a default implementation for tests and easy setup.
impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics: MetricsConfig {
                log_metrics: false,
                log_aggregation_seconds: 60,
            },
            throttle: ThrottleConfig { window_seconds: 60 },
            transport: TransportConfig {
                push_url: None,
                webhook_url: None,
                timeout_seconds: 10,
            },
        }
    }
}
