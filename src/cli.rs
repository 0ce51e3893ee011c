//! Command-Line Interface (CLI) argument parsing.
//!
//! This module defines the command-line arguments for the application using
//! the `clap` crate. These arguments are parsed at startup and then merged
//! with the configuration from the `audiowatch.toml` file and environment
//! variables.

use clap::Parser;
use figment::{
    value::{Dict, Map, Value},
    Error, Metadata, Profile, Provider,
};
use std::path::PathBuf;

/// A rate-limited dispatcher for audio quality degradation notifications.
#[derive(Parser, Debug, Default, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Throttle window duration in seconds.
    #[arg(long, value_name = "SECONDS")]
    pub throttle_window: Option<u64>,

    /// Base URL of the connection-addressed push endpoint.
    #[arg(long, value_name = "URL")]
    pub push_url: Option<String>,

    /// URL of the generic message-send webhook.
    #[arg(long, value_name = "URL")]
    pub webhook_url: Option<String>,

    /// The logging level (e.g. "info", "debug").
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Enable periodic logging of internal metrics.
    #[arg(long)]
    pub log_metrics: Option<bool>,
}

impl Provider for Cli {
    fn metadata(&self) -> Metadata {
        Metadata::named("Command-Line Arguments")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        let mut dict = Dict::new();

        if let Some(window) = self.throttle_window {
            let mut throttle = Dict::new();
            throttle.insert("window_seconds".into(), Value::from(window));
            dict.insert("throttle".into(), Value::from(throttle));
        }

        let mut transport = Dict::new();
        if let Some(url) = &self.push_url {
            transport.insert("push_url".into(), Value::from(url.clone()));
        }
        if let Some(url) = &self.webhook_url {
            transport.insert("webhook_url".into(), Value::from(url.clone()));
        }
        if !transport.is_empty() {
            dict.insert("transport".into(), Value::from(transport));
        }

        if let Some(level) = &self.log_level {
            dict.insert("log_level".into(), Value::from(level.clone()));
        }

        // The flag's presence means "on"; an explicit `--log-metrics=false`
        // is treated the same as leaving it off.
        if self.log_metrics == Some(true) {
            let mut metrics = Dict::new();
            metrics.insert("log_metrics".into(), Value::from(true));
            dict.insert("metrics".into(), Value::from(metrics));
        }

        let mut map = Map::new();
        map.insert(Profile::Default, dict);
        Ok(map)
    }
}
