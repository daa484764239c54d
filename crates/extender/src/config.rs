//! Extender configuration

use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_CONFIG_FILE: &str = "/etc/utilization-filter/config";

/// Extender configuration, layered from an optional file and `EXTENDER_*` env vars
#[derive(Debug, Clone, Deserialize)]
pub struct ExtenderConfig {
    /// Port for the extender, health and metrics endpoints
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Deadline for one filter request across all candidate nodes
    #[serde(default = "default_attempt_timeout")]
    pub attempt_timeout_secs: u64,

    /// Maximum admitted CPU utilization ratio
    pub threshold: Option<f64>,

    /// Trailing window of the idle-rate query
    pub query_window_secs: Option<u64>,

    /// Upper bound on one backend query
    pub query_timeout_secs: Option<u64>,

    /// Prometheus HTTP API base URL
    pub prometheus_address: Option<String>,
}

fn default_listen_port() -> u16 {
    8888
}

fn default_attempt_timeout() -> u64 {
    30
}

impl Default for ExtenderConfig {
    fn default() -> Self {
        Self {
            listen_port: default_listen_port(),
            attempt_timeout_secs: default_attempt_timeout(),
            threshold: None,
            query_window_secs: None,
            query_timeout_secs: None,
            prometheus_address: None,
        }
    }
}

impl ExtenderConfig {
    /// Load configuration from the config file (if present) and environment
    pub fn load() -> Result<Self> {
        let file = std::env::var("EXTENDER_CONFIG_FILE")
            .unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name(&file).required(false))
            .add_source(config::Environment::with_prefix("EXTENDER").try_parsing(true))
            .build()
            .context("Failed to read extender configuration")?;

        config
            .try_deserialize()
            .context("Invalid extender configuration")
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs)
    }

    /// Plugin args in the shape the filter decodes; unset fields keep the filter's defaults
    pub fn filter_args(&self) -> serde_json::Value {
        let mut args = serde_json::Map::new();
        if let Some(threshold) = self.threshold {
            args.insert("threshold".into(), threshold.into());
        }
        if let Some(window) = self.query_window_secs {
            args.insert("queryWindowSeconds".into(), window.into());
        }
        if let Some(timeout) = self.query_timeout_secs {
            args.insert("queryTimeoutSeconds".into(), timeout.into());
        }
        if let Some(address) = &self.prometheus_address {
            args.insert("prometheusAddress".into(), address.clone().into());
        }
        serde_json::Value::Object(args)
    }
}
