//! Filter arguments decoded from the scheduler profile

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Arguments accepted by the utilization filter.
///
/// Unknown fields are ignored, so older profiles carrying decorative
/// settings still decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterArgs {
    /// Maximum admitted CPU utilization ratio
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    /// Trailing window of the idle-rate query, in seconds
    #[serde(default = "default_query_window_seconds")]
    pub query_window_seconds: u64,

    /// Upper bound on a single backend query, in seconds
    #[serde(default = "default_query_timeout_seconds")]
    pub query_timeout_seconds: u64,

    /// Base URL of the Prometheus HTTP API
    #[serde(default = "default_prometheus_address")]
    pub prometheus_address: String,
}

fn default_threshold() -> f64 {
    0.70
}

fn default_query_window_seconds() -> u64 {
    60
}

fn default_query_timeout_seconds() -> u64 {
    10
}

fn default_prometheus_address() -> String {
    "http://monitor-kube-prometheus-prometheus:9090".to_string()
}

impl Default for FilterArgs {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            query_window_seconds: default_query_window_seconds(),
            query_timeout_seconds: default_query_timeout_seconds(),
            prometheus_address: default_prometheus_address(),
        }
    }
}

/// Validated, immutable filter configuration
#[derive(Debug, Clone, PartialEq)]
pub struct FilterConfig {
    pub threshold: f64,
    pub query_window: Duration,
    pub query_timeout: Duration,
    pub prometheus_address: Url,
}

impl FilterArgs {
    /// Decode args from an opaque JSON object; `null` means all defaults
    pub fn decode(raw: &serde_json::Value) -> Result<Self, ConfigError> {
        let kind = match raw {
            serde_json::Value::Null => return Ok(Self::default()),
            serde_json::Value::Object(_) => return Ok(serde_json::from_value(raw.clone())?),
            serde_json::Value::Array(_) => "array",
            serde_json::Value::Bool(_) => "boolean",
            serde_json::Value::Number(_) => "number",
            serde_json::Value::String(_) => "string",
        };
        Err(ConfigError::NotAnObject(kind))
    }

    /// Check ranges and parse the backend address
    pub fn validate(&self) -> Result<FilterConfig, ConfigError> {
        if !self.threshold.is_finite() || !(0.0..=1.0).contains(&self.threshold) {
            return Err(ConfigError::InvalidThreshold(self.threshold));
        }
        if self.query_window_seconds == 0 {
            return Err(ConfigError::ZeroDuration {
                field: "queryWindowSeconds",
            });
        }
        if self.query_timeout_seconds == 0 {
            return Err(ConfigError::ZeroDuration {
                field: "queryTimeoutSeconds",
            });
        }

        let invalid = |reason: String| ConfigError::InvalidAddress {
            address: self.prometheus_address.clone(),
            reason,
        };
        let address = Url::parse(&self.prometheus_address).map_err(|e| invalid(e.to_string()))?;
        if !matches!(address.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme {}", address.scheme())));
        }

        Ok(FilterConfig {
            threshold: self.threshold,
            query_window: Duration::from_secs(self.query_window_seconds),
            query_timeout: Duration::from_secs(self.query_timeout_seconds),
            prometheus_address: address,
        })
    }
}

impl FilterConfig {
    pub fn from_raw(raw: &serde_json::Value) -> Result<Self, ConfigError> {
        FilterArgs::decode(raw)?.validate()
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            query_window: Duration::from_secs(default_query_window_seconds()),
            query_timeout: Duration::from_secs(default_query_timeout_seconds()),
            prometheus_address: Url::parse(&default_prometheus_address())
                .expect("default prometheus address is a valid URL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_when_absent() {
        let config = FilterConfig::from_raw(&serde_json::Value::Null).unwrap();
        assert_eq!(config, FilterConfig::default());
        assert_eq!(config.threshold, 0.70);
        assert_eq!(config.query_window, Duration::from_secs(60));

        let config = FilterConfig::from_raw(&json!({})).unwrap();
        assert_eq!(config, FilterConfig::default());
    }

    #[test]
    fn test_decode_camel_case_fields() {
        let config = FilterConfig::from_raw(&json!({
            "threshold": 0.85,
            "queryWindowSeconds": 120,
            "queryTimeoutSeconds": 3,
            "prometheusAddress": "https://prom.example:9090"
        }))
        .unwrap();

        assert_eq!(config.threshold, 0.85);
        assert_eq!(config.query_window, Duration::from_secs(120));
        assert_eq!(config.query_timeout, Duration::from_secs(3));
        assert_eq!(config.prometheus_address.host_str(), Some("prom.example"));
    }

    #[test]
    fn test_decorative_fields_are_ignored() {
        let config = FilterConfig::from_raw(&json!({
            "favoriteColor": "#326CE5",
            "favoriteNumber": 7,
            "thanksTo": "someone"
        }))
        .unwrap();
        assert_eq!(config, FilterConfig::default());
    }

    #[test]
    fn test_rejects_out_of_range_threshold() {
        for bad in [-0.1, 1.5] {
            let result = FilterConfig::from_raw(&json!({ "threshold": bad }));
            assert!(matches!(result, Err(ConfigError::InvalidThreshold(_))));
        }
    }

    #[test]
    fn test_rejects_zero_window() {
        let result = FilterConfig::from_raw(&json!({ "queryWindowSeconds": 0 }));
        assert!(matches!(result, Err(ConfigError::ZeroDuration { .. })));
    }

    #[test]
    fn test_rejects_bad_address() {
        let result = FilterConfig::from_raw(&json!({ "prometheusAddress": "not a url" }));
        assert!(matches!(result, Err(ConfigError::InvalidAddress { .. })));

        let result = FilterConfig::from_raw(&json!({ "prometheusAddress": "ftp://prom:21" }));
        assert!(matches!(result, Err(ConfigError::InvalidAddress { .. })));
    }

    #[test]
    fn test_rejects_wrong_shape() {
        let result = FilterConfig::from_raw(&json!({ "threshold": "high" }));
        assert!(matches!(result, Err(ConfigError::Decode(_))));

        let result = FilterConfig::from_raw(&json!("threshold=0.5"));
        assert!(matches!(result, Err(ConfigError::NotAnObject("string"))));
    }

    #[test]
    fn test_rejects_positional_args() {
        let result = FilterConfig::from_raw(&json!([0.1, 5, 7]));
        assert!(matches!(result, Err(ConfigError::NotAnObject("array"))));
    }
}
