//! Prometheus HTTP API client for instant queries

use super::{async_trait, MetricsBackend, QueryResult, Series};
use crate::error::{BackendError, ConfigError};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Envelope shared by every Prometheus API response
#[derive(Debug, Deserialize)]
struct ApiResponse {
    status: String,
    #[serde(default)]
    data: Option<ApiData>,
    #[serde(default, rename = "errorType")]
    error_type: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiData {
    result_type: String,
    result: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct VectorEntry {
    #[serde(default)]
    metric: BTreeMap<String, String>,
    value: (f64, String),
}

/// Client for `GET /api/v1/query`
#[derive(Debug, Clone)]
pub struct PrometheusClient {
    client: Client,
    query_url: Url,
}

impl PrometheusClient {
    /// Create a client for the Prometheus server at `address`
    pub fn new(address: &Url, timeout: Duration) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::Client(e.to_string()))?;

        // Keep any path prefix (e.g. behind a proxy) when joining the API path
        let mut base = address.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let query_url = base
            .join("api/v1/query")
            .map_err(|e| ConfigError::InvalidAddress {
                address: address.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self { client, query_url })
    }

    pub fn query_url(&self) -> &Url {
        &self.query_url
    }

    fn parse_body(body: &str) -> Result<QueryResult, BackendError> {
        let response: ApiResponse = serde_json::from_str(body)
            .map_err(|e| BackendError::Malformed(format!("undecodable body: {e}")))?;

        if response.status != "success" {
            return Err(BackendError::Query {
                error_type: response.error_type.unwrap_or_else(|| "unknown".to_string()),
                message: response.error.unwrap_or_default(),
            });
        }

        let data = response
            .data
            .ok_or_else(|| BackendError::Malformed("missing data".to_string()))?;

        if data.result_type != "vector" {
            return Ok(QueryResult::Other(data.result_type));
        }

        let entries: Vec<VectorEntry> = serde_json::from_value(data.result)
            .map_err(|e| BackendError::Malformed(format!("bad vector result: {e}")))?;

        Ok(QueryResult::Vector(
            entries
                .into_iter()
                .map(|entry| Series {
                    labels: entry.metric,
                    timestamp: entry.value.0,
                    value: entry.value.1,
                })
                .collect(),
        ))
    }
}

#[async_trait]
impl MetricsBackend for PrometheusClient {
    async fn instant_query(
        &self,
        query: &str,
        at: DateTime<Utc>,
    ) -> Result<QueryResult, BackendError> {
        let time = format!("{:.3}", at.timestamp_millis() as f64 / 1000.0);
        debug!(query = %query, time = %time, "Issuing instant query");

        let response = self
            .client
            .get(self.query_url.clone())
            .query(&[("query", query), ("time", time.as_str())])
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        if !status.is_success() {
            // Prometheus reports bad queries as 4xx with a JSON error envelope
            return match Self::parse_body(&body) {
                Err(err @ BackendError::Query { .. }) => Err(err),
                _ => Err(BackendError::Status {
                    status: status.as_u16(),
                    body,
                }),
            };
        }

        Self::parse_body(&body)
    }
}
