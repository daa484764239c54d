//! Threshold gate over a node's instantaneous CPU utilization

use super::{MetricsBackend, QueryResult};
use crate::config::FilterConfig;
use crate::error::BackendError;
use crate::models::UtilizationSample;
use crate::observability::FilterMetrics;
use chrono::{TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Outcome of the utilization check for one node
#[derive(Debug)]
pub enum GateVerdict {
    Admit(UtilizationSample),
    Reject {
        reason: String,
        sample: UtilizationSample,
    },
    Error(BackendError),
}

/// Render a duration as a Prometheus range selector duration
pub fn format_window(window: Duration) -> String {
    let secs = window.as_secs().max(1);
    if secs % 3600 == 0 {
        format!("{}h", secs / 3600)
    } else if secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{}s", secs)
    }
}

fn escape_label_value(value: &str) -> String {
    value
        .replace('\\', r"\\")
        .replace('"', r#"\""#)
        .replace('\n', r"\n")
}

/// Average idle-time rate across the node's CPUs over the trailing window
pub fn build_idle_query(node: &str, window: Duration) -> String {
    format!(
        r#"avg by (instance) (rate(node_cpu_seconds_total{{mode="idle",instance="{}"}}[{}]))"#,
        escape_label_value(node),
        format_window(window)
    )
}

/// Admits nodes whose CPU utilization is at or below the configured threshold
#[derive(Clone)]
pub struct UtilizationGate {
    backend: Arc<dyn MetricsBackend>,
    config: Arc<FilterConfig>,
    metrics: FilterMetrics,
}

impl UtilizationGate {
    pub fn new(backend: Arc<dyn MetricsBackend>, config: Arc<FilterConfig>) -> Self {
        Self {
            backend,
            config,
            metrics: FilterMetrics::new(),
        }
    }

    /// Query the node's current utilization.
    ///
    /// Aborts with `Cancelled` as soon as `cancel` fires and with `Timeout`
    /// once the configured query timeout elapses. Never retries.
    pub async fn sample(
        &self,
        cancel: &CancellationToken,
        node: &str,
    ) -> Result<UtilizationSample, BackendError> {
        let query = build_idle_query(node, self.config.query_window);
        let now = Utc::now();
        let started = Instant::now();

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(BackendError::Cancelled),
            outcome = tokio::time::timeout(
                self.config.query_timeout,
                self.backend.instant_query(&query, now),
            ) => match outcome {
                Ok(result) => result,
                Err(_) => Err(BackendError::Timeout(self.config.query_timeout)),
            },
        };
        self.metrics
            .observe_backend_latency(started.elapsed().as_secs_f64());

        let series = match result? {
            QueryResult::Vector(series) => series,
            QueryResult::Other(result_type) => {
                return Err(BackendError::UnexpectedResultType(result_type))
            }
        };

        let [single] = series.as_slice() else {
            return Err(BackendError::SeriesCount {
                node: node.to_string(),
                count: series.len(),
            });
        };

        let idle: f64 = single.value.parse().map_err(|_| {
            BackendError::Malformed(format!("non-numeric sample value {:?}", single.value))
        })?;

        let timestamp = Utc
            .timestamp_millis_opt((single.timestamp * 1000.0) as i64)
            .single()
            .unwrap_or(now);

        Ok(UtilizationSample {
            node: node.to_string(),
            utilization: 1.0 - idle,
            timestamp,
        })
    }

    /// Sample the node and apply the threshold policy.
    ///
    /// Only a utilization strictly above the threshold rejects. A `NaN`
    /// sample compares false and is admitted.
    pub async fn evaluate(&self, cancel: &CancellationToken, node: &str) -> GateVerdict {
        match self.sample(cancel, node).await {
            Ok(sample) => {
                self.metrics
                    .set_node_utilization(node, sample.utilization);
                debug!(
                    node = %node,
                    utilization = sample.utilization,
                    threshold = self.config.threshold,
                    "Sampled node utilization"
                );
                if sample.utilization > self.config.threshold {
                    GateVerdict::Reject {
                        reason: format!("node's CPU usage is too high: {:.2}", sample.utilization),
                        sample,
                    }
                } else {
                    GateVerdict::Admit(sample)
                }
            }
            Err(err) => {
                self.metrics.inc_backend_error(err.kind());
                GateVerdict::Error(err)
            }
        }
    }
}
