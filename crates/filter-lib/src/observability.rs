//! Observability infrastructure for the utilization filter
//!
//! Provides:
//! - Prometheus metrics (decisions by verdict, backend latency and errors, observed utilization)
//! - Structured JSON logging with tracing

use prometheus::{
    register_gauge_vec, register_histogram, register_int_counter, register_int_counter_vec,
    GaugeVec, Histogram, IntCounter, IntCounterVec,
};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

/// Histogram buckets for backend query latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<FilterMetricsInner> = OnceLock::new();

struct FilterMetricsInner {
    decisions: IntCounterVec,
    precomputations: IntCounter,
    backend_latency_seconds: Histogram,
    backend_errors: IntCounterVec,
    node_utilization: GaugeVec,
}

impl FilterMetricsInner {
    fn new() -> Self {
        Self {
            decisions: register_int_counter_vec!(
                "utilization_filter_decisions_total",
                "Per-node filter decisions by verdict",
                &["verdict"]
            )
            .expect("Failed to register decisions_total"),

            precomputations: register_int_counter!(
                "utilization_filter_precomputations_total",
                "Work items summarized in the precompute phase"
            )
            .expect("Failed to register precomputations_total"),

            backend_latency_seconds: register_histogram!(
                "utilization_filter_backend_query_latency_seconds",
                "Time spent waiting on the metrics backend for one node",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register backend_query_latency_seconds"),

            backend_errors: register_int_counter_vec!(
                "utilization_filter_backend_errors_total",
                "Failed utilization queries by failure kind",
                &["kind"]
            )
            .expect("Failed to register backend_errors_total"),

            node_utilization: register_gauge_vec!(
                "utilization_filter_node_utilization_ratio",
                "Last CPU utilization ratio observed for a node",
                &["node"]
            )
            .expect("Failed to register node_utilization_ratio"),
        }
    }
}

/// Filter metrics for Prometheus exposition
///
/// Lightweight handle to the process-wide metrics; clones share them.
#[derive(Clone)]
pub struct FilterMetrics {
    _private: (),
}

impl Default for FilterMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FilterMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("FilterMetrics")
    }
}

impl FilterMetrics {
    /// Create a handle, registering the collectors on first use
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(FilterMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &FilterMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    pub fn inc_decision(&self, verdict: &str) {
        self.inner().decisions.with_label_values(&[verdict]).inc();
    }

    pub fn inc_precomputations(&self) {
        self.inner().precomputations.inc();
    }

    pub fn observe_backend_latency(&self, duration_secs: f64) {
        self.inner().backend_latency_seconds.observe(duration_secs);
    }

    pub fn inc_backend_error(&self, kind: &str) {
        self.inner().backend_errors.with_label_values(&[kind]).inc();
    }

    pub fn set_node_utilization(&self, node: &str, utilization: f64) {
        self.inner()
            .node_utilization
            .with_label_values(&[node])
            .set(utilization);
    }

    /// Decisions recorded so far for a verdict label
    pub fn decisions(&self, verdict: &str) -> u64 {
        self.inner().decisions.with_label_values(&[verdict]).get()
    }
}

/// Structured logger for filter events
///
/// Emits event-style records for decisions and lifecycle changes.
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    plugin: String,
}

impl StructuredLogger {
    pub fn new(plugin: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
        }
    }

    /// Log a node admitted after the utilization check
    pub fn log_admitted(&self, pod: &str, node: &str, utilization: f64, threshold: f64) {
        debug!(
            event = "node_admitted",
            plugin = %self.plugin,
            pod = %pod,
            node = %node,
            utilization = utilization,
            threshold = threshold,
            "Node admitted"
        );
    }

    /// Log a node rejected for high utilization
    pub fn log_rejected(&self, pod: &str, node: &str, utilization: f64, threshold: f64) {
        info!(
            event = "node_rejected",
            plugin = %self.plugin,
            pod = %pod,
            node = %node,
            utilization = utilization,
            threshold = threshold,
            "Node rejected, CPU utilization above threshold"
        );
    }

    /// Log a decision that could not be made
    pub fn log_decision_error(&self, pod: &str, node: &str, cause: &str) {
        warn!(
            event = "decision_error",
            plugin = %self.plugin,
            pod = %pod,
            node = %node,
            cause = %cause,
            "Filter decision failed"
        );
    }

    /// Log startup with the effective configuration
    pub fn log_startup(&self, version: &str, threshold: f64, window_secs: u64, backend: &str) {
        info!(
            event = "filter_started",
            plugin = %self.plugin,
            version = %version,
            threshold = threshold,
            window_secs = window_secs,
            backend = %backend,
            "Utilization filter started"
        );
    }

    /// Log shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "filter_shutdown",
            plugin = %self.plugin,
            reason = %reason,
            "Utilization filter shutting down"
        );
    }
}
