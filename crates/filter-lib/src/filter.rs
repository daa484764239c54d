//! The utilization filter plugin
//!
//! Two phases per scheduling attempt: `precompute` summarizes the work
//! item's limits into the cycle state once, then `decide` runs once per
//! candidate node, possibly concurrently. The utilization gate is the
//! authoritative check; the stored summary is only read for admitted nodes.

use crate::aggregator::summarize;
use crate::config::FilterConfig;
use crate::cycle_state::CycleState;
use crate::error::{BackendError, ConfigError};
use crate::health::{components, HealthRegistry};
use crate::models::{NodeInfo, ResourceSummary, WorkItem};
use crate::observability::{FilterMetrics, StructuredLogger};
use crate::utilization::{GateVerdict, MetricsBackend, PrometheusClient, UtilizationGate};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// Plugin name, also the prefix of the cycle state key
pub const NAME: &str = "utilization-filter";

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

/// Verdict handed back to the scheduler
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "code", content = "reason", rename_all = "lowercase")]
pub enum Status {
    Success,
    /// Node rejected; human-readable reason
    Unschedulable(String),
    /// No decision could be made
    Error(String),
}

impl Status {
    pub fn is_success(&self) -> bool {
        matches!(self, Status::Success)
    }

    pub fn code(&self) -> &'static str {
        match self {
            Status::Success => "success",
            Status::Unschedulable(_) => "unschedulable",
            Status::Error(_) => "error",
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Status::Success => None,
            Status::Unschedulable(reason) | Status::Error(reason) => Some(reason.as_str()),
        }
    }
}

/// Scheduler-facing boundary of a two-phase filter
#[async_trait]
pub trait FilterPlugin: Send + Sync {
    fn name(&self) -> &str;

    /// Once per work item, before any `decide`
    fn precompute(&self, state: &CycleState, work: &WorkItem) -> Status;

    /// Once per candidate node; may run concurrently with sibling nodes
    async fn decide(
        &self,
        cancel: &CancellationToken,
        state: &CycleState,
        work: &WorkItem,
        node: &NodeInfo,
    ) -> Status;
}

/// Shared plumbing the hosting scheduler hands to each plugin
#[derive(Debug, Clone, Default)]
pub struct FrameworkHandle {
    pub metrics: FilterMetrics,
    pub health: HealthRegistry,
}

/// Rejects nodes whose live CPU utilization exceeds a threshold
pub struct UtilizationFilter {
    config: Arc<FilterConfig>,
    gate: UtilizationGate,
    state_key: String,
    handle: FrameworkHandle,
    logger: StructuredLogger,
}

impl UtilizationFilter {
    /// Build from raw plugin args, talking to the Prometheus server they name
    pub fn new(args: &serde_json::Value, handle: FrameworkHandle) -> Result<Self, ConfigError> {
        let config = FilterConfig::from_raw(args)?;
        let backend = PrometheusClient::new(&config.prometheus_address, config.query_timeout)?;
        Ok(Self::with_backend(config, Arc::new(backend), handle))
    }

    /// Build over an arbitrary metrics backend
    pub fn with_backend(
        config: FilterConfig,
        backend: Arc<dyn MetricsBackend>,
        handle: FrameworkHandle,
    ) -> Self {
        let config = Arc::new(config);
        let instance = NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed);
        debug!(
            plugin = NAME,
            instance = instance,
            threshold = config.threshold,
            window_secs = config.query_window.as_secs(),
            "Constructed utilization filter"
        );

        Self {
            gate: UtilizationGate::new(backend, config.clone()),
            config,
            state_key: format!("PreFilter{NAME}/{instance}"),
            handle,
            logger: StructuredLogger::new(NAME),
        }
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Cycle state key holding this instance's resource summary
    pub fn state_key(&self) -> &str {
        &self.state_key
    }

    async fn record_backend_error(&self, err: &BackendError) {
        if !matches!(err, BackendError::Cancelled) {
            self.handle
                .health
                .set_degraded(components::BACKEND, err.to_string())
                .await;
        }
    }
}

#[async_trait]
impl FilterPlugin for UtilizationFilter {
    fn name(&self) -> &str {
        NAME
    }

    fn precompute(&self, state: &CycleState, work: &WorkItem) -> Status {
        let summary = summarize(work);
        debug!(
            pod = %work.id(),
            attempt = state.attempt_id(),
            totals = ?summary.totals,
            "Precomputed resource summary"
        );
        state.write(self.state_key.clone(), summary);
        self.handle.metrics.inc_precomputations();
        Status::Success
    }

    async fn decide(
        &self,
        cancel: &CancellationToken,
        state: &CycleState,
        work: &WorkItem,
        node: &NodeInfo,
    ) -> Status {
        let pod = work.id();
        let threshold = self.config.threshold;

        let status = match self.gate.evaluate(cancel, &node.name).await {
            GateVerdict::Error(err) => {
                self.record_backend_error(&err).await;
                self.logger
                    .log_decision_error(&pod, &node.name, &err.to_string());
                Status::Error(err.to_string())
            }
            GateVerdict::Reject { reason, sample } => {
                self.handle.health.set_healthy(components::BACKEND).await;
                self.logger
                    .log_rejected(&pod, &node.name, sample.utilization, threshold);
                Status::Unschedulable(reason)
            }
            GateVerdict::Admit(sample) => {
                self.handle.health.set_healthy(components::BACKEND).await;
                match state.read::<ResourceSummary>(&self.state_key) {
                    Ok(summary) => {
                        debug!(
                            pod = %pod,
                            node = %node.name,
                            attempt = state.attempt_id(),
                            totals = ?summary.totals,
                            "Filter decision context"
                        );
                        self.handle.health.set_healthy(components::FILTER).await;
                        self.logger
                            .log_admitted(&pod, &node.name, sample.utilization, threshold);
                        Status::Success
                    }
                    Err(err) => {
                        error!(
                            pod = %pod,
                            node = %node.name,
                            attempt = state.attempt_id(),
                            error = %err,
                            "Decision without precomputed state"
                        );
                        self.handle
                            .health
                            .set_degraded(components::FILTER, err.to_string())
                            .await;
                        Status::Error(format!("{NAME}: {err}"))
                    }
                }
            }
        };

        self.handle.metrics.inc_decision(status.code());
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::ComponentStatus;
    use crate::models::ResourceList;
    use crate::testing::{config_with_threshold, vector, StaticBackend};
    use crate::utilization::QueryResult;
    use std::time::Duration;

    fn work() -> WorkItem {
        let limits: ResourceList = [("cpu".to_string(), 500), ("memory".to_string(), 1 << 20)]
            .into_iter()
            .collect();
        WorkItem::new("default", "web-0").with_container("app", limits)
    }

    fn filter(backend: StaticBackend, threshold: f64) -> UtilizationFilter {
        UtilizationFilter::with_backend(
            config_with_threshold(threshold),
            Arc::new(backend),
            FrameworkHandle::default(),
        )
    }

    #[test]
    fn test_new_rejects_bad_args() {
        let result = UtilizationFilter::new(
            &serde_json::json!({ "threshold": 2.0 }),
            FrameworkHandle::default(),
        );
        assert!(matches!(result, Err(ConfigError::InvalidThreshold(_))));
    }

    #[test]
    fn test_new_with_defaults() {
        let filter = UtilizationFilter::new(&serde_json::Value::Null, FrameworkHandle::default())
            .unwrap();
        assert_eq!(filter.name(), NAME);
        assert_eq!(filter.config().threshold, 0.70);
    }

    #[test]
    fn test_state_keys_are_unique_per_instance() {
        let a = filter(StaticBackend::new(vector("n", "0.5")), 0.7);
        let b = filter(StaticBackend::new(vector("n", "0.5")), 0.7);
        assert_ne!(a.state_key(), b.state_key());
        assert!(a.state_key().starts_with("PreFilterutilization-filter/"));
    }

    #[test]
    fn test_precompute_writes_summary() {
        let filter = filter(StaticBackend::new(vector("n", "0.5")), 0.7);
        let state = CycleState::new();

        assert_eq!(filter.precompute(&state, &work()), Status::Success);

        let summary: ResourceSummary = state.read(filter.state_key()).unwrap();
        assert_eq!(summary.get("cpu"), 500);
        assert_eq!(summary.get("memory"), 1 << 20);
    }

    #[tokio::test]
    async fn test_admits_idle_node() {
        let filter = filter(StaticBackend::new(vector("node-a", "0.5")), 0.7);
        let state = CycleState::new();
        filter.precompute(&state, &work());

        let status = filter
            .decide(&CancellationToken::new(), &state, &work(), &NodeInfo::new("node-a"))
            .await;
        assert_eq!(status, Status::Success);
        assert_eq!(state.read_count(), 1);
    }

    #[tokio::test]
    async fn test_rejects_busy_node_without_reading_state() {
        let filter = filter(StaticBackend::new(vector("node-a", "0.2")), 0.7);
        let state = CycleState::new();
        filter.precompute(&state, &work());

        let status = filter
            .decide(&CancellationToken::new(), &state, &work(), &NodeInfo::new("node-a"))
            .await;
        match status {
            Status::Unschedulable(reason) => assert!(reason.contains("0.80")),
            other => panic!("expected unschedulable, got {other:?}"),
        }
        assert_eq!(state.read_count(), 0);
    }

    #[tokio::test]
    async fn test_decide_before_precompute_is_error() {
        let filter = filter(StaticBackend::new(vector("node-a", "0.9")), 0.7);
        let state = CycleState::new();

        let status = filter
            .decide(&CancellationToken::new(), &state, &work(), &NodeInfo::new("node-a"))
            .await;
        match status {
            Status::Error(cause) => assert!(cause.contains("no state written")),
            other => panic!("expected error, got {other:?}"),
        }
        assert_eq!(state.read_count(), 1);
    }

    #[tokio::test]
    async fn test_foreign_state_under_key_is_error() {
        let filter = filter(StaticBackend::new(vector("node-a", "0.9")), 0.7);
        let state = CycleState::new();
        state.write(filter.state_key(), "not a summary".to_string());

        let status = filter
            .decide(&CancellationToken::new(), &state, &work(), &NodeInfo::new("node-a"))
            .await;
        assert!(matches!(status, Status::Error(ref cause) if cause.contains("is not a")));
    }

    #[tokio::test]
    async fn test_missing_state_degrades_filter_health() {
        let handle = FrameworkHandle::default();
        handle.health.register(components::FILTER).await;
        let filter = UtilizationFilter::with_backend(
            config_with_threshold(0.7),
            Arc::new(StaticBackend::new(vector("node-a", "0.9"))),
            handle.clone(),
        );

        let status = filter
            .decide(&CancellationToken::new(), &CycleState::new(), &work(), &NodeInfo::new("node-a"))
            .await;
        assert!(matches!(status, Status::Error(_)));
        let health = handle.health.health().await;
        assert_eq!(health.components[components::FILTER].status, ComponentStatus::Degraded);

        let state = CycleState::new();
        filter.precompute(&state, &work());
        let status = filter
            .decide(&CancellationToken::new(), &state, &work(), &NodeInfo::new("node-a"))
            .await;
        assert!(status.is_success());
        let health = handle.health.health().await;
        assert_eq!(health.components[components::FILTER].status, ComponentStatus::Healthy);
    }

    #[tokio::test]
    async fn test_empty_backend_response_skips_state() {
        let filter = filter(StaticBackend::new(Ok(QueryResult::Vector(vec![]))), 0.7);
        let state = CycleState::new();
        filter.precompute(&state, &work());

        let status = filter
            .decide(&CancellationToken::new(), &state, &work(), &NodeInfo::new("node-a"))
            .await;
        assert!(matches!(status, Status::Error(_)));
        assert_eq!(state.read_count(), 0);
    }

    #[tokio::test]
    async fn test_backend_error_degrades_health() {
        let filter = filter(
            StaticBackend::new(Err(BackendError::Transport("connection refused".into()))),
            0.7,
        );
        let state = CycleState::new();
        filter.precompute(&state, &work());

        let status = filter
            .decide(&CancellationToken::new(), &state, &work(), &NodeInfo::new("node-a"))
            .await;
        assert!(matches!(status, Status::Error(_)));

        let health = filter.handle.health.health().await;
        assert_eq!(
            health.components[components::BACKEND].status,
            ComponentStatus::Degraded
        );
    }

    #[tokio::test]
    async fn test_cancelled_decision_returns_promptly() {
        let backend =
            StaticBackend::new(vector("node-a", "0.5")).with_delay(Duration::from_secs(60));
        let filter = filter(backend, 0.7);
        let state = CycleState::new();
        filter.precompute(&state, &work());

        let cancel = CancellationToken::new();
        cancel.cancel();

        let status = tokio::time::timeout(
            Duration::from_secs(2),
            filter.decide(&cancel, &state, &work(), &NodeInfo::new("node-a")),
        )
        .await
        .expect("decision should not hang once cancelled");
        assert!(matches!(status, Status::Error(ref cause) if cause.contains("cancelled")));
        assert_eq!(state.read_count(), 0);
    }

    #[test]
    fn test_status_accessors() {
        assert!(Status::Success.is_success());
        assert_eq!(Status::Success.reason(), None);
        assert_eq!(Status::Unschedulable("busy".into()).code(), "unschedulable");
        assert_eq!(Status::Error("boom".into()).reason(), Some("boom"));
    }
}
