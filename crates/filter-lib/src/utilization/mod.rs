//! Utilization telemetry from an external metrics backend
//!
//! This module provides the backend abstraction, a Prometheus HTTP API
//! client implementing it, and the threshold gate that turns a node's
//! idle-time ratio into an admission verdict.

mod gate;
mod prometheus_api;

pub use gate::{build_idle_query, format_window, GateVerdict, UtilizationGate};
pub use prometheus_api::PrometheusClient;

use crate::error::BackendError;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

pub use async_trait::async_trait;

/// One series of an instant-vector result
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub labels: BTreeMap<String, String>,
    /// Evaluation timestamp in unix seconds
    pub timestamp: f64,
    /// Sample value as reported; may be `NaN` or `+Inf`
    pub value: String,
}

/// Result of an instant query
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    Vector(Vec<Series>),
    /// Any non-vector result type (`scalar`, `matrix`, `string`)
    Other(String),
}

/// Trait for telemetry backends answering instant queries
#[async_trait]
pub trait MetricsBackend: Send + Sync {
    /// Evaluate `query` at the instant `at`
    async fn instant_query(&self, query: &str, at: DateTime<Utc>)
        -> Result<QueryResult, BackendError>;
}
