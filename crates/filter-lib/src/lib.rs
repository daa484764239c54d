//! Utilization-aware node filter for a workload scheduler
//!
//! This crate provides the core functionality for:
//! - Summarizing a pod's container limits once per scheduling attempt
//! - Per-attempt cycle state shared between the precompute and decide phases
//! - Gating nodes on live CPU utilization from Prometheus
//! - Running one attempt's per-node decisions concurrently
//! - Health checks and observability

pub mod aggregator;
pub mod config;
pub mod cycle_state;
pub mod error;
pub mod filter;
pub mod health;
pub mod models;
pub mod observability;
pub mod schedule;
pub mod utilization;

#[cfg(test)]
mod testing;

pub use config::{FilterArgs, FilterConfig};
pub use cycle_state::{CycleState, StateData};
pub use error::{BackendError, ConfigError, CycleStateError, QuantityError};
pub use filter::{FilterPlugin, FrameworkHandle, Status, UtilizationFilter, NAME};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{FilterMetrics, StructuredLogger};
pub use schedule::{filter_nodes, FilterOutcome};
