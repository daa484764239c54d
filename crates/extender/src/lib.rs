//! kube-scheduler extender for the utilization filter
//!
//! Serves the filter over the scheduler extender HTTP protocol together
//! with health, readiness and Prometheus metrics endpoints.

pub mod api;
pub mod config;
pub mod extender;
