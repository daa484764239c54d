//! Error taxonomy for the filter core

use thiserror::Error;

/// Malformed plugin arguments. Fatal at construction time.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to decode filter args: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("filter args must be a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("threshold must be a ratio in [0, 1], got {0}")]
    InvalidThreshold(f64),

    #[error("{field} must be greater than zero")]
    ZeroDuration { field: &'static str },

    #[error("invalid prometheus address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

/// The metrics backend could not produce a usable sample
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("querying Prometheus failed: {0}")]
    Transport(String),

    #[error("Prometheus returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Prometheus query error ({error_type}): {message}")]
    Query { error_type: String, message: String },

    #[error("invalid Prometheus response: {0}")]
    Malformed(String),

    #[error("invalid Prometheus response: expected a vector, got {0}")]
    UnexpectedResultType(String),

    #[error("invalid Prometheus response: expected exactly one series for node {node}, got {count}")]
    SeriesCount { node: String, count: usize },

    #[error("utilization query timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("utilization query cancelled")]
    Cancelled,
}

impl BackendError {
    /// Short label for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            BackendError::Transport(_) => "transport",
            BackendError::Status { .. } => "http_status",
            BackendError::Query { .. } => "query",
            BackendError::Malformed(_) => "malformed",
            BackendError::UnexpectedResultType(_) => "result_type",
            BackendError::SeriesCount { .. } => "series_count",
            BackendError::Timeout(_) => "timeout",
            BackendError::Cancelled => "cancelled",
        }
    }
}

/// Cycle state protocol violations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CycleStateError {
    #[error("no state written under key {0:?} in this scheduling attempt")]
    NotFound(String),

    #[error("state under key {key:?} is not a {expected}")]
    TypeMismatch { key: String, expected: &'static str },
}

/// Unparseable Kubernetes resource quantity
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuantityError {
    #[error("invalid quantity {0:?}")]
    Invalid(String),

    #[error("quantity {0:?} is out of range")]
    OutOfRange(String),
}
