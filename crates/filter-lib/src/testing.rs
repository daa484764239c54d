//! Test doubles shared by the unit tests

use crate::config::FilterConfig;
use crate::error::BackendError;
use crate::utilization::{async_trait, MetricsBackend, QueryResult, Series};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn config_with_threshold(threshold: f64) -> FilterConfig {
    FilterConfig {
        threshold,
        ..FilterConfig::default()
    }
}

/// Single-series idle-ratio response for `node`
pub fn vector(node: &str, idle: &str) -> Result<QueryResult, BackendError> {
    Ok(QueryResult::Vector(vec![Series {
        labels: BTreeMap::from([("instance".to_string(), node.to_string())]),
        timestamp: Utc::now().timestamp() as f64,
        value: idle.to_string(),
    }]))
}

/// Backend answering from canned responses, optionally after a delay
pub struct StaticBackend {
    default: Result<QueryResult, BackendError>,
    per_node: HashMap<String, Result<QueryResult, BackendError>>,
    delay: Option<Duration>,
    queries: Arc<Mutex<Vec<String>>>,
}

impl StaticBackend {
    pub fn new(default: Result<QueryResult, BackendError>) -> Self {
        Self {
            default,
            per_node: HashMap::new(),
            delay: None,
            queries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_node(mut self, node: &str, response: Result<QueryResult, BackendError>) -> Self {
        self.per_node.insert(node.to_string(), response);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every query received so far
    pub fn queries(&self) -> Arc<Mutex<Vec<String>>> {
        self.queries.clone()
    }
}

#[async_trait]
impl MetricsBackend for StaticBackend {
    async fn instant_query(
        &self,
        query: &str,
        _at: DateTime<Utc>,
    ) -> Result<QueryResult, BackendError> {
        self.queries.lock().unwrap().push(query.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.per_node
            .iter()
            .find(|(node, _)| query.contains(&format!("instance=\"{node}\"")))
            .map(|(_, response)| response.clone())
            .unwrap_or_else(|| self.default.clone())
    }
}
