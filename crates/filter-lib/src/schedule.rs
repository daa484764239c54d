//! One scheduling attempt: precompute once, then decide for every node in parallel

use crate::cycle_state::CycleState;
use crate::filter::{FilterPlugin, Status};
use crate::models::{NodeInfo, WorkItem};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Partition of the candidate nodes after filtering
#[derive(Debug, Clone, Default, Serialize)]
pub struct FilterOutcome {
    pub attempt_id: u64,
    /// Admitted nodes, in input order
    pub feasible: Vec<NodeInfo>,
    /// Rejected node name → reason
    pub unschedulable: BTreeMap<String, String>,
    /// Node name → cause for nodes no decision could be made for
    pub errored: BTreeMap<String, String>,
    /// Set when the precompute phase failed; nothing is feasible then
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precompute_error: Option<String>,
}

impl FilterOutcome {
    fn record(&mut self, node: NodeInfo, status: Status) {
        match status {
            Status::Success => self.feasible.push(node),
            Status::Unschedulable(reason) => {
                self.unschedulable.insert(node.name, reason);
            }
            Status::Error(cause) => {
                self.errored.insert(node.name, cause);
            }
        }
    }
}

/// Run one scheduling attempt of `work` against `nodes`.
///
/// A fresh [`CycleState`] is created for the attempt and dropped when it
/// ends. Each node is decided on its own task; a failing or panicking
/// decision only affects its own node.
pub async fn filter_nodes(
    plugin: Arc<dyn FilterPlugin>,
    work: Arc<WorkItem>,
    nodes: Vec<NodeInfo>,
    cancel: CancellationToken,
) -> FilterOutcome {
    let state = Arc::new(CycleState::new());
    let mut outcome = FilterOutcome {
        attempt_id: state.attempt_id(),
        ..Default::default()
    };

    let pre = plugin.precompute(&state, &work);
    if !pre.is_success() {
        let cause = pre.reason().unwrap_or("precompute failed").to_string();
        warn!(
            plugin = plugin.name(),
            pod = %work.id(),
            attempt = outcome.attempt_id,
            cause = %cause,
            "Precompute failed, no node is feasible"
        );
        for node in nodes {
            outcome.errored.insert(node.name, cause.clone());
        }
        outcome.precompute_error = Some(cause);
        return outcome;
    }

    let handles: Vec<_> = nodes
        .into_iter()
        .map(|node| {
            let plugin = plugin.clone();
            let state = state.clone();
            let work = work.clone();
            let cancel = cancel.clone();
            let task_node = node.clone();
            let handle = tokio::spawn(async move {
                plugin.decide(&cancel, &state, &work, &task_node).await
            });
            (node, handle)
        })
        .collect();

    for (node, handle) in handles {
        let status = match handle.await {
            Ok(status) => status,
            Err(join_err) => {
                warn!(node = %node.name, error = %join_err, "Decision task failed");
                Status::Error(format!("decision task failed: {join_err}"))
            }
        };
        outcome.record(node, status);
    }

    info!(
        plugin = plugin.name(),
        pod = %work.id(),
        attempt = outcome.attempt_id,
        feasible = outcome.feasible.len(),
        unschedulable = outcome.unschedulable.len(),
        errored = outcome.errored.len(),
        "Filtered candidate nodes"
    );
    outcome
}
