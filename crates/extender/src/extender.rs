//! Scheduler extender filter protocol
//!
//! kube-scheduler POSTs the pod and its candidate nodes (either full Node
//! objects or just names when the extender is node-cache capable) and
//! expects back the subset that passed, plus a reason per failed node.

use filter_lib::{filter_nodes, FilterPlugin, NodeInfo, WorkItem};
use k8s_openapi::api::core::v1::{Node, Pod};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeList {
    #[serde(default)]
    pub items: Vec<Node>,
}

/// Request body of the extender `filter` verb
#[derive(Debug, Clone, Deserialize)]
pub struct ExtenderArgs {
    pub pod: Pod,
    #[serde(default)]
    pub nodes: Option<NodeList>,
    #[serde(default, rename = "nodenames")]
    pub node_names: Option<Vec<String>>,
}

/// Response body of the extender `filter` verb
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtenderFilterResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodes: Option<NodeList>,
    #[serde(default, rename = "nodenames", skip_serializing_if = "Option::is_none")]
    pub node_names: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub failed_nodes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

impl ExtenderFilterResult {
    fn failed(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            ..Default::default()
        }
    }
}

/// Filter the request's candidate nodes, cancelling outstanding decisions after `timeout`
pub async fn run_filter(
    plugin: Arc<dyn FilterPlugin>,
    args: ExtenderArgs,
    timeout: Duration,
) -> ExtenderFilterResult {
    let work = match WorkItem::try_from(&args.pod) {
        Ok(work) => work,
        Err(err) => {
            warn!(error = %err, "Rejecting filter request with unparseable pod");
            return ExtenderFilterResult::failed(format!("invalid pod resources: {err}"));
        }
    };

    let (candidates, node_objects) = match (args.nodes, args.node_names) {
        (Some(list), _) => (list.items.iter().map(NodeInfo::from).collect(), Some(list.items)),
        (None, Some(names)) => (names.into_iter().map(NodeInfo::new).collect(), None),
        (None, None) => (Vec::new(), None),
    };

    let cancel = CancellationToken::new();
    let deadline = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            cancel.cancel();
        })
    };
    let outcome = filter_nodes(plugin, Arc::new(work), candidates, cancel).await;
    deadline.abort();

    let feasible: HashSet<&str> = outcome.feasible.iter().map(|n| n.name.as_str()).collect();
    let mut result = ExtenderFilterResult {
        error: outcome.precompute_error.clone().unwrap_or_default(),
        ..Default::default()
    };

    match node_objects {
        Some(items) => {
            let items = items
                .into_iter()
                .filter(|node| {
                    node.metadata
                        .name
                        .as_deref()
                        .is_some_and(|name| feasible.contains(name))
                })
                .collect();
            result.nodes = Some(NodeList { items });
        }
        None => {
            result.node_names = Some(outcome.feasible.iter().map(|n| n.name.clone()).collect());
        }
    }

    result.failed_nodes = outcome.unschedulable;
    result.failed_nodes.extend(outcome.errored);
    result
}
