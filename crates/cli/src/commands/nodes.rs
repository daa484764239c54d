//! Node utilization checks and full filter runs

use anyhow::Result;
use colored::Colorize;
use filter_lib::utilization::{GateVerdict, PrometheusClient, UtilizationGate};
use filter_lib::{filter_nodes, FilterConfig, FrameworkHandle, NodeInfo, UtilizationFilter};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tabled::Tabled;
use tokio_util::sync::CancellationToken;

use super::load_work_item;
use crate::output::{color_utilization, color_verdict, print_rows, OutputFormat};

/// Per-node result of a utilization check
#[derive(Debug, Serialize)]
struct NodeReport {
    node: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    utilization: Option<f64>,
    verdict: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

#[derive(Tabled)]
struct NodeRow {
    #[tabled(rename = "Node")]
    node: String,
    #[tabled(rename = "CPU Utilization")]
    utilization: String,
    #[tabled(rename = "Verdict")]
    verdict: String,
    #[tabled(rename = "Reason")]
    reason: String,
}

#[derive(Tabled)]
struct DecisionRow {
    #[tabled(rename = "Node")]
    node: String,
    #[tabled(rename = "Verdict")]
    verdict: String,
    #[tabled(rename = "Reason")]
    reason: String,
}

/// Cancel `token` on Ctrl-C so in-flight queries stop promptly
fn cancel_on_interrupt(token: &CancellationToken) {
    let token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });
}

/// Sample each node's utilization and apply the threshold
pub async fn check_nodes(config: FilterConfig, nodes: Vec<String>, format: OutputFormat) -> Result<()> {
    let backend = PrometheusClient::new(&config.prometheus_address, config.query_timeout)?;
    let threshold = config.threshold;
    let gate = UtilizationGate::new(Arc::new(backend), Arc::new(config));

    let cancel = CancellationToken::new();
    cancel_on_interrupt(&cancel);

    let handles: Vec<_> = nodes
        .into_iter()
        .map(|node| {
            let gate = gate.clone();
            let cancel = cancel.clone();
            let name = node.clone();
            (node, tokio::spawn(async move { gate.evaluate(&cancel, &name).await }))
        })
        .collect();

    let mut reports = Vec::with_capacity(handles.len());
    for (node, handle) in handles {
        let report = match handle.await? {
            GateVerdict::Admit(sample) => NodeReport {
                node,
                utilization: Some(sample.utilization),
                verdict: "success",
                reason: None,
            },
            GateVerdict::Reject { reason, sample } => NodeReport {
                node,
                utilization: Some(sample.utilization),
                verdict: "unschedulable",
                reason: Some(reason),
            },
            GateVerdict::Error(err) => NodeReport {
                node,
                utilization: None,
                verdict: "error",
                reason: Some(err.to_string()),
            },
        };
        reports.push(report);
    }

    if let OutputFormat::Table = format {
        println!(
            "{} {}",
            "Threshold:".bold(),
            format!("{:.2}", threshold).cyan()
        );
    }

    let rows = reports
        .iter()
        .map(|r| NodeRow {
            node: r.node.clone(),
            utilization: r
                .utilization
                .map(|u| color_utilization(u, threshold))
                .unwrap_or_else(|| "-".to_string()),
            verdict: color_verdict(r.verdict),
            reason: r.reason.clone().unwrap_or_default(),
        })
        .collect();
    print_rows(rows, &reports, format);
    Ok(())
}

/// Run one full filter attempt for a pod manifest against the given nodes
pub async fn filter_pod(
    args: serde_json::Value,
    pod: &Path,
    nodes: Vec<String>,
    format: OutputFormat,
) -> Result<()> {
    let work = load_work_item(pod)?;
    let filter = UtilizationFilter::new(&args, FrameworkHandle::default())?;

    let cancel = CancellationToken::new();
    cancel_on_interrupt(&cancel);

    let candidates = nodes.into_iter().map(NodeInfo::new).collect();
    let outcome = filter_nodes(Arc::new(filter), Arc::new(work), candidates, cancel).await;

    let mut rows: Vec<DecisionRow> = outcome
        .feasible
        .iter()
        .map(|n| DecisionRow {
            node: n.name.clone(),
            verdict: color_verdict("success"),
            reason: String::new(),
        })
        .collect();
    rows.extend(outcome.unschedulable.iter().map(|(node, reason)| DecisionRow {
        node: node.clone(),
        verdict: color_verdict("unschedulable"),
        reason: reason.clone(),
    }));
    rows.extend(outcome.errored.iter().map(|(node, cause)| DecisionRow {
        node: node.clone(),
        verdict: color_verdict("error"),
        reason: cause.clone(),
    }));

    print_rows(rows, &outcome, format);
    if let OutputFormat::Table = format {
        println!(
            "\nFeasible: {} of {}",
            outcome.feasible.len(),
            outcome.feasible.len() + outcome.unschedulable.len() + outcome.errored.len()
        );
    }
    Ok(())
}
