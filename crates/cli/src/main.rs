//! Utilization filter CLI
//!
//! A command-line tool for checking node utilization verdicts against a
//! Prometheus server and inspecting what the filter precomputes for a pod.

mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{nodes as node_cmd, summarize};
use filter_lib::FilterArgs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Utilization filter CLI
#[derive(Parser)]
#[command(name = "utilctl")]
#[command(author, version, about = "CLI for the Utilization Filter", long_about = None)]
pub struct Cli {
    /// Prometheus base URL (can also be set via UTILCTL_PROMETHEUS_URL env var)
    #[arg(long, env = "UTILCTL_PROMETHEUS_URL", default_value = "http://localhost:9090")]
    pub prometheus_url: String,

    /// Maximum admitted CPU utilization ratio
    #[arg(long, default_value_t = 0.70)]
    pub threshold: f64,

    /// Trailing window of the idle-rate query, in seconds
    #[arg(long, default_value_t = 60)]
    pub window_secs: u64,

    /// Timeout for one backend query, in seconds
    #[arg(long, default_value_t = 10)]
    pub timeout_secs: u64,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check nodes' CPU utilization against the threshold
    Check {
        /// Node names (as the `instance` label in Prometheus)
        #[arg(required = true)]
        nodes: Vec<String>,
    },

    /// Run a full filter attempt for a pod against candidate nodes
    Filter {
        /// Pod manifest (JSON)
        #[arg(long, short)]
        pod: PathBuf,

        /// Candidate node names
        #[arg(required = true)]
        nodes: Vec<String>,
    },

    /// Summarize the container limits of a pod manifest
    Summarize {
        /// Pod manifest (JSON)
        pod: PathBuf,
    },
}

impl Cli {
    fn filter_args(&self) -> FilterArgs {
        FilterArgs {
            threshold: self.threshold,
            query_window_seconds: self.window_secs,
            query_timeout_seconds: self.timeout_secs,
            prometheus_address: self.prometheus_url.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new("debug"))
            .with_writer(std::io::stderr)
            .init();
    }

    let args = cli.filter_args();

    match cli.command {
        Commands::Check { nodes } => {
            node_cmd::check_nodes(args.validate()?, nodes, cli.format).await?;
        }
        Commands::Filter { pod, nodes } => {
            node_cmd::filter_pod(serde_json::to_value(&args)?, &pod, nodes, cli.format).await?;
        }
        Commands::Summarize { pod } => {
            summarize::show_summary(&pod, cli.format)?;
        }
    }

    Ok(())
}
