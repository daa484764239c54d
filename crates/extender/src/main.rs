//! Utilization extender - kube-scheduler extender filtering busy nodes
//!
//! Runs next to kube-scheduler and rejects candidate nodes whose live CPU
//! utilization, as reported by Prometheus, is above the configured threshold.

use anyhow::{Context, Result};
use filter_lib::{
    health::components, FilterPlugin, FrameworkHandle, StructuredLogger, UtilizationFilter, NAME,
};
use scheduler_extender::{api, config};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const EXTENDER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting utilization extender");

    let config = config::ExtenderConfig::load()?;

    let handle = FrameworkHandle::default();
    handle.health.register(components::FILTER).await;
    handle.health.register(components::BACKEND).await;

    let filter = UtilizationFilter::new(&config.filter_args(), handle.clone())
        .context("Failed to construct utilization filter")?;

    let logger = StructuredLogger::new(NAME);
    logger.log_startup(
        EXTENDER_VERSION,
        filter.config().threshold,
        filter.config().query_window.as_secs(),
        filter.config().prometheus_address.as_str(),
    );

    let filter: Arc<dyn FilterPlugin> = Arc::new(filter);
    let app_state = Arc::new(api::AppState::new(
        handle.clone(),
        filter,
        config.attempt_timeout(),
    ));

    handle.health.set_ready(true).await;

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    api::serve(config.listen_port, app_state, shutdown).await?;

    logger.log_shutdown("SIGINT received");
    info!("Shutting down");

    Ok(())
}
