//! Node metrics agent
//!
//! Runs as a DaemonSet on each Kubernetes node, turning kubelet statistics
//! into labeled metric events written to stdout as JSON lines.

use agent_lib::{
    collector::{CollectionLoopBuilder, KubeletSource},
    health::HealthRegistry,
    observability::{AgentMetrics, StructuredLogger},
};
use anyhow::{Context, Result};
use clap::Parser;
use node_metrics_agent::{api, config::AgentConfig, sink};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Debug)]
#[command(name = "node-metrics-agent", version, about = "Kubernetes node metrics agent")]
struct Args {
    /// Configuration file (YAML, TOML or JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run a single collection pass and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries events, logs go to stderr
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let config = AgentConfig::load(args.config.as_deref())?;
    info!(
        node_name = %config.node_name,
        kubelet = %config.kubelet_endpoint,
        "Agent configured"
    );

    let health_registry = HealthRegistry::new();
    health_registry.register_all().await;

    let metrics = AgentMetrics::new();
    let logger = StructuredLogger::new(&config.node_name);
    let collection = config.collection_config()?;
    logger.log_startup(
        AGENT_VERSION,
        collection.interval,
        &collection.metric_groups.enabled(),
    );

    let mut source = KubeletSource::new(&config.kubelet_config(), &config.node_name)?;
    if config.node_metadata {
        match kube::Client::try_default().await {
            Ok(client) => source = source.with_node_api(client),
            Err(e) => warn!(
                error = %e,
                "No Kubernetes API access, node labels and capacity are unavailable"
            ),
        }
    }

    let (mut collection_loop, events_rx) = CollectionLoopBuilder::new()
        .source(Arc::new(source))
        .chain(config.processor_chain()?)
        .health(health_registry.clone())
        .counter_expiration(config.counter_expiration())
        .config(collection)
        .build()?;

    let sink_handle = tokio::spawn(sink::write_events(events_rx, tokio::io::stdout()));

    if args.once {
        let result = collection_loop.run_pass().await;
        drop(collection_loop);
        let written = sink_handle.await.context("Event sink task panicked")??;
        let report = result?;
        info!(
            resources = report.total_resources(),
            events = written,
            dropped = report.dropped,
            "Single pass complete"
        );
        return Ok(());
    }

    let (shutdown_tx, _) = broadcast::channel(1);

    let app_state = Arc::new(api::AppState::new(health_registry, metrics));
    let api_handle = tokio::spawn(api::serve(
        config.api_port,
        app_state,
        shutdown_tx.subscribe(),
    ));
    let loop_handle = tokio::spawn(collection_loop.run(shutdown_tx.subscribe()));

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    logger.log_shutdown("SIGINT received");
    // no receivers left only means both tasks already stopped
    let _ = shutdown_tx.send(());

    if let Err(e) = loop_handle.await {
        error!(error = %e, "Collection loop task failed");
    }
    match sink_handle.await {
        Ok(Ok(written)) => info!(written, "Event sink drained"),
        Ok(Err(e)) => error!(error = format!("{e:#}"), "Event sink failed"),
        Err(e) => error!(error = %e, "Event sink task failed"),
    }
    match api_handle.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = format!("{e:#}"), "API server failed"),
        Err(e) => error!(error = %e, "API server task failed"),
    }

    info!("Shutdown complete");
    Ok(())
}
