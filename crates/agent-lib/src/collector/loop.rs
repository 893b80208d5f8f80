//! Metrics collection loop
//!
//! Periodically fetches a snapshot, runs the metrics pipeline over it and
//! forwards the resulting events, with a configurable interval and jitter.

use super::SnapshotSource;
use crate::event::Event;
use crate::health::{components, HealthRegistry};
use crate::metadata::{MetadataIndex, OmitLabel};
use crate::metrics::MetricsProcessor;
use crate::models::{MetricGroup, MetricGroups};
use crate::observability::{AgentMetrics, StructuredLogger};
use crate::processors::ProcessorChain;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Configuration for the metrics collection loop
#[derive(Debug, Clone)]
pub struct CollectionConfig {
    /// Node this agent runs on
    pub node_name: String,
    /// Base collection interval (default: 10 seconds)
    pub interval: Duration,
    /// Maximum jitter to add to interval (default: 1 second)
    pub jitter: Duration,
    /// Hierarchy levels emitted by each pass
    pub metric_groups: MetricGroups,
    /// Pod label keys never copied onto resources
    pub omit_labels: Vec<OmitLabel>,
    /// Copy node labels onto pod, container and volume resources
    pub include_node_labels: bool,
    /// Channel buffer size for emitted events
    pub buffer_size: usize,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            node_name: String::new(),
            interval: Duration::from_secs(10),
            jitter: Duration::from_secs(1),
            metric_groups: MetricGroups::all(),
            omit_labels: Vec::new(),
            include_node_labels: true,
            buffer_size: 1000,
        }
    }
}

/// Outcome of one successful pass
#[derive(Debug, Clone, Default)]
pub struct PassReport {
    /// Resources emitted per group
    pub resources: HashMap<MetricGroup, usize>,
    /// Events forwarded after processing
    pub events: usize,
    /// Events dropped by processors
    pub dropped: usize,
    pub elapsed: Duration,
}

impl PassReport {
    pub fn total_resources(&self) -> usize {
        self.resources.values().sum()
    }
}

/// Drives the pipeline over the snapshot source on a fixed interval
pub struct CollectionLoop {
    source: Arc<dyn SnapshotSource>,
    processor: Arc<MetricsProcessor>,
    chain: ProcessorChain,
    health: HealthRegistry,
    metrics: AgentMetrics,
    logger: StructuredLogger,
    config: CollectionConfig,
    /// Last successfully built index, reused when a metadata fetch fails
    metadata: Arc<MetadataIndex>,
    events_tx: mpsc::Sender<Event>,
}

impl CollectionLoop {
    /// Create a new collection loop and the receiving end of its event channel
    pub fn new(
        source: Arc<dyn SnapshotSource>,
        processor: Arc<MetricsProcessor>,
        chain: ProcessorChain,
        health: HealthRegistry,
        config: CollectionConfig,
    ) -> (Self, mpsc::Receiver<Event>) {
        let (events_tx, events_rx) = mpsc::channel(config.buffer_size.max(1));

        let loop_instance = Self {
            source,
            processor,
            chain,
            health,
            metrics: AgentMetrics::new(),
            logger: StructuredLogger::new(config.node_name.clone()),
            config,
            metadata: Arc::new(MetadataIndex::default()),
            events_tx,
        };

        (loop_instance, events_rx)
    }

    /// Run passes until `shutdown` fires or the event receiver goes away
    ///
    /// A pass in flight always completes; shutdown is only observed between passes.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            groups = ?self.config.metric_groups.enabled(),
            "Starting metrics collection loop"
        );

        loop {
            match self.run_pass().await {
                Ok(report) => self.logger.log_pass(
                    report.total_resources(),
                    report.events,
                    report.dropped,
                    report.elapsed,
                ),
                Err(e) => self.logger.log_pass_skipped(&e),
            }

            if self.events_tx.is_closed() {
                warn!("Event receiver closed, stopping collection loop");
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.next_delay()) => {}
                _ = shutdown.recv() => {
                    info!("Shutting down metrics collection loop");
                    break;
                }
            }
        }
    }

    /// Run a single pass: fetch, transform, process, forward
    pub async fn run_pass(&mut self) -> Result<PassReport> {
        let start = Instant::now();

        let summary = match self.source.stats_summary().await {
            Ok(summary) => {
                self.health.record_success(components::KUBELET).await;
                summary
            }
            Err(e) => {
                self.metrics.inc_fetch_errors();
                self.health
                    .record_failure(components::KUBELET, format!("{e:#}"))
                    .await;
                return Err(e.context("Failed to fetch stats summary"));
            }
        };

        match self.fetch_metadata().await {
            Ok(index) => {
                self.health.record_success(components::METADATA).await;
                self.metadata = Arc::new(index);
            }
            Err(e) => {
                self.metrics.inc_fetch_errors();
                let status = self
                    .health
                    .record_failure(components::METADATA, format!("{e:#}"))
                    .await;
                warn!(
                    error = format!("{e:#}"),
                    status = ?status,
                    pods = self.metadata.pod_count(),
                    "Metadata fetch failed, reusing previous index"
                );
            }
        }

        let data = self.processor.generate_metrics_data(
            &summary,
            &self.metadata,
            &self.config.metric_groups,
        );

        let mut report = PassReport::default();
        for rm in &data {
            *report.resources.entry(rm.resource.kind).or_default() += 1;
        }

        let events: Vec<Event> = data.iter().map(Event::from).collect();
        let (events, dropped) = self.chain.apply(events);
        report.dropped = dropped;
        report.events = events.len();

        for event in events {
            if let Err(e) = self.events_tx.send(event).await {
                self.health
                    .record_failure(components::PIPELINE, "event receiver closed")
                    .await;
                return Err(e).context("Failed to forward event");
            }
        }
        self.health.record_success(components::PIPELINE).await;
        self.health.set_ready(true).await;

        for group in self.config.metric_groups.enabled() {
            let count = report.resources.get(&group).copied().unwrap_or(0);
            self.metrics.set_resources_emitted(group, count);
        }
        self.metrics.add_events_dropped(dropped);
        self.metrics
            .set_rate_cache_entries(self.processor.rate_cache().len());

        report.elapsed = start.elapsed();
        self.metrics.observe_pass(report.elapsed);

        debug!(
            resources = report.total_resources(),
            events = report.events,
            dropped = report.dropped,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Collection pass complete"
        );

        Ok(report)
    }

    async fn fetch_metadata(&self) -> Result<MetadataIndex> {
        let (pods, nodes) = tokio::try_join!(self.source.pods(), self.source.nodes())
            .context("Failed to fetch metadata")?;

        Ok(MetadataIndex::new(
            &pods,
            &nodes,
            &self.config.omit_labels,
            self.config.include_node_labels,
        ))
    }

    /// Delay before the next pass, jittered so agents across nodes spread out
    fn next_delay(&self) -> Duration {
        let jitter_ms = rand_jitter(self.config.jitter.as_millis() as u64);
        self.config.interval + Duration::from_millis(jitter_ms)
    }
}

/// Generate a pseudo-random jitter value between 0 and max_ms
fn rand_jitter(max_ms: u64) -> u64 {
    if max_ms == 0 {
        return 0;
    }

    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;

    now % max_ms
}

/// Builder for creating the collection loop
pub struct CollectionLoopBuilder {
    source: Option<Arc<dyn SnapshotSource>>,
    processor: Option<Arc<MetricsProcessor>>,
    chain: ProcessorChain,
    health: HealthRegistry,
    counter_expiration: Duration,
    config: CollectionConfig,
}

impl CollectionLoopBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            source: None,
            processor: None,
            chain: ProcessorChain::default(),
            health: HealthRegistry::new(),
            counter_expiration: Duration::from_secs(60),
            config: CollectionConfig::default(),
        }
    }

    /// Set the snapshot source
    pub fn source(mut self, source: Arc<dyn SnapshotSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Use an existing processor instead of building one
    pub fn processor(mut self, processor: Arc<MetricsProcessor>) -> Self {
        self.processor = Some(processor);
        self
    }

    pub fn chain(mut self, chain: ProcessorChain) -> Self {
        self.chain = chain;
        self
    }

    pub fn health(mut self, health: HealthRegistry) -> Self {
        self.health = health;
        self
    }

    /// Maximum gap between two counter samples that still yields a rate
    pub fn counter_expiration(mut self, expiration: Duration) -> Self {
        self.counter_expiration = expiration;
        self
    }

    pub fn config(mut self, config: CollectionConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the collection interval
    pub fn interval(mut self, interval: Duration) -> Self {
        self.config.interval = interval;
        self
    }

    /// Set the jitter duration
    pub fn jitter(mut self, jitter: Duration) -> Self {
        self.config.jitter = jitter;
        self
    }

    /// Set the buffer size
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.config.buffer_size = size;
        self
    }

    /// Build the collection loop
    pub fn build(self) -> Result<(CollectionLoop, mpsc::Receiver<Event>)> {
        let source = self
            .source
            .ok_or_else(|| anyhow::anyhow!("Snapshot source is required"))?;
        if self.config.interval.is_zero() {
            anyhow::bail!("Collection interval must be greater than zero");
        }

        let processor = self
            .processor
            .unwrap_or_else(|| Arc::new(MetricsProcessor::new(self.counter_expiration)));

        Ok(CollectionLoop::new(
            source,
            processor,
            self.chain,
            self.health,
            self.config,
        ))
    }
}

impl Default for CollectionLoopBuilder {
    fn default() -> Self {
        Self::new()
    }
}
