//! Observability infrastructure for the agent
//!
//! Provides:
//! - Prometheus metrics (pass latency, fetch errors, emitted resources, rate cache size)
//! - Structured JSON logging with tracing

use crate::models::MetricGroup;
use prometheus::{
    register_histogram, register_int_counter, register_int_gauge, register_int_gauge_vec,
    Encoder, Histogram, IntCounter, IntGauge, IntGaugeVec, TextEncoder,
};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{info, warn};

/// Histogram buckets for pass latency (in seconds)
const PASS_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<AgentMetricsInner> = OnceLock::new();

struct AgentMetricsInner {
    pass_duration_seconds: Histogram,
    passes: IntCounter,
    fetch_errors: IntCounter,
    events_dropped: IntCounter,
    resources_emitted: IntGaugeVec,
    rate_cache_entries: IntGauge,
}

impl AgentMetricsInner {
    fn new() -> Self {
        // Registration only fails on a duplicate name, and this runs once per process
        Self {
            pass_duration_seconds: register_histogram!(
                "node_metrics_agent_pass_duration_seconds",
                "Time spent on one collection pass, fetch included",
                PASS_LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register pass_duration_seconds"),

            passes: register_int_counter!(
                "node_metrics_agent_passes_total",
                "Completed collection passes"
            )
            .expect("Failed to register passes_total"),

            fetch_errors: register_int_counter!(
                "node_metrics_agent_fetch_errors_total",
                "Failed kubelet or metadata fetches"
            )
            .expect("Failed to register fetch_errors_total"),

            events_dropped: register_int_counter!(
                "node_metrics_agent_events_dropped_total",
                "Events dropped by processors"
            )
            .expect("Failed to register events_dropped_total"),

            resources_emitted: register_int_gauge_vec!(
                "node_metrics_agent_resources_emitted",
                "Resources emitted by the last pass",
                &["group"]
            )
            .expect("Failed to register resources_emitted"),

            rate_cache_entries: register_int_gauge!(
                "node_metrics_agent_rate_cache_entries",
                "Counter baselines held by the rate cache"
            )
            .expect("Failed to register rate_cache_entries"),
        }
    }
}

/// Agent metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance. Clones share the
/// same underlying metrics.
#[derive(Clone)]
pub struct AgentMetrics {
    inner: &'static AgentMetricsInner,
}

impl Default for AgentMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        Self {
            inner: GLOBAL_METRICS.get_or_init(AgentMetricsInner::new),
        }
    }

    pub fn observe_pass(&self, elapsed: Duration) {
        self.inner.pass_duration_seconds.observe(elapsed.as_secs_f64());
        self.inner.passes.inc();
    }

    pub fn inc_fetch_errors(&self) {
        self.inner.fetch_errors.inc();
    }

    pub fn add_events_dropped(&self, count: usize) {
        self.inner.events_dropped.inc_by(count as u64);
    }

    pub fn set_resources_emitted(&self, group: MetricGroup, count: usize) {
        self.inner
            .resources_emitted
            .with_label_values(&[group.as_str()])
            .set(count as i64);
    }

    pub fn set_rate_cache_entries(&self, count: usize) {
        self.inner.rate_cache_entries.set(count as i64);
    }

    pub fn passes(&self) -> u64 {
        self.inner.passes.get()
    }

    pub fn fetch_errors(&self) -> u64 {
        self.inner.fetch_errors.get()
    }
}

/// Render every registered metric in the Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

/// Structured logger for agent lifecycle events
#[derive(Clone)]
pub struct StructuredLogger {
    node_name: String,
}

impl StructuredLogger {
    pub fn new(node_name: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
        }
    }

    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    /// Log agent startup
    pub fn log_startup(&self, version: &str, interval: Duration, groups: &[MetricGroup]) {
        let groups: Vec<&str> = groups.iter().map(|g| g.as_str()).collect();
        info!(
            event = "agent_started",
            node = %self.node_name,
            agent_version = %version,
            interval_secs = interval.as_secs(),
            metric_groups = ?groups,
            "Node metrics agent started"
        );
    }

    /// Log the outcome of one collection pass
    pub fn log_pass(&self, resources: usize, events: usize, dropped: usize, elapsed: Duration) {
        info!(
            event = "pass_completed",
            node = %self.node_name,
            resources = resources,
            events = events,
            dropped = dropped,
            elapsed_ms = elapsed.as_millis() as u64,
            "Collection pass completed"
        );
    }

    /// Log a skipped pass
    pub fn log_pass_skipped(&self, error: &anyhow::Error) {
        warn!(
            event = "pass_skipped",
            node = %self.node_name,
            error = format!("{error:#}"),
            "Collection pass skipped"
        );
    }

    /// Log agent shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "agent_shutdown",
            node = %self.node_name,
            reason = %reason,
            "Node metrics agent shutting down"
        );
    }
}
