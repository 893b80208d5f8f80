//! Hierarchy walk over a statistics snapshot

use super::compute::{cpu_metrics, memory_metrics, network_metrics, volume_metrics};
use super::rate::{CounterRateCache, RETENTION_FACTOR};
use super::resource::{container_resource, node_resource, pod_resource, volume_resource};
use super::{rate_metric_name, COUNTER_METRICS};
use crate::metadata::MetadataIndex;
use crate::models::{MetricGroup, MetricGroups, MetricMap, Metric, Resource, ResourceMetrics};
use crate::stats::{ContainerStats, NodeStats, PodStats, Summary, VolumeStats};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Source of the single logical timestamp of a collection pass
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Long-lived pipeline state: the rate cache and the pass clock
pub struct MetricsProcessor {
    rate_cache: CounterRateCache,
    clock: Arc<dyn Clock>,
}

impl MetricsProcessor {
    /// Create a processor whose counter rates expire after `expiration`
    pub fn new(expiration: Duration) -> Self {
        Self {
            rate_cache: CounterRateCache::new(expiration),
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the pass clock
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn rate_cache(&self) -> &CounterRateCache {
        &self.rate_cache
    }

    /// Rate of `metric` for `resource` since the previous pass
    pub fn get_counter_rate(&self, resource: &Resource, metric_name: &str, metric: &Metric) -> f64 {
        self.rate_cache.get_rate(resource, metric_name, metric)
    }

    /// Run one collection pass over `summary`
    pub fn generate_metrics_data(
        &self,
        summary: &Summary,
        metadata: &MetadataIndex,
        groups: &MetricGroups,
    ) -> Vec<ResourceMetrics> {
        let timestamp = self.clock.now();
        let mut acc = MetricDataAccumulator::new(metadata, groups, self);

        let node = node_resource(&summary.node, metadata, timestamp);
        acc.node_stats(&node, &summary.node);

        for pod_stats in &summary.pods {
            let pod = pod_resource(&node, pod_stats, metadata);
            acc.pod_stats(&pod, pod_stats);

            for container_stats in &pod_stats.containers {
                acc.container_stats(&pod, container_stats);
            }

            for volume_stats in &pod_stats.volume_stats {
                acc.volume_stats(&pod, volume_stats);
            }
        }

        self.evict_idle(timestamp);
        acc.data
    }

    /// Forget baselines unseen for `RETENTION_FACTOR` expiration windows
    ///
    /// A retention window reaching past the representable date range
    /// disables eviction.
    fn evict_idle(&self, now: DateTime<Utc>) {
        let cutoff = self
            .rate_cache
            .expiration()
            .checked_mul(RETENTION_FACTOR)
            .and_then(|retention| chrono::Duration::from_std(retention).ok())
            .and_then(|retention| now.checked_sub_signed(retention));

        let Some(cutoff) = cutoff else {
            return;
        };

        let evicted = self.rate_cache.evict_older_than(cutoff);
        if evicted > 0 {
            debug!(evicted, "Evicted idle counter baselines");
        }
    }
}

/// Collects the output of a single pass
pub struct MetricDataAccumulator<'a> {
    pub data: Vec<ResourceMetrics>,
    metadata: &'a MetadataIndex,
    groups: &'a MetricGroups,
    processor: &'a MetricsProcessor,
}

impl<'a> MetricDataAccumulator<'a> {
    pub fn new(
        metadata: &'a MetadataIndex,
        groups: &'a MetricGroups,
        processor: &'a MetricsProcessor,
    ) -> Self {
        Self {
            data: Vec::new(),
            metadata,
            groups,
            processor,
        }
    }

    pub fn node_stats(&mut self, node: &Resource, stats: &NodeStats) {
        if !self.groups.is_enabled(MetricGroup::Node) {
            return;
        }

        let (cpu_limit, memory_limit) = self
            .metadata
            .node_metadata_by_name(&node.name)
            .map_or((0.0, 0.0), |n| (n.cpu_capacity(), n.memory_capacity()));

        let mut metrics = cpu_metrics(stats.cpu.as_ref(), cpu_limit);
        metrics.extend(memory_metrics(stats.memory.as_ref(), memory_limit));
        metrics.extend(network_metrics(stats.network.as_ref()));

        self.push(node, metrics);
    }

    pub fn pod_stats(&mut self, pod: &Resource, stats: &PodStats) {
        if !self.groups.is_enabled(MetricGroup::Pod) {
            return;
        }

        let (cpu_limit, memory_limit) = self
            .metadata
            .pod_metadata_by_uid(&stats.pod_ref.uid)
            .map_or((0.0, 0.0), |p| (p.cpu_limit(), p.memory_limit()));

        let mut metrics = cpu_metrics(stats.cpu.as_ref(), cpu_limit);
        metrics.extend(memory_metrics(stats.memory.as_ref(), memory_limit));
        metrics.extend(network_metrics(stats.network.as_ref()));

        self.push(pod, metrics);
    }

    pub fn container_stats(&mut self, pod: &Resource, stats: &ContainerStats) {
        if !self.groups.is_enabled(MetricGroup::Container) {
            return;
        }

        let container = container_resource(pod, stats, self.metadata);
        let (cpu_limit, memory_limit) = self
            .metadata
            .pod_metadata_by_uid(&pod.id)
            .map_or((0.0, 0.0), |p| {
                (
                    p.cpu_limit_for_container(&stats.name),
                    p.memory_limit_for_container(&stats.name),
                )
            });

        let mut metrics = cpu_metrics(stats.cpu.as_ref(), cpu_limit);
        metrics.extend(memory_metrics(stats.memory.as_ref(), memory_limit));
        metrics.extend(network_metrics(stats.network.as_ref()));

        self.push(&container, metrics);
    }

    pub fn volume_stats(&mut self, pod: &Resource, stats: &VolumeStats) {
        if !self.groups.is_enabled(MetricGroup::Volume) {
            return;
        }

        let volume = volume_resource(pod, stats);
        self.push(&volume, volume_metrics(stats));
    }

    /// Append counter rates and record the resource
    fn push(&mut self, resource: &Resource, mut metrics: MetricMap) {
        let rates: Vec<(String, Metric)> = COUNTER_METRICS
            .iter()
            .filter_map(|&name| {
                let counter = metrics.get(name)?;
                let rate = self.processor.get_counter_rate(resource, name, counter);
                Some((rate_metric_name(name), Metric::Float(rate)))
            })
            .collect();
        metrics.extend(rates);

        self.data.push(ResourceMetrics {
            resource: resource.clone(),
            metrics,
        });
    }
}
