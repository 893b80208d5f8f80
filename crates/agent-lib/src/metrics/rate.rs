//! Counter-to-rate conversion
//!
//! Keeps the previous observation of every `(resource id, metric)` pair and
//! turns the next one into a per-second rate. A sample is stale when the gap
//! since the previous observation is non-positive or longer than the
//! expiration window; stale samples yield 0 but still become the new baseline.

use crate::models::{Metric, Resource};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::time::Duration;
use tracing::trace;

/// Entries unseen for this many expiration windows are evicted
pub const RETENTION_FACTOR: u32 = 10;

#[derive(Debug, Clone, Copy)]
struct Observation {
    value: f64,
    timestamp: DateTime<Utc>,
}

/// Thread-safe store of the last counter observation per resource
///
/// Each update runs under the map's entry lock, so concurrent passes
/// sharing one cache never interleave on the same key.
#[derive(Debug)]
pub struct CounterRateCache {
    entries: DashMap<(String, String), Observation>,
    expiration: Duration,
}

impl CounterRateCache {
    pub fn new(expiration: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            expiration,
        }
    }

    pub fn expiration(&self) -> Duration {
        self.expiration
    }

    /// Per-second rate of `metric` since the previous observation
    pub fn get_rate(&self, resource: &Resource, metric_name: &str, metric: &Metric) -> f64 {
        let current = Observation {
            value: metric.value(),
            timestamp: resource.timestamp,
        };

        let mut entry = self
            .entries
            .entry((resource.id.clone(), metric_name.to_string()))
            .or_insert(current);

        let previous = *entry;
        *entry = current;
        drop(entry);

        let elapsed = match (current.timestamp - previous.timestamp).to_std() {
            Ok(elapsed) if !elapsed.is_zero() => elapsed,
            // first observation, or clock went backwards
            _ => return 0.0,
        };

        if elapsed > self.expiration {
            trace!(
                resource = %resource.id,
                metric = metric_name,
                elapsed_ms = elapsed.as_millis() as u64,
                "Counter sample expired, resetting baseline"
            );
            return 0.0;
        }

        (current.value - previous.value) / elapsed.as_secs_f64()
    }

    /// Drop entries last observed before `cutoff`, returning how many went
    pub fn evict_older_than(&self, cutoff: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, obs| obs.timestamp >= cutoff);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
