//! Metrics transformation pipeline
//!
//! Turns a kubelet statistics snapshot and a metadata index into a list of
//! labeled [`ResourceMetrics`](crate::models::ResourceMetrics), one per node,
//! pod, container and volume. Cumulative counters additionally get a
//! per-second rate derived from the previous pass.

mod accumulator;
mod compute;
mod rate;
mod resource;


pub use accumulator::{Clock, MetricDataAccumulator, MetricsProcessor, SystemClock};
pub use compute::{cpu_metrics, memory_metrics, network_metrics, volume_metrics};
pub use rate::{CounterRateCache, RETENTION_FACTOR};
pub use resource::{container_resource, node_resource, pod_resource, volume_resource};

pub const MEASURE_CPU_USAGE: &str = "cpu.usage";
pub const MEASURE_CPU_UTILIZATION: &str = "cpu.utilization";

pub const MEASURE_MEMORY_USAGE: &str = "memory.usage";
pub const MEASURE_MEMORY_RSS: &str = "memory.rss";
pub const MEASURE_MEMORY_PAGE_FAULTS: &str = "memory.page_faults";
pub const MEASURE_MEMORY_MAJOR_PAGE_FAULTS: &str = "memory.major_page_faults";
pub const MEASURE_MEMORY_WORKING_SET: &str = "memory.working_set";
pub const MEASURE_MEMORY_AVAILABLE: &str = "memory.available";
pub const MEASURE_MEMORY_UTILIZATION: &str = "memory.utilization";

pub const MEASURE_NETWORK_BYTES_RECEIVE: &str = "network.bytes.receive";
pub const MEASURE_NETWORK_BYTES_SEND: &str = "network.bytes.send";
pub const MEASURE_NETWORK_ERRORS_RECEIVE: &str = "network.errors.receive";
pub const MEASURE_NETWORK_ERRORS_SEND: &str = "network.errors.send";

pub const MEASURE_VOLUME_AVAILABLE: &str = "volume.available";
pub const MEASURE_VOLUME_CAPACITY: &str = "volume.capacity";
pub const MEASURE_VOLUME_USED: &str = "volume.used";
pub const MEASURE_VOLUME_INODES_TOTAL: &str = "volume.inodes.total";
pub const MEASURE_VOLUME_INODES_FREE: &str = "volume.inodes.free";
pub const MEASURE_VOLUME_INODES_USED: &str = "volume.inodes.used";

/// Cumulative counters that get a `<name>.rate` companion metric
pub const COUNTER_METRICS: &[&str] = &[
    MEASURE_NETWORK_BYTES_RECEIVE,
    MEASURE_NETWORK_BYTES_SEND,
    MEASURE_NETWORK_ERRORS_RECEIVE,
    MEASURE_NETWORK_ERRORS_SEND,
    MEASURE_MEMORY_PAGE_FAULTS,
    MEASURE_MEMORY_MAJOR_PAGE_FAULTS,
];

/// Suffix appended to a counter name for its rate metric
pub const RATE_SUFFIX: &str = ".rate";

/// Prefix applied to every cluster-native label key
pub const PREFIX_LABEL: &str = "label.";

/// Reserved, unprefixed label keys
pub const LABEL_NODE_NAME: &str = "node.name";
pub const LABEL_NAMESPACE_NAME: &str = "namespace";
pub const LABEL_POD_NAME: &str = "pod.name";
pub const LABEL_POD_UID: &str = "pod.uid";
pub const LABEL_CONTAINER_NAME: &str = "container.name";
pub const LABEL_VOLUME_NAME: &str = "volume.name";

/// Name of the rate metric derived from a counter
pub fn rate_metric_name(counter: &str) -> String {
    format!("{counter}{RATE_SUFFIX}")
}
