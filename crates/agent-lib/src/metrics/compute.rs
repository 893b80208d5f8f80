//! Pure conversions from kubelet stats to named metrics

use super::*;
use crate::models::{Metric, MetricMap};
use crate::stats::{CpuStats, MemoryStats, NetworkStats, VolumeStats};

const NANOCORES_PER_CORE: f64 = 1e9;

fn int(value: Option<u64>) -> Metric {
    Metric::Int(value.unwrap_or(0))
}

/// CPU usage in cores, plus utilization when a limit is known
///
/// Returns an empty map when the kubelet reported no usage sample.
pub fn cpu_metrics(stats: Option<&CpuStats>, limit_cores: f64) -> MetricMap {
    let mut metrics = MetricMap::new();

    let Some(nano_cores) = stats.and_then(|s| s.usage_nano_cores) else {
        return metrics;
    };

    let usage = nano_cores as f64 / NANOCORES_PER_CORE;
    metrics.insert(MEASURE_CPU_USAGE.to_string(), Metric::Float(usage));

    if limit_cores > 0.0 {
        metrics.insert(
            MEASURE_CPU_UTILIZATION.to_string(),
            Metric::Float(usage / limit_cores * 100.0),
        );
    }

    metrics
}

/// Memory gauges and fault counters, plus utilization when a limit is known
///
/// Utilization is working set over limit, or usage over limit when no
/// working set was sampled.
pub fn memory_metrics(stats: Option<&MemoryStats>, limit_bytes: f64) -> MetricMap {
    let mut metrics = MetricMap::new();

    let Some(stats) = stats else {
        return metrics;
    };

    metrics.insert(MEASURE_MEMORY_USAGE.to_string(), int(stats.usage_bytes));
    metrics.insert(MEASURE_MEMORY_RSS.to_string(), int(stats.rss_bytes));
    metrics.insert(MEASURE_MEMORY_PAGE_FAULTS.to_string(), int(stats.page_faults));
    metrics.insert(
        MEASURE_MEMORY_MAJOR_PAGE_FAULTS.to_string(),
        int(stats.major_page_faults),
    );
    metrics.insert(
        MEASURE_MEMORY_WORKING_SET.to_string(),
        int(stats.working_set_bytes),
    );
    metrics.insert(
        MEASURE_MEMORY_AVAILABLE.to_string(),
        int(stats.available_bytes),
    );

    if limit_bytes > 0.0 {
        let used = stats
            .working_set_bytes
            .or(stats.usage_bytes)
            .unwrap_or(0) as f64;
        metrics.insert(
            MEASURE_MEMORY_UTILIZATION.to_string(),
            Metric::Float(used / limit_bytes * 100.0),
        );
    }

    metrics
}

/// Raw cumulative network counters; rates are derived downstream
pub fn network_metrics(stats: Option<&NetworkStats>) -> MetricMap {
    let mut metrics = MetricMap::new();

    let Some(stats) = stats else {
        return metrics;
    };

    metrics.insert(MEASURE_NETWORK_BYTES_RECEIVE.to_string(), int(stats.rx_bytes));
    metrics.insert(MEASURE_NETWORK_BYTES_SEND.to_string(), int(stats.tx_bytes));
    metrics.insert(MEASURE_NETWORK_ERRORS_RECEIVE.to_string(), int(stats.rx_errors));
    metrics.insert(MEASURE_NETWORK_ERRORS_SEND.to_string(), int(stats.tx_errors));

    metrics
}

pub fn volume_metrics(stats: &VolumeStats) -> MetricMap {
    MetricMap::from([
        (MEASURE_VOLUME_AVAILABLE.to_string(), int(stats.available_bytes)),
        (MEASURE_VOLUME_CAPACITY.to_string(), int(stats.capacity_bytes)),
        (MEASURE_VOLUME_USED.to_string(), int(stats.used_bytes)),
        (MEASURE_VOLUME_INODES_TOTAL.to_string(), int(stats.inodes)),
        (MEASURE_VOLUME_INODES_FREE.to_string(), int(stats.inodes_free)),
        (MEASURE_VOLUME_INODES_USED.to_string(), int(stats.inodes_used)),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn test_cpu_metrics() {
        let summary = fixtures::summary();
        let metrics = cpu_metrics(summary.pods[0].cpu.as_ref(), 0.2);

        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics[MEASURE_CPU_USAGE].value(), 0.00791918);
        assert!((metrics[MEASURE_CPU_UTILIZATION].value() - 3.95959).abs() < 1e-6);
    }

    #[test]
    fn test_cpu_metrics_without_limit() {
        let summary = fixtures::summary();
        let metrics = cpu_metrics(summary.pods[0].cpu.as_ref(), 0.0);

        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[MEASURE_CPU_USAGE].value(), 0.00791918);
        assert!(!metrics.contains_key(MEASURE_CPU_UTILIZATION));
    }

    #[test]
    fn test_cpu_metrics_optional() {
        let summary = fixtures::summary();
        assert!(cpu_metrics(summary.pods[1].cpu.as_ref(), 0.5).is_empty());

        let no_usage = CpuStats {
            usage_core_nano_seconds: Some(10),
            ..Default::default()
        };
        assert!(cpu_metrics(Some(&no_usage), 0.5).is_empty());
    }

    #[test]
    fn test_cpu_utilization_matches_ratio() {
        for (nano_cores, limit) in [(1_000_000_000u64, 2.0), (250_000_000, 0.5), (1, 4.0)] {
            let stats = CpuStats {
                usage_nano_cores: Some(nano_cores),
                ..Default::default()
            };
            let metrics = cpu_metrics(Some(&stats), limit);
            let expected = nano_cores as f64 / 1e9 / limit * 100.0;
            assert!((metrics[MEASURE_CPU_UTILIZATION].value() - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn test_memory_metrics() {
        let summary = fixtures::summary();
        let metrics = memory_metrics(summary.pods[0].memory.as_ref(), 2147483648.0);

        assert_eq!(metrics.len(), 7);
        assert_eq!(metrics[MEASURE_MEMORY_USAGE], Metric::Int(2143281152));
        assert_eq!(metrics[MEASURE_MEMORY_RSS].value(), 23191552.0);
        assert!((metrics[MEASURE_MEMORY_UTILIZATION].value() - 97.79205322265625).abs() < 1e-4);
    }

    #[test]
    fn test_memory_metrics_without_limit() {
        let summary = fixtures::summary();
        let metrics = memory_metrics(summary.pods[0].memory.as_ref(), 0.0);

        assert_eq!(metrics.len(), 6);
        assert!(!metrics.contains_key(MEASURE_MEMORY_UTILIZATION));
    }

    #[test]
    fn test_memory_utilization_falls_back_to_usage() {
        let stats = MemoryStats {
            usage_bytes: Some(512),
            ..Default::default()
        };
        let metrics = memory_metrics(Some(&stats), 1024.0);

        assert_eq!(metrics[MEASURE_MEMORY_UTILIZATION].value(), 50.0);
        assert_eq!(metrics[MEASURE_MEMORY_WORKING_SET], Metric::Int(0));
    }

    #[test]
    fn test_memory_metrics_optional() {
        assert!(memory_metrics(None, 1024.0).is_empty());
    }

    #[test]
    fn test_network_metrics() {
        let summary = fixtures::summary();
        let metrics = network_metrics(summary.pods[0].network.as_ref());

        assert_eq!(metrics.len(), 4);
        assert_eq!(metrics[MEASURE_NETWORK_BYTES_RECEIVE].value(), 150353577.0);
        assert_eq!(metrics[MEASURE_NETWORK_ERRORS_RECEIVE].value(), 0.0);
        assert!(network_metrics(None).is_empty());
    }

    #[test]
    fn test_volume_metrics() {
        let summary = fixtures::summary();
        let metrics = volume_metrics(&summary.pods[0].volume_stats[0]);

        assert_eq!(metrics.len(), 6);
        assert_eq!(metrics[MEASURE_VOLUME_AVAILABLE].value(), 4182040576.0);
        assert_eq!(metrics[MEASURE_VOLUME_USED].value(), 12288.0);
        assert_eq!(metrics[MEASURE_VOLUME_INODES_TOTAL].value(), 1021009.0);
    }

    #[test]
    fn test_volume_metrics_missing_fields_are_zero() {
        let stats = VolumeStats {
            name: "empty".into(),
            ..Default::default()
        };
        let metrics = volume_metrics(&stats);
        assert_eq!(metrics.len(), 6);
        assert!(metrics.values().all(|m| m.value() == 0.0));
    }
}
