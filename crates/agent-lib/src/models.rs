//! Core data models for the metrics pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Label set attached to a resource
pub type Labels = BTreeMap<String, String>;

/// Status fields attached to a resource
pub type Status = BTreeMap<String, StatusValue>;

/// Named metrics produced for a single resource
pub type MetricMap = BTreeMap<String, Metric>;

/// A single metric value
///
/// Counters and byte sizes are reported as integers; derived values
/// (cores, percentages, rates) are floats.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Metric {
    Float(f64),
    Int(u64),
}

impl Metric {
    /// Numeric value regardless of representation
    pub fn value(&self) -> f64 {
        match *self {
            Metric::Float(v) => v,
            Metric::Int(v) => v as f64,
        }
    }
}

/// A single status field value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum StatusValue {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl From<&str> for StatusValue {
    fn from(value: &str) -> Self {
        StatusValue::Str(value.to_string())
    }
}

impl From<String> for StatusValue {
    fn from(value: String) -> Self {
        StatusValue::Str(value)
    }
}

impl From<i64> for StatusValue {
    fn from(value: i64) -> Self {
        StatusValue::Int(value)
    }
}

impl From<bool> for StatusValue {
    fn from(value: bool) -> Self {
        StatusValue::Bool(value)
    }
}

/// Hierarchy level of a monitored entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricGroup {
    Node,
    Pod,
    Container,
    Volume,
}

impl MetricGroup {
    pub const ALL: [MetricGroup; 4] = [
        MetricGroup::Node,
        MetricGroup::Pod,
        MetricGroup::Container,
        MetricGroup::Volume,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricGroup::Node => "node",
            MetricGroup::Pod => "pod",
            MetricGroup::Container => "container",
            MetricGroup::Volume => "volume",
        }
    }
}

impl fmt::Display for MetricGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown metric group '{0}', expected one of node, pod, container, volume")]
pub struct MetricGroupError(pub String);

impl FromStr for MetricGroup {
    type Err = MetricGroupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "node" => Ok(MetricGroup::Node),
            "pod" => Ok(MetricGroup::Pod),
            "container" => Ok(MetricGroup::Container),
            "volume" => Ok(MetricGroup::Volume),
            _ => Err(MetricGroupError(s.to_string())),
        }
    }
}

/// Selects which hierarchy levels are visited in a collection pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricGroups(HashMap<MetricGroup, bool>);

impl MetricGroups {
    /// Every group enabled
    pub fn all() -> Self {
        MetricGroup::ALL.into_iter().collect()
    }

    /// Parse a list of group names, rejecting unknown names
    pub fn from_names<I, S>(names: I) -> Result<Self, MetricGroupError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names
            .into_iter()
            .map(|name| name.as_ref().parse::<MetricGroup>())
            .collect()
    }

    pub fn set(&mut self, group: MetricGroup, enabled: bool) {
        self.0.insert(group, enabled);
    }

    pub fn is_enabled(&self, group: MetricGroup) -> bool {
        self.0.get(&group).copied().unwrap_or(false)
    }

    /// Enabled groups in hierarchy order
    pub fn enabled(&self) -> Vec<MetricGroup> {
        MetricGroup::ALL
            .into_iter()
            .filter(|g| self.is_enabled(*g))
            .collect()
    }
}

impl FromIterator<MetricGroup> for MetricGroups {
    fn from_iter<T: IntoIterator<Item = MetricGroup>>(iter: T) -> Self {
        Self(iter.into_iter().map(|g| (g, true)).collect())
    }
}

impl From<HashMap<MetricGroup, bool>> for MetricGroups {
    fn from(map: HashMap<MetricGroup, bool>) -> Self {
        Self(map)
    }
}

/// One monitored entity in one collection pass
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resource {
    pub kind: MetricGroup,
    /// Identity used for counter rate tracking, unique per node
    pub id: String,
    pub name: String,
    pub labels: Labels,
    pub status: Status,
    pub timestamp: DateTime<Utc>,
}

/// A resource together with the metrics computed for it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceMetrics {
    pub resource: Resource,
    pub metrics: MetricMap,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_value_accessor() {
        assert_eq!(Metric::Float(1.25).value(), 1.25);
        assert_eq!(Metric::Int(42).value(), 42.0);
    }

    #[test]
    fn test_metric_serializes_as_number() {
        let json = serde_json::to_string(&vec![Metric::Int(7), Metric::Float(0.5)]).unwrap();
        assert_eq!(json, "[7,0.5]");
    }

    #[test]
    fn test_metric_group_parse() {
        assert_eq!("Pod".parse::<MetricGroup>(), Ok(MetricGroup::Pod));
        assert_eq!(" volume ".parse::<MetricGroup>(), Ok(MetricGroup::Volume));
        assert!("cluster".parse::<MetricGroup>().is_err());
    }

    #[test]
    fn test_metric_groups_from_names() {
        let groups = MetricGroups::from_names(["node", "container"]).unwrap();
        assert!(groups.is_enabled(MetricGroup::Node));
        assert!(groups.is_enabled(MetricGroup::Container));
        assert!(!groups.is_enabled(MetricGroup::Pod));
        assert_eq!(
            groups.enabled(),
            vec![MetricGroup::Node, MetricGroup::Container]
        );

        let err = MetricGroups::from_names(["node", "disk"]).unwrap_err();
        assert_eq!(err, MetricGroupError("disk".to_string()));
    }

    #[test]
    fn test_metric_groups_explicit_false() {
        let mut groups = MetricGroups::all();
        groups.set(MetricGroup::Volume, false);
        assert!(!groups.is_enabled(MetricGroup::Volume));
        assert_eq!(groups.enabled().len(), 3);
    }

    #[test]
    fn test_status_value_serialization() {
        let mut status = Status::new();
        status.insert("phase".into(), "Running".into());
        status.insert("ready".into(), true.into());
        status.insert("restart_count".into(), 3i64.into());
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"phase": "Running", "ready": true, "restart_count": 3})
        );
    }
}
