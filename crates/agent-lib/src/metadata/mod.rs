//! Cluster metadata index
//!
//! Flattens pod and node objects into two read-only lookup tables, keyed by
//! pod UID and node name. Labels are filtered against the omit list once,
//! here, so omitted keys can never reach a resource downstream.

mod quantity;


pub use quantity::{parse_quantity, QuantityError};

use crate::models::{Labels, Status, StatusValue};
use k8s_openapi::api::core::v1::{ContainerStatus, Node, Pod, PodStatus};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

/// Pod status keys
pub const STATUS_PHASE: &str = "phase";
pub const STATUS_READY: &str = "ready";
pub const STATUS_RESTART_COUNT: &str = "restart_count";
pub const STATUS_QOS_CLASS: &str = "qos_class";
/// Container status keys (ready and restart count are shared with pods)
pub const STATUS_STATE: &str = "state";

const RESOURCE_CPU: &str = "cpu";
const RESOURCE_MEMORY: &str = "memory";

/// A metadata label key excluded from all output
pub type OmitLabel = String;

/// Limits and status for one container of a pod
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContainerMetadata {
    /// CPU limit in cores, 0 when unset
    pub cpu_limit: f64,
    /// Memory limit in bytes, 0 when unset
    pub memory_limit: f64,
    pub status: Status,
}

/// Flattened view of a pod object
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PodMetadata {
    name: String,
    namespace: String,
    uid: String,
    labels: Labels,
    status: Status,
    containers: BTreeMap<String, ContainerMetadata>,
}

impl PodMetadata {
    fn from_pod(pod: &Pod, omit: &HashSet<&str>) -> Self {
        let meta = &pod.metadata;

        let mut containers: BTreeMap<String, ContainerMetadata> = BTreeMap::new();
        if let Some(spec) = &pod.spec {
            for container in &spec.containers {
                let limits = container
                    .resources
                    .as_ref()
                    .and_then(|r| r.limits.as_ref());
                containers.insert(
                    container.name.clone(),
                    ContainerMetadata {
                        cpu_limit: limit_value(limits, RESOURCE_CPU),
                        memory_limit: limit_value(limits, RESOURCE_MEMORY),
                        status: Status::new(),
                    },
                );
            }
        }

        let pod_status = pod.status.as_ref();
        for cs in pod_status
            .and_then(|s| s.container_statuses.as_ref())
            .into_iter()
            .flatten()
        {
            containers.entry(cs.name.clone()).or_default().status = container_status(cs);
        }

        Self {
            name: meta.name.clone().unwrap_or_default(),
            namespace: meta.namespace.clone().unwrap_or_default(),
            uid: meta.uid.clone().unwrap_or_default(),
            labels: filter_labels(meta.labels.as_ref(), omit),
            status: pod_status.map(pod_status_fields).unwrap_or_default(),
            containers,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    /// Filtered, unprefixed pod labels
    pub fn labels(&self) -> &Labels {
        &self.labels
    }

    /// Sum of container CPU limits in cores, 0 when no container sets one
    pub fn cpu_limit(&self) -> f64 {
        self.containers.values().map(|c| c.cpu_limit).sum()
    }

    /// Sum of container memory limits in bytes, 0 when no container sets one
    pub fn memory_limit(&self) -> f64 {
        self.containers.values().map(|c| c.memory_limit).sum()
    }

    pub fn cpu_limit_for_container(&self, name: &str) -> f64 {
        self.containers.get(name).map_or(0.0, |c| c.cpu_limit)
    }

    pub fn memory_limit_for_container(&self, name: &str) -> f64 {
        self.containers.get(name).map_or(0.0, |c| c.memory_limit)
    }

    /// Pod-level status fields
    pub fn status(&self) -> &Status {
        &self.status
    }

    /// Container-level status fields, empty for an unknown container
    pub fn status_for_container(&self, name: &str) -> Status {
        self.containers
            .get(name)
            .map(|c| c.status.clone())
            .unwrap_or_default()
    }
}

/// Flattened view of a node object
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeMetadata {
    name: String,
    labels: Labels,
    cpu_capacity: f64,
    memory_capacity: f64,
}

impl NodeMetadata {
    fn from_node(node: &Node, omit: &HashSet<&str>) -> Self {
        let allocatable = node.status.as_ref().and_then(|s| s.allocatable.as_ref());

        Self {
            name: node.metadata.name.clone().unwrap_or_default(),
            labels: filter_labels(node.metadata.labels.as_ref(), omit),
            cpu_capacity: limit_value(allocatable, RESOURCE_CPU),
            memory_capacity: limit_value(allocatable, RESOURCE_MEMORY),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Filtered, unprefixed node labels
    pub fn labels(&self) -> &Labels {
        &self.labels
    }

    /// Allocatable CPU in cores, 0 when unreported
    pub fn cpu_capacity(&self) -> f64 {
        self.cpu_capacity
    }

    /// Allocatable memory in bytes, 0 when unreported
    pub fn memory_capacity(&self) -> f64 {
        self.memory_capacity
    }
}

/// Read-only lookup tables for one metadata refresh
#[derive(Debug, Clone, Default)]
pub struct MetadataIndex {
    pods: HashMap<String, PodMetadata>,
    nodes: HashMap<String, NodeMetadata>,
    include_node_labels: bool,
}

impl MetadataIndex {
    pub fn new(
        pods: &[Pod],
        nodes: &[Node],
        omit_labels: &[OmitLabel],
        include_node_labels: bool,
    ) -> Self {
        let omit: HashSet<&str> = omit_labels.iter().map(String::as_str).collect();

        let pods: HashMap<String, PodMetadata> = pods
            .iter()
            .map(|pod| PodMetadata::from_pod(pod, &omit))
            .filter(|pm| !pm.uid.is_empty())
            .map(|pm| (pm.uid.clone(), pm))
            .collect();

        let nodes: HashMap<String, NodeMetadata> = nodes
            .iter()
            .map(|node| NodeMetadata::from_node(node, &omit))
            .filter(|nm| !nm.name.is_empty())
            .map(|nm| (nm.name.clone(), nm))
            .collect();

        debug!(
            pods = pods.len(),
            nodes = nodes.len(),
            omitted_keys = omit.len(),
            "Built metadata index"
        );

        Self {
            pods,
            nodes,
            include_node_labels,
        }
    }

    pub fn pod_metadata_by_uid(&self, uid: &str) -> Option<&PodMetadata> {
        self.pods.get(uid)
    }

    pub fn node_metadata_by_name(&self, name: &str) -> Option<&NodeMetadata> {
        self.nodes.get(name)
    }

    pub fn include_node_labels(&self) -> bool {
        self.include_node_labels
    }

    pub fn pod_count(&self) -> usize {
        self.pods.len()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

fn filter_labels(labels: Option<&BTreeMap<String, String>>, omit: &HashSet<&str>) -> Labels {
    labels
        .into_iter()
        .flatten()
        .filter(|(k, _)| !omit.contains(k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn limit_value(limits: Option<&BTreeMap<String, Quantity>>, resource: &str) -> f64 {
    let Some(quantity) = limits.and_then(|l| l.get(resource)) else {
        return 0.0;
    };

    match parse_quantity(&quantity.0) {
        Ok(value) => value,
        Err(e) => {
            debug!(resource, quantity = %quantity.0, error = %e, "Ignoring unparseable limit");
            0.0
        }
    }
}

fn pod_status_fields(status: &PodStatus) -> Status {
    let mut fields = Status::new();

    if let Some(phase) = &status.phase {
        fields.insert(STATUS_PHASE.to_string(), phase.as_str().into());
    }

    let ready = status
        .conditions
        .iter()
        .flatten()
        .any(|c| c.type_ == "Ready" && c.status == "True");
    fields.insert(STATUS_READY.to_string(), ready.into());

    let restarts: i64 = status
        .container_statuses
        .iter()
        .flatten()
        .map(|cs| i64::from(cs.restart_count))
        .sum();
    fields.insert(STATUS_RESTART_COUNT.to_string(), restarts.into());

    if let Some(qos) = &status.qos_class {
        fields.insert(STATUS_QOS_CLASS.to_string(), qos.as_str().into());
    }

    fields
}

fn container_status(cs: &ContainerStatus) -> Status {
    let mut fields = Status::new();
    fields.insert(
        STATUS_RESTART_COUNT.to_string(),
        StatusValue::Int(i64::from(cs.restart_count)),
    );
    fields.insert(STATUS_READY.to_string(), StatusValue::Bool(cs.ready));

    let state = cs.state.as_ref().and_then(|s| {
        if s.running.is_some() {
            Some("running")
        } else if s.waiting.is_some() {
            Some("waiting")
        } else if s.terminated.is_some() {
            Some("terminated")
        } else {
            None
        }
    });
    if let Some(state) = state {
        fields.insert(STATUS_STATE.to_string(), state.into());
    }

    fields
}
