//! Resource descriptors for each hierarchy level
//!
//! Label merge order is fixed: reserved keys first, then node labels (when
//! enabled), then the entity's own labels. Cluster-native keys are always
//! written under [`PREFIX_LABEL`], so they can never overwrite a reserved key;
//! a pod label sharing a key with a node label replaces it.

use super::{
    LABEL_CONTAINER_NAME, LABEL_NAMESPACE_NAME, LABEL_NODE_NAME, LABEL_POD_NAME, LABEL_POD_UID,
    LABEL_VOLUME_NAME, PREFIX_LABEL,
};
use crate::metadata::MetadataIndex;
use crate::models::{Labels, MetricGroup, Resource, Status};
use crate::stats::{ContainerStats, NodeStats, PodStats, VolumeStats};
use chrono::{DateTime, Utc};

fn insert_prefixed(labels: &mut Labels, source: &Labels) {
    for (key, value) in source {
        labels.insert(format!("{PREFIX_LABEL}{key}"), value.clone());
    }
}

fn node_labels(node_name: &str, metadata: &MetadataIndex) -> Labels {
    let mut labels = Labels::new();
    labels.insert(LABEL_NODE_NAME.to_string(), node_name.to_string());

    if metadata.include_node_labels() {
        if let Some(nmd) = metadata.node_metadata_by_name(node_name) {
            insert_prefixed(&mut labels, nmd.labels());
        }
    }

    labels
}

/// Build the node resource
pub fn node_resource(
    stats: &NodeStats,
    metadata: &MetadataIndex,
    timestamp: DateTime<Utc>,
) -> Resource {
    Resource {
        kind: MetricGroup::Node,
        id: stats.node_name.clone(),
        name: stats.node_name.clone(),
        labels: node_labels(&stats.node_name, metadata),
        status: Status::new(),
        timestamp,
    }
}

/// Build a pod resource that inherits the owning node's labels
pub fn pod_resource(node: &Resource, stats: &PodStats, metadata: &MetadataIndex) -> Resource {
    let pod_ref = &stats.pod_ref;
    let pmd = metadata.pod_metadata_by_uid(&pod_ref.uid);

    let mut labels = node_labels(&node.name, metadata);
    labels.insert(LABEL_NAMESPACE_NAME.to_string(), pod_ref.namespace.clone());
    labels.insert(LABEL_POD_NAME.to_string(), pod_ref.name.clone());
    labels.insert(LABEL_POD_UID.to_string(), pod_ref.uid.clone());
    if let Some(pmd) = pmd {
        insert_prefixed(&mut labels, pmd.labels());
    }

    Resource {
        kind: MetricGroup::Pod,
        id: pod_ref.uid.clone(),
        name: pod_ref.name.clone(),
        labels,
        status: pmd.map(|p| p.status().clone()).unwrap_or_default(),
        timestamp: node.timestamp,
    }
}

/// Build a container resource from its pod
pub fn container_resource(
    pod: &Resource,
    stats: &ContainerStats,
    metadata: &MetadataIndex,
) -> Resource {
    let mut labels = pod.labels.clone();
    labels.insert(LABEL_CONTAINER_NAME.to_string(), stats.name.clone());

    let mut status = pod.status.clone();
    if let Some(pmd) = metadata.pod_metadata_by_uid(&pod.id) {
        status.extend(pmd.status_for_container(&stats.name));
    }

    Resource {
        kind: MetricGroup::Container,
        id: format!("{}/{}", pod.id, stats.name),
        name: stats.name.clone(),
        labels,
        status,
        timestamp: pod.timestamp,
    }
}

/// Build a volume resource from its pod
pub fn volume_resource(pod: &Resource, stats: &VolumeStats) -> Resource {
    let mut labels = pod.labels.clone();
    labels.insert(LABEL_VOLUME_NAME.to_string(), stats.name.clone());

    Resource {
        kind: MetricGroup::Volume,
        id: format!("{}/{}", pod.id, stats.name),
        name: stats.name.clone(),
        labels,
        status: Status::new(),
        timestamp: pod.timestamp,
    }
}
