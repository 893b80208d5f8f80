//! Snapshot collection
//!
//! A [`SnapshotSource`] fetches the raw inputs of a pass (kubelet stats, pod
//! and node objects); the [`CollectionLoop`] drives the pipeline over them on
//! a fixed interval and forwards the resulting events.

mod kubelet;
mod r#loop;

pub use kubelet::{KubeletConfig, KubeletSource};
pub use r#loop::{CollectionConfig, CollectionLoop, CollectionLoopBuilder, PassReport};

use crate::stats::Summary;
use anyhow::Result;
use k8s_openapi::api::core::v1::{Node, Pod};

pub use async_trait::async_trait;

/// Provider of the raw inputs of a collection pass
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Fetch the node's statistics summary
    async fn stats_summary(&self) -> Result<Summary>;

    /// List pods scheduled on the node
    async fn pods(&self) -> Result<Vec<Pod>>;

    /// Fetch node objects; empty when node metadata is unavailable
    async fn nodes(&self) -> Result<Vec<Node>>;
}
