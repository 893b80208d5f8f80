//! Agent library for node-local Kubernetes metrics
//!
//! This crate provides the core functionality for:
//! - Reading kubelet statistics and pod/node metadata
//! - Turning a statistics snapshot into labeled, rate-adjusted resource metrics
//! - Building events and filtering them through processors
//! - Health checks and observability

pub mod collector;
pub mod event;
pub mod health;
pub mod metadata;
pub mod metrics;
pub mod models;
pub mod observability;
pub mod processors;
pub mod stats;

#[cfg(test)]
mod fixtures;

pub use event::Event;
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use metadata::MetadataIndex;
pub use metrics::MetricsProcessor;
pub use models::*;
pub use observability::{AgentMetrics, StructuredLogger};
