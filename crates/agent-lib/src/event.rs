//! Flat event records built from resource metrics
//!
//! Each [`ResourceMetrics`] becomes one event whose data is a flat map:
//! labels keep their keys, status fields go under `status.`, metrics under
//! `metrics.`. Processors and the exporter only ever see this shape.

use crate::models::ResourceMetrics;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

pub const FIELD_RESOURCE_TYPE: &str = "metrics.resource.type";
pub const FIELD_RESOURCE_NAME: &str = "metrics.resource.name";
pub const PREFIX_STATUS: &str = "status.";
pub const PREFIX_METRICS: &str = "metrics.";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub timestamp: DateTime<Utc>,
    pub data: Map<String, Value>,
}

impl Event {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.data.get(field)
    }
}

impl From<&ResourceMetrics> for Event {
    fn from(rm: &ResourceMetrics) -> Self {
        let resource = &rm.resource;
        let mut data = Map::new();

        data.insert(
            FIELD_RESOURCE_TYPE.to_string(),
            Value::from(resource.kind.as_str()),
        );
        data.insert(
            FIELD_RESOURCE_NAME.to_string(),
            Value::from(resource.name.clone()),
        );

        for (key, value) in &resource.labels {
            data.insert(key.clone(), Value::from(value.clone()));
        }

        for (key, value) in &resource.status {
            let value = serde_json::to_value(value).unwrap_or(Value::Null);
            data.insert(format!("{PREFIX_STATUS}{key}"), value);
        }

        for (name, metric) in &rm.metrics {
            let value = serde_json::to_value(metric).unwrap_or(Value::Null);
            data.insert(format!("{PREFIX_METRICS}{name}"), value);
        }

        Self {
            timestamp: resource.timestamp,
            data,
        }
    }
}
