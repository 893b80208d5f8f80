//! Post-processing of built events before export
//!
//! Processors are configured once at startup; any configuration problem is
//! reported before the first collection pass runs.

mod drop_event;

pub use drop_event::EventDropper;

use crate::event::Event;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("drop_event processor requires a 'field' to be set")]
    FieldUnspecified,

    #[error("invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid options for processor '{processor}': {source}")]
    InvalidOptions {
        processor: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unknown processor type '{0}'")]
    UnknownProcessor(String),
}

/// A filter or transform applied to every event
pub trait Processor: Send + Sync {
    fn name(&self) -> &'static str;

    /// Returns `false` when the event should be dropped
    fn process(&self, event: &mut Event) -> bool;
}

/// Processor entry as it appears in configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProcessorConfig {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub options: serde_json::Value,
}

/// Build a processor from its configuration entry
pub fn build_processor(config: &ProcessorConfig) -> Result<Box<dyn Processor>, ProcessorError> {
    match config.kind.as_str() {
        EventDropper::NAME => Ok(Box::new(EventDropper::from_options(&config.options)?)),
        other => Err(ProcessorError::UnknownProcessor(other.to_string())),
    }
}

/// Ordered list of processors applied to each event
#[derive(Default)]
pub struct ProcessorChain {
    processors: Vec<Box<dyn Processor>>,
}

impl ProcessorChain {
    pub fn new(processors: Vec<Box<dyn Processor>>) -> Self {
        Self { processors }
    }

    pub fn from_configs(configs: &[ProcessorConfig]) -> Result<Self, ProcessorError> {
        let processors = configs
            .iter()
            .map(build_processor)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(processors))
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// Run every processor; stops at the first one that drops the event
    pub fn process(&self, event: &mut Event) -> bool {
        self.processors.iter().all(|p| p.process(event))
    }

    /// Apply the chain to a batch, returning the kept events and the drop count
    pub fn apply(&self, events: Vec<Event>) -> (Vec<Event>, usize) {
        let total = events.len();
        let kept: Vec<Event> = events
            .into_iter()
            .filter_map(|mut event| self.process(&mut event).then_some(event))
            .collect();
        let dropped = total - kept.len();
        (kept, dropped)
    }
}
