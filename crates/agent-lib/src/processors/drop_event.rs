//! Drops events whose field matches one of a set of patterns

use super::{Processor, ProcessorError};
use crate::event::Event;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Default, Deserialize)]
struct DropEventOptions {
    #[serde(default)]
    field: String,
    #[serde(default)]
    values: Vec<String>,
}

/// Drops an event when `field` is a string fully matching any pattern
#[derive(Debug)]
pub struct EventDropper {
    field: String,
    patterns: Vec<Regex>,
}

impl EventDropper {
    pub const NAME: &'static str = "drop_event";

    pub fn new<S: AsRef<str>>(field: &str, values: &[S]) -> Result<Self, ProcessorError> {
        if field.is_empty() {
            return Err(ProcessorError::FieldUnspecified);
        }

        let patterns = values
            .iter()
            .map(|value| {
                let value = value.as_ref();
                Regex::new(&format!("^(?:{value})$")).map_err(|source| {
                    ProcessorError::InvalidPattern {
                        pattern: value.to_string(),
                        source,
                    }
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            field: field.to_string(),
            patterns,
        })
    }

    /// Build from the `options` object of a processor config entry
    pub fn from_options(options: &Value) -> Result<Self, ProcessorError> {
        let options: DropEventOptions = if options.is_null() {
            DropEventOptions::default()
        } else {
            serde_json::from_value(options.clone()).map_err(|source| {
                ProcessorError::InvalidOptions {
                    processor: Self::NAME.to_string(),
                    source,
                }
            })?
        };

        Self::new(&options.field, &options.values)
    }
}

impl Processor for EventDropper {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn process(&self, event: &mut Event) -> bool {
        let Some(value) = event.get(&self.field) else {
            return true;
        };

        let Some(value) = value.as_str() else {
            debug!(
                key = %self.field,
                value = %value,
                "Not filtering field of non-string type"
            );
            return true;
        };

        !self.patterns.iter().any(|re| re.is_match(value))
    }
}
