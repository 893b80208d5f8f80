//! Node metrics agent: configuration, HTTP API and event output

pub mod api;
pub mod config;
pub mod sink;
