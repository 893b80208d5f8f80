//! Agent configuration
//!
//! Values come from an optional file layered under `AGENT_`-prefixed
//! environment variables. Everything is validated before the first pass.

use agent_lib::collector::{CollectionConfig, KubeletConfig};
use agent_lib::processors::{ProcessorChain, ProcessorConfig};
use agent_lib::MetricGroups;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_PREFIX: &str = "AGENT";
const SERVICE_ACCOUNT_TOKEN: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";

/// Longest accepted counter expiration (one day)
pub const MAX_COUNTER_EXPIRATION_SECS: u64 = 86_400;

/// Agent configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Node name from Kubernetes downward API
    #[serde(default = "default_node_name")]
    pub node_name: String,

    /// Kubelet base URL
    #[serde(default = "default_kubelet_endpoint")]
    pub kubelet_endpoint: String,

    /// Bearer token file for the kubelet; empty disables authentication
    #[serde(default = "default_kubelet_token_path")]
    pub kubelet_token_path: Option<PathBuf>,

    /// Accept the kubelet's self-signed serving certificate
    #[serde(default = "default_true")]
    pub kubelet_insecure_tls: bool,

    #[serde(default = "default_kubelet_timeout")]
    pub kubelet_timeout_secs: u64,

    /// Fetch node labels and capacity from the API server
    #[serde(default = "default_true")]
    pub node_metadata: bool,

    /// Metrics collection interval in seconds
    #[serde(default = "default_collection_interval")]
    pub collection_interval_secs: u64,

    /// Upper bound of the random delay added to each interval
    #[serde(default = "default_collection_jitter")]
    pub collection_jitter_ms: u64,

    /// Longest gap between two counter samples that still yields a rate
    #[serde(default = "default_counter_expiration")]
    pub counter_expiration_secs: u64,

    #[serde(default = "default_metric_groups")]
    pub metric_groups: Vec<String>,

    /// Pod label keys that are never emitted
    #[serde(default)]
    pub omit_labels: Vec<String>,

    #[serde(default = "default_true")]
    pub include_node_labels: bool,

    /// API server port for health/metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    #[serde(default)]
    pub processors: Vec<ProcessorConfig>,
}

fn default_node_name() -> String {
    std::env::var("NODE_NAME").unwrap_or_else(|_| "unknown".to_string())
}

fn default_kubelet_endpoint() -> String {
    let host = std::env::var("NODE_IP").unwrap_or_else(|_| "localhost".to_string());
    format!("https://{host}:10250")
}

fn default_kubelet_token_path() -> Option<PathBuf> {
    Some(PathBuf::from(SERVICE_ACCOUNT_TOKEN))
}

fn default_true() -> bool {
    true
}

fn default_kubelet_timeout() -> u64 {
    10
}

fn default_collection_interval() -> u64 {
    10
}

fn default_collection_jitter() -> u64 {
    1000
}

fn default_counter_expiration() -> u64 {
    60
}

fn default_metric_groups() -> Vec<String> {
    ["node", "pod", "container", "volume"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_api_port() -> u16 {
    8080
}

impl AgentConfig {
    /// Load configuration from the optional file and the process environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::from_sources(path, environment())
    }

    /// Load configuration from the optional file and the given environment source
    pub fn from_sources(path: Option<&Path>, env: config::Environment) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let config: Self = builder
            .add_source(env)
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Failed to parse configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the agent cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.node_name.trim().is_empty() {
            anyhow::bail!("node_name must not be empty");
        }
        if self.collection_interval_secs == 0 {
            anyhow::bail!("collection_interval_secs must be greater than zero");
        }
        if self.counter_expiration_secs == 0 {
            anyhow::bail!("counter_expiration_secs must be greater than zero");
        }
        if self.counter_expiration_secs > MAX_COUNTER_EXPIRATION_SECS {
            anyhow::bail!(
                "counter_expiration_secs ({}) exceeds the maximum of {}",
                self.counter_expiration_secs,
                MAX_COUNTER_EXPIRATION_SECS
            );
        }
        // consecutive passes can be apart by interval, jitter and a slow fetch
        let max_pass_gap = self.max_pass_gap();
        if self.counter_expiration() <= max_pass_gap {
            anyhow::bail!(
                "counter_expiration_secs ({}) must exceed collection interval plus jitter plus kubelet timeout ({}ms), no rate would ever be reported",
                self.counter_expiration_secs,
                max_pass_gap.as_millis()
            );
        }

        self.metric_groups()?;
        self.processor_chain()?;
        Ok(())
    }

    pub fn metric_groups(&self) -> Result<MetricGroups> {
        MetricGroups::from_names(&self.metric_groups).context("Invalid metric_groups")
    }

    pub fn processor_chain(&self) -> Result<ProcessorChain> {
        ProcessorChain::from_configs(&self.processors).context("Invalid processors")
    }

    pub fn counter_expiration(&self) -> Duration {
        Duration::from_secs(self.counter_expiration_secs)
    }

    /// Longest expected gap between the timestamps of two consecutive passes
    pub fn max_pass_gap(&self) -> Duration {
        Duration::from_secs(self.collection_interval_secs)
            .saturating_add(Duration::from_millis(self.collection_jitter_ms))
            .saturating_add(Duration::from_secs(self.kubelet_timeout_secs))
    }

    pub fn kubelet_config(&self) -> KubeletConfig {
        KubeletConfig {
            endpoint: self.kubelet_endpoint.clone(),
            token_path: self
                .kubelet_token_path
                .clone()
                .filter(|p| !p.as_os_str().is_empty()),
            insecure_tls: self.kubelet_insecure_tls,
            timeout: Duration::from_secs(self.kubelet_timeout_secs),
        }
    }

    pub fn collection_config(&self) -> Result<CollectionConfig> {
        Ok(CollectionConfig {
            node_name: self.node_name.clone(),
            interval: Duration::from_secs(self.collection_interval_secs),
            jitter: Duration::from_millis(self.collection_jitter_ms),
            metric_groups: self.metric_groups()?,
            omit_labels: self.omit_labels.clone(),
            include_node_labels: self.include_node_labels,
            ..CollectionConfig::default()
        })
    }
}

/// `AGENT_`-prefixed environment source; list values are comma separated
pub fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("metric_groups")
        .with_list_parse_key("omit_labels")
}
