//! Kubelet-backed snapshot source

use super::SnapshotSource;
use crate::stats::Summary;
use anyhow::{Context, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Node, Pod};
use kube::Api;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

const STATS_SUMMARY_PATH: &str = "stats/summary";
const PODS_PATH: &str = "pods";

/// Connection settings for the node's kubelet
#[derive(Debug, Clone)]
pub struct KubeletConfig {
    /// Base URL, e.g. `https://10.0.0.5:10250`
    pub endpoint: String,
    /// Service account token sent as a bearer token, re-read on every request
    pub token_path: Option<PathBuf>,
    /// Accept the kubelet's self-signed serving certificate
    pub insecure_tls: bool,
    pub timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct PodList {
    #[serde(default)]
    items: Vec<Pod>,
}

/// Reads stats and pods from the kubelet, and the node object from the API server
pub struct KubeletSource {
    client: Client,
    base_url: Url,
    token_path: Option<PathBuf>,
    node_name: String,
    nodes: Option<Api<Node>>,
}

impl KubeletSource {
    pub fn new(config: &KubeletConfig, node_name: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.insecure_tls)
            .build()
            .context("Failed to create kubelet HTTP client")?;

        // Url::join drops the last path segment unless the base ends with '/'
        let mut endpoint = config.endpoint.clone();
        if !endpoint.ends_with('/') {
            endpoint.push('/');
        }
        let base_url = Url::parse(&endpoint).context("Invalid kubelet endpoint")?;

        Ok(Self {
            client,
            base_url,
            token_path: config.token_path.clone(),
            node_name: node_name.into(),
            nodes: None,
        })
    }

    /// Fetch node labels and allocatable resources through the API server
    pub fn with_node_api(mut self, client: kube::Client) -> Self {
        self.nodes = Some(Api::all(client));
        self
    }

    async fn token(&self) -> Result<Option<String>> {
        let Some(path) = &self.token_path else {
            return Ok(None);
        };

        match tokio::fs::read_to_string(path).await {
            Ok(token) => Ok(Some(token.trim().to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No service account token, sending unauthenticated");
                Ok(None)
            }
            Err(e) => {
                Err(e).with_context(|| format!("Failed to read token from {}", path.display()))
            }
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid kubelet path")?;

        let mut request = self.client.get(url.clone());
        if let Some(token) = self.token().await? {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to send request to {url}"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Kubelet error ({}) for {}: {}", status, url, body);
        }

        response
            .json()
            .await
            .with_context(|| format!("Failed to parse response from {url}"))
    }
}

#[async_trait]
impl SnapshotSource for KubeletSource {
    async fn stats_summary(&self) -> Result<Summary> {
        self.get(STATS_SUMMARY_PATH).await
    }

    async fn pods(&self) -> Result<Vec<Pod>> {
        let list: PodList = self.get(PODS_PATH).await?;
        Ok(list.items)
    }

    async fn nodes(&self) -> Result<Vec<Node>> {
        let Some(api) = &self.nodes else {
            return Ok(Vec::new());
        };

        let node = api
            .get(&self.node_name)
            .await
            .with_context(|| format!("Failed to fetch node {}", self.node_name))?;
        Ok(vec![node])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn config(endpoint: String, token_path: Option<PathBuf>) -> KubeletConfig {
        KubeletConfig {
            endpoint,
            token_path,
            insecure_tls: false,
            timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_stats_summary() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/stats/summary")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"node": {"nodeName": "worker-1", "cpu": {"usageNanoCores": 1000}}, "pods": []}"#,
            )
            .create_async()
            .await;

        let source = KubeletSource::new(&config(server.url(), None), "worker-1").unwrap();
        let summary = source.stats_summary().await.unwrap();

        assert_eq!(summary.node.node_name, "worker-1");
        assert_eq!(summary.node.cpu.unwrap().usage_nano_cores, Some(1000));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_pods_with_bearer_token() {
        let mut token_file = tempfile::NamedTempFile::new().unwrap();
        writeln!(token_file, "secret-token").unwrap();

        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/pods")
            .match_header("authorization", "Bearer secret-token")
            .with_status(200)
            .with_body(
                r#"{"kind": "PodList", "apiVersion": "v1", "items": [
                    {"metadata": {"name": "web-0", "namespace": "default", "uid": "u1"}}
                ]}"#,
            )
            .create_async()
            .await;

        let source =
            KubeletSource::new(&config(server.url(), Some(token_file.path().into())), "worker-1")
                .unwrap();
        let pods = source.pods().await.unwrap();

        assert_eq!(pods.len(), 1);
        assert_eq!(pods[0].metadata.uid.as_deref(), Some("u1"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/stats/summary")
            .with_status(401)
            .with_body("Unauthorized")
            .create_async()
            .await;

        let source = KubeletSource::new(&config(server.url(), None), "worker-1").unwrap();
        let err = source.stats_summary().await.unwrap_err();
        assert!(err.to_string().contains("401"));
    }

    #[tokio::test]
    async fn test_missing_token_file_is_unauthenticated() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/pods")
            .with_status(200)
            .with_body(r#"{"items": []}"#)
            .create_async()
            .await;

        let missing = PathBuf::from("/nonexistent/serviceaccount/token");
        let source = KubeletSource::new(&config(server.url(), Some(missing)), "worker-1").unwrap();
        assert!(source.pods().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_nodes_without_api_client() {
        let source =
            KubeletSource::new(&config("http://127.0.0.1:1".into(), None), "worker-1").unwrap();
        assert!(source.nodes().await.unwrap().is_empty());
    }

    #[test]
    fn test_endpoint_with_path_prefix() {
        let source = KubeletSource::new(
            &config("http://apiserver/api/v1/nodes/worker-1/proxy".into(), None),
            "worker-1",
        )
        .unwrap();
        assert_eq!(
            source.base_url.join(STATS_SUMMARY_PATH).unwrap().as_str(),
            "http://apiserver/api/v1/nodes/worker-1/proxy/stats/summary"
        );
    }
}
