use chrono::{DateTime, Utc};
use podlog_config::PodlogConfig;
use podlog_core::{LogSource, PodListing, PodPhase, PodSource, PodlogError};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::command::CliCommand;
use crate::since_time_arg;

#[derive(Debug, Deserialize)]
struct PodList {
    #[serde(default)]
    items: Vec<PodItem>,
}

#[derive(Debug, Deserialize)]
struct PodItem {
    metadata: PodMetadata,
    #[serde(default)]
    status: PodStatus,
}

#[derive(Debug, Deserialize)]
struct PodMetadata {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct PodStatus {
    #[serde(default)]
    phase: Option<String>,
}

/// Parse `get pods -o json` output into listings, in API order.
pub fn parse_pod_listing(json: &str) -> Result<Vec<PodListing>, PodlogError> {
    let list: PodList =
        serde_json::from_str(json).map_err(|e| PodlogError::InvalidListing(e.to_string()))?;
    Ok(list
        .items
        .into_iter()
        .map(|item| {
            let phase = item
                .status
                .phase
                .as_deref()
                .map(PodPhase::parse)
                .unwrap_or(PodPhase::Unknown);
            PodListing::new(item.metadata.name, phase)
        })
        .collect())
}

/// Pod listing and log retrieval through the `oc`/`kubectl` CLI.
#[derive(Debug, Clone)]
pub struct ClusterClient {
    cli: CliCommand,
    namespace: String,
}

impl ClusterClient {
    pub fn new(cli: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            cli: CliCommand::new(cli),
            namespace: namespace.into(),
        }
    }

    pub fn from_config(config: &PodlogConfig) -> Self {
        Self::new(config.retrieval.cli.clone(), config.namespace.clone())
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

impl PodSource for ClusterClient {
    async fn list_pods(&self, namespace: &str) -> Result<Vec<PodListing>, PodlogError> {
        let out = self
            .cli
            .run(&["get", "pods", "-n", namespace, "-o", "json"])
            .await
            .map_err(|e| {
                PodlogError::DiscoveryFailed(format!("failed to run {}: {e}", self.cli.program()))
            })?;
        if !out.success {
            return Err(PodlogError::DiscoveryFailed(out.failure_reason()));
        }
        let pods = parse_pod_listing(&out.stdout)?;
        debug!(namespace, pods = pods.len(), "listed pods");
        Ok(pods)
    }
}

impl LogSource for ClusterClient {
    async fn fetch_logs(&self, pod_name: &str, since: DateTime<Utc>) -> Result<String, PodlogError> {
        let since_arg = since_time_arg(since);
        debug!(pod = pod_name, since = %since_arg, "fetching logs");
        let out = self
            .cli
            .run(&[
                "logs",
                pod_name,
                "-n",
                &self.namespace,
                "--since-time",
                &since_arg,
                "--tail=-1",
            ])
            .await
            .map_err(|e| PodlogError::RetrievalFailed {
                pod: pod_name.to_string(),
                reason: format!("failed to run {}: {e}", self.cli.program()),
            })?;
        if !out.success {
            let reason = out.failure_reason();
            warn!(pod = pod_name, %reason, "log retrieval failed");
            return Err(PodlogError::RetrievalFailed {
                pod: pod_name.to_string(),
                reason,
            });
        }
        if out.stdout.trim().is_empty() {
            debug!(pod = pod_name, "no logs since lower bound");
        }
        Ok(out.stdout)
    }
}
