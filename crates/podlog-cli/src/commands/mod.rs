pub mod completions;
pub mod errors;
pub mod pods;
pub mod requests;
pub mod scan;

use std::path::PathBuf;

use chrono::{DateTime, NaiveDateTime, Utc};
use podlog_client::ClusterClient;
use podlog_config::{ConfigError, PodlogConfig};
use podlog_core::PodlogError;
use podlog_engine::Analyzer;
use tokio_util::sync::CancellationToken;
use tracing::warn;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Podlog(#[from] PodlogError),

    #[error("cannot read {path}: {source}")]
    ReadLog {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Unknown shell: {0}. Supported: bash, zsh, fish, elvish, powershell")]
    UnknownShell(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Global options shared by every subcommand.
pub struct Settings {
    pub config: Option<PathBuf>,
    pub namespace: Option<String>,
}

impl Settings {
    /// `--config`, then ~/.podlog/podlog.toml, then built-in defaults;
    /// `--namespace` overrides the file.
    pub fn load(&self) -> Result<PodlogConfig, CliError> {
        let mut config = podlog_config::load_or_default(self.config.as_deref())?;
        if let Some(ns) = &self.namespace {
            config.namespace = ns.clone();
            podlog_config::validate(&config)?;
        }
        Ok(config)
    }
}

/// Analyzer over the cluster CLI configured in `config`.
pub fn cluster_analyzer(config: PodlogConfig) -> Analyzer<ClusterClient> {
    let client = ClusterClient::from_config(&config);
    Analyzer::new(config, client)
}

/// Token cancelled on the first Ctrl-C.
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling analysis");
            trigger.cancel();
        }
    });
    token
}

/// `--since` values: RFC 3339, `YYYY-MM-DD HH:MM:SS` (UTC), or a duration
/// ago such as `90m` or `2h 30m`.
pub fn parse_since(s: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Ok(ts.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Ok(naive.and_utc());
    }
    let ago = humantime::parse_duration(s)
        .map_err(|e| format!("expected a timestamp or a duration like '2h': {e}"))?;
    let ago = chrono::Duration::from_std(ago).map_err(|e| e.to_string())?;
    Ok(Utc::now() - ago)
}
