use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

// ---------------------------------------------------------------------------
// TOML data model
// ---------------------------------------------------------------------------

/// Top-level TOML config file (`podlog.toml`).
#[derive(Debug, Clone, Deserialize)]
pub struct PodlogConfig {
    /// Namespace whose pods are analyzed.
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default)]
    pub pods: PodPatterns,
    #[serde(default)]
    pub errors: ErrorConfig,
    #[serde(default)]
    pub requests: RequestConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

impl Default for PodlogConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            pods: PodPatterns::default(),
            errors: ErrorConfig::default(),
            requests: RequestConfig::default(),
            retrieval: RetrievalConfig::default(),
        }
    }
}

/// Pod-name pattern tables used for classification.
#[derive(Debug, Clone, Deserialize)]
pub struct PodPatterns {
    /// Ordered service-name fragments; the first fragment contained in a pod
    /// name wins. The service label is the fragment up to its first dash.
    #[serde(default = "default_service_fragments")]
    pub service_fragments: Vec<String>,
    /// Prefixes identifying test-runner pods.
    #[serde(default = "default_test_prefixes")]
    pub test_prefixes: Vec<String>,
    /// Service label for test pods whose name has no second segment.
    #[serde(default = "default_test_fallback_service")]
    pub test_fallback_service: String,
    /// Fragments identifying API pods for request analysis.
    #[serde(default = "default_api_fragments")]
    pub api_fragments: Vec<String>,
}

impl Default for PodPatterns {
    fn default() -> Self {
        Self {
            service_fragments: default_service_fragments(),
            test_prefixes: default_test_prefixes(),
            test_fallback_service: default_test_fallback_service(),
            api_fragments: default_api_fragments(),
        }
    }
}

/// Error extraction and deduplication settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorConfig {
    /// Minimum similarity (0-100) for two blocks to share a group.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
    /// Context lines captured before each block (0 disables).
    #[serde(default = "default_context_lines")]
    pub context_lines_before: usize,
    /// Context lines captured after each block (0 disables).
    #[serde(default = "default_context_lines")]
    pub context_lines_after: usize,
    /// Hard cap on lines consumed by a traceback block.
    #[serde(default = "default_traceback_max_lines")]
    pub traceback_max_lines: usize,
    /// Hard cap on lines in a standalone error block.
    #[serde(default = "default_standalone_max_lines")]
    pub standalone_max_lines: usize,
    /// Standalone blocks with text this short or shorter are dropped.
    #[serde(default = "default_min_block_chars")]
    pub min_block_chars: usize,
    /// How many leading characters of a line the keyword scan looks at.
    #[serde(default = "default_keyword_prefix_chars")]
    pub keyword_prefix_chars: usize,
    /// Replaces the built-in error keyword list when set.
    #[serde(default)]
    pub keywords: Option<Vec<String>>,
}

impl Default for ErrorConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            context_lines_before: default_context_lines(),
            context_lines_after: default_context_lines(),
            traceback_max_lines: default_traceback_max_lines(),
            standalone_max_lines: default_standalone_max_lines(),
            min_block_chars: default_min_block_chars(),
            keyword_prefix_chars: default_keyword_prefix_chars(),
            keywords: None,
        }
    }
}

/// Request log parsing settings.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestConfig {
    /// Requests whose endpoint contains any of these paths are dropped.
    #[serde(default = "default_health_check_paths")]
    pub health_check_paths: Vec<String>,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            health_check_paths: default_health_check_paths(),
        }
    }
}

/// Cluster access settings.
#[derive(Debug, Clone, Deserialize)]
pub struct RetrievalConfig {
    /// Cluster CLI binary (`oc` or `kubectl`).
    #[serde(default = "default_cli")]
    pub cli: String,
    /// Per-pod log fetch timeout in seconds.
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
    /// Pod listing timeout in seconds.
    #[serde(default = "default_list_timeout")]
    pub list_timeout_secs: u64,
    /// Upper bound on concurrent per-pod fetches.
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,
}

impl RetrievalConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn list_timeout(&self) -> Duration {
        Duration::from_secs(self.list_timeout_secs)
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            cli: default_cli(),
            fetch_timeout_secs: default_fetch_timeout(),
            list_timeout_secs: default_list_timeout(),
            max_concurrent_fetches: default_max_concurrent_fetches(),
        }
    }
}

// ---------------------------------------------------------------------------
// Serde defaults
// ---------------------------------------------------------------------------

fn default_namespace() -> String {
    "openstack".into()
}
fn default_service_fragments() -> Vec<String> {
    [
        "octavia-api",
        "octavia-worker",
        "octavia-housekeeping",
        "octavia-health-manager",
        "designate-api",
        "designate-central",
        "designate-worker",
        "designate-producer",
        "designate-mdns",
        "designate-sink",
        "neutron-api",
        "neutron-dhcp-agent",
        "neutron-l3-agent",
        "neutron-metadata-agent",
        "neutron-ovn-metadata-agent",
        "neutron-sriov-agent",
        "nova-api",
        "nova-conductor",
        "nova-scheduler",
        "nova-compute",
        "cinder-api",
        "cinder-scheduler",
        "cinder-volume",
        "cinder-backup",
        "glance-api",
        "keystone-api",
        "placement-api",
        "heat-api",
        "heat-engine",
        "manila-api",
        "manila-scheduler",
        "manila-share",
        "barbican-api",
        "barbican-worker",
        "horizon",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
fn default_test_prefixes() -> Vec<String> {
    vec!["tempest-".into()]
}
fn default_test_fallback_service() -> String {
    "tempest".into()
}
fn default_api_fragments() -> Vec<String> {
    [
        "octavia-api",
        "designate-api",
        "neutron-api",
        "nova-api",
        "cinder-api",
        "glance-api",
        "keystone-api",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
fn default_similarity_threshold() -> f64 {
    85.0
}
fn default_context_lines() -> usize {
    5
}
fn default_traceback_max_lines() -> usize {
    200
}
fn default_standalone_max_lines() -> usize {
    50
}
fn default_min_block_chars() -> usize {
    20
}
fn default_keyword_prefix_chars() -> usize {
    50
}
fn default_health_check_paths() -> Vec<String> {
    vec!["/healthcheck".into()]
}
fn default_cli() -> String {
    "oc".into()
}
fn default_fetch_timeout() -> u64 {
    60
}
fn default_list_timeout() -> u64 {
    30
}
fn default_max_concurrent_fetches() -> usize {
    16
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Load and parse a TOML config file.
pub fn load(path: &Path) -> Result<PodlogConfig> {
    let content = std::fs::read_to_string(path)?;
    parse(&content)
}

/// Load `path` if given, else the default location if it exists, else the
/// built-in defaults.
pub fn load_or_default(path: Option<&Path>) -> Result<PodlogConfig> {
    if let Some(path) = path {
        return load(path);
    }
    match default_config_path() {
        Some(p) if p.exists() => load(&p),
        _ => Ok(PodlogConfig::default()),
    }
}

/// Default config location: ~/.podlog/podlog.toml
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".podlog").join("podlog.toml"))
}

/// Parse TOML string into a PodlogConfig.
pub fn parse(toml_str: &str) -> Result<PodlogConfig> {
    let config: PodlogConfig = toml::from_str(toml_str)?;
    validate(&config)?;
    Ok(config)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

pub fn validate(config: &PodlogConfig) -> Result<()> {
    if config.namespace.trim().is_empty() {
        return Err(ConfigError::Validation(
            "namespace must not be empty".into(),
        ));
    }

    if config.pods.service_fragments.is_empty() && config.pods.test_prefixes.is_empty() {
        return Err(ConfigError::Validation(
            "pods: at least one service fragment or test prefix is required".into(),
        ));
    }
    if let Some(empty) = config
        .pods
        .service_fragments
        .iter()
        .chain(&config.pods.test_prefixes)
        .chain(&config.pods.api_fragments)
        .find(|f| f.is_empty())
    {
        return Err(ConfigError::Validation(format!(
            "pods: pattern entries must not be empty (got '{empty}')"
        )));
    }

    let errors = &config.errors;
    if !(0.0..=100.0).contains(&errors.similarity_threshold) {
        return Err(ConfigError::Validation(format!(
            "errors: similarity_threshold must be within 0-100, got {}",
            errors.similarity_threshold
        )));
    }
    if errors.traceback_max_lines == 0 || errors.standalone_max_lines == 0 {
        return Err(ConfigError::Validation(
            "errors: line caps must be >= 1".into(),
        ));
    }
    if errors.keyword_prefix_chars == 0 {
        return Err(ConfigError::Validation(
            "errors: keyword_prefix_chars must be >= 1".into(),
        ));
    }
    if let Some(ref keywords) = errors.keywords {
        if keywords.is_empty() || keywords.iter().any(|k| k.trim().is_empty()) {
            return Err(ConfigError::Validation(
                "errors: keywords must be a non-empty list of non-empty strings".into(),
            ));
        }
    }

    let retrieval = &config.retrieval;
    if retrieval.cli.trim().is_empty() {
        return Err(ConfigError::Validation(
            "retrieval: cli must not be empty".into(),
        ));
    }
    if retrieval.fetch_timeout_secs == 0 || retrieval.list_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "retrieval: timeouts must be >= 1 second".into(),
        ));
    }
    if retrieval.max_concurrent_fetches == 0 {
        return Err(ConfigError::Validation(
            "retrieval: max_concurrent_fetches must be >= 1".into(),
        ));
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
