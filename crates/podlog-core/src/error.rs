use std::time::Duration;

/// Podlog error types
#[derive(Debug, thiserror::Error)]
pub enum PodlogError {
    #[error("pod discovery failed: {0}")]
    DiscoveryFailed(String),

    #[error("log retrieval failed for {pod}: {reason}")]
    RetrievalFailed { pod: String, reason: String },

    #[error("log retrieval for {pod} timed out after {}s", timeout.as_secs())]
    RetrievalTimeout { pod: String, timeout: Duration },

    #[error("a lower time bound is required for request parsing")]
    MissingTimeBound,

    #[error("analysis cancelled")]
    Cancelled,

    #[error("invalid pod listing: {0}")]
    InvalidListing(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PodlogError {
    /// True for failures that only affect a single pod and must not abort a run.
    pub fn is_per_pod(&self) -> bool {
        matches!(
            self,
            Self::RetrievalFailed { .. } | Self::RetrievalTimeout { .. } | Self::MissingTimeBound
        )
    }
}
