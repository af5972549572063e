use serde::{Deserialize, Serialize};

/// Runtime phase reported by the cluster for a pod.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

impl PodPhase {
    /// Parse the phase string used by the cluster API. Anything unrecognised
    /// maps to `Unknown`.
    pub fn parse(s: &str) -> Self {
        match s {
            "Pending" => Self::Pending,
            "Running" => Self::Running,
            "Succeeded" => Self::Succeeded,
            "Failed" => Self::Failed,
            _ => Self::Unknown,
        }
    }

    /// Phases whose logs are worth collecting. Test pods are often already
    /// `Succeeded` or `Failed` by the time analysis runs.
    pub fn has_logs(&self) -> bool {
        matches!(self, Self::Running | Self::Succeeded | Self::Failed)
    }
}

impl std::fmt::Display for PodPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Running => write!(f, "Running"),
            Self::Succeeded => write!(f, "Succeeded"),
            Self::Failed => write!(f, "Failed"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// One entry of a raw pod listing, as returned by a `PodSource`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodListing {
    pub name: String,
    pub phase: PodPhase,
}

impl PodListing {
    pub fn new(name: impl Into<String>, phase: PodPhase) -> Self {
        Self {
            name: name.into(),
            phase,
        }
    }
}

/// Kind of process running in a pod.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PodCategory {
    Service,
    Test,
}

impl PodCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Service => "service",
            Self::Test => "test",
        }
    }
}

impl std::fmt::Display for PodCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified pod: which service it belongs to and what runs in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodDescriptor {
    pub name: String,
    pub service: String,
    pub category: PodCategory,
}
