use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::pod::{PodCategory, PodDescriptor};

/// Severity of an extracted error block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Error,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
        }
    }

    /// `Critical` if the token appears anywhere in `line` (case-insensitive).
    pub fn from_line(line: &str) -> Self {
        if line.to_uppercase().contains("CRITICAL") {
            Self::Critical
        } else {
            Self::Error
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One or more consecutive log lines representing a single error event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBlock {
    pub pod_name: String,
    pub service: String,
    pub category: PodCategory,
    pub timestamp: Option<NaiveDateTime>,
    pub severity: Severity,
    pub raw_text: String,
    pub normalized_text: String,
    pub has_traceback: bool,
    /// Lines preceding the block, for display only.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context_before: Vec<String>,
    /// Lines following the block, for display only.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context_after: Vec<String>,
}

/// Where and when a member of a `UniqueErrorGroup` was seen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrence {
    pub pod_name: String,
    pub timestamp: Option<NaiveDateTime>,
}

/// A cluster of error blocks whose normalized text is similar enough to be
/// treated as the same issue. The representative is the first block seen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniqueErrorGroup {
    pub representative_text: String,
    pub normalized_text: String,
    pub severity: Severity,
    pub pod_name: String,
    pub service: String,
    pub category: PodCategory,
    pub has_traceback: bool,
    pub first_seen: Option<NaiveDateTime>,
    pub last_seen: Option<NaiveDateTime>,
    pub count: usize,
    pub occurrences: Vec<Occurrence>,
}

impl UniqueErrorGroup {
    /// Start a new group with `block` as representative.
    pub fn from_block(block: &ErrorBlock) -> Self {
        Self {
            representative_text: block.raw_text.clone(),
            normalized_text: block.normalized_text.clone(),
            severity: block.severity,
            pod_name: block.pod_name.clone(),
            service: block.service.clone(),
            category: block.category,
            has_traceback: block.has_traceback,
            first_seen: block.timestamp,
            last_seen: block.timestamp,
            count: 1,
            occurrences: vec![Occurrence {
                pod_name: block.pod_name.clone(),
                timestamp: block.timestamp,
            }],
        }
    }

    /// Record another occurrence and widen the seen bounds.
    pub fn attach(&mut self, block: &ErrorBlock) {
        self.count += 1;
        self.occurrences.push(Occurrence {
            pod_name: block.pod_name.clone(),
            timestamp: block.timestamp,
        });
        if let Some(ts) = block.timestamp {
            if self.first_seen.map_or(true, |first| ts < first) {
                self.first_seen = Some(ts);
            }
            if self.last_seen.map_or(true, |last| ts > last) {
                self.last_seen = Some(ts);
            }
        }
    }
}

/// One parsed inbound API request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestObservation {
    pub timestamp: DateTime<Utc>,
    pub pod_name: String,
    pub service: String,
    pub method: String,
    pub endpoint: String,
    pub status_code: u16,
    pub response_time_secs: f64,
    pub is_error: bool,
    pub is_client_error: bool,
    pub is_server_error: bool,
}

impl RequestObservation {
    /// Build an observation; the error flags are derived from `status_code`.
    pub fn new(
        pod: &PodDescriptor,
        timestamp: DateTime<Utc>,
        method: &str,
        endpoint: &str,
        status_code: u16,
        response_time_secs: f64,
    ) -> Self {
        Self {
            timestamp,
            pod_name: pod.name.clone(),
            service: pod.service.clone(),
            method: method.to_uppercase(),
            endpoint: endpoint.to_string(),
            status_code,
            response_time_secs,
            is_error: status_code >= 400,
            is_client_error: (400..500).contains(&status_code),
            is_server_error: status_code >= 500,
        }
    }
}
