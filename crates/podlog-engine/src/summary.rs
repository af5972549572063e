use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use podlog_core::{ErrorBlock, RequestObservation, Severity, UniqueErrorGroup};
use serde::{Deserialize, Serialize};

/// A pod whose logs could not be retrieved during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodFailure {
    pub pod_name: String,
    pub reason: String,
}

impl PodFailure {
    pub fn new(pod_name: impl Into<String>, reason: impl ToString) -> Self {
        Self {
            pod_name: pod_name.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result of an error analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorAnalysis {
    /// Raw error blocks seen across all pods, before deduplication.
    pub total_errors: usize,
    /// Ranked groups: CRITICAL first, then by count.
    pub unique_errors: Vec<UniqueErrorGroup>,
    pub unique_count: usize,
    pub critical_count: usize,
    pub pods_analyzed: Vec<String>,
    #[serde(default)]
    pub pods_failed: Vec<PodFailure>,
    /// Raw error blocks per service label.
    pub counts_by_service: BTreeMap<String, usize>,
    pub since_time: DateTime<Utc>,
}

impl ErrorAnalysis {
    /// A well-formed result with zero totals.
    pub fn empty(since_time: DateTime<Utc>) -> Self {
        summarize_errors(&[], Vec::new(), since_time, Vec::new(), Vec::new())
    }

    /// Groups bucketed by the service of their representative, in rank order.
    pub fn groups_by_service(&self) -> BTreeMap<&str, Vec<&UniqueErrorGroup>> {
        let mut buckets: BTreeMap<&str, Vec<&UniqueErrorGroup>> = BTreeMap::new();
        for group in &self.unique_errors {
            buckets.entry(group.service.as_str()).or_default().push(group);
        }
        buckets
    }
}

/// Build the error result from the raw blocks and their (already ranked) groups.
pub fn summarize_errors(
    blocks: &[ErrorBlock],
    unique_errors: Vec<UniqueErrorGroup>,
    since_time: DateTime<Utc>,
    pods_analyzed: Vec<String>,
    pods_failed: Vec<PodFailure>,
) -> ErrorAnalysis {
    let mut counts_by_service: BTreeMap<String, usize> = BTreeMap::new();
    for block in blocks {
        *counts_by_service.entry(block.service.clone()).or_default() += 1;
    }

    let critical_count = unique_errors
        .iter()
        .filter(|g| g.severity == Severity::Critical)
        .count();

    ErrorAnalysis {
        total_errors: blocks.len(),
        unique_count: unique_errors.len(),
        critical_count,
        unique_errors,
        pods_analyzed,
        pods_failed,
        counts_by_service,
        since_time,
    }
}

/// Result of a request analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestAnalysis {
    pub total_requests: usize,
    pub error_requests: usize,
    pub client_errors: usize,
    pub server_errors: usize,
    /// `(total - errors) / total * 100`, 0 when there are no requests.
    pub success_rate_percent: f64,
    pub avg_response_time: f64,
    pub max_response_time: f64,
    pub min_response_time: f64,
    pub requests: Vec<RequestObservation>,
    pub by_service: BTreeMap<String, Vec<RequestObservation>>,
    pub pods_analyzed: Vec<String>,
    #[serde(default)]
    pub pods_failed: Vec<PodFailure>,
}

impl RequestAnalysis {
    pub fn empty() -> Self {
        summarize_requests(Vec::new(), Vec::new(), Vec::new())
    }
}

/// Compute counts, success rate and latency statistics over `requests`.
pub fn summarize_requests(
    requests: Vec<RequestObservation>,
    pods_analyzed: Vec<String>,
    pods_failed: Vec<PodFailure>,
) -> RequestAnalysis {
    let total = requests.len();
    let error_requests = requests.iter().filter(|r| r.is_error).count();
    let client_errors = requests.iter().filter(|r| r.is_client_error).count();
    let server_errors = requests.iter().filter(|r| r.is_server_error).count();

    let (success_rate_percent, avg, max, min) = if total == 0 {
        (0.0, 0.0, 0.0, 0.0)
    } else {
        let times = requests.iter().map(|r| r.response_time_secs);
        let sum: f64 = times.clone().sum();
        (
            (total - error_requests) as f64 / total as f64 * 100.0,
            sum / total as f64,
            times.clone().fold(f64::MIN, f64::max),
            times.fold(f64::MAX, f64::min),
        )
    };

    let mut by_service: BTreeMap<String, Vec<RequestObservation>> = BTreeMap::new();
    for req in &requests {
        by_service
            .entry(req.service.clone())
            .or_default()
            .push(req.clone());
    }

    RequestAnalysis {
        total_requests: total,
        error_requests,
        client_errors,
        server_errors,
        success_rate_percent,
        avg_response_time: avg,
        max_response_time: max,
        min_response_time: min,
        requests,
        by_service,
        pods_analyzed,
        pods_failed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use podlog_core::{PodCategory, PodDescriptor};

    fn pod(name: &str, service: &str) -> PodDescriptor {
        PodDescriptor {
            name: name.into(),
            service: service.into(),
            category: PodCategory::Service,
        }
    }

    fn req(service: &str, status: u16, time: f64) -> RequestObservation {
        RequestObservation::new(
            &pod(&format!("{service}-api-0"), service),
            Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap(),
            "GET",
            "/v1/x",
            status,
            time,
        )
    }

    fn block(service: &str, text: &str, severity: Severity) -> ErrorBlock {
        ErrorBlock {
            pod_name: format!("{service}-0"),
            service: service.into(),
            category: PodCategory::Service,
            timestamp: None,
            severity,
            raw_text: text.into(),
            normalized_text: text.into(),
            has_traceback: false,
            context_before: Vec::new(),
            context_after: Vec::new(),
        }
    }

    #[test]
    fn test_request_stats() {
        let reqs = vec![
            req("nova", 200, 0.1),
            req("nova", 404, 0.3),
            req("octavia", 503, 0.5),
            req("nova", 201, 0.3),
        ];
        let a = summarize_requests(reqs, vec!["nova-api-0".into()], Vec::new());
        assert_eq!(a.total_requests, 4);
        assert_eq!(a.error_requests, 2);
        assert_eq!(a.client_errors, 1);
        assert_eq!(a.server_errors, 1);
        assert_eq!(a.success_rate_percent, 50.0);
        assert!((a.avg_response_time - 0.3).abs() < 1e-9);
        assert_eq!(a.max_response_time, 0.5);
        assert_eq!(a.min_response_time, 0.1);
        assert_eq!(a.by_service["nova"].len(), 3);
        assert_eq!(a.by_service["octavia"].len(), 1);
    }

    #[test]
    fn test_by_service_keeps_arrival_order() {
        let reqs = vec![req("nova", 200, 0.1), req("nova", 500, 0.2), req("nova", 302, 0.3)];
        let a = summarize_requests(reqs, Vec::new(), Vec::new());
        let statuses: Vec<u16> = a.by_service["nova"].iter().map(|r| r.status_code).collect();
        assert_eq!(statuses, vec![200, 500, 302]);
    }

    #[test]
    fn test_empty_requests_are_defined() {
        let a = RequestAnalysis::empty();
        assert_eq!(a.total_requests, 0);
        assert_eq!(a.success_rate_percent, 0.0);
        assert_eq!(a.avg_response_time, 0.0);
        assert_eq!(a.max_response_time, 0.0);
        assert_eq!(a.min_response_time, 0.0);
        assert!(a.by_service.is_empty());
    }

    #[test]
    fn test_error_stats() {
        let blocks = vec![
            block("nova", "ERROR a", Severity::Error),
            block("nova", "ERROR a", Severity::Error),
            block("octavia", "CRITICAL b", Severity::Critical),
        ];
        let mut first = UniqueErrorGroup::from_block(&blocks[0]);
        first.attach(&blocks[1]);
        let second = UniqueErrorGroup::from_block(&blocks[2]);
        let since = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();

        let a = summarize_errors(
            &blocks,
            vec![second, first],
            since,
            vec!["nova-0".into(), "octavia-0".into()],
            vec![PodFailure::new("glance-0", "timed out")],
        );
        assert_eq!(a.total_errors, 3);
        assert_eq!(a.unique_count, 2);
        assert_eq!(a.critical_count, 1);
        assert_eq!(a.counts_by_service["nova"], 2);
        assert_eq!(a.counts_by_service["octavia"], 1);
        assert_eq!(a.pods_failed[0].pod_name, "glance-0");
        assert_eq!(a.since_time, since);

        let buckets = a.groups_by_service();
        assert_eq!(buckets["nova"].len(), 1);
        assert_eq!(buckets["nova"][0].count, 2);
        assert_eq!(buckets["octavia"][0].severity, Severity::Critical);
    }

    #[test]
    fn test_empty_error_analysis() {
        let since = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let a = ErrorAnalysis::empty(since);
        assert_eq!(a.total_errors, 0);
        assert_eq!(a.unique_count, 0);
        assert!(a.counts_by_service.is_empty());
    }

    #[test]
    fn test_analysis_serializes() {
        let a = summarize_requests(vec![req("nova", 500, 0.2)], Vec::new(), Vec::new());
        let v = serde_json::to_value(&a).unwrap();
        assert_eq!(v["server_errors"], 1);
        assert_eq!(v["requests"][0]["method"], "GET");
    }
}
