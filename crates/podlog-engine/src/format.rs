use chrono::NaiveDateTime;
use podlog_core::UniqueErrorGroup;

use crate::summary::{ErrorAnalysis, RequestAnalysis};

/// Truncate to at most `max` chars, marking the cut with `...`.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let keep = max.saturating_sub(3);
    let head: String = s.chars().take(keep).collect();
    format!("{head}...")
}

/// First line of a block, used as its one-line excerpt.
pub fn excerpt(text: &str, max: usize) -> String {
    truncate(text.lines().next().unwrap_or("").trim(), max)
}

fn format_seen(ts: Option<NaiveDateTime>) -> String {
    ts.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// One-line summary of an error group.
/// Output: `[CRITICAL] x3 octavia (octavia-api-0) 2025-01-01 10:00:00: Amphora lost heartbeat`
pub fn format_group_line(group: &UniqueErrorGroup, max: usize) -> String {
    let traceback = if group.has_traceback { " [traceback]" } else { "" };
    format!(
        "[{}] x{} {} ({}) {}{}: {}",
        group.severity,
        group.count,
        group.service,
        group.pod_name,
        format_seen(group.first_seen),
        traceback,
        excerpt(&group.representative_text, max)
    )
}

/// Format an error analysis for terminal display.
pub fn format_error_summary(a: &ErrorAnalysis, top: usize) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Errors since {} | Pods: {} analyzed, {} failed\n",
        a.since_time.format("%Y-%m-%d %H:%M:%S UTC"),
        a.pods_analyzed.len(),
        a.pods_failed.len()
    ));
    out.push_str(&format!(
        "Total: {} | Unique: {} | Critical: {}\n",
        a.total_errors, a.unique_count, a.critical_count
    ));

    if !a.counts_by_service.is_empty() {
        let services: Vec<String> = a
            .counts_by_service
            .iter()
            .map(|(service, count)| format!("{service}={count}"))
            .collect();
        out.push_str(&format!("By service: {}\n", services.join(", ")));
    }

    for (i, group) in a.unique_errors.iter().take(top).enumerate() {
        out.push_str(&format!("  {}. {}\n", i + 1, format_group_line(group, 100)));
    }
    if a.unique_errors.len() > top {
        out.push_str(&format!("  ... {} more\n", a.unique_errors.len() - top));
    }

    for f in &a.pods_failed {
        out.push_str(&format!("Failed: {} ({})\n", f.pod_name, f.reason));
    }
    out
}

/// Format a request analysis for terminal display.
pub fn format_request_summary(a: &RequestAnalysis) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Requests: {} | Errors: {} (4xx: {}, 5xx: {}) | Success: {:.2}%\n",
        a.total_requests, a.error_requests, a.client_errors, a.server_errors, a.success_rate_percent
    ));
    out.push_str(&format!(
        "Response time: avg {:.3}s | min {:.3}s | max {:.3}s\n",
        a.avg_response_time, a.min_response_time, a.max_response_time
    ));
    for (service, reqs) in &a.by_service {
        let errors = reqs.iter().filter(|r| r.is_error).count();
        out.push_str(&format!("  {service}: {} requests, {errors} errors\n", reqs.len()));
    }
    for f in &a.pods_failed {
        out.push_str(&format!("Failed: {} ({})\n", f.pod_name, f.reason));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::{summarize_requests, PodFailure};
    use chrono::{TimeZone, Utc};
    use podlog_core::{ErrorBlock, PodCategory, PodDescriptor, RequestObservation, Severity};

    fn group(text: &str, severity: Severity) -> UniqueErrorGroup {
        UniqueErrorGroup::from_block(&ErrorBlock {
            pod_name: "octavia-api-0".into(),
            service: "octavia".into(),
            category: PodCategory::Service,
            timestamp: NaiveDateTime::parse_from_str("2025-01-01 10:00:00", "%Y-%m-%d %H:%M:%S").ok(),
            severity,
            raw_text: text.into(),
            normalized_text: text.into(),
            has_traceback: true,
            context_before: Vec::new(),
            context_after: Vec::new(),
        })
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 6), "abc...");
        assert_eq!(truncate("ééééééé", 5), "éé...");
    }

    #[test]
    fn test_excerpt_uses_first_line() {
        assert_eq!(excerpt("  first line\n  second", 50), "first line");
        assert_eq!(excerpt("", 50), "");
    }

    #[test]
    fn test_group_line() {
        let line = format_group_line(&group("Amphora lost heartbeat\n  detail", Severity::Critical), 80);
        assert_eq!(
            line,
            "[CRITICAL] x1 octavia (octavia-api-0) 2025-01-01 10:00:00 [traceback]: Amphora lost heartbeat"
        );
    }

    #[test]
    fn test_error_summary() {
        let a = ErrorAnalysis {
            total_errors: 5,
            unique_errors: vec![group("boom", Severity::Error), group("bang", Severity::Error)],
            unique_count: 2,
            critical_count: 0,
            pods_analyzed: vec!["octavia-api-0".into()],
            pods_failed: vec![PodFailure::new("nova-api-0", "timed out")],
            counts_by_service: [("octavia".to_string(), 5)].into_iter().collect(),
            since_time: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        };
        let out = format_error_summary(&a, 1);
        assert!(out.contains("Total: 5 | Unique: 2 | Critical: 0"));
        assert!(out.contains("By service: octavia=5"));
        assert!(out.contains("boom"));
        assert!(out.contains("... 1 more"));
        assert!(out.contains("Failed: nova-api-0 (timed out)"));
    }

    #[test]
    fn test_request_summary() {
        let pod = PodDescriptor {
            name: "nova-api-0".into(),
            service: "nova".into(),
            category: PodCategory::Service,
        };
        let ts = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let reqs = vec![
            RequestObservation::new(&pod, ts, "GET", "/a", 200, 0.5),
            RequestObservation::new(&pod, ts, "GET", "/b", 500, 1.5),
        ];
        let out = format_request_summary(&summarize_requests(reqs, Vec::new(), Vec::new()));
        assert!(out.contains("Requests: 2 | Errors: 1 (4xx: 0, 5xx: 1) | Success: 50.00%"));
        assert!(out.contains("avg 1.000s | min 0.500s | max 1.500s"));
        assert!(out.contains("nova: 2 requests, 1 errors"));
    }
}
