use chrono::{DateTime, NaiveDateTime, Utc};
use podlog_config::RequestConfig;
use podlog_core::{PodDescriptor, RequestObservation};
use regex::Regex;
use tracing::{debug, warn};

/// One entry of the request-line cascade: a regex and the capture groups
/// holding each field. `response_time` is `None` for layouts without timing.
pub struct RequestPattern {
    pub name: &'static str,
    pub regex: Regex,
    pub timestamp: usize,
    pub method: usize,
    pub endpoint: usize,
    pub status: usize,
    pub response_time: Option<usize>,
}

const METHODS: &str = "GET|POST|PUT|DELETE|PATCH|HEAD|OPTIONS";
const ISO_TS: &str = r"\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}";

/// The built-in cascade, tried in order; the first pattern that yields a
/// complete record wins.
pub fn default_patterns() -> Vec<RequestPattern> {
    vec![
        // 2025-01-01 10:00:00.123 15 INFO nova.api [req-..] 10.0.0.1 "GET /v2.1/servers HTTP/1.1" status: 200 len: 512 time: 0.0451
        RequestPattern {
            name: "service",
            regex: Regex::new(&format!(
                r#"(?i)({ISO_TS}(?:\.\d+)?).*?"({METHODS})\s+([^\s"]+)[^"]*"\s+status:\s+(\d{{3}})\s+len:\s+\d+\s+time:\s+([\d.]+)"#
            ))
            .unwrap(),
            timestamp: 1,
            method: 2,
            endpoint: 3,
            status: 4,
            response_time: Some(5),
        },
        // 2025-01-01 10:00:00.123 12 INFO wsgi 10.0.0.5 GET /v2.0/ports HTTP/1.1 201 0.2311
        RequestPattern {
            name: "access",
            regex: Regex::new(&format!(
                r"(?i)({ISO_TS}(?:\.\d+)?).*?\b({METHODS})\s+(\S+)\s+.*?\s+(\d{{3}})\s+([\d.]+)"
            ))
            .unwrap(),
            timestamp: 1,
            method: 2,
            endpoint: 3,
            status: 4,
            response_time: Some(5),
        },
        // 2025-01-01 10:00:00 api POST /v2/zones -> 202 in 1.5s
        RequestPattern {
            name: "loose",
            regex: Regex::new(&format!(
                r"(?i)({ISO_TS}).*?\b(GET|POST|PUT|DELETE|PATCH)\s+(\S+).*?(\d{{3}}).*?([\d.]+)s"
            ))
            .unwrap(),
            timestamp: 1,
            method: 2,
            endpoint: 3,
            status: 4,
            response_time: Some(5),
        },
        // 10.0.0.9 - - [12/Nov/2024:20:30:45 +0000] "DELETE /v2/zones/abc HTTP/1.1" 204 0
        RequestPattern {
            name: "common",
            regex: Regex::new(&format!(
                r#"(?i)\S+\s+\S+\s+\S+\s+\[([^\]]+)\]\s+"({METHODS})\s+([^\s"]+)[^"]*"\s+(\d{{3}})\b"#
            ))
            .unwrap(),
            timestamp: 1,
            method: 2,
            endpoint: 3,
            status: 4,
            response_time: None,
        },
    ]
}

/// Parse the timestamp formats found in request lines, in order:
/// `12/Nov/2024:20:30:45 [+0000]`, `2024-11-12 20:30:45.123`,
/// `2024-11-12 20:30:45`. Times without an offset are taken as UTC.
pub fn parse_request_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_str(raw, "%d/%b/%Y:%H:%M:%S %z") {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%d/%b/%Y:%H:%M:%S") {
        return Some(naive.and_utc());
    }
    let iso = raw.replacen('T', " ", 1);
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(&iso, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Fields pulled from one matching line.
struct RawRequest<'a> {
    timestamp: DateTime<Utc>,
    method: &'a str,
    endpoint: &'a str,
    status: u16,
    response_time: f64,
}

impl RequestPattern {
    fn extract<'a>(&self, line: &'a str) -> Option<RawRequest<'a>> {
        let caps = self.regex.captures(line)?;
        let timestamp = parse_request_timestamp(caps.get(self.timestamp)?.as_str())?;
        let status = caps.get(self.status)?.as_str().parse().ok()?;
        let response_time = match self.response_time {
            Some(group) => caps.get(group)?.as_str().parse().ok()?,
            None => 0.0,
        };
        Some(RawRequest {
            timestamp,
            method: caps.get(self.method)?.as_str(),
            endpoint: caps.get(self.endpoint)?.as_str(),
            status,
            response_time,
        })
    }
}

/// Turns API pod log text into request observations.
pub struct RequestParser {
    patterns: Vec<RequestPattern>,
    health_check_paths: Vec<String>,
}

impl RequestParser {
    pub fn new(config: &RequestConfig) -> Self {
        Self::with_patterns(default_patterns(), config)
    }

    pub fn with_defaults() -> Self {
        Self::new(&RequestConfig::default())
    }

    pub fn with_patterns(patterns: Vec<RequestPattern>, config: &RequestConfig) -> Self {
        Self {
            patterns,
            health_check_paths: config.health_check_paths.clone(),
        }
    }

    pub fn patterns(&self) -> &[RequestPattern] {
        &self.patterns
    }

    fn is_health_check(&self, endpoint: &str) -> bool {
        self.health_check_paths
            .iter()
            .any(|p| endpoint.contains(p.as_str()))
    }

    /// Parse `text` into observations, in line order. Without a lower time
    /// bound nothing is returned; requests older than the bound are dropped.
    pub fn parse(
        &self,
        text: &str,
        pod: &PodDescriptor,
        since: Option<DateTime<Utc>>,
    ) -> Vec<RequestObservation> {
        let Some(since) = since else {
            warn!(pod = %pod.name, "no lower time bound given, skipping request parsing");
            return Vec::new();
        };

        let mut out = Vec::new();
        for line in text.lines() {
            let Some((pattern, req)) = self
                .patterns
                .iter()
                .find_map(|p| p.extract(line).map(|r| (p.name, r)))
            else {
                continue;
            };

            if self.is_health_check(req.endpoint) || req.timestamp < since {
                continue;
            }

            debug!(pod = %pod.name, pattern, status = req.status, "request line");
            out.push(RequestObservation::new(
                pod,
                req.timestamp,
                req.method,
                req.endpoint,
                req.status,
                req.response_time,
            ));
        }
        out
    }
}
