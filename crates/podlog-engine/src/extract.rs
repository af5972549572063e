use std::sync::LazyLock;

use chrono::NaiveDateTime;
use podlog_config::ErrorConfig;
use podlog_core::{ErrorBlock, PodDescriptor, Severity};
use regex::Regex;
use tracing::debug;

use crate::level::{starts_with_timestamp, LevelDetector};
use crate::normalize::normalize;

/// Phrase that opens a Python traceback.
pub const TRACEBACK_MARKER: &str = "Traceback (most recent call last)";

static RE_TIMESTAMP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2})").unwrap());
/// `ERROR designate.objects.adapters.base` in an oslo-style line.
static RE_MODULE_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(ERROR|CRITICAL)\s+[\w.]+").unwrap());
static RE_QUIET_LEVEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(INFO|DEBUG|WARNING)\s").unwrap());
static RE_STACK_FRAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^\s+File\s+""#).unwrap());
static RE_FRAGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s+(File|return|raise|def|class)\b").unwrap());
static RE_TIMESTAMPED_ERROR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}.*\b(ERROR|CRITICAL)\b").unwrap()
});

/// Lines of one detected block, borrowed from the source text.
struct Scan<'a> {
    lines: Vec<&'a str>,
    /// Index of the first line not consumed by the block.
    next: usize,
}

/// Splits a pod's raw log text into error blocks.
///
/// Single pass over the lines: a qualifying error line either opens a
/// multi-line traceback block or a standalone block; the scan resumes after
/// the last consumed line, so every line is visited a bounded number of times.
#[derive(Debug, Clone)]
pub struct ErrorExtractor {
    detector: LevelDetector,
    traceback_max_lines: usize,
    standalone_max_lines: usize,
    min_block_chars: usize,
    context_before: usize,
    context_after: usize,
}

impl ErrorExtractor {
    pub fn new(config: &ErrorConfig) -> Self {
        Self {
            detector: LevelDetector::from_config(config),
            traceback_max_lines: config.traceback_max_lines,
            standalone_max_lines: config.standalone_max_lines,
            min_block_chars: config.min_block_chars,
            context_before: config.context_lines_before,
            context_after: config.context_lines_after,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(&ErrorConfig::default())
    }

    /// Extract error blocks from `text`, in order of first appearance.
    pub fn extract(&self, text: &str, pod: &PodDescriptor) -> Vec<ErrorBlock> {
        let lines: Vec<&str> = text.lines().collect();
        let mut blocks = Vec::new();
        let mut i = 0;

        while i < lines.len() {
            let line = lines[i];
            if !self.detector.is_error_line(line) {
                i += 1;
                continue;
            }

            if line.contains(TRACEBACK_MARKER) {
                let scan = self.scan_traceback(&lines, i);
                debug!(pod = %pod.name, lines = scan.lines.len(), "traceback block");
                blocks.push(self.build(pod, &lines, i, &scan, true));
                i = scan.next;
            } else if is_traceback_fragment(line) {
                i += 1;
            } else {
                let scan = self.scan_standalone(&lines, i);
                if joined_len(&scan.lines) > self.min_block_chars {
                    debug!(pod = %pod.name, lines = scan.lines.len(), "standalone error block");
                    blocks.push(self.build(pod, &lines, i, &scan, false));
                }
                i = scan.next;
            }
        }

        blocks
    }

    fn scan_traceback<'a>(&self, lines: &[&'a str], start: usize) -> Scan<'a> {
        let opener = lines[start];
        let timestamp = RE_TIMESTAMP.find(opener).map(|m| m.as_str());
        let module_prefix = RE_MODULE_PREFIX.find(opener).map(|m| m.as_str());
        let is_new_entry = |line: &str| {
            starts_with_timestamp(line) && module_prefix.map_or(true, |m| !line.contains(m))
        };

        let mut block = vec![opener];
        let limit = start.saturating_add(self.traceback_max_lines);
        let mut j = start + 1;

        while j < lines.len() && j < limit {
            let line = lines[j];

            if line.trim().is_empty() {
                // Two blank lines followed by a different entry separate blocks.
                let separator = lines.get(j + 1).is_some_and(|l| l.trim().is_empty())
                    && lines.get(j + 2).is_some_and(|l| is_new_entry(*l));
                if separator {
                    break;
                }
                j += 1;
                continue;
            }

            if is_continuation(line, timestamp, module_prefix) || !starts_with_timestamp(line) {
                block.push(line);
                j += 1;
            } else {
                break;
            }
        }

        Scan {
            lines: block,
            next: j,
        }
    }

    fn scan_standalone<'a>(&self, lines: &[&'a str], start: usize) -> Scan<'a> {
        let mut block = vec![lines[start]];
        let limit = start.saturating_add(self.standalone_max_lines);
        let mut j = start + 1;

        while j < lines.len() && j < limit {
            let line = lines[j];
            if starts_with_timestamp(line) || line.trim().is_empty() {
                break;
            }
            block.push(line);
            j += 1;
        }

        Scan {
            lines: block,
            next: j,
        }
    }

    fn build(
        &self,
        pod: &PodDescriptor,
        lines: &[&str],
        start: usize,
        scan: &Scan<'_>,
        has_traceback: bool,
    ) -> ErrorBlock {
        let opener = scan.lines[0];
        let raw_text = scan.lines.join("\n");
        let normalized_text = normalize(&raw_text);
        ErrorBlock {
            pod_name: pod.name.clone(),
            service: pod.service.clone(),
            category: pod.category,
            timestamp: parse_timestamp(opener),
            severity: Severity::from_line(opener),
            raw_text,
            normalized_text,
            has_traceback,
            context_before: self.collect_context_before(lines, start),
            context_after: self.collect_context_after(lines, scan.next),
        }
    }

    fn collect_context_before(&self, lines: &[&str], start: usize) -> Vec<String> {
        let mut context = Vec::new();
        let lowest = start.saturating_sub(self.context_before);
        for idx in (lowest..start).rev() {
            let line = lines[idx];
            if RE_TIMESTAMPED_ERROR.is_match(line) {
                break;
            }
            if line.trim().is_empty() && idx > 0 && lines[idx - 1].trim().is_empty() {
                break;
            }
            context.push(line.to_string());
        }
        context.reverse();
        context
    }

    fn collect_context_after(&self, lines: &[&str], from: usize) -> Vec<String> {
        let mut context = Vec::new();
        let end = from.saturating_add(self.context_after).min(lines.len());
        for idx in from..end {
            let line = lines[idx];
            if RE_TIMESTAMPED_ERROR.is_match(line) {
                break;
            }
            if line.trim().is_empty() && lines.get(idx + 1).is_some_and(|l| l.trim().is_empty()) {
                break;
            }
            context.push(line.to_string());
        }
        context
    }
}

/// A line belongs to an open traceback if it shares the opener's timestamp
/// (same module, or any non-INFO/DEBUG/WARNING line), is indented, or is a
/// stack frame.
fn is_continuation(line: &str, timestamp: Option<&str>, module_prefix: Option<&str>) -> bool {
    if timestamp.is_some_and(|ts| line.contains(ts)) {
        return module_prefix.is_some_and(|m| line.contains(m)) || !RE_QUIET_LEVEL.is_match(line);
    }
    line.starts_with("    ") || line.starts_with('\t') || RE_STACK_FRAME.is_match(line)
}

/// Character count of `lines` joined with newlines.
fn joined_len(lines: &[&str]) -> usize {
    let chars: usize = lines.iter().map(|l| l.chars().count()).sum();
    chars + lines.len().saturating_sub(1)
}

/// Pieces of a traceback seen out of context; these never open a block.
fn is_traceback_fragment(line: &str) -> bool {
    let head: String = line.chars().take(100).collect();
    head.contains("File \"") || head.contains("Traceback") || RE_FRAGMENT.is_match(line)
}

/// Timestamp of a line, `YYYY-MM-DD[T ]HH:MM:SS` precision.
pub fn parse_timestamp(line: &str) -> Option<NaiveDateTime> {
    let raw = RE_TIMESTAMP.find(line)?.as_str().replacen('T', " ", 1);
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%d %H:%M:%S").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use podlog_core::PodCategory;

    fn pod() -> PodDescriptor {
        PodDescriptor {
            name: "octavia-worker-0".into(),
            service: "octavia".into(),
            category: PodCategory::Service,
        }
    }

    fn extract(text: &str) -> Vec<ErrorBlock> {
        ErrorExtractor::with_defaults().extract(text, &pod())
    }

    #[test]
    fn test_single_structured_error() {
        let blocks = extract("2025-01-01 10:00:00.123 4 ERROR mod.x boom");
        assert_eq!(blocks.len(), 1);
        let b = &blocks[0];
        assert_eq!(b.severity, Severity::Error);
        assert!(!b.has_traceback);
        assert_eq!(b.raw_text, "2025-01-01 10:00:00.123 4 ERROR mod.x boom");
        assert_eq!(b.normalized_text, "<TIMESTAMP> 4 ERROR mod.x boom");
        assert_eq!(b.timestamp, parse_timestamp("2025-01-01 10:00:00"));
        assert_eq!(b.pod_name, "octavia-worker-0");
        assert_eq!(b.service, "octavia");
    }

    #[test]
    fn test_traceback_is_one_block() {
        let text = "\
2025-01-01 10:00:00.123 4 ERROR octavia.worker Traceback (most recent call last):
2025-01-01 10:00:00.123 4 ERROR octavia.worker   File \"/x.py\", line 1, in f
2025-01-01 10:00:00.123 4 ERROR octavia.worker     do()
2025-01-01 10:00:00.123 4 ERROR octavia.worker   File \"/y.py\", line 2, in do
2025-01-01 10:00:00.123 4 ERROR octavia.worker ValueError: bad
2025-01-01 10:00:01.000 4 INFO octavia.api request handled";
        let blocks = extract(text);
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].has_traceback);
        assert_eq!(blocks[0].raw_text.lines().count(), 5);
        assert!(blocks[0].raw_text.ends_with("ValueError: bad"));
        assert_eq!(blocks[0].context_after, vec!["2025-01-01 10:00:01.000 4 INFO octavia.api request handled"]);
    }

    #[test]
    fn test_traceback_stops_at_info_with_same_timestamp() {
        let text = "\
2025-01-01 10:00:00.123 4 ERROR octavia.worker Traceback (most recent call last):
2025-01-01 10:00:00.123 4 ERROR octavia.worker ValueError: bad
2025-01-01 10:00:00.123 4 INFO octavia.api request handled";
        let blocks = extract(text);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].raw_text.lines().count(), 2);
    }

    #[test]
    fn test_traceback_absorbs_same_timestamp_non_quiet_line() {
        let text = "\
2025-01-01 10:00:00.123 4 ERROR nova.compute Traceback (most recent call last):
    File \"a.py\", line 1

2025-01-01 10:00:00.123 4 ERROR nova.virt RuntimeError: boom";
        let blocks = extract(text);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].raw_text.lines().count(), 3);
        assert!(blocks[0].raw_text.contains("nova.virt"));
    }

    #[test]
    fn test_double_blank_separates_blocks() {
        let text = "\
2025-01-01 10:00:00.123 4 ERROR nova.compute Traceback (most recent call last):
    File \"a.py\", line 1


2025-01-01 10:00:00.123 4 ERROR nova.virt RuntimeError: boom";
        let blocks = extract(text);
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].has_traceback);
        assert_eq!(blocks[0].raw_text.lines().count(), 2);
        assert!(!blocks[1].has_traceback);
        assert!(blocks[1].raw_text.contains("RuntimeError"));
    }

    #[test]
    fn test_traceback_line_cap() {
        let mut text = String::from("Traceback (most recent call last):\n");
        for n in 0..300 {
            text.push_str(&format!("    at frame {n}\n"));
        }
        let blocks = extract(&text);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].raw_text.lines().count(), 200);
    }

    #[test]
    fn test_unstructured_traceback_without_timestamp() {
        let text = "\
Traceback (most recent call last):
  File \"/usr/lib/python3/tempest/test_lb.py\", line 10, in test_create
    self.assertEqual(1, 2)
AssertionError: 1 != 2
2025-01-01 10:00:05.000 4 INFO tempest.lib next test";
        let blocks = extract(text);
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].has_traceback);
        assert_eq!(blocks[0].timestamp, None);
        assert_eq!(blocks[0].raw_text.lines().count(), 4);
    }

    #[test]
    fn test_standalone_with_continuation_lines() {
        let text = "\
2025-01-01 10:00:00.123 4 ERROR neutron.agent Failed to bind port
detail line one
detail line two
2025-01-01 10:00:01.000 4 INFO neutron.agent ok";
        let blocks = extract(text);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].raw_text.lines().count(), 3);
        assert!(!blocks[0].has_traceback);
    }

    #[test]
    fn test_standalone_stops_at_blank_line() {
        let text = "FATAL: disk failure on /dev/sda\n\nunrelated chatter";
        let blocks = extract(text);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].raw_text, "FATAL: disk failure on /dev/sda");
    }

    #[test]
    fn test_standalone_line_cap() {
        let mut text = String::from("ERROR: something went badly wrong here\n");
        for n in 0..80 {
            text.push_str(&format!("detail {n}\n"));
        }
        let blocks = extract(&text);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].raw_text.lines().count(), 50);
    }

    #[test]
    fn test_short_standalone_dropped() {
        assert!(extract("ERROR: x").is_empty());
        // exactly at the threshold is still noise
        assert!(extract("ERROR: 1234567890123").is_empty());
        assert_eq!(extract("ERROR: 12345678901234").len(), 1);
    }

    #[test]
    fn test_short_traceback_kept() {
        let blocks = extract("Traceback (most recent call last)");
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].has_traceback);
    }

    #[test]
    fn test_fragments_do_not_open_blocks() {
        let text = "\
some chatter
    raise ConnectionError(\"refused by upstream server\")
Traceback summary: ERROR persisted for 3 retries";
        assert!(extract(text).is_empty());
    }

    #[test]
    fn test_keyword_late_in_line_ignored() {
        let text = "2025-01-01 10:00:00.123 4 INFO nova.api finished processing request, no error seen";
        assert!(extract(text).is_empty());
    }

    #[test]
    fn test_test_runner_failure() {
        let text = "\
{0} tempest.api.test_lb [1.2s] ... FAILED
Traceback (most recent call last):
  File \"/usr/lib/python3/tempest/test_lb.py\", line 10, in test_create
AssertionError: 1 != 2

Ran 1 tests";
        let blocks = extract(text);
        assert_eq!(blocks.len(), 1);
        assert!(!blocks[0].has_traceback);
        assert!(blocks[0].raw_text.contains("AssertionError"));
    }

    #[test]
    fn test_critical_severity() {
        let blocks = extract("2025-01-01 10:00:00.123 4 CRITICAL nova.compute hypervisor gone");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].severity, Severity::Critical);
    }

    #[test]
    fn test_block_order_follows_source() {
        let text = "\
2025-01-01 10:00:00.123 4 ERROR a.first first failure happened
2025-01-01 10:00:01.123 4 INFO a.mid fine
2025-01-01 10:00:02.123 4 ERROR a.second second failure happened";
        let blocks = extract(text);
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].raw_text.contains("first failure"));
        assert!(blocks[1].raw_text.contains("second failure"));
    }

    #[test]
    fn test_context_lines() {
        let text = "\
2025-01-01 09:59:58.000 4 ERROR nova.api earlier failure we ignore
2025-01-01 09:59:59.000 4 INFO nova.api preparing
2025-01-01 09:59:59.500 4 DEBUG nova.api calling placement
2025-01-01 10:00:00.123 4 ERROR nova.api Unable to reach placement
2025-01-01 10:00:01.000 4 INFO nova.api retrying";
        let blocks = extract(text);
        assert_eq!(blocks.len(), 2);
        let b = &blocks[1];
        assert_eq!(b.context_before.len(), 2);
        assert!(b.context_before[0].ends_with("preparing"));
        assert_eq!(b.context_after.len(), 1);
        assert!(!b.raw_text.contains("preparing"));
    }

    #[test]
    fn test_context_disabled() {
        let config = ErrorConfig {
            context_lines_before: 0,
            context_lines_after: 0,
            ..ErrorConfig::default()
        };
        let text = "\
2025-01-01 09:59:59.000 4 INFO nova.api preparing
2025-01-01 10:00:00.123 4 ERROR nova.api Unable to reach placement
2025-01-01 10:00:01.000 4 INFO nova.api retrying";
        let blocks = ErrorExtractor::new(&config).extract(text, &pod());
        assert!(blocks[0].context_before.is_empty());
        assert!(blocks[0].context_after.is_empty());
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let text = "\
2025-01-01 10:00:00.123 4 ERROR octavia.worker Traceback (most recent call last):
2025-01-01 10:00:00.123 4 ERROR octavia.worker ValueError: bad
2025-01-01 10:00:03.000 4 ERROR octavia.worker Amphora 10.0.0.4 unreachable";
        assert_eq!(extract(text), extract(text));
    }

    #[test]
    fn test_parse_timestamp_t_separator() {
        let a = parse_timestamp("2025-03-04T05:06:07.891 x");
        let b = parse_timestamp("2025-03-04 05:06:07 y");
        assert!(a.is_some());
        assert_eq!(a, b);
        assert_eq!(parse_timestamp("no time here"), None);
    }
}
