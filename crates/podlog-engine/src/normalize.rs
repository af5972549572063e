use std::sync::LazyLock;

use regex::Regex;

static RE_ISO_TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}(\.\d+)?([+-]\d{2}:\d{2}|Z)?").unwrap()
});
static RE_APACHE_TIMESTAMP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{2}/[A-Za-z]{3}/\d{4}:\d{2}:\d{2}:\d{2}").unwrap());
static RE_UUID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}").unwrap()
});
static RE_REQUEST_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)req-[0-9a-f-]+").unwrap());
static RE_IP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}(:\d+)?\b").unwrap());
static RE_NUMERIC_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bid[:=]\s*\d+\b").unwrap());
static RE_ADDR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"0x[0-9a-fA-F]+").unwrap());
static RE_WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Rewrites volatile substrings (timestamps, UUIDs, request ids, IPs,
/// numeric ids, memory addresses) to stable placeholders and collapses
/// whitespace, so that two occurrences of the same error compare equal.
pub fn normalize(text: &str) -> String {
    let s = RE_ISO_TIMESTAMP.replace_all(text, "<TIMESTAMP>");
    let s = RE_APACHE_TIMESTAMP.replace_all(&s, "<TIMESTAMP>");
    let s = RE_UUID.replace_all(&s, "<UUID>");
    let s = RE_REQUEST_ID.replace_all(&s, "<REQ-ID>");
    let s = RE_IP.replace_all(&s, "<IP>");
    let s = RE_NUMERIC_ID.replace_all(&s, "id=<ID>");
    let s = RE_ADDR.replace_all(&s, "<ADDR>");
    let s = RE_WHITESPACE.replace_all(&s, " ");
    s.trim().to_string()
}
