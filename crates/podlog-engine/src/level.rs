use std::sync::LazyLock;

use podlog_config::ErrorConfig;
use regex::Regex;

/// Built-in error keywords, matched case-insensitively against the start of
/// a line. Order is irrelevant to the result but kept stable for display.
pub const DEFAULT_ERROR_KEYWORDS: &[&str] = &[
    // severity words
    "ERROR", "CRITICAL", "FATAL", "PANIC", "FAIL", "FAILED",
    // exception indicators
    "EXCEPTION", "TRACEBACK", "RAISE", "THROWN",
    // connectivity
    "TIMEOUT", "TIMED OUT", "REFUSED", "UNREACHABLE", "DISCONNECT",
    "CONNECTION", "CLOSED", "BROKEN PIPE", "RESET", "ABORT",
    // python exceptions
    "KEYERROR", "VALUEERROR", "ATTRIBUTEERROR", "TYPEERROR",
    "INDEXERROR", "IMPORTERROR", "RUNTIMEERROR", "MEMORYERROR",
    "OSERROR", "IOERROR", "ASSERTIONERROR",
    // java exceptions
    "NULLPOINTEREXCEPTION", "OUTOFMEMORYERROR", "STACKOVERFLOWERROR",
    "ILLEGALARGUMENTEXCEPTION", "CLASSNOTFOUNDEXCEPTION",
    // system and resources
    "CRASH", "HUNG", "DEADLOCK", "CORRUPT", "SEGFAULT",
    "CORE DUMP", "OOM", "OUT OF MEMORY",
    // access
    "DENIED", "FORBIDDEN", "UNAUTHORIZED", "PERMISSION",
    // availability
    "UNAVAILABLE", "DOWN", "OFFLINE",
    // database
    "ROLLBACK", "CONSTRAINT", "INTEGRITY",
    // validation
    "INVALID", "MALFORMED", "UNEXPECTED",
    // http
    "HTTP 4", "HTTP 5", "STATUS 4", "STATUS 5",
    "500 ", "502 ", "503 ", "504 ",
];

/// `timestamp PID LEVEL module` with LEVEL in {ERROR, CRITICAL}.
static RE_STRUCTURED_ERROR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}[.,]\d+\s+\d+\s+(ERROR|CRITICAL)\s+")
        .unwrap()
});

static RE_TIMESTAMP_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}").unwrap());

/// True if the line starts a new timestamped log entry.
pub fn starts_with_timestamp(line: &str) -> bool {
    RE_TIMESTAMP_PREFIX.is_match(line)
}

/// True if the structured level field of the line is ERROR or CRITICAL.
/// Level words appearing later in the message do not count.
pub fn is_structured_error(line: &str) -> bool {
    RE_STRUCTURED_ERROR.is_match(line)
}

/// Two-tier error line detector: a strict structured-prefix match, or an
/// error keyword within the first few characters of the line.
#[derive(Debug, Clone)]
pub struct LevelDetector {
    keywords: Vec<String>,
    prefix_chars: usize,
}

impl LevelDetector {
    pub fn new(keywords: impl IntoIterator<Item = impl AsRef<str>>, prefix_chars: usize) -> Self {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().to_uppercase())
                .collect(),
            prefix_chars,
        }
    }

    pub fn from_config(config: &ErrorConfig) -> Self {
        match config.keywords {
            Some(ref keywords) => Self::new(keywords, config.keyword_prefix_chars),
            None => Self::new(DEFAULT_ERROR_KEYWORDS, config.keyword_prefix_chars),
        }
    }

    pub fn with_defaults() -> Self {
        Self::from_config(&ErrorConfig::default())
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// Keyword scan restricted to the line prefix.
    pub fn has_keyword_in_prefix(&self, line: &str) -> bool {
        let prefix: String = line.chars().take(self.prefix_chars).collect();
        let prefix = prefix.to_uppercase();
        self.keywords.iter().any(|k| prefix.contains(k.as_str()))
    }

    pub fn is_error_line(&self, line: &str) -> bool {
        is_structured_error(line) || self.has_keyword_in_prefix(line)
    }
}
