//! Structured JSON logger
//!
//! Each line is one JSON object: `event`, then `severity`, then the event's
//! fields sorted by key. ERROR and FATAL lines go to stderr so a failing
//! commit or a corrupt page is visible even when stdout carries CLI output.
//! Lines below `REVTREE_LOG_LEVEL` (default `INFO`) are never formatted.

use std::fmt;
use std::io::{self, Write};
use std::sync::OnceLock;

/// Environment variable holding the minimum severity to emit
pub const LOG_LEVEL_ENV: &str = "REVTREE_LOG_LEVEL";

static THRESHOLD: OnceLock<Severity> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Transaction begin and scope entry
    Trace = 0,
    Info = 1,
    /// A scope was dropped without completing
    Warn = 2,
    /// Commit or verification failed; published state is unchanged
    Error = 3,
    /// Corruption; the resource must not be trusted
    Fatal = 4,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        }
    }

    /// Parses a level name, case-insensitively.
    pub fn parse(name: &str) -> Option<Self> {
        [
            Severity::Trace,
            Severity::Info,
            Severity::Warn,
            Severity::Error,
            Severity::Fatal,
        ]
        .into_iter()
        .find(|s| s.as_str().eq_ignore_ascii_case(name.trim()))
    }

    fn to_stderr(self) -> bool {
        self >= Severity::Error
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Renders one log line, newline included.
pub(crate) fn format_line(severity: Severity, event: &str, fields: &[(&str, &str)]) -> String {
    let mut sorted: Vec<&(&str, &str)> = fields.iter().collect();
    sorted.sort_by_key(|(key, _)| *key);

    let mut line = String::with_capacity(64 + fields.len() * 24);
    line.push_str("{\"event\":");
    push_json_string(&mut line, event);
    line.push_str(",\"severity\":\"");
    line.push_str(severity.as_str());
    line.push('"');
    for (key, value) in sorted {
        line.push(',');
        push_json_string(&mut line, key);
        line.push(':');
        push_json_string(&mut line, value);
    }
    line.push_str("}\n");
    line
}

fn push_json_string(line: &mut String, value: &str) {
    // Serializing a &str cannot fail.
    match serde_json::to_string(value) {
        Ok(quoted) => line.push_str(&quoted),
        Err(_) => line.push_str("\"\""),
    }
}

/// Structured JSON logger writing to stdout (stderr for ERROR and FATAL)
pub struct Logger;

impl Logger {
    /// Minimum severity that is emitted.
    pub fn threshold() -> Severity {
        *THRESHOLD.get_or_init(|| {
            std::env::var(LOG_LEVEL_ENV)
                .ok()
                .and_then(|v| Severity::parse(&v))
                .unwrap_or(Severity::Info)
        })
    }

    pub fn enabled(severity: Severity) -> bool {
        severity >= Self::threshold()
    }

    pub fn log(severity: Severity, event: &str, fields: &[(&str, &str)]) {
        if !Self::enabled(severity) {
            return;
        }
        let line = format_line(severity, event, fields);
        // A lost log line never fails the operation being logged.
        let _ = if severity.to_stderr() {
            io::stderr().lock().write_all(line.as_bytes())
        } else {
            io::stdout().lock().write_all(line.as_bytes())
        };
    }

    pub fn trace(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Trace, event, fields);
    }

    pub fn info(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Info, event, fields);
    }

    pub fn warn(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Warn, event, fields);
    }

    pub fn error(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Error, event, fields);
    }

    pub fn fatal(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Fatal, event, fields);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::Event;

    fn parse(line: &str) -> serde_json::Value {
        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1);
        serde_json::from_str(line).unwrap()
    }

    #[test]
    fn test_severity_ordering_and_routing() {
        assert!(Severity::Trace < Severity::Info);
        assert!(Severity::Warn < Severity::Error);
        assert!(!Severity::Warn.to_stderr());
        assert!(Severity::Error.to_stderr());
        assert!(Severity::Fatal.to_stderr());
    }

    #[test]
    fn test_severity_parse() {
        assert_eq!(Severity::parse("warn"), Some(Severity::Warn));
        assert_eq!(Severity::parse(" FATAL "), Some(Severity::Fatal));
        assert_eq!(Severity::parse("verbose"), None);
    }

    #[test]
    fn test_fatal_always_enabled() {
        assert!(Logger::enabled(Severity::Fatal));
    }

    #[test]
    fn test_commit_line_layout() {
        let line = format_line(
            Severity::Info,
            Event::CommitPublished.as_str(),
            &[("revision", "3"), ("resource", "books"), ("root_offset", "8192")],
        );
        assert_eq!(
            line,
            "{\"event\":\"COMMIT_PUBLISHED\",\"severity\":\"INFO\",\
             \"resource\":\"books\",\"revision\":\"3\",\"root_offset\":\"8192\"}\n"
        );
    }

    #[test]
    fn test_field_order_is_independent_of_input_order() {
        let fields = [("pages", "7"), ("bytes", "4096"), ("revision", "1")];
        let mut reversed = fields;
        reversed.reverse();

        let first = format_line(Severity::Info, Event::CommitFlushComplete.as_str(), &fields);
        let second = format_line(Severity::Info, Event::CommitFlushComplete.as_str(), &reversed);
        assert_eq!(first, second);
        assert!(first.find("bytes").unwrap() < first.find("pages").unwrap());
    }

    #[test]
    fn test_commit_message_is_escaped() {
        let message = "import \"catalog\"\n\tbatch 2\u{1}";
        let line = format_line(
            Severity::Error,
            Event::CommitFailed.as_str(),
            &[("message", message), ("path", "C:\\db\\books")],
        );

        let parsed = parse(&line);
        assert_eq!(parsed["event"], "COMMIT_FAILED");
        assert_eq!(parsed["severity"], "ERROR");
        assert_eq!(parsed["message"], message);
        assert_eq!(parsed["path"], "C:\\db\\books");
    }

    #[test]
    fn test_corruption_line_without_fields() {
        let parsed = parse(&format_line(Severity::Fatal, Event::PageCorruption.as_str(), &[]));
        assert_eq!(parsed.as_object().unwrap().len(), 2);
        assert_eq!(parsed["severity"], "FATAL");
    }
}
