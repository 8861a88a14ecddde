//! Structured logging for lokidb
//!
//! Mutations and maintenance tasks (index rebuilds, TTL sweeps, dynamic
//! view rematerialization, adapter round-trips) emit one structured line
//! per event instead of ad-hoc `println!`s. Logging is synchronous, has
//! no buffering, and never changes execution outcome - it is a read-only
//! side channel.

use std::fmt;
use std::io::{self, Write};

/// Severity of a logged event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Fine-grained tracing, e.g. index intersection chosen over full sort.
    Trace,
    /// Normal operation: insert/update/remove, index rebuild, view refresh.
    Info,
    /// Recoverable condition: `getCollection` miss, sampled `checkIndex` failure.
    Warn,
    /// Operation failed and was rejected to the caller.
    Error,
}

impl Severity {
    fn as_str(self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A minimal structured logger writing one JSON object per line.
///
/// Fields are emitted in the order given by the caller, after `severity`
/// and `event`, so output order is deterministic for a fixed call site.
pub struct Logger;

impl Logger {
    /// Logs an informational or trace event to stdout.
    pub fn log(severity: Severity, event: &str, fields: &[(&str, &str)]) {
        Self::write_to(severity, event, fields, &mut io::stdout());
    }

    /// Logs a warning or error event to stderr.
    pub fn log_stderr(severity: Severity, event: &str, fields: &[(&str, &str)]) {
        Self::write_to(severity, event, fields, &mut io::stderr());
    }

    fn write_to<W: Write>(severity: Severity, event: &str, fields: &[(&str, &str)], writer: &mut W) {
        let mut out = String::with_capacity(128);
        out.push('{');
        out.push_str("\"severity\":\"");
        out.push_str(severity.as_str());
        out.push_str("\",\"event\":\"");
        escape_into(event, &mut out);
        out.push('"');
        for (key, value) in fields {
            out.push_str(",\"");
            escape_into(key, &mut out);
            out.push_str("\":\"");
            escape_into(value, &mut out);
            out.push('"');
        }
        out.push('}');
        let _ = writeln!(writer, "{}", out);
    }
}

fn escape_into(s: &str, out: &mut String) {
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ordering() {
        assert!(Severity::Trace < Severity::Info);
        assert!(Severity::Info < Severity::Warn);
        assert!(Severity::Warn < Severity::Error);
    }

    #[test]
    fn escape_handles_quotes() {
        let mut out = String::new();
        escape_into("has \"quotes\" and \\slash", &mut out);
        assert_eq!(out, "has \\\"quotes\\\" and \\\\slash");
    }
}
