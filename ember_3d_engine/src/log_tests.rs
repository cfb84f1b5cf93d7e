//! Unit tests for log.rs
//!
//! Tests LogSeverity ordering, LogEntry and the plain formatting of DefaultLogger.

use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};
use std::time::SystemTime;

fn entry(severity: LogSeverity, file: Option<&'static str>, line: Option<u32>) -> LogEntry {
    LogEntry {
        severity,
        timestamp: SystemTime::now(),
        source: "ember3d::tests".to_string(),
        message: "fence signaled".to_string(),
        file,
        line,
    }
}

// ============================================================================
// LOG SEVERITY TESTS
// ============================================================================

#[test]
fn test_log_severity_ordering() {
    assert!(LogSeverity::Trace < LogSeverity::Debug);
    assert!(LogSeverity::Debug < LogSeverity::Info);
    assert!(LogSeverity::Info < LogSeverity::Warn);
    assert!(LogSeverity::Warn < LogSeverity::Error);
}

#[test]
fn test_log_severity_labels_are_fixed_width() {
    for severity in [
        LogSeverity::Trace,
        LogSeverity::Debug,
        LogSeverity::Info,
        LogSeverity::Warn,
        LogSeverity::Error,
    ] {
        assert_eq!(severity.label().len(), 5);
    }
}

// ============================================================================
// DEFAULT LOGGER TESTS
// ============================================================================

#[test]
fn test_format_plain_without_location() {
    let line = DefaultLogger::format_plain(&entry(LogSeverity::Info, None, None));
    assert!(line.contains("[INFO ]"));
    assert!(line.contains("[ember3d::tests]"));
    assert!(line.ends_with("fence signaled"));
}

#[test]
fn test_format_plain_with_location() {
    let line = DefaultLogger::format_plain(&entry(LogSeverity::Error, Some("graph.rs"), Some(12)));
    assert!(line.contains("[ERROR]"));
    assert!(line.ends_with("(graph.rs:12)"));
}

#[test]
fn test_format_plain_ignores_partial_location() {
    let line = DefaultLogger::format_plain(&entry(LogSeverity::Warn, Some("graph.rs"), None));
    assert!(!line.contains("graph.rs"));
}

#[test]
fn test_default_logger_does_not_panic() {
    let logger = DefaultLogger;
    logger.log(&entry(LogSeverity::Trace, None, None));
    logger.log(&entry(LogSeverity::Error, Some("frame.rs"), Some(7)));
}
