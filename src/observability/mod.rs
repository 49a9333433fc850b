//! Observability
//!
//! - Structured JSON logging with deterministic field order
//! - Typed lifecycle events
//! - Passive counters for the page store
//!
//! Observability never changes what the storage core does: logging and
//! counting cannot fail an operation.
//!
//! ```ignore
//! use revtree::observability::{log_event_with_fields, Event};
//!
//! log_event_with_fields(Event::CommitPublished, &[("revision", "3")]);
//! ```

mod events;
mod logger;
mod metrics;
mod scope;

pub use events::Event;
pub use logger::{Logger, Severity, LOG_LEVEL_ENV};
pub use metrics::{MetricsSnapshot, StoreMetrics};
pub use scope::{ObservationScope, Timer};

fn severity_of(event: Event) -> Severity {
    if event.is_fatal() {
        Severity::Fatal
    } else {
        Severity::Info
    }
}

/// Log a lifecycle event
pub fn log_event(event: Event) {
    log_event_with_fields(event, &[]);
}

/// Log a lifecycle event with fields
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    match severity_of(event) {
        Severity::Fatal => Logger::fatal(event.as_str(), fields),
        severity => Logger::log(severity, event.as_str(), fields),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_severity() {
        assert_eq!(severity_of(Event::PageCorruption), Severity::Fatal);
        assert_eq!(severity_of(Event::CommitPublished), Severity::Info);
    }

    #[test]
    fn test_log_event_with_fields() {
        log_event(Event::ResourceOpened);
        log_event_with_fields(Event::CommitPublished, &[("revision", "1")]);
    }
}
