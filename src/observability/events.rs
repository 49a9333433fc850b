//! Observable events
//!
//! Events are explicit and typed. Every log line emitted by the storage core
//! carries one of these names.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Database / resource lifecycle
    DatabaseCreated,
    DatabaseOpened,
    ResourceCreated,
    ResourceOpened,
    ResourceBootstrapped,

    // Configuration
    ConfigLoaded,

    // Transactions
    ReadTrxBegin,
    WriteTrxBegin,
    WriteTrxAbort,
    WriterBusy,

    // Commit path
    CommitFlushComplete,
    CommitPublished,
    CommitFailed,

    // Labels
    LabelsRecomputed,

    // Verification
    VerifyBegin,
    VerifyComplete,
    /// Checksum or page format failure (FATAL)
    PageCorruption,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::DatabaseCreated => "DATABASE_CREATED",
            Event::DatabaseOpened => "DATABASE_OPENED",
            Event::ResourceCreated => "RESOURCE_CREATED",
            Event::ResourceOpened => "RESOURCE_OPENED",
            Event::ResourceBootstrapped => "RESOURCE_BOOTSTRAPPED",

            Event::ConfigLoaded => "CONFIG_LOADED",

            Event::ReadTrxBegin => "READ_TRX_BEGIN",
            Event::WriteTrxBegin => "WRITE_TRX_BEGIN",
            Event::WriteTrxAbort => "WRITE_TRX_ABORT",
            Event::WriterBusy => "WRITER_BUSY",

            Event::CommitFlushComplete => "COMMIT_FLUSH_COMPLETE",
            Event::CommitPublished => "COMMIT_PUBLISHED",
            Event::CommitFailed => "COMMIT_FAILED",

            Event::LabelsRecomputed => "LABELS_RECOMPUTED",

            Event::VerifyBegin => "VERIFY_BEGIN",
            Event::VerifyComplete => "VERIFY_COMPLETE",
            Event::PageCorruption => "PAGE_CORRUPTION",
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Event::PageCorruption)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_events_have_string_representation() {
        let events = [
            Event::DatabaseCreated,
            Event::DatabaseOpened,
            Event::ResourceCreated,
            Event::ResourceOpened,
            Event::ResourceBootstrapped,
            Event::ConfigLoaded,
            Event::ReadTrxBegin,
            Event::WriteTrxBegin,
            Event::WriteTrxAbort,
            Event::WriterBusy,
            Event::CommitFlushComplete,
            Event::CommitPublished,
            Event::CommitFailed,
            Event::LabelsRecomputed,
            Event::VerifyBegin,
            Event::VerifyComplete,
            Event::PageCorruption,
        ];

        for event in events {
            let s = event.as_str();
            assert!(!s.is_empty());
            assert!(s.chars().all(|c| c.is_uppercase() || c == '_'));
        }
    }

    #[test]
    fn test_fatal_events() {
        assert!(Event::PageCorruption.is_fatal());
        assert!(!Event::CommitFailed.is_fatal());
        assert!(!Event::CommitPublished.is_fatal());
    }

    #[test]
    fn test_event_display() {
        assert_eq!(format!("{}", Event::CommitPublished), "COMMIT_PUBLISHED");
    }
}
