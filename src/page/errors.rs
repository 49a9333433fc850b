//! Page and transaction error types
//!
//! Error codes:
//! - REV_PAGE_FORMAT (FATAL severity)
//! - REV_PAGE_STORAGE (ERROR severity, FATAL when the storage error is)
//! - REV_KEY_OUT_OF_RANGE (ERROR severity, also for unallocated index numbers)
//! - REV_WRITER_BUSY (ERROR severity)
//! - REV_REVISION_NOT_FOUND (ERROR severity)
//! - REV_DANGLING_REFERENCE (FATAL severity)

use std::fmt;

use crate::storage::{Severity, StorageError};

/// Page-layer error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageErrorCode {
    /// Unknown page tag or malformed page payload
    RevPageFormat,
    /// The storage backend failed underneath a page operation
    RevPageStorage,
    /// Record key outside the allocated key space of an index tree
    RevKeyOutOfRange,
    /// A write transaction is already open on the resource
    RevWriterBusy,
    /// Requested revision was never published
    RevRevisionNotFound,
    /// A reference points at neither a durable page nor a logged one
    RevDanglingReference,
}

impl PageErrorCode {
    /// Returns the stable string code
    pub fn code(&self) -> &'static str {
        match self {
            PageErrorCode::RevPageFormat => "REV_PAGE_FORMAT",
            PageErrorCode::RevPageStorage => "REV_PAGE_STORAGE",
            PageErrorCode::RevKeyOutOfRange => "REV_KEY_OUT_OF_RANGE",
            PageErrorCode::RevWriterBusy => "REV_WRITER_BUSY",
            PageErrorCode::RevRevisionNotFound => "REV_REVISION_NOT_FOUND",
            PageErrorCode::RevDanglingReference => "REV_DANGLING_REFERENCE",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            PageErrorCode::RevPageFormat => Severity::Fatal,
            PageErrorCode::RevDanglingReference => Severity::Fatal,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for PageErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Page error with context
#[derive(Debug)]
pub struct PageError {
    code: PageErrorCode,
    message: String,
    source: Option<StorageError>,
}

impl PageError {
    /// Malformed page bytes (FATAL)
    pub fn format(message: impl Into<String>) -> Self {
        Self {
            code: PageErrorCode::RevPageFormat,
            message: message.into(),
            source: None,
        }
    }

    /// Page tag with no registered kind (FATAL)
    pub fn unknown_tag(tag: u8) -> Self {
        Self::format(format!("Unknown page tag: {}", tag))
    }

    /// Storage failure underneath a page operation
    pub fn storage(context: impl Into<String>, source: StorageError) -> Self {
        Self {
            code: PageErrorCode::RevPageStorage,
            message: format!("{}: {}", context.into(), source),
            source: Some(source),
        }
    }

    /// Key beyond the allocated key space
    pub fn key_out_of_range(key: u64, next_key: u64) -> Self {
        Self {
            code: PageErrorCode::RevKeyOutOfRange,
            message: format!(
                "Record key {} is outside the allocated key space (next key {})",
                key, next_key
            ),
            source: None,
        }
    }

    /// Index number that would leave a gap in the dense index numbering
    pub fn index_out_of_range(index_number: u32, next_index: usize) -> Self {
        Self {
            code: PageErrorCode::RevKeyOutOfRange,
            message: format!(
                "Index number {} is not allocated (next index number {})",
                index_number, next_index
            ),
            source: None,
        }
    }

    /// Second writer on the same resource
    pub fn writer_busy(resource: impl Into<String>) -> Self {
        Self {
            code: PageErrorCode::RevWriterBusy,
            message: format!(
                "A write transaction is already open on resource '{}'",
                resource.into()
            ),
            source: None,
        }
    }

    pub fn revision_not_found(revision: u32, latest: Option<u32>) -> Self {
        let latest = match latest {
            Some(r) => r.to_string(),
            None => "none".to_string(),
        };
        Self {
            code: PageErrorCode::RevRevisionNotFound,
            message: format!("Revision {} not found (latest: {})", revision, latest),
            source: None,
        }
    }

    /// Reference with neither offset nor log key (FATAL)
    pub fn dangling(context: impl Into<String>) -> Self {
        Self {
            code: PageErrorCode::RevDanglingReference,
            message: format!("Dangling page reference: {}", context.into()),
            source: None,
        }
    }

    pub fn code(&self) -> PageErrorCode {
        self.code
    }

    /// Storage corruption surfaces as FATAL too
    pub fn severity(&self) -> Severity {
        match &self.source {
            Some(source) if source.is_fatal() => Severity::Fatal,
            _ => self.code.severity(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }

    pub fn storage_error(&self) -> Option<&StorageError> {
        self.source.as_ref()
    }
}

impl fmt::Display for PageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity(), self.code.code(), self.message)
    }
}

impl std::error::Error for PageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Result type for page and transaction operations
pub type PageResult<T> = Result<T, PageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(PageErrorCode::RevPageFormat.code(), "REV_PAGE_FORMAT");
        assert_eq!(PageErrorCode::RevKeyOutOfRange.code(), "REV_KEY_OUT_OF_RANGE");
        assert_eq!(PageErrorCode::RevWriterBusy.code(), "REV_WRITER_BUSY");
        assert_eq!(PageErrorCode::RevRevisionNotFound.code(), "REV_REVISION_NOT_FOUND");
    }

    #[test]
    fn test_unknown_tag_is_fatal() {
        let err = PageError::unknown_tag(7);
        assert!(err.is_fatal());
        assert!(err.to_string().contains("Unknown page tag: 7"));
    }

    #[test]
    fn test_storage_corruption_propagates_fatal() {
        let err = PageError::storage("read", StorageError::data_corruption("bad crc"));
        assert_eq!(err.code(), PageErrorCode::RevPageStorage);
        assert!(err.is_fatal());
        assert!(err.storage_error().is_some());
    }

    #[test]
    fn test_range_error_is_not_fatal() {
        let err = PageError::key_out_of_range(11, 11);
        assert!(!err.is_fatal());
        assert!(err.message().contains("next key 11"));
    }
}
