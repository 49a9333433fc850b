//! Page references
//!
//! A reference lives in a parent page and points at a child page in one of
//! two places: the durable page storage (`offset`) or the transaction log of
//! the open write transaction (`log_key`). Only the offset is persisted; a
//! reference still carrying a log key cannot be encoded.

use std::fmt;

use super::codec::{PageDecoder, PageEncoder};
use super::errors::{PageError, PageResult};

/// Slot of a dirty page in a transaction log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LogKey(pub u64);

impl fmt::Display for LogKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "log#{}", self.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageReference {
    offset: Option<u64>,
    log_key: Option<LogKey>,
}

impl PageReference {
    /// Reference to nothing yet
    pub fn null() -> Self {
        Self::default()
    }

    /// Reference to a published page
    pub fn durable(offset: u64) -> Self {
        Self {
            offset: Some(offset),
            log_key: None,
        }
    }

    /// Reference to a page owned by the current write transaction
    pub fn logged(key: LogKey) -> Self {
        Self {
            offset: None,
            log_key: Some(key),
        }
    }

    pub fn is_null(&self) -> bool {
        self.offset.is_none() && self.log_key.is_none()
    }

    pub fn offset(&self) -> Option<u64> {
        self.offset
    }

    pub fn log_key(&self) -> Option<LogKey> {
        self.log_key
    }

    /// Records where the flushed page landed and drops the log slot.
    pub fn mark_flushed(&mut self, offset: u64) {
        self.offset = Some(offset);
        self.log_key = None;
    }

    pub(crate) fn encode(&self, enc: &mut PageEncoder) -> PageResult<()> {
        if let Some(key) = self.log_key {
            return Err(PageError::dangling(format!(
                "reference to unflushed page {} cannot be encoded",
                key
            )));
        }
        enc.put_opt_u64(self.offset);
        Ok(())
    }

    pub(crate) fn decode(dec: &mut PageDecoder<'_>) -> PageResult<Self> {
        Ok(Self {
            offset: dec.get_opt_u64()?,
            log_key: None,
        })
    }
}
