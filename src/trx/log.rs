//! Transaction log
//!
//! Holds every page the open write transaction has copied or created. Pages
//! in the log are exclusively owned by the writer and invisible to readers;
//! the log is emptied by commit (flush) or discarded by abort.

use std::collections::HashMap;

use crate::page::{LogKey, Page};

#[derive(Debug, Default)]
pub struct TransactionLog {
    pages: HashMap<LogKey, Page>,
    next_key: u64,
}

impl TransactionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a page and returns the key referencing it.
    pub fn put(&mut self, page: Page) -> LogKey {
        let key = LogKey(self.next_key);
        self.next_key += 1;
        self.pages.insert(key, page);
        key
    }

    pub fn get(&self, key: LogKey) -> Option<&Page> {
        self.pages.get(&key)
    }

    pub fn get_mut(&mut self, key: LogKey) -> Option<&mut Page> {
        self.pages.get_mut(&key)
    }

    /// Removes a page for flushing.
    pub fn take(&mut self, key: LogKey) -> Option<Page> {
        self.pages.remove(&key)
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn clear(&mut self) {
        self.pages.clear();
    }
}
