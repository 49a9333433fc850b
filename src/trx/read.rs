//! Read transactions
//!
//! A read transaction is pinned to the revision root it was opened on. It
//! holds that page through an `Arc`, so later commits never change what it
//! sees.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::observability::{log_event_with_fields, Event};
use crate::page::{DataRecord, IndexTree, IndexType, Page, PageError, PageResult, RevisionRootPage, User};

use super::descent::{lookup_record, lookup_tree};
use super::store::PageStore;

pub struct PageReadTrx {
    store: Arc<PageStore>,
    revision_root: Arc<Page>,
}

impl PageReadTrx {
    pub(crate) fn new(store: Arc<PageStore>, revision_root: Arc<Page>) -> PageResult<Self> {
        if !matches!(&*revision_root, Page::RevisionRoot(_)) {
            return Err(PageError::format(format!(
                "Read transaction opened on a {} page",
                revision_root.kind()
            )));
        }
        let trx = Self {
            store,
            revision_root,
        };
        let revision = trx.revision().to_string();
        log_event_with_fields(
            Event::ReadTrxBegin,
            &[("resource", trx.store.name()), ("revision", revision.as_str())],
        );
        Ok(trx)
    }

    pub fn revision_root(&self) -> &RevisionRootPage {
        match &*self.revision_root {
            Page::RevisionRoot(rr) => rr,
            _ => unreachable!("checked when the transaction was opened"),
        }
    }

    pub fn revision(&self) -> u32 {
        self.revision_root().revision()
    }

    pub fn commit_time(&self) -> Option<DateTime<Utc>> {
        self.revision_root().commit_time()
    }

    pub fn commit_message(&self) -> Option<&str> {
        self.revision_root().commit_message()
    }

    pub fn user(&self) -> Option<&User> {
        self.revision_root().user()
    }

    /// Highest node key of the document tree in this revision.
    pub fn max_node_key(&self) -> Option<u64> {
        self.revision_root().max_node_key()
    }

    pub fn tree(&self, index_type: IndexType, index_number: u32) -> PageResult<Option<IndexTree>> {
        lookup_tree(&*self.store, self.revision_root(), index_type, index_number)
    }

    /// Record under `key`; `None` when the key was never written or was
    /// removed in this revision.
    pub fn get(&self, key: u64, index_type: IndexType, index_number: u32) -> PageResult<Option<DataRecord>> {
        let Some(tree) = self.tree(index_type, index_number)? else {
            return Ok(None);
        };
        lookup_record(&*self.store, &tree, key)
    }

    pub fn store(&self) -> &Arc<PageStore> {
        &self.store
    }
}
