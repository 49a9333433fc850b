//! Shared page store of one resource
//!
//! Owns the storage backend, the page cache and the single-writer flag.
//! Transactions hold an `Arc<PageStore>`; the store itself holds no
//! per-transaction state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::observability::{log_event_with_fields, Event, StoreMetrics};
use crate::page::{CacheStats, Page, PageCache, PageError, PageReference, PageResult, RootPage};
use crate::storage::{PageStorage, RootPointer, StorageError};

use super::descent::{leaf_reference, PageRef, PageSource};
use super::read::PageReadTrx;
use super::write::PageWriteTrx;

/// Default upper bound on cached pages
pub const DEFAULT_CACHE_ENTRIES: usize = 4096;

/// Records whose encoding exceeds this many bytes go to overflow pages
pub const DEFAULT_INLINE_RECORD_LIMIT: usize = 2048;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOptions {
    pub cache_max_entries: usize,
    pub inline_record_limit: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            cache_max_entries: DEFAULT_CACHE_ENTRIES,
            inline_record_limit: DEFAULT_INLINE_RECORD_LIMIT,
        }
    }
}

pub struct PageStore {
    name: String,
    storage: Mutex<Box<dyn PageStorage>>,
    cache: PageCache,
    writer_active: AtomicBool,
    options: StoreOptions,
    metrics: StoreMetrics,
}

impl PageStore {
    pub fn new(name: impl Into<String>, storage: Box<dyn PageStorage>, options: StoreOptions) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            storage: Mutex::new(storage),
            cache: PageCache::new(options.cache_max_entries),
            writer_active: AtomicBool::new(false),
            options,
            metrics: StoreMetrics::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    pub fn metrics(&self) -> &StoreMetrics {
        &self.metrics
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Wraps a storage failure, logging it when it signals corruption.
    pub(crate) fn storage_error(&self, context: String, error: StorageError) -> PageError {
        if error.is_fatal() {
            let message = error.to_string();
            log_event_with_fields(
                Event::PageCorruption,
                &[("resource", self.name.as_str()), ("error", message.as_str())],
            );
        }
        PageError::storage(context, error)
    }

    /// Reads and decodes the page at `offset` without touching the cache.
    pub(crate) fn read_page(&self, offset: u64) -> PageResult<Page> {
        let bytes = self
            .storage
            .lock()
            .read(offset)
            .map_err(|e| self.storage_error(format!("Failed to read page at offset {}", offset), e))?;
        self.metrics.increment_pages_read();

        Page::decode(&bytes).map_err(|e| {
            let message = e.to_string();
            let offset = offset.to_string();
            log_event_with_fields(
                Event::PageCorruption,
                &[
                    ("error", message.as_str()),
                    ("offset", offset.as_str()),
                    ("resource", self.name.as_str()),
                ],
            );
            e
        })
    }

    /// Published page at `offset`, shared through the cache.
    pub fn load(&self, offset: u64) -> PageResult<Arc<Page>> {
        if let Some(page) = self.cache.get(offset) {
            return Ok(page);
        }
        let page = self.read_page(offset)?;
        Ok(self.cache.insert(offset, Arc::new(page)))
    }

    pub fn root_pointer(&self) -> PageResult<Option<RootPointer>> {
        self.storage
            .lock()
            .read_root_pointer()
            .map_err(|e| self.storage_error("Failed to read root pointer".to_string(), e))
    }

    /// Latest published revision, `None` before the first commit.
    pub fn latest_revision(&self) -> PageResult<Option<u32>> {
        Ok(self.root_pointer()?.map(|p| p.revision))
    }

    /// Published root-of-everything page.
    pub(crate) fn load_root(&self) -> PageResult<Option<(RootPointer, RootPage)>> {
        let Some(pointer) = self.root_pointer()? else {
            return Ok(None);
        };
        let page = self.load(pointer.root_page_offset)?;
        match &*page {
            Page::Root(root) => Ok(Some((pointer, root.clone()))),
            other => Err(PageError::format(format!(
                "Root pointer references a {} page",
                other.kind()
            ))),
        }
    }

    /// Revision root of `revision` in the published state.
    pub fn load_revision_root(&self, revision: u32) -> PageResult<Arc<Page>> {
        let Some((_, root)) = self.load_root()? else {
            return Err(PageError::revision_not_found(revision, None));
        };
        if revision >= root.revision_count() {
            return Err(PageError::revision_not_found(revision, root.latest_revision()));
        }

        let reference = if Some(revision) == root.latest_revision() {
            root.latest().clone()
        } else {
            leaf_reference(self, root.revisions(), u64::from(revision))?.ok_or_else(|| {
                PageError::dangling(format!("revision {} missing from revisions tree", revision))
            })?
        };

        let page = self
            .resolve(&reference)?
            .ok_or_else(|| PageError::dangling(format!("revision root {}", revision)))?;
        match &*page {
            Page::RevisionRoot(rr) if rr.revision() == revision => {}
            Page::RevisionRoot(rr) => {
                return Err(PageError::format(format!(
                    "Revision tree slot {} holds revision {}",
                    revision,
                    rr.revision()
                )))
            }
            other => {
                return Err(PageError::format(format!(
                    "Expected revision root, found {}",
                    other.kind()
                )))
            }
        }
        match page {
            PageRef::Shared(page) => Ok(page),
            PageRef::Logged(page) => Ok(Arc::new(page.clone())),
        }
    }

    /// Read transaction on `revision`, or on the latest revision.
    pub fn begin_read(self: &Arc<Self>, revision: Option<u32>) -> PageResult<PageReadTrx> {
        let revision = match revision {
            Some(r) => r,
            None => self
                .latest_revision()?
                .ok_or_else(|| PageError::revision_not_found(0, None))?,
        };
        let revision_root = self.load_revision_root(revision)?;
        self.metrics.increment_read_trx();
        PageReadTrx::new(Arc::clone(self), revision_root)
    }

    /// Opens the single write transaction.
    ///
    /// Fails with `REV_WRITER_BUSY` while another writer is open.
    pub fn begin_write(self: &Arc<Self>) -> PageResult<PageWriteTrx> {
        if self
            .writer_active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            log_event_with_fields(Event::WriterBusy, &[("resource", self.name.as_str())]);
            return Err(PageError::writer_busy(&self.name));
        }
        let guard = WriterGuard {
            store: Arc::clone(self),
        };

        let base = match self.load_root()? {
            Some((_, root)) => {
                let latest = root.latest_revision().ok_or_else(|| {
                    PageError::format("Published root page has no revisions")
                })?;
                let revision_root = self.load_revision_root(latest)?;
                Some((root, revision_root))
            }
            None => None,
        };
        PageWriteTrx::new(guard, base)
    }

    pub fn is_writer_active(&self) -> bool {
        self.writer_active.load(Ordering::Acquire)
    }

    pub(crate) fn with_storage<T>(&self, f: impl FnOnce(&mut dyn PageStorage) -> T) -> T {
        let mut storage = self.storage.lock();
        f(storage.as_mut())
    }
}

impl PageSource for PageStore {
    fn resolve(&self, reference: &PageReference) -> PageResult<Option<PageRef<'_>>> {
        if let Some(offset) = reference.offset() {
            return Ok(Some(PageRef::Shared(self.load(offset)?)));
        }
        match reference.log_key() {
            Some(key) => Err(PageError::dangling(format!(
                "{} is not visible outside its write transaction",
                key
            ))),
            None => Ok(None),
        }
    }
}

/// Holds the single-writer flag; releasing happens on drop.
pub(crate) struct WriterGuard {
    pub(crate) store: Arc<PageStore>,
}

impl Drop for WriterGuard {
    fn drop(&mut self) {
        self.store.writer_active.store(false, Ordering::Release);
    }
}
