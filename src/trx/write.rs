//! Write transactions and commit
//!
//! The single write transaction of a resource builds the next revision in
//! its transaction log. Modifying a record copies the record page and every
//! indirect page above it into the log; pages it does not touch stay shared
//! with the base revision by offset.
//!
//! # Commit
//!
//! 1. Stamp the revision root and link it into the revisions tree
//! 2. Flush the log post-order: overflow pages, then each page after all of
//!    its logged children, the root-of-everything page last
//! 3. Sync the page storage
//! 4. Replace the root pointer (`PreparedCommit::publish`)
//!
//! Until step 4 the published state is untouched; a failure or crash
//! anywhere before it leaves the previous revision as the latest one.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;

use crate::crash_point::{maybe_crash, points};
use crate::observability::{log_event_with_fields, Event, ObservationScope};
use crate::page::{
    leaf_key, slot_index, tree_capacity, DataRecord, IndexTree, IndexType, IndirectPage, LogKey,
    OverflowPage, Page, PageError, PageReference, PageResult, RecordPage, RevisionRootPage,
    RootPage, User, MAX_TREE_DEPTH,
};
use crate::storage::RootPointer;

use super::descent::{lookup_record, lookup_tree, PageRef, PageSource};
use super::log::TransactionLog;
use super::store::{PageStore, WriterGuard};

pub struct PageWriteTrx {
    guard: WriterGuard,
    log: TransactionLog,
    root: RootPage,
    revision_root: RevisionRootPage,
    base_revision: Option<u32>,
    user: Option<User>,
}

impl PageWriteTrx {
    pub(crate) fn new(guard: WriterGuard, base: Option<(RootPage, Arc<Page>)>) -> PageResult<Self> {
        let mut log = TransactionLog::new();
        let (root, revision_root, base_revision) = match base {
            Some((root, page)) => match &*page {
                Page::RevisionRoot(rr) => (root, rr.next_revision(), Some(rr.revision())),
                other => {
                    return Err(PageError::format(format!(
                        "Expected revision root, found {}",
                        other.kind()
                    )))
                }
            },
            None => {
                let mut rr = RevisionRootPage::new(0);
                for index_type in IndexType::SECONDARY {
                    let page = index_type
                        .root_kind()
                        .and_then(|kind| kind.empty_page())
                        .ok_or_else(|| PageError::format(format!("No root page for {}", index_type)))?;
                    let key = log.put(page);
                    if let Some(reference) = rr.index_root_mut(index_type) {
                        *reference = PageReference::logged(key);
                    }
                }
                (RootPage::new(), rr, None)
            }
        };

        let trx = Self {
            guard,
            log,
            root,
            revision_root,
            base_revision,
            user: None,
        };
        let revision = trx.revision().to_string();
        log_event_with_fields(
            Event::WriteTrxBegin,
            &[("resource", trx.store().name()), ("revision", revision.as_str())],
        );
        Ok(trx)
    }

    pub fn store(&self) -> &Arc<PageStore> {
        &self.guard.store
    }

    /// Revision this transaction will commit as.
    pub fn revision(&self) -> u32 {
        self.revision_root.revision()
    }

    /// Revision the transaction started from; `None` while bootstrapping.
    pub fn base_revision(&self) -> Option<u32> {
        self.base_revision
    }

    pub fn max_node_key(&self) -> Option<u64> {
        self.revision_root.max_node_key()
    }

    /// Number of pages copied or created so far.
    pub fn dirty_pages(&self) -> usize {
        self.log.len()
    }

    /// Committing user recorded in the revision root.
    pub fn set_user(&mut self, user: User) {
        self.user = Some(user);
    }

    /// Current tree of an index, including uncommitted changes.
    pub fn tree(&self, index_type: IndexType, index_number: u32) -> PageResult<IndexTree> {
        Ok(lookup_tree(self, &self.revision_root, index_type, index_number)?.unwrap_or_default())
    }

    fn store_tree(&mut self, index_type: IndexType, index_number: u32, tree: IndexTree) -> PageResult<()> {
        let Some(kind) = index_type.root_kind() else {
            if index_number != 0 {
                return Err(PageError::index_out_of_range(index_number, 1));
            }
            self.revision_root.set_document_tree(tree);
            return Ok(());
        };

        let store = Arc::clone(&self.guard.store);
        let reference = self
            .revision_root
            .index_root_mut(index_type)
            .ok_or_else(|| PageError::format(format!("No root page slot for {}", index_type)))?;
        let key = match reference.log_key() {
            Some(key) => key,
            None => {
                let page = match reference.offset() {
                    Some(offset) => (*store.load(offset)?).clone(),
                    None => kind
                        .empty_page()
                        .ok_or_else(|| PageError::format(format!("No root page for {}", index_type)))?,
                };
                let key = self.log.put(page);
                *reference = PageReference::logged(key);
                key
            }
        };

        self.log
            .get_mut(key)
            .and_then(Page::as_index_root_mut)
            .ok_or_else(|| PageError::dangling(format!("index root of {}", index_type)))?
            .set_tree(index_number, tree)
    }

    /// Allocates the next record key of an index.
    pub fn allocate_key(&mut self, index_type: IndexType, index_number: u32) -> PageResult<u64> {
        let mut tree = self.tree(index_type, index_number)?;
        let key = tree.next_key;
        tree.next_key += 1;
        self.store_tree(index_type, index_number, tree)?;
        Ok(key)
    }

    /// Transaction-owned record page holding `key`.
    ///
    /// Copies the leaf and every indirect page above it on first use; later
    /// calls for the same leaf return the same copy. Keys that were never
    /// allocated fail with `REV_KEY_OUT_OF_RANGE`.
    pub fn prepare(
        &mut self,
        key: u64,
        index_type: IndexType,
        index_number: u32,
    ) -> PageResult<&mut RecordPage> {
        let mut tree = self.tree(index_type, index_number)?;
        if key >= tree.next_key {
            return Err(PageError::key_out_of_range(key, tree.next_key));
        }

        let store = Arc::clone(&self.guard.store);
        let leaf = leaf_key(key);
        let record_key = with_leaf_slot(&store, &mut self.log, &mut tree, leaf, |slot, log| {
            cow_reference(&store, log, slot, || {
                Page::Record(RecordPage::new(leaf, index_type, index_number))
            })
        })?;
        self.store_tree(index_type, index_number, tree)?;

        match self.log.get_mut(record_key) {
            Some(Page::Record(page)) => Ok(page),
            Some(other) => Err(PageError::format(format!(
                "Expected record page, found {}",
                other.kind()
            ))),
            None => Err(PageError::dangling(format!("record page of key {}", key))),
        }
    }

    /// Record under `key` as this transaction sees it.
    pub fn get(&self, key: u64, index_type: IndexType, index_number: u32) -> PageResult<Option<DataRecord>> {
        let tree = self.tree(index_type, index_number)?;
        lookup_record(self, &tree, key)
    }

    pub fn set_record(
        &mut self,
        key: u64,
        index_type: IndexType,
        index_number: u32,
        record: DataRecord,
    ) -> PageResult<()> {
        self.prepare(key, index_type, index_number)?.insert(key, record)
    }

    /// Removes a record; returns whether one was present.
    pub fn remove_record(&mut self, key: u64, index_type: IndexType, index_number: u32) -> PageResult<bool> {
        Ok(self.prepare(key, index_type, index_number)?.remove(key).is_some())
    }

    /// Flushes and syncs the new revision without publishing it.
    pub fn prepare_commit(mut self, message: Option<String>) -> PageResult<PreparedCommit> {
        let revision = self.revision();
        let revision_field = revision.to_string();
        let store = Arc::clone(&self.guard.store);
        let scope = ObservationScope::with_fields(
            "COMMIT_FLUSH",
            &[("resource", store.name()), ("revision", revision_field.as_str())],
        );

        match self.flush_all(message) {
            Ok((root_offset, stats)) => {
                let pages = stats.pages.to_string();
                let bytes = stats.bytes.to_string();
                scope.complete_with_fields(&[("pages", pages.as_str()), ("bytes", bytes.as_str())]);
                log_event_with_fields(
                    Event::CommitFlushComplete,
                    &[
                        ("bytes", bytes.as_str()),
                        ("pages", pages.as_str()),
                        ("resource", store.name()),
                        ("revision", revision_field.as_str()),
                    ],
                );
                maybe_crash(points::COMMIT_AFTER_FLUSH);

                Ok(PreparedCommit {
                    guard: self.guard,
                    root_offset,
                    revision,
                    published: false,
                })
            }
            Err(e) => {
                let reason = e.to_string();
                scope.fail(&reason);
                store.metrics().increment_commit_failures();
                log_event_with_fields(
                    Event::CommitFailed,
                    &[
                        ("reason", reason.as_str()),
                        ("resource", store.name()),
                        ("revision", revision_field.as_str()),
                    ],
                );
                Err(e)
            }
        }
    }

    /// Commits and publishes; returns the new revision number.
    pub fn commit(self, message: Option<String>) -> PageResult<u32> {
        self.prepare_commit(message)?.publish()
    }

    /// Discards every change of this transaction.
    pub fn abort(mut self) {
        let revision = self.revision().to_string();
        let pages = self.log.len().to_string();
        self.log.clear();
        self.store().metrics().increment_aborts();
        log_event_with_fields(
            Event::WriteTrxAbort,
            &[
                ("pages", pages.as_str()),
                ("resource", self.store().name()),
                ("revision", revision.as_str()),
            ],
        );
    }

    fn flush_all(&mut self, message: Option<String>) -> PageResult<(u64, FlushStats)> {
        let store = Arc::clone(&self.guard.store);
        let revision = self.revision();

        self.revision_root
            .set_commit_info(Utc::now(), message, self.user.take());
        let revision_root_key = self.log.put(Page::RevisionRoot(self.revision_root.clone()));

        let mut revisions = self.root.revisions().clone();
        revisions.next_key = revisions.next_key.max(u64::from(revision) + 1);
        with_leaf_slot(&store, &mut self.log, &mut revisions, u64::from(revision), |slot, _| {
            *slot = PageReference::logged(revision_root_key);
            Ok(())
        })?;
        self.root
            .publish_revision(revision, PageReference::logged(revision_root_key), revisions);
        let root_key = self.log.put(Page::Root(self.root.clone()));

        let mut flusher = Flusher {
            store: &store,
            log: &mut self.log,
            flushed: HashMap::new(),
            stats: FlushStats::default(),
        };
        let root_offset = flusher.flush(root_key)?;
        let stats = flusher.stats;

        store
            .with_storage(|storage| storage.sync())
            .map_err(|e| store.storage_error("Failed to sync page storage".to_string(), e))?;
        Ok((root_offset, stats))
    }
}

impl PageSource for PageWriteTrx {
    fn resolve(&self, reference: &PageReference) -> PageResult<Option<PageRef<'_>>> {
        if let Some(key) = reference.log_key() {
            return self
                .log
                .get(key)
                .map(|page| Some(PageRef::Logged(page)))
                .ok_or_else(|| PageError::dangling(format!("{} is not in the transaction log", key)));
        }
        match reference.offset() {
            Some(offset) => Ok(Some(PageRef::Shared(self.guard.store.load(offset)?))),
            None => Ok(None),
        }
    }
}

/// Flushed and synced revision waiting for its root pointer swap.
///
/// Dropping it unpublished leaves the previous revision as the latest one,
/// exactly like a crash between sync and swap.
pub struct PreparedCommit {
    guard: WriterGuard,
    root_offset: u64,
    revision: u32,
    published: bool,
}

impl PreparedCommit {
    pub fn revision(&self) -> u32 {
        self.revision
    }

    pub fn root_offset(&self) -> u64 {
        self.root_offset
    }

    /// Atomically replaces the root pointer.
    pub fn publish(mut self) -> PageResult<u32> {
        let store = Arc::clone(&self.guard.store);
        let revision = self.revision.to_string();

        maybe_crash(points::COMMIT_BEFORE_ROOT_SWAP);
        let pointer = RootPointer::new(self.root_offset, self.revision);
        if let Err(e) = store.with_storage(|storage| storage.write_root_pointer(&pointer)) {
            let error = store.storage_error("Failed to publish root pointer".to_string(), e);
            let reason = error.to_string();
            store.metrics().increment_commit_failures();
            log_event_with_fields(
                Event::CommitFailed,
                &[
                    ("reason", reason.as_str()),
                    ("resource", store.name()),
                    ("revision", revision.as_str()),
                ],
            );
            return Err(error);
        }
        maybe_crash(points::COMMIT_AFTER_ROOT_SWAP);

        self.published = true;
        store.metrics().increment_commits();
        let offset = self.root_offset.to_string();
        log_event_with_fields(
            Event::CommitPublished,
            &[
                ("resource", store.name()),
                ("revision", revision.as_str()),
                ("root_offset", offset.as_str()),
            ],
        );
        Ok(self.revision)
    }
}

impl Drop for PreparedCommit {
    fn drop(&mut self) {
        if !self.published {
            let revision = self.revision.to_string();
            log_event_with_fields(
                Event::CommitFailed,
                &[
                    ("reason", "dropped before publish"),
                    ("resource", self.guard.store.name()),
                    ("revision", revision.as_str()),
                ],
            );
        }
    }
}

#[derive(Debug, Default)]
struct FlushStats {
    pages: u64,
    bytes: u64,
}

struct Flusher<'a> {
    store: &'a PageStore,
    log: &'a mut TransactionLog,
    flushed: HashMap<LogKey, u64>,
    stats: FlushStats,
}

impl Flusher<'_> {
    fn append(&mut self, page: &Page) -> PageResult<u64> {
        let bytes = page.encode()?;
        let offset = self
            .store
            .with_storage(|storage| storage.append(&bytes))
            .map_err(|e| {
                self.store
                    .storage_error(format!("Failed to append {} page", page.kind()), e)
            })?;
        self.stats.pages += 1;
        self.stats.bytes += bytes.len() as u64;
        self.store.metrics().record_flush(bytes.len() as u64);
        Ok(offset)
    }

    /// Writes the logged page `key` after everything it references.
    fn flush(&mut self, key: LogKey) -> PageResult<u64> {
        if let Some(&offset) = self.flushed.get(&key) {
            return Ok(offset);
        }
        let mut page = self
            .log
            .take(key)
            .ok_or_else(|| PageError::dangling(format!("{} is not in the transaction log", key)))?;

        if let Page::Record(record) = &mut page {
            let limit = self.store.options().inline_record_limit;
            for (record_key, bytes) in record.take_oversized(limit) {
                let offset = self.append(&Page::Overflow(OverflowPage::new(bytes)))?;
                self.store.metrics().increment_overflow_pages();
                record.set_overflow(record_key, PageReference::durable(offset));
            }
        }

        for reference in page.references_mut() {
            if let Some(child) = reference.log_key() {
                let offset = self.flush(child)?;
                reference.mark_flushed(offset);
            }
        }

        let offset = self.append(&page)?;
        self.flushed.insert(key, offset);
        Ok(offset)
    }
}

/// Makes `reference` point at a transaction-owned page and returns its key.
fn cow_reference(
    store: &PageStore,
    log: &mut TransactionLog,
    reference: &mut PageReference,
    make_empty: impl FnOnce() -> Page,
) -> PageResult<LogKey> {
    if let Some(key) = reference.log_key() {
        return Ok(key);
    }
    let page = match reference.offset() {
        Some(offset) => store.load(offset)?.instantiate(),
        None => make_empty(),
    };
    let key = log.put(page);
    *reference = PageReference::logged(key);
    Ok(key)
}

fn indirect_mut(log: &mut TransactionLog, key: LogKey) -> PageResult<&mut IndirectPage> {
    match log.get_mut(key) {
        Some(Page::Indirect(page)) => Ok(page),
        Some(other) => Err(PageError::format(format!(
            "Expected indirect page, found {}",
            other.kind()
        ))),
        None => Err(PageError::dangling(format!("indirect page {}", key))),
    }
}

/// Adds indirect levels on top of the root until `leaf` is addressable.
fn grow_tree(log: &mut TransactionLog, tree: &mut IndexTree, leaf: u64) -> PageResult<()> {
    while leaf >= tree_capacity(tree.depth) {
        if tree.depth >= MAX_TREE_DEPTH {
            return Err(PageError::format(format!(
                "Leaf {} exceeds the capacity of a depth {} tree",
                leaf, MAX_TREE_DEPTH
            )));
        }
        if !tree.root.is_null() {
            let old_root = std::mem::take(&mut tree.root);
            let key = log.put(Page::Indirect(IndirectPage::with_first_child(old_root)));
            tree.root = PageReference::logged(key);
        }
        tree.depth += 1;
    }
    Ok(())
}

/// Copies the indirect path down to `leaf` and hands its slot to `f`.
fn with_leaf_slot<T>(
    store: &PageStore,
    log: &mut TransactionLog,
    tree: &mut IndexTree,
    leaf: u64,
    f: impl FnOnce(&mut PageReference, &mut TransactionLog) -> PageResult<T>,
) -> PageResult<T> {
    grow_tree(log, tree, leaf)?;
    if tree.depth == 0 {
        return f(&mut tree.root, log);
    }

    let new_indirect = || Page::Indirect(IndirectPage::new());
    let mut key = cow_reference(store, log, &mut tree.root, new_indirect)?;
    for level in (1..tree.depth).rev() {
        let slot = slot_index(leaf, level);
        let mut child = indirect_mut(log, key)?.slot(slot).clone();
        let child_key = cow_reference(store, log, &mut child, new_indirect)?;
        *indirect_mut(log, key)?.slot_mut(slot) = child;
        key = child_key;
    }

    let slot = slot_index(leaf, 0);
    let mut leaf_reference = indirect_mut(log, key)?.slot(slot).clone();
    let result = f(&mut leaf_reference, log)?;
    *indirect_mut(log, key)?.slot_mut(slot) = leaf_reference;
    Ok(result)
}
