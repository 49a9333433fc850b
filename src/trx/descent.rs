//! Read-only descent through index trees
//!
//! Shared by read and write transactions. A [`PageSource`] resolves a
//! reference to a page; the read side only knows durable pages, the write
//! side checks its transaction log first.

use std::ops::Deref;
use std::sync::Arc;

use crate::page::{
    leaf_key, slot_index, tree_capacity, DataRecord, IndexTree, IndexType, IndirectPage, Page,
    PageError, PageReference, PageResult, RecordEntry, RecordPage, RevisionRootPage,
};

/// A resolved page, borrowed from a transaction log or shared from the cache
pub(crate) enum PageRef<'a> {
    Logged(&'a Page),
    Shared(Arc<Page>),
}

impl Deref for PageRef<'_> {
    type Target = Page;

    fn deref(&self) -> &Page {
        match self {
            PageRef::Logged(page) => page,
            PageRef::Shared(page) => page,
        }
    }
}

pub(crate) trait PageSource {
    /// Resolves `reference`; `None` for a null reference.
    fn resolve(&self, reference: &PageReference) -> PageResult<Option<PageRef<'_>>>;
}

pub(crate) fn expect_indirect(page: &Page) -> PageResult<&IndirectPage> {
    match page {
        Page::Indirect(p) => Ok(p),
        other => Err(PageError::format(format!(
            "Expected indirect page, found {}",
            other.kind()
        ))),
    }
}

pub(crate) fn expect_record(page: &Page) -> PageResult<&RecordPage> {
    match page {
        Page::Record(p) => Ok(p),
        other => Err(PageError::format(format!(
            "Expected record page, found {}",
            other.kind()
        ))),
    }
}

/// Reference sitting in the leaf slot for `leaf`, if the tree reaches it.
pub(crate) fn leaf_reference<S: PageSource + ?Sized>(
    source: &S,
    tree: &IndexTree,
    leaf: u64,
) -> PageResult<Option<PageReference>> {
    if tree.root.is_null() || leaf >= tree_capacity(tree.depth) {
        return Ok(None);
    }

    let mut current = tree.root.clone();
    for level in (0..tree.depth).rev() {
        let next = match source.resolve(&current)? {
            Some(page) => expect_indirect(&page)?.slot(slot_index(leaf, level)).clone(),
            None => return Ok(None),
        };
        if next.is_null() {
            return Ok(None);
        }
        current = next;
    }
    Ok(Some(current))
}

/// Record stored under `key`, following overflow references.
pub(crate) fn lookup_record<S: PageSource + ?Sized>(
    source: &S,
    tree: &IndexTree,
    key: u64,
) -> PageResult<Option<DataRecord>> {
    if key >= tree.next_key {
        return Ok(None);
    }
    let Some(reference) = leaf_reference(source, tree, leaf_key(key))? else {
        return Ok(None);
    };
    let Some(page) = source.resolve(&reference)? else {
        return Ok(None);
    };

    match expect_record(&page)?.get(key) {
        None => Ok(None),
        Some(RecordEntry::Inline(record)) => Ok(Some(record.clone())),
        Some(RecordEntry::Overflow(overflow)) => {
            let overflow_page = source
                .resolve(overflow)?
                .ok_or_else(|| PageError::dangling(format!("overflow page of record {}", key)))?;
            match &*overflow_page {
                Page::Overflow(o) => Ok(Some(o.record()?)),
                other => Err(PageError::format(format!(
                    "Expected overflow page, found {}",
                    other.kind()
                ))),
            }
        }
    }
}

/// Tree of `index_type`/`index_number` as seen from `revision_root`.
pub(crate) fn lookup_tree<S: PageSource + ?Sized>(
    source: &S,
    revision_root: &RevisionRootPage,
    index_type: IndexType,
    index_number: u32,
) -> PageResult<Option<IndexTree>> {
    let Some(kind) = index_type.root_kind() else {
        return Ok(Some(revision_root.document_tree().clone()));
    };
    let Some(reference) = revision_root.index_root(index_type) else {
        return Ok(None);
    };
    let Some(page) = source.resolve(reference)? else {
        return Ok(None);
    };
    if page.kind() != kind {
        return Err(PageError::format(format!(
            "Index root for {} has kind {}",
            index_type,
            page.kind()
        )));
    }
    Ok(page
        .as_index_root()
        .and_then(|root| root.tree(index_number))
        .cloned())
}
