//! Root-of-everything page
//!
//! Entry point of a published state. Holds the number of revisions, a
//! direct reference to the latest revision root and a tree keyed by
//! revision number whose leaf slots reference every revision root.

use super::codec::{PageDecoder, PageEncoder};
use super::errors::PageResult;
use super::index_root::IndexTree;
use super::reference::PageReference;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RootPage {
    revision_count: u32,
    latest: PageReference,
    revisions: IndexTree,
}

impl RootPage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn revision_count(&self) -> u32 {
        self.revision_count
    }

    pub fn latest_revision(&self) -> Option<u32> {
        self.revision_count.checked_sub(1)
    }

    pub fn latest(&self) -> &PageReference {
        &self.latest
    }

    pub fn revisions(&self) -> &IndexTree {
        &self.revisions
    }

    /// Installs the tree and latest reference for a newly committed revision.
    pub fn publish_revision(&mut self, revision: u32, latest: PageReference, revisions: IndexTree) {
        self.revision_count = revision + 1;
        self.latest = latest;
        self.revisions = revisions;
    }

    pub(crate) fn references_mut(&mut self) -> impl Iterator<Item = &mut PageReference> {
        std::iter::once(&mut self.latest).chain(std::iter::once(&mut self.revisions.root))
    }

    pub(crate) fn encode(&self, enc: &mut PageEncoder) -> PageResult<()> {
        enc.put_u32(self.revision_count);
        self.latest.encode(enc)?;
        self.revisions.encode(enc)
    }

    pub(crate) fn decode(dec: &mut PageDecoder<'_>) -> PageResult<Self> {
        Ok(Self {
            revision_count: dec.get_u32()?,
            latest: PageReference::decode(dec)?,
            revisions: IndexTree::decode(dec)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_root_has_no_revision() {
        let root = RootPage::new();
        assert_eq!(root.revision_count(), 0);
        assert_eq!(root.latest_revision(), None);
        assert!(root.latest().is_null());
    }

    #[test]
    fn test_publish_revision() {
        let mut root = RootPage::new();
        let tree = IndexTree {
            root: PageReference::durable(64),
            next_key: 3,
            depth: 1,
        };
        root.publish_revision(2, PageReference::durable(128), tree.clone());

        assert_eq!(root.revision_count(), 3);
        assert_eq!(root.latest_revision(), Some(2));
        assert_eq!(root.revisions(), &tree);
    }
}
