//! Index trees and secondary index root pages
//!
//! Every index (the document records and each secondary index) is an
//! indirect tree with its own key space. A tree records its root, the next
//! unallocated record key and how many indirect levels it currently has, so
//! readers descend without knowing anything about the write that built it.

use std::fmt;

use super::codec::{PageDecoder, PageEncoder};
use super::errors::{PageError, PageResult};
use super::kind::PageKind;
use super::reference::PageReference;
use super::MAX_TREE_DEPTH;

/// Which index a record page belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IndexType {
    /// Node records of the document
    Document,
    /// Name dictionary
    Name,
    /// Path summary
    PathSummary,
    /// Content-and-structure index
    Cas,
    /// Path index
    Path,
    /// DeweyID to node key index
    DeweyId,
}

impl IndexType {
    /// Secondary indexes in the order the revision root stores them
    pub const SECONDARY: [IndexType; 5] = [
        IndexType::Name,
        IndexType::PathSummary,
        IndexType::Cas,
        IndexType::Path,
        IndexType::DeweyId,
    ];

    pub fn as_u8(self) -> u8 {
        match self {
            IndexType::Document => 0,
            IndexType::Name => 1,
            IndexType::PathSummary => 2,
            IndexType::Cas => 3,
            IndexType::Path => 4,
            IndexType::DeweyId => 5,
        }
    }

    pub fn from_u8(value: u8) -> PageResult<Self> {
        match value {
            0 => Ok(IndexType::Document),
            1 => Ok(IndexType::Name),
            2 => Ok(IndexType::PathSummary),
            3 => Ok(IndexType::Cas),
            4 => Ok(IndexType::Path),
            5 => Ok(IndexType::DeweyId),
            other => Err(PageError::format(format!("Unknown index type: {}", other))),
        }
    }

    /// Kind of the root page owning this index's trees; `None` for the
    /// document tree, which the revision root owns directly.
    pub fn root_kind(self) -> Option<PageKind> {
        match self {
            IndexType::Document => None,
            IndexType::Name => Some(PageKind::Name),
            IndexType::PathSummary => Some(PageKind::PathSummary),
            IndexType::Cas => Some(PageKind::Cas),
            IndexType::Path => Some(PageKind::Path),
            IndexType::DeweyId => Some(PageKind::DeweyId),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            IndexType::Document => "document",
            IndexType::Name => "name",
            IndexType::PathSummary => "path_summary",
            IndexType::Cas => "cas",
            IndexType::Path => "path",
            IndexType::DeweyId => "dewey_id",
        }
    }
}

impl fmt::Display for IndexType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Root of one indirect tree plus its key-space bookkeeping
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexTree {
    pub root: PageReference,
    /// First record key not yet allocated
    pub next_key: u64,
    /// Indirect levels between `root` and the leaves
    pub depth: u8,
}

impl IndexTree {
    /// Highest allocated key, if any key was allocated.
    pub fn max_key(&self) -> Option<u64> {
        self.next_key.checked_sub(1)
    }

    pub(crate) fn encode(&self, enc: &mut PageEncoder) -> PageResult<()> {
        self.root.encode(enc)?;
        enc.put_varint(self.next_key);
        enc.put_u8(self.depth);
        Ok(())
    }

    pub(crate) fn decode(dec: &mut PageDecoder<'_>) -> PageResult<Self> {
        let root = PageReference::decode(dec)?;
        let next_key = dec.get_varint()?;
        let depth = dec.get_u8()?;
        if depth > MAX_TREE_DEPTH {
            return Err(PageError::format(format!(
                "Index tree depth {} exceeds maximum {}",
                depth, MAX_TREE_DEPTH
            )));
        }
        Ok(Self {
            root,
            next_key,
            depth,
        })
    }
}

/// Singleton root page of one secondary index kind.
///
/// Holds one tree per index number; index numbers are dense from 0.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexRootPage {
    trees: Vec<IndexTree>,
}

impl IndexRootPage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tree(&self, index_number: u32) -> Option<&IndexTree> {
        self.trees.get(index_number as usize)
    }

    /// Stores `tree` under `index_number`.
    ///
    /// Replaces an existing tree or appends the next index number; any
    /// higher number fails with `REV_KEY_OUT_OF_RANGE`.
    pub fn set_tree(&mut self, index_number: u32, tree: IndexTree) -> PageResult<()> {
        let index = index_number as usize;
        match index.cmp(&self.trees.len()) {
            std::cmp::Ordering::Less => self.trees[index] = tree,
            std::cmp::Ordering::Equal => self.trees.push(tree),
            std::cmp::Ordering::Greater => {
                return Err(PageError::index_out_of_range(index_number, self.trees.len()))
            }
        }
        Ok(())
    }

    pub fn trees(&self) -> &[IndexTree] {
        &self.trees
    }

    pub(crate) fn references_mut(&mut self) -> impl Iterator<Item = &mut PageReference> {
        self.trees.iter_mut().map(|t| &mut t.root)
    }

    pub(crate) fn encode(&self, enc: &mut PageEncoder) -> PageResult<()> {
        enc.put_varint(self.trees.len() as u64);
        for tree in &self.trees {
            tree.encode(enc)?;
        }
        Ok(())
    }

    pub(crate) fn decode(dec: &mut PageDecoder<'_>) -> PageResult<Self> {
        let count = dec.get_len()?;
        let mut trees = Vec::with_capacity(count);
        for _ in 0..count {
            trees.push(IndexTree::decode(dec)?);
        }
        Ok(Self { trees })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_type_codes_are_stable() {
        for index_type in [IndexType::Document]
            .into_iter()
            .chain(IndexType::SECONDARY)
        {
            assert_eq!(IndexType::from_u8(index_type.as_u8()).unwrap(), index_type);
        }
        assert!(IndexType::from_u8(6).is_err());
    }

    fn tree_with(next_key: u64) -> IndexTree {
        IndexTree {
            root: PageReference::durable(9),
            next_key,
            depth: 1,
        }
    }

    #[test]
    fn test_set_tree_appends_dense_numbers() {
        let mut page = IndexRootPage::new();
        page.set_tree(0, tree_with(3)).unwrap();
        page.set_tree(1, tree_with(40)).unwrap();
        page.set_tree(0, tree_with(5)).unwrap();

        assert_eq!(page.trees().len(), 2);
        assert_eq!(page.tree(0).map(|t| t.next_key), Some(5));
        assert_eq!(page.tree(1).and_then(|t| t.max_key()), Some(39));
    }

    #[test]
    fn test_set_tree_rejects_gap() {
        let mut page = IndexRootPage::new();
        page.set_tree(0, tree_with(1)).unwrap();

        let err = page.set_tree(2, tree_with(1)).unwrap_err();
        assert_eq!(err.code(), crate::page::PageErrorCode::RevKeyOutOfRange);
        assert!(page.set_tree(u32::MAX, tree_with(1)).is_err());
        assert_eq!(page.trees().len(), 1);
    }

    #[test]
    fn test_excessive_depth_rejected() {
        let mut enc = PageEncoder::default();
        PageReference::null().encode(&mut enc).unwrap();
        enc.put_varint(0);
        enc.put_u8(MAX_TREE_DEPTH + 1);
        let bytes = enc.finish();
        assert!(IndexTree::decode(&mut PageDecoder::new(&bytes)).is_err());
    }
}
