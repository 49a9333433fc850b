//! Page kinds and the tag dispatch registry
//!
//! Every serialized page starts with a one-byte tag. Tags are part of the
//! on-disk format and are never reassigned:
//!
//! | Tag | Kind          |
//! |-----|---------------|
//! | 1   | Record        |
//! | 2   | Name          |
//! | 3   | Root          |
//! | 4   | Indirect      |
//! | 5   | RevisionRoot  |
//! | 6   | PathSummary   |
//! | 7   | (reserved)    |
//! | 8   | Cas           |
//! | 9   | Overflow      |
//! | 10  | Path          |
//! | 11  | DeweyId       |
//!
//! The registry is built once per process and maps each tag to its
//! encode/decode/instantiate functions.

use std::fmt;
use std::sync::OnceLock;

use super::codec::{PageDecoder, PageEncoder};
use super::errors::{PageError, PageResult};
use super::index_root::{IndexRootPage, IndexType};
use super::indirect::IndirectPage;
use super::record::{OverflowPage, RecordPage};
use super::reference::PageReference;
use super::revision_root::RevisionRootPage;
use super::root::RootPage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageKind {
    Record,
    Name,
    Root,
    Indirect,
    RevisionRoot,
    PathSummary,
    Cas,
    Overflow,
    Path,
    DeweyId,
}

impl PageKind {
    pub const ALL: [PageKind; 10] = [
        PageKind::Record,
        PageKind::Name,
        PageKind::Root,
        PageKind::Indirect,
        PageKind::RevisionRoot,
        PageKind::PathSummary,
        PageKind::Cas,
        PageKind::Overflow,
        PageKind::Path,
        PageKind::DeweyId,
    ];

    pub fn tag(self) -> u8 {
        match self {
            PageKind::Record => 1,
            PageKind::Name => 2,
            PageKind::Root => 3,
            PageKind::Indirect => 4,
            PageKind::RevisionRoot => 5,
            PageKind::PathSummary => 6,
            PageKind::Cas => 8,
            PageKind::Overflow => 9,
            PageKind::Path => 10,
            PageKind::DeweyId => 11,
        }
    }

    /// Resolves a tag through the registry; unknown tags are fatal.
    pub fn from_tag(tag: u8) -> PageResult<Self> {
        registry().entry(tag).map(|e| e.kind)
    }

    /// Singleton index roots start out empty in every new resource.
    pub fn is_singleton(self) -> bool {
        matches!(
            self,
            PageKind::Root
                | PageKind::RevisionRoot
                | PageKind::Name
                | PageKind::PathSummary
                | PageKind::Cas
                | PageKind::Path
                | PageKind::DeweyId
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PageKind::Record => "record",
            PageKind::Name => "name",
            PageKind::Root => "root",
            PageKind::Indirect => "indirect",
            PageKind::RevisionRoot => "revision_root",
            PageKind::PathSummary => "path_summary",
            PageKind::Cas => "cas",
            PageKind::Overflow => "overflow",
            PageKind::Path => "path",
            PageKind::DeweyId => "dewey_id",
        }
    }
}

impl fmt::Display for PageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.as_str(), self.tag())
    }
}

/// A page of any kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Page {
    Record(RecordPage),
    Name(IndexRootPage),
    Root(RootPage),
    Indirect(IndirectPage),
    RevisionRoot(RevisionRootPage),
    PathSummary(IndexRootPage),
    Cas(IndexRootPage),
    Overflow(OverflowPage),
    Path(IndexRootPage),
    DeweyId(IndexRootPage),
}

impl Page {
    pub fn kind(&self) -> PageKind {
        match self {
            Page::Record(_) => PageKind::Record,
            Page::Name(_) => PageKind::Name,
            Page::Root(_) => PageKind::Root,
            Page::Indirect(_) => PageKind::Indirect,
            Page::RevisionRoot(_) => PageKind::RevisionRoot,
            Page::PathSummary(_) => PageKind::PathSummary,
            Page::Cas(_) => PageKind::Cas,
            Page::Overflow(_) => PageKind::Overflow,
            Page::Path(_) => PageKind::Path,
            Page::DeweyId(_) => PageKind::DeweyId,
        }
    }

    /// Serializes the page, tag byte first.
    pub fn encode(&self) -> PageResult<Vec<u8>> {
        let entry = registry().lookup(self.kind());
        let mut enc = PageEncoder::with_tag(entry.kind.tag());
        (entry.encode)(self, &mut enc)?;
        Ok(enc.finish())
    }

    /// Deserializes a page, dispatching on its tag byte.
    pub fn decode(bytes: &[u8]) -> PageResult<Page> {
        let (&tag, payload) = bytes
            .split_first()
            .ok_or_else(|| PageError::format("Empty page"))?;
        let entry = registry().entry(tag)?;
        let mut dec = PageDecoder::new(payload);
        let page = (entry.decode)(&mut dec)?;
        dec.finish()?;
        Ok(page)
    }

    /// Copy for a write transaction: data-bearing pages are cloned, singleton
    /// roots come back empty.
    pub fn instantiate(&self) -> Page {
        (registry().lookup(self.kind()).instantiate)(self)
    }

    /// Index root page of a secondary kind.
    pub fn as_index_root(&self) -> Option<&IndexRootPage> {
        match self {
            Page::Name(p) | Page::PathSummary(p) | Page::Cas(p) | Page::Path(p) | Page::DeweyId(p) => {
                Some(p)
            }
            _ => None,
        }
    }

    pub fn as_index_root_mut(&mut self) -> Option<&mut IndexRootPage> {
        match self {
            Page::Name(p) | Page::PathSummary(p) | Page::Cas(p) | Page::Path(p) | Page::DeweyId(p) => {
                Some(p)
            }
            _ => None,
        }
    }

    /// Every child reference the page holds.
    pub fn references(&self) -> Vec<&PageReference> {
        match self {
            Page::Record(p) => p.overflow_references().collect(),
            Page::Root(p) => vec![p.latest(), &p.revisions().root],
            Page::Indirect(p) => p.references().filter(|r| !r.is_null()).collect(),
            Page::RevisionRoot(p) => std::iter::once(&p.document_tree().root)
                .chain(IndexType::SECONDARY.iter().filter_map(|t| p.index_root(*t)))
                .collect(),
            Page::Name(p) | Page::PathSummary(p) | Page::Cas(p) | Page::Path(p) | Page::DeweyId(p) => {
                p.trees().iter().map(|t| &t.root).collect()
            }
            Page::Overflow(_) => Vec::new(),
        }
    }

    pub(crate) fn references_mut(&mut self) -> Vec<&mut PageReference> {
        match self {
            Page::Record(p) => p.references_mut().collect(),
            Page::Root(p) => p.references_mut().collect(),
            Page::Indirect(p) => p.references_mut().collect(),
            Page::RevisionRoot(p) => p.references_mut().collect(),
            Page::Name(p) | Page::PathSummary(p) | Page::Cas(p) | Page::Path(p) | Page::DeweyId(p) => {
                p.references_mut().collect()
            }
            Page::Overflow(_) => Vec::new(),
        }
    }
}

type EncodeFn = fn(&Page, &mut PageEncoder) -> PageResult<()>;
type DecodeFn = fn(&mut PageDecoder<'_>) -> PageResult<Page>;
type InstantiateFn = fn(&Page) -> Page;

/// Behavior registered for one tag
#[derive(Clone, Copy)]
pub struct PageKindEntry {
    pub kind: PageKind,
    pub encode: EncodeFn,
    pub decode: DecodeFn,
    pub instantiate: InstantiateFn,
}

impl fmt::Debug for PageKindEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageKindEntry").field("kind", &self.kind).finish()
    }
}

/// Immutable tag table
#[derive(Debug)]
pub struct PageRegistry {
    by_tag: [Option<PageKindEntry>; 256],
}

impl PageRegistry {
    fn build(entries: Vec<PageKindEntry>) -> Self {
        let mut by_tag = [None; 256];
        for entry in entries {
            let tag = entry.kind.tag() as usize;
            assert!(
                by_tag[tag].is_none(),
                "page tag {} registered twice",
                tag
            );
            by_tag[tag] = Some(entry);
        }
        Self { by_tag }
    }

    /// Lookup by tag, used when reading pages.
    pub fn entry(&self, tag: u8) -> PageResult<&PageKindEntry> {
        self.by_tag[tag as usize]
            .as_ref()
            .ok_or_else(|| PageError::unknown_tag(tag))
    }

    /// Lookup by variant, used when writing pages.
    pub fn lookup(&self, kind: PageKind) -> &PageKindEntry {
        match &self.by_tag[kind.tag() as usize] {
            Some(entry) => entry,
            None => unreachable!("every page kind is registered"),
        }
    }

    pub fn tags(&self) -> impl Iterator<Item = u8> + '_ {
        self.by_tag
            .iter()
            .enumerate()
            .filter(|(_, e)| e.is_some())
            .map(|(tag, _)| tag as u8)
    }
}

fn variant_mismatch(expected: PageKind, page: &Page) -> PageError {
    PageError::format(format!(
        "Encoder for {} received a {} page",
        expected,
        page.kind()
    ))
}

fn empty_index_root(kind: PageKind) -> Page {
    match kind {
        PageKind::Name => Page::Name(IndexRootPage::new()),
        PageKind::PathSummary => Page::PathSummary(IndexRootPage::new()),
        PageKind::Cas => Page::Cas(IndexRootPage::new()),
        PageKind::Path => Page::Path(IndexRootPage::new()),
        _ => Page::DeweyId(IndexRootPage::new()),
    }
}

impl PageKind {
    /// Fresh empty page of a singleton kind.
    pub fn empty_page(self) -> Option<Page> {
        match self {
            PageKind::Root => Some(Page::Root(RootPage::new())),
            PageKind::RevisionRoot => Some(Page::RevisionRoot(RevisionRootPage::new(0))),
            PageKind::Name
            | PageKind::PathSummary
            | PageKind::Cas
            | PageKind::Path
            | PageKind::DeweyId => Some(empty_index_root(self)),
            PageKind::Record | PageKind::Indirect | PageKind::Overflow => None,
        }
    }
}

macro_rules! index_root_entry {
    ($kind:expr, $variant:ident) => {
        PageKindEntry {
            kind: $kind,
            encode: |page, enc| match page {
                Page::$variant(p) => p.encode(enc),
                other => Err(variant_mismatch($kind, other)),
            },
            decode: |dec| Ok(Page::$variant(IndexRootPage::decode(dec)?)),
            instantiate: |_| empty_index_root($kind),
        }
    };
}

fn build_registry() -> PageRegistry {
    PageRegistry::build(vec![
        PageKindEntry {
            kind: PageKind::Record,
            encode: |page, enc| match page {
                Page::Record(p) => p.encode(enc),
                other => Err(variant_mismatch(PageKind::Record, other)),
            },
            decode: |dec| Ok(Page::Record(RecordPage::decode(dec)?)),
            instantiate: Page::clone,
        },
        index_root_entry!(PageKind::Name, Name),
        PageKindEntry {
            kind: PageKind::Root,
            encode: |page, enc| match page {
                Page::Root(p) => p.encode(enc),
                other => Err(variant_mismatch(PageKind::Root, other)),
            },
            decode: |dec| Ok(Page::Root(RootPage::decode(dec)?)),
            instantiate: |_| Page::Root(RootPage::new()),
        },
        PageKindEntry {
            kind: PageKind::Indirect,
            encode: |page, enc| match page {
                Page::Indirect(p) => p.encode(enc),
                other => Err(variant_mismatch(PageKind::Indirect, other)),
            },
            decode: |dec| Ok(Page::Indirect(IndirectPage::decode(dec)?)),
            instantiate: Page::clone,
        },
        PageKindEntry {
            kind: PageKind::RevisionRoot,
            encode: |page, enc| match page {
                Page::RevisionRoot(p) => p.encode(enc),
                other => Err(variant_mismatch(PageKind::RevisionRoot, other)),
            },
            decode: |dec| Ok(Page::RevisionRoot(RevisionRootPage::decode(dec)?)),
            instantiate: |_| Page::RevisionRoot(RevisionRootPage::new(0)),
        },
        index_root_entry!(PageKind::PathSummary, PathSummary),
        index_root_entry!(PageKind::Cas, Cas),
        PageKindEntry {
            kind: PageKind::Overflow,
            encode: |page, enc| match page {
                Page::Overflow(p) => p.encode(enc),
                other => Err(variant_mismatch(PageKind::Overflow, other)),
            },
            decode: |dec| Ok(Page::Overflow(OverflowPage::decode(dec)?)),
            instantiate: Page::clone,
        },
        index_root_entry!(PageKind::Path, Path),
        index_root_entry!(PageKind::DeweyId, DeweyId),
    ])
}

/// Process-wide page registry, built on first use.
pub fn registry() -> &'static PageRegistry {
    static REGISTRY: OnceLock<PageRegistry> = OnceLock::new();
    REGISTRY.get_or_init(build_registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::{DataRecord, IndexTree};

    fn sample_pages() -> Vec<Page> {
        let mut record = RecordPage::new(0, IndexType::Document, 0);
        record.insert(3, DataRecord::new(b"text".to_vec())).unwrap();

        let mut indirect = IndirectPage::new();
        *indirect.slot_mut(4) = PageReference::durable(99);

        let mut index_root = IndexRootPage::new();
        index_root.set_tree(
            0,
            IndexTree {
                root: PageReference::durable(7),
                next_key: 12,
                depth: 1,
            },
        )
        .unwrap();

        vec![
            Page::Record(record),
            Page::Name(index_root.clone()),
            Page::Root(RootPage::new()),
            Page::Indirect(indirect),
            Page::RevisionRoot(RevisionRootPage::new(3)),
            Page::PathSummary(index_root.clone()),
            Page::Cas(index_root.clone()),
            Page::Overflow(OverflowPage::new(DataRecord::new(vec![1; 64]).to_bytes())),
            Page::Path(index_root.clone()),
            Page::DeweyId(index_root),
        ]
    }

    #[test]
    fn test_every_kind_is_registered_once() {
        let tags: Vec<u8> = registry().tags().collect();
        assert_eq!(tags, vec![1, 2, 3, 4, 5, 6, 8, 9, 10, 11]);
        for kind in PageKind::ALL {
            assert_eq!(PageKind::from_tag(kind.tag()).unwrap(), kind);
        }
    }

    #[test]
    fn test_every_kind_decodes_to_equal_page() {
        for page in sample_pages() {
            let bytes = page.encode().unwrap();
            assert_eq!(bytes[0], page.kind().tag());
            assert_eq!(Page::decode(&bytes).unwrap(), page);
        }
    }

    #[test]
    fn test_unknown_and_reserved_tags_are_fatal() {
        for tag in [0u8, 7, 12, 255] {
            let err = Page::decode(&[tag, 0, 0]).unwrap_err();
            assert!(err.is_fatal(), "tag {} should be fatal", tag);
        }
    }

    #[test]
    fn test_empty_page_is_format_error() {
        assert!(Page::decode(&[]).unwrap_err().is_fatal());
    }

    #[test]
    fn test_instantiate_clones_data_pages_only() {
        for page in sample_pages() {
            let copy = page.instantiate();
            assert_eq!(copy.kind(), page.kind());
            if page.kind().is_singleton() {
                assert_eq!(Some(copy), page.kind().empty_page());
            } else {
                assert_eq!(copy, page);
            }
        }
    }

    #[test]
    fn test_references_lists_children() {
        let pages = sample_pages();
        let offsets = |page: &Page| -> Vec<Option<u64>> {
            page.references().iter().map(|r| r.offset()).collect()
        };
        assert_eq!(offsets(&pages[1]), vec![Some(7)]);
        assert_eq!(offsets(&pages[3]), vec![Some(99)]);
        assert_eq!(offsets(&pages[2]), vec![None, None]);
        assert!(offsets(&pages[7]).is_empty());
    }

    #[test]
    fn test_trailing_payload_rejected() {
        let mut bytes = Page::Root(RootPage::new()).encode().unwrap();
        bytes.push(0);
        assert!(Page::decode(&bytes).is_err());
    }
}
