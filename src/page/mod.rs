//! Copy-on-write page model
//!
//! A revision is a tree of pages. Index trees map a record key to the leaf
//! page holding it through fixed fan-out indirect pages:
//!
//! ```text
//! RootPage ──latest──────────────▶ RevisionRootPage (rev n)
//!    └─revisions tree──▶ Indirect ─▶ RevisionRootPage (rev 0..n)
//!
//! RevisionRootPage ──document tree──▶ Indirect ─▶ ... ─▶ RecordPage
//!                  ──name/path/cas/…─▶ IndexRootPage ─▶ trees ─▶ RecordPage
//! ```
//!
//! Pages reachable from a published root are immutable. A write transaction
//! copies every page on the path to a leaf it modifies; everything else is
//! shared with the previous revision by offset.

mod cache;
mod codec;
mod errors;
mod index_root;
mod indirect;
mod kind;
mod record;
mod reference;
mod revision_root;
mod root;

pub use cache::{CacheStats, PageCache};
pub use codec::{PageDecoder, PageEncoder};
pub use errors::{PageError, PageErrorCode, PageResult};
pub use index_root::{IndexRootPage, IndexTree, IndexType};
pub use indirect::IndirectPage;
pub use kind::{registry, Page, PageKind, PageKindEntry, PageRegistry};
pub use record::{DataRecord, OverflowPage, RecordEntry, RecordPage};
pub use reference::{LogKey, PageReference};
pub use revision_root::{RevisionRootPage, User};
pub use root::RootPage;

/// log2 of the indirect page fan-out
pub const INDIRECT_EXPONENT: u32 = 7;

/// Child references per indirect page
pub const FANOUT: usize = 1 << INDIRECT_EXPONENT;

/// log2 of the number of record keys per leaf page
pub const RECORD_EXPONENT: u32 = 7;

/// Record keys per leaf page
pub const RECORDS_PER_PAGE: u64 = 1 << RECORD_EXPONENT;

/// Enough levels to address every leaf of a 64-bit key space
pub const MAX_TREE_DEPTH: u8 = 9;

/// Leaf page holding a record key.
pub fn leaf_key(record_key: u64) -> u64 {
    record_key >> RECORD_EXPONENT
}

/// Number of leaves addressable by a tree of `depth` indirect levels.
///
/// Depth 0 means the tree root references the single leaf directly.
pub fn tree_capacity(depth: u8) -> u64 {
    (FANOUT as u64)
        .checked_pow(u32::from(depth))
        .unwrap_or(u64::MAX)
}

/// Slot taken at indirect `level` (0 = directly above the leaves).
pub fn slot_index(leaf_key: u64, level: u8) -> usize {
    ((leaf_key >> (u32::from(level) * INDIRECT_EXPONENT)) & (FANOUT as u64 - 1)) as usize
}
