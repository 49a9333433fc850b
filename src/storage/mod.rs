//! Durable page storage
//!
//! Pages are written as an append-only sequence of checksummed frames. A
//! revision becomes visible only when the root pointer is replaced after all
//! of its pages have been synced.
//!
//! # Design Principles
//!
//! - Append-only (no in-place updates)
//! - Checksum-verified on every read
//! - Any frame failure is corruption and halts the read
//! - One root pointer swap per commit

mod checksum;
mod errors;
mod file;
mod frame;
mod memory;
mod root_pointer;

pub use checksum::{compute_checksum, verify_checksum};
pub use errors::{Severity, StorageError, StorageErrorCode, StorageResult};
pub use file::{FileStorage, PAGE_FILE_NAME};
pub use frame::{decode_frame, encode_frame, MIN_FRAME_SIZE};
pub use memory::MemoryStorage;
pub use root_pointer::{RootPointer, RootPointerFile, POINTER_FORMAT_VERSION};

/// Backend holding serialized pages and the root pointer of one resource.
///
/// Offsets returned by `append` are stable for the lifetime of the storage
/// and identify a page everywhere a reference to it is persisted.
pub trait PageStorage: Send {
    /// Appends one serialized page (tag byte first) and returns its offset.
    fn append(&mut self, page_bytes: &[u8]) -> StorageResult<u64>;

    /// Reads back the page bytes stored at `offset`, verifying the checksum.
    fn read(&mut self, offset: u64) -> StorageResult<Vec<u8>>;

    /// Makes every appended page durable.
    fn sync(&mut self) -> StorageResult<()>;

    /// Returns the currently published root pointer, if any.
    fn read_root_pointer(&mut self) -> StorageResult<Option<RootPointer>>;

    /// Atomically replaces the published root pointer.
    fn write_root_pointer(&mut self, pointer: &RootPointer) -> StorageResult<()>;
}
