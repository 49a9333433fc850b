//! Page transactions
//!
//! - [`PageStore`]: shared state of one resource (storage, cache, writer flag)
//! - [`PageReadTrx`]: pinned to one committed revision
//! - [`PageWriteTrx`]: the single writer, building the next revision in its
//!   transaction log
//!
//! Readers never observe pages of an open write transaction; a revision is
//! visible only after its root pointer swap.

mod descent;
mod log;
mod read;
mod store;
mod verify;
mod write;

pub use log::TransactionLog;
pub use read::PageReadTrx;
pub use store::{PageStore, StoreOptions, DEFAULT_CACHE_ENTRIES, DEFAULT_INLINE_RECORD_LIMIT};
pub use verify::VerifyReport;
pub use write::{PageWriteTrx, PreparedCommit};
