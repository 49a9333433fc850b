//! DeweyID node labels
//!
//! - [`DeweyId`]: immutable label, ordered like the document
//! - [`allocate`]: dense allocation of one step between two bounds
//! - [`manager`]: labels for inserts and subtree relabeling through the
//!   structural node interface

pub mod allocate;
mod errors;
mod id;
pub mod manager;

pub use allocate::{FIRST_DIVISION, SUBDIVISION_START};
pub use errors::{DeweyError, DeweyResult};
pub use id::{DeweyId, LabelClass, ATTRIBUTE_MARKER, NAMESPACE_MARKER, ROOT_DIVISION};
pub use manager::compute_new_dewey_ids;
