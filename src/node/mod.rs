//! Structural node model
//!
//! Just enough of a document model to place and label nodes: a kind,
//! structural pointers and an optional name and value per node. Nodes are
//! records of the document index tree.

mod errors;
mod read;
mod record;
mod write;

pub use errors::{NodeError, NodeResult};
pub use read::NodeReadTrx;
pub use record::{NewNode, NodeKind, StructNode, DOCUMENT_ROOT_KEY};
pub use write::NodeWriteTrx;

use crate::dewey::DeweyId;

/// Node access needed to compute labels.
pub trait StructuralNodes {
    /// Current state of node `key`; `NotFound` for keys holding no node.
    fn node(&self, key: u64) -> NodeResult<StructNode>;

    /// Replaces the label of node `key`.
    fn update_dewey_id(&mut self, key: u64, id: DeweyId) -> NodeResult<()>;
}
