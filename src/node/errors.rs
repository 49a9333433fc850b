//! # Node Errors

use thiserror::Error;

use crate::dewey::DeweyError;
use crate::page::PageError;

pub type NodeResult<T> = Result<T, NodeError>;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Page(#[from] PageError),

    #[error(transparent)]
    Label(#[from] DeweyError),

    /// Navigation to a key that holds no node
    #[error("Node {0} does not exist")]
    NotFound(u64),

    #[error("Node {0} has no DeweyID")]
    MissingLabel(u64),

    #[error("Invalid structure: {0}")]
    InvalidStructure(String),

    #[error("Corrupt node record {key}: {reason}")]
    CorruptRecord { key: u64, reason: String },
}

impl NodeError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        NodeError::InvalidStructure(message.into())
    }

    /// Format and storage corruption, as opposed to caller mistakes.
    pub fn is_fatal(&self) -> bool {
        match self {
            NodeError::Page(e) => e.is_fatal(),
            NodeError::CorruptRecord { .. } => true,
            _ => false,
        }
    }
}
