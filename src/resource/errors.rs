//! # Resource Errors

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::node::NodeError;
use crate::page::PageError;
use crate::storage::StorageError;

pub type ResourceResult<T> = Result<T, ResourceError>;

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Page(#[from] PageError),

    #[error(transparent)]
    Node(#[from] NodeError),

    #[error("{0} already exists")]
    AlreadyExists(PathBuf),

    #[error("Resource '{0}' not found")]
    ResourceNotFound(String),

    #[error("No database at {0}")]
    DatabaseNotFound(PathBuf),
}

impl ResourceError {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        ResourceError::Io {
            context: context.into(),
            source,
        }
    }
}
