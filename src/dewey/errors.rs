//! # DeweyID Errors

use thiserror::Error;

/// Result type for label operations
pub type DeweyResult<T> = Result<T, DeweyError>;

/// Label construction and allocation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeweyError {
    #[error("Invalid DeweyID {label}: {reason}")]
    InvalidLabel { label: String, reason: String },

    #[error("DeweyID {label} is not a child of {parent}")]
    NotAChild { label: String, parent: String },

    #[error("DeweyIDs {left} and {right} belong to different node classes")]
    ClassMismatch { left: String, right: String },

    #[error("DeweyID {left} does not precede {right}")]
    Unordered { left: String, right: String },

    #[error("Division overflow while allocating after {0}")]
    DivisionOverflow(String),

    #[error("Truncated DeweyID encoding")]
    Truncated,
}

impl DeweyError {
    pub(crate) fn invalid(divisions: &[u64], reason: impl Into<String>) -> Self {
        let label = divisions
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join(".");
        DeweyError::InvalidLabel {
            label,
            reason: reason.into(),
        }
    }
}
