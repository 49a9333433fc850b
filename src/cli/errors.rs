//! CLI-specific error types
//!
//! All CLI errors end the process with a non-zero status.

use std::fmt;
use std::io;

use crate::resource::ResourceError;

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Invalid argument or configuration file
    ConfigError,
    /// I/O error (stdout or database files)
    IoError,
    /// Database or resource already exists
    AlreadyExists,
    /// Database or resource does not exist
    NotFound,
    /// Stored data failed verification
    Corruption,
    /// Any other storage failure
    StorageError,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "REVTREE_CLI_CONFIG_ERROR",
            Self::IoError => "REVTREE_CLI_IO_ERROR",
            Self::AlreadyExists => "REVTREE_CLI_ALREADY_EXISTS",
            Self::NotFound => "REVTREE_CLI_NOT_FOUND",
            Self::Corruption => "REVTREE_CLI_CORRUPTION",
            Self::StorageError => "REVTREE_CLI_STORAGE_ERROR",
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    /// Create a new CLI error
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Config error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    /// I/O error
    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    /// Get the error code
    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    /// Get the error code string
    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<ResourceError> for CliError {
    fn from(e: ResourceError) -> Self {
        let code = match &e {
            ResourceError::Config(_) | ResourceError::Json(_) => CliErrorCode::ConfigError,
            ResourceError::Io { .. } => CliErrorCode::IoError,
            ResourceError::AlreadyExists(_) => CliErrorCode::AlreadyExists,
            ResourceError::ResourceNotFound(_) | ResourceError::DatabaseNotFound(_) => {
                CliErrorCode::NotFound
            }
            ResourceError::Storage(s) if s.is_fatal() => CliErrorCode::Corruption,
            ResourceError::Page(p) if p.is_fatal() => CliErrorCode::Corruption,
            ResourceError::Node(n) if n.is_fatal() => CliErrorCode::Corruption,
            _ => CliErrorCode::StorageError,
        };
        Self::new(code, e.to_string())
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_errors_map_to_codes() {
        let err: CliError = ResourceError::ResourceNotFound("doc".into()).into();
        assert_eq!(err.code_str(), "REVTREE_CLI_NOT_FOUND");

        let err: CliError = ResourceError::Config("bad".into()).into();
        assert_eq!(err.code(), &CliErrorCode::ConfigError);
        assert!(err.to_string().starts_with("REVTREE_CLI_CONFIG_ERROR: "));
    }
}
