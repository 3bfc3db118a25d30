//! Error types for docdex

use std::time::Duration;
use thiserror::Error;

/// docdex error type
#[derive(Error, Debug)]
pub enum Error {
    /// Missing document root or document path
    #[error("{what} not found: {path}")]
    NotFound { what: &'static str, path: String },

    /// A file or directory could not be read
    #[error("Cannot read {path}: {reason}")]
    Access { path: String, reason: String },

    /// Malformed operation arguments
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Directory scan exceeded its time bound
    #[error("Scan timed out after {0:?}")]
    Timeout(Duration),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// External answer generation failed
    #[error("Answer generation failed: {0}")]
    Answer(String),
}

/// Coarse classification used at the adapter boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Access,
    InvalidArgument,
    Timeout,
    Internal,
}

impl Error {
    /// Document lookup failure for `path`
    pub fn document_not_found(path: impl Into<String>) -> Self {
        Error::NotFound {
            what: "Document",
            path: path.into(),
        }
    }

    /// Missing or non-directory document root
    pub fn root_not_found(path: &std::path::Path) -> Self {
        Error::NotFound {
            what: "Document root",
            path: path.display().to_string(),
        }
    }

    /// Which error class this belongs to
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::Access { .. } => ErrorKind::Access,
            Error::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Error::Timeout(_) => ErrorKind::Timeout,
            Error::Io(_) | Error::Serialization(_) | Error::ConfigError(_) | Error::Answer(_) => {
                ErrorKind::Internal
            }
        }
    }
}

/// Result type alias for docdex operations
pub type Result<T> = std::result::Result<T, Error>;

impl From<glob::PatternError> for Error {
    fn from(err: glob::PatternError) -> Self {
        Error::ConfigError(format!("Invalid glob pattern: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::document_not_found("guides/setup.md");
        assert_eq!(err.to_string(), "Document not found: guides/setup.md");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_invalid_argument_names_constraint() {
        let err = Error::InvalidArgument("max_results must be greater than 0, got 0".into());
        assert!(err.to_string().contains("max_results must be greater than 0"));
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_pattern_error_is_config() {
        let err: Error = glob::Pattern::new("[").unwrap_err().into();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(err.to_string().starts_with("Configuration error"));
    }
}
