//! Error types for Swforge

use thiserror::Error;

/// Result type alias for Swforge operations
pub type SwResult<T> = Result<T, SwError>;

/// Errors raised while resolving a public URL to a local file path.
///
/// All three variants collapse into the same "invalid source" diagnostic
/// at the assembly layer; the distinction exists for callers that want to
/// know why a fragment was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// The input was empty or could not be parsed as a URL at all.
    #[error("Invalid file path format: {0:?}")]
    InvalidPathFormat(String),

    /// The URL points at a host other than the content directory's host.
    /// Cross-origin file sources are never allowed.
    #[error("External file URL rejected: {0}")]
    ExternalFileUrl(String),

    /// The URL maps outside the content directory, contains a traversal
    /// segment, or points at a file that does not exist.
    #[error("File path not found for URL: {0}")]
    FilePathNotFound(String),
}

/// Main error type for Swforge
#[derive(Error, Debug)]
pub enum SwError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Script source error: {0}")]
    Source(String),

    #[error("Resolve error: {0}")]
    Resolve(#[from] ResolveError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

impl SwError {
    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new script source error
    pub fn source(msg: impl Into<String>) -> Self {
        Self::Source(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_error_display() {
        let err = ResolveError::ExternalFileUrl("https://evil.example/x.js".to_string());
        assert!(err.to_string().contains("evil.example"));
    }

    #[test]
    fn test_resolve_error_converts() {
        let err: SwError = ResolveError::InvalidPathFormat(String::new()).into();
        assert!(matches!(err, SwError::Resolve(_)));
    }
}
