//! Unified error types for the thumbnail service.
//!
//! Every variant carries a stable code prefix so that front layers can map
//! failures without matching on message text.

use rmcp::model::{ErrorCode, ErrorData as McpError};
use tokio_rusqlite::rusqlite;

/// Unified error types for the thumbnail service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., unknown eviction mode).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// The resource identifier could not be resolved and no metadata is known.
    #[error("NOT_FOUND: {0}")]
    NotFound(String),

    /// ACL-read intersection is empty and the class is not allow-listed.
    #[error("UNAUTHORIZED: {0}")]
    Unauthorized(String),

    /// The original binary exceeds the configured size cap.
    #[error("FILE_TOO_LARGE: resource size ({size_mb} MB) exceeds the limit ({limit_mb} MB)")]
    FileTooLarge { size_mb: u64, limit_mb: u64 },

    /// The reference binary could not be fetched or has an unexpected mime type.
    #[error("REFERENCE_UNAVAILABLE: {0}")]
    ReferenceUnavailable(String),

    /// Every handler, including the default one, declined.
    #[error("NO_THUMBNAIL: {0}")]
    NoThumbnail(String),

    /// The default handler itself failed.
    #[error("GENERATION_FAILED: {0}")]
    GenerationFailed(String),

    /// Following the redirect chain failed at the transport level.
    #[error("RESOLUTION_FAILED: {0}")]
    ResolutionFailed(String),

    /// HTTP error response or network failure during a metadata or binary fetch.
    #[error("HTTP_ERROR: {0}")]
    HttpError(String),

    /// The metadata graph could not be parsed.
    #[error("GRAPH_PARSE: {0}")]
    GraphParse(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// Filesystem operation on the thumbnail cache failed.
    #[error("CACHE_ERROR: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// HTTP-equivalent status for the front layer.
    pub fn status(&self) -> u16 {
        match self {
            Error::InvalidInput(_) => 400,
            Error::Unauthorized(_) => 401,
            Error::NotFound(_) | Error::NoThumbnail(_) => 404,
            Error::FileTooLarge { .. } => 413,
            Error::ReferenceUnavailable(_) | Error::ResolutionFailed(_) | Error::HttpError(_) | Error::GraphParse(_) => {
                502
            }
            Error::GenerationFailed(_) | Error::Database(_) | Error::MigrationFailed(_) | Error::Io(_) => 500,
        }
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let code = match &err {
            Error::InvalidInput(_) => -32602,
            Error::NotFound(_) => -32001,
            Error::Unauthorized(_) => -32003,
            Error::FileTooLarge { .. } => -32004,
            Error::ReferenceUnavailable(_) => -32005,
            Error::NoThumbnail(_) => -32006,
            Error::GenerationFailed(_) => -32007,
            Error::ResolutionFailed(_) => -32008,
            Error::HttpError(_) => -32009,
            Error::GraphParse(_) => -32010,
            Error::Database(_) | Error::MigrationFailed(_) | Error::Io(_) => -32002,
        };

        McpError { code: ErrorCode(code), message: err.to_string().into(), data: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::NotFound("http://12345".to_string());
        assert!(err.to_string().contains("NOT_FOUND"));
        assert!(err.to_string().contains("http://12345"));
    }

    #[test]
    fn test_file_too_large_display() {
        let err = Error::FileTooLarge { size_mb: 120, limit_mb: 100 };
        assert_eq!(
            err.to_string(),
            "FILE_TOO_LARGE: resource size (120 MB) exceeds the limit (100 MB)"
        );
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(Error::Unauthorized("x".into()).status(), 401);
        assert_eq!(Error::FileTooLarge { size_mb: 2, limit_mb: 1 }.status(), 413);
        assert_eq!(Error::NoThumbnail("x".into()).status(), 404);
        assert_eq!(Error::GenerationFailed("x".into()).status(), 500);
        assert_eq!(Error::InvalidInput("x".into()).status(), 400);
    }

    #[test]
    fn test_error_to_mcp_error() {
        let err = Error::Unauthorized("http://12345".to_string());
        let mcp_err: McpError = err.into();
        assert_eq!(mcp_err.code.0, -32003);
        assert!(mcp_err.message.contains("UNAUTHORIZED"));
    }
}
