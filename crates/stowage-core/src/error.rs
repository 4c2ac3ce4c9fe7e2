//! Error types module
//!
//! Every storage operation reports failure through [`StoreError`]. Backend-specific
//! failures (HTTP statuses, filesystem errors, `object_store` errors) are mapped into
//! [`StoreError::Backend`] with a [`BackendErrorKind`] so callers can match on the
//! cause instead of inspecting the message.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::io;

/// Cause of a failure reported by a storage backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendErrorKind {
    /// The object or bucket does not exist remotely
    NotFound,
    /// The key (or bucket) already exists and overwriting was not allowed
    Conflict,
    /// Credentials were rejected or lack permission
    Unauthorized,
    /// Payload too large or storage quota exhausted
    QuotaExceeded,
    RateLimited,
    /// The backend answered with a server-side failure
    Unavailable,
    Timeout,
    /// The request never reached the backend or the connection broke
    Transport,
    /// The backend does not implement the operation
    Unsupported,
    Other,
}

impl BackendErrorKind {
    /// Map an HTTP status code onto an error kind.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => BackendErrorKind::Unauthorized,
            404 => BackendErrorKind::NotFound,
            408 => BackendErrorKind::Timeout,
            409 => BackendErrorKind::Conflict,
            413 | 507 => BackendErrorKind::QuotaExceeded,
            429 => BackendErrorKind::RateLimited,
            500..=599 => BackendErrorKind::Unavailable,
            _ => BackendErrorKind::Other,
        }
    }

    /// Whether a later attempt of the same call may succeed.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            BackendErrorKind::RateLimited
                | BackendErrorKind::Unavailable
                | BackendErrorKind::Timeout
                | BackendErrorKind::Transport
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BackendErrorKind::NotFound => "not_found",
            BackendErrorKind::Conflict => "conflict",
            BackendErrorKind::Unauthorized => "unauthorized",
            BackendErrorKind::QuotaExceeded => "quota_exceeded",
            BackendErrorKind::RateLimited => "rate_limited",
            BackendErrorKind::Unavailable => "unavailable",
            BackendErrorKind::Timeout => "timeout",
            BackendErrorKind::Transport => "transport",
            BackendErrorKind::Unsupported => "unsupported",
            BackendErrorKind::Other => "other",
        }
    }
}

impl Display for BackendErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Storage operation errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The local source file does not exist.
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Storage backend error ({kind}): {message}")]
    Backend {
        kind: BackendErrorKind,
        message: String,
    },
}

impl StoreError {
    pub fn backend(kind: BackendErrorKind, message: impl Into<String>) -> Self {
        StoreError::Backend {
            kind,
            message: message.into(),
        }
    }

    /// Backend error kind, if this is a backend failure.
    pub fn kind(&self) -> Option<BackendErrorKind> {
        match self {
            StoreError::Backend { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_some_and(BackendErrorKind::is_retryable)
    }

    /// Machine-readable error code (e.g., "CONFIGURATION_ERROR")
    pub fn error_code(&self) -> &'static str {
        match self {
            StoreError::Configuration(_) => "CONFIGURATION_ERROR",
            StoreError::NotFound(_) => "NOT_FOUND",
            StoreError::InvalidKey(_) => "INVALID_KEY",
            StoreError::Io(_) => "IO_ERROR",
            StoreError::Backend { .. } => "BACKEND_ERROR",
        }
    }
}

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_map_to_kinds() {
        assert_eq!(BackendErrorKind::from_status(401), BackendErrorKind::Unauthorized);
        assert_eq!(BackendErrorKind::from_status(403), BackendErrorKind::Unauthorized);
        assert_eq!(BackendErrorKind::from_status(404), BackendErrorKind::NotFound);
        assert_eq!(BackendErrorKind::from_status(409), BackendErrorKind::Conflict);
        assert_eq!(BackendErrorKind::from_status(413), BackendErrorKind::QuotaExceeded);
        assert_eq!(BackendErrorKind::from_status(429), BackendErrorKind::RateLimited);
        assert_eq!(BackendErrorKind::from_status(503), BackendErrorKind::Unavailable);
        assert_eq!(BackendErrorKind::from_status(400), BackendErrorKind::Other);
    }

    #[test]
    fn only_transient_kinds_are_retryable() {
        assert!(StoreError::backend(BackendErrorKind::Timeout, "slow").is_retryable());
        assert!(StoreError::backend(BackendErrorKind::Transport, "reset").is_retryable());
        assert!(!StoreError::backend(BackendErrorKind::Conflict, "exists").is_retryable());
        assert!(!StoreError::NotFound("clip.mp4".to_string()).is_retryable());
    }

    #[test]
    fn backend_error_message_includes_kind() {
        let err = StoreError::backend(BackendErrorKind::Conflict, "The resource already exists");
        assert_eq!(
            err.to_string(),
            "Storage backend error (conflict): The resource already exists"
        );
        assert_eq!(err.kind(), Some(BackendErrorKind::Conflict));
        assert_eq!(err.error_code(), "BACKEND_ERROR");
    }

    #[test]
    fn io_errors_convert() {
        let err: StoreError = io::Error::new(io::ErrorKind::PermissionDenied, "denied").into();
        assert!(matches!(err, StoreError::Io(_)));
        assert_eq!(err.kind(), None);
    }
}
