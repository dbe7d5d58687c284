//! # Error Taxonomy
//!
//! Every failure crossing a gateway boundary is normalized into one of three
//! kinds before the engine sees it:
//!
//! - [`ErrorKind::Connectivity`]: transient backend trouble (connection reset,
//!   timeout, lock contention). The only retryable kind.
//! - [`ErrorKind::Operation`]: semantic failure (not found, permission denied,
//!   failed precondition). Never retried.
//! - [`ErrorKind::Validation`]: caller misuse (bad identifiers, empty batch).
//!   Never retried.
//!
//! Backend-specific errors (`sqlx::Error`, `std::io::Error`) are converted via
//! the `From` impls at the bottom of this module.

use thiserror::Error;

/// Closed set of error kinds the retry policy reasons about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Connectivity,
    Operation,
    Validation,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Connectivity => write!(f, "connectivity"),
            ErrorKind::Operation => write!(f, "operation"),
            ErrorKind::Validation => write!(f, "validation"),
        }
    }
}

#[derive(Debug, Error)]
pub enum RequestError {
    /// Transient backend failure; safe to retry
    #[error("Connectivity error during {operation}: {reason}")]
    Connectivity { operation: String, reason: String },

    /// The addressed resource (request, remote file, row) does not exist
    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("Operation {operation} failed: {reason}")]
    Operation { operation: String, reason: String },

    #[error("Validation error: {0}")]
    Validation(String),

    /// Retry budget spent on a retryable error; wraps the last failure
    #[error("{operation} failed after {attempts} retries: {source}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        #[source]
        source: Box<RequestError>,
    },

    /// Checksums were deleted but the rerun trigger did not go through
    #[error(
        "Request {request_id}: {checksums_deleted} checksums cleared but rerun not triggered: {reason}"
    )]
    PartialRerun {
        request_id: i64,
        checksums_deleted: u64,
        reason: String,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl RequestError {
    pub fn connectivity(operation: impl Into<String>, reason: impl ToString) -> Self {
        Self::Connectivity {
            operation: operation.into(),
            reason: reason.to_string(),
        }
    }

    pub fn operation(operation: impl Into<String>, reason: impl ToString) -> Self {
        Self::Operation {
            operation: operation.into(),
            reason: reason.to_string(),
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Classify this error into the closed kind set
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Connectivity { .. } => ErrorKind::Connectivity,
            Self::NotFound { .. } | Self::Operation { .. } | Self::PartialRerun { .. } => {
                ErrorKind::Operation
            }
            Self::Validation(_) | Self::Configuration(_) => ErrorKind::Validation,
            Self::RetriesExhausted { source, .. } => source.kind(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connectivity { .. })
    }

    /// True for a "not found" condition, looking through retry wrappers
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::RetriesExhausted { source, .. } => source.is_not_found(),
            _ => false,
        }
    }

    pub fn is_retries_exhausted(&self) -> bool {
        matches!(self, Self::RetriesExhausted { .. })
    }
}

pub type Result<T> = std::result::Result<T, RequestError>;

impl From<std::io::Error> for RequestError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind as Io;
        match err.kind() {
            Io::NotFound => RequestError::not_found(err.to_string()),
            Io::ConnectionReset
            | Io::ConnectionRefused
            | Io::ConnectionAborted
            | Io::NotConnected
            | Io::TimedOut
            | Io::BrokenPipe
            | Io::Interrupted
            | Io::WouldBlock
            | Io::UnexpectedEof => RequestError::connectivity("io", err),
            Io::PermissionDenied => RequestError::operation("io", format!("permission denied: {err}")),
            _ => RequestError::operation("io", err),
        }
    }
}

/// PostgreSQL SQLSTATE codes that signal contention rather than a semantic failure
const TRANSIENT_SQLSTATES: &[&str] = &["40001", "40P01", "55P03", "57014", "53300"];

impl From<sqlx::Error> for RequestError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => RequestError::not_found("database row"),
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::WorkerCrashed => RequestError::connectivity("database", &err),
            sqlx::Error::Database(db_err) => {
                let transient = db_err
                    .code()
                    .map(|code| TRANSIENT_SQLSTATES.contains(&code.as_ref()))
                    .unwrap_or(false);
                if transient {
                    RequestError::connectivity("database", &err)
                } else {
                    RequestError::operation("database", &err)
                }
            }
            _ => RequestError::operation("database", &err),
        }
    }
}

impl From<serde_json::Error> for RequestError {
    fn from(err: serde_json::Error) -> Self {
        RequestError::Validation(format!("JSON serialization error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(
            RequestError::connectivity("fetch", "reset").kind(),
            ErrorKind::Connectivity
        );
        assert_eq!(RequestError::not_found("x").kind(), ErrorKind::Operation);
        assert_eq!(RequestError::validation("bad").kind(), ErrorKind::Validation);
        assert_eq!(
            RequestError::Configuration("bad".into()).kind(),
            ErrorKind::Validation
        );
    }

    #[test]
    fn test_only_connectivity_is_retryable() {
        assert!(RequestError::connectivity("fetch", "timeout").is_retryable());
        assert!(!RequestError::operation("fetch", "denied").is_retryable());
        assert!(!RequestError::not_found("file").is_retryable());
        assert!(!RequestError::validation("empty").is_retryable());
    }

    #[test]
    fn test_retries_exhausted_reports_source_kind() {
        let err = RequestError::RetriesExhausted {
            operation: "fetch".into(),
            attempts: 3,
            source: Box::new(RequestError::connectivity("fetch", "reset")),
        };
        assert_eq!(err.kind(), ErrorKind::Connectivity);
        assert!(!err.is_retryable());
        assert!(err.is_retries_exhausted());
        assert!(err.to_string().contains("after 3 retries"));
    }

    #[test]
    fn test_io_error_normalization() {
        let missing: RequestError =
            std::io::Error::new(std::io::ErrorKind::NotFound, "no such file").into();
        assert!(missing.is_not_found());

        let reset: RequestError =
            std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset").into();
        assert!(reset.is_retryable());

        let denied: RequestError =
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied").into();
        assert_eq!(denied.kind(), ErrorKind::Operation);
    }

    #[test]
    fn test_sqlx_error_normalization() {
        assert!(RequestError::from(sqlx::Error::RowNotFound).is_not_found());
        assert!(RequestError::from(sqlx::Error::PoolTimedOut).is_retryable());
        assert!(RequestError::from(sqlx::Error::PoolClosed).is_retryable());
        assert_eq!(
            RequestError::from(sqlx::Error::ColumnNotFound("x".into())).kind(),
            ErrorKind::Operation
        );
    }
}
