//! Unified error handling for the latency harness
//!
//! Every fallible operation in the crate returns [`BenchResult`]. Errors are
//! grouped into categories so the binary can tell an operator mistake apart
//! from an engine or filesystem failure:
//! - User errors (malformed sweep grid, bad flags)
//! - Backend errors (the engine or a profiler failed)
//! - I/O errors (report or trace could not be written)
//! - Internal errors (bugs)
//!
//! Nothing here is retried; every error ends the sweep.

use std::fmt;

use crate::profiling::ProfilingError;

/// Unified error type for the latency harness
#[derive(Debug, thiserror::Error)]
pub enum BenchError {
    // ========== User Errors ==========
    /// Malformed sweep grid or engine arguments
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    // ========== Backend Errors ==========
    /// The engine's generate capability failed
    #[error("Engine failure: {0}")]
    EngineFailure(String),

    /// A profiling or tracing session failed
    #[error("Profiling failed: {0}")]
    Profiling(#[from] ProfilingError),

    // ========== I/O Errors ==========
    /// File I/O error
    #[error("I/O error: {0}")]
    IoFailure(#[from] std::io::Error),

    /// The report table could not be serialized
    #[error("Report write failed: {0}")]
    ReportWrite(String),

    // ========== Internal Errors ==========
    /// Internal error (indicates a bug)
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl BenchError {
    /// Categorize the error for reporting
    pub fn category(&self) -> ErrorCategory {
        match self {
            BenchError::InvalidConfiguration(_) => ErrorCategory::User,
            BenchError::EngineFailure(_) | BenchError::Profiling(_) => ErrorCategory::Backend,
            BenchError::IoFailure(_) | BenchError::ReportWrite(_) => ErrorCategory::Io,
            BenchError::InternalError(_) => ErrorCategory::Internal,
        }
    }

    /// Check if this is a user-facing error (fix the command line)
    pub fn is_user_error(&self) -> bool {
        matches!(self.category(), ErrorCategory::User)
    }

    /// Check if this error came from the engine or a profiler
    pub fn is_backend_error(&self) -> bool {
        matches!(self.category(), ErrorCategory::Backend)
    }
}

/// Error category for reporting decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// User error - invalid grid or flags
    User,
    /// Backend error - engine or profiler failure
    Backend,
    /// I/O error - report or trace persistence
    Io,
    /// Internal error - indicates a bug
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::User => write!(f, "User"),
            ErrorCategory::Backend => write!(f, "Backend"),
            ErrorCategory::Io => write!(f, "Io"),
            ErrorCategory::Internal => write!(f, "Internal"),
        }
    }
}

impl From<csv::Error> for BenchError {
    fn from(err: csv::Error) -> Self {
        BenchError::ReportWrite(err.to_string())
    }
}

/// Result type alias used throughout the crate
pub type BenchResult<T> = std::result::Result<T, BenchError>;

// ========== Helper Functions ==========

/// Build an `InvalidConfiguration` error
///
/// # Examples
/// ```ignore
/// return Err(invalid_config("batch size must be positive"));
/// ```
pub fn invalid_config(msg: impl Into<String>) -> BenchError {
    BenchError::InvalidConfiguration(msg.into())
}

/// Build an `EngineFailure` from any engine-side error
///
/// # Examples
/// ```ignore
/// let resp = client.send().await.map_err(|e| engine_failure("POST /v1/completions", e))?;
/// ```
pub fn engine_failure<E: fmt::Display>(what: &str, err: E) -> BenchError {
    BenchError::EngineFailure(format!("{}: {}", what, err))
}

/// Wrap an IO error with context, keeping its kind
///
/// # Examples
/// ```ignore
/// std::fs::create_dir_all(dir).map_err(|e| io_context(e, "creating trace dir"))?;
/// ```
pub fn io_context(err: std::io::Error, msg: &str) -> BenchError {
    BenchError::IoFailure(std::io::Error::new(err.kind(), format!("{}: {}", msg, err)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        assert_eq!(
            BenchError::InvalidConfiguration("x".to_string()).category(),
            ErrorCategory::User
        );
        assert_eq!(
            BenchError::EngineFailure("x".to_string()).category(),
            ErrorCategory::Backend
        );
        assert_eq!(
            BenchError::Profiling(ProfilingError::SessionError("x".to_string())).category(),
            ErrorCategory::Backend
        );
        assert_eq!(
            BenchError::ReportWrite("x".to_string()).category(),
            ErrorCategory::Io
        );
        assert_eq!(
            BenchError::InternalError("x".to_string()).category(),
            ErrorCategory::Internal
        );
    }

    #[test]
    fn test_error_display() {
        let err = invalid_config("input length must be positive");
        assert_eq!(
            err.to_string(),
            "Invalid configuration: input length must be positive"
        );
        assert!(err.is_user_error());

        let err = engine_failure("generate", "connection refused");
        assert_eq!(err.to_string(), "Engine failure: generate: connection refused");
        assert!(err.is_backend_error());
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: BenchError = io.into();
        assert_eq!(err.category(), ErrorCategory::Io);
    }

    #[test]
    fn test_io_context_keeps_kind() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        match io_context(io, "writing report") {
            BenchError::IoFailure(inner) => {
                assert_eq!(inner.kind(), std::io::ErrorKind::PermissionDenied);
                assert!(inner.to_string().contains("writing report"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_error_category_display() {
        assert_eq!(ErrorCategory::User.to_string(), "User");
        assert_eq!(ErrorCategory::Io.to_string(), "Io");
    }
}
