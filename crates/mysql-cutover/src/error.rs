//! Error types for the cut-over library.

use thiserror::Error;

/// MySQL `ER_LOCK_WAIT_TIMEOUT`.
pub const ER_LOCK_WAIT_TIMEOUT: u16 = 1205;

/// MySQL `ER_NO_SUCH_THREAD` ("Unknown thread id").
pub const ER_NO_SUCH_THREAD: u16 = 1094;

/// How a database failure should be treated by the lock guard and the switcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbErrorKind {
    /// The server gave up waiting for a lock within `lock_wait_timeout`.
    LockWaitTimeout,
    /// A `KILL` target no longer exists (it finished before we got to it).
    VanishedTarget,
    /// Anything else.
    Other,
}

/// An error reported by the database, kept as the server sent it.
///
/// This is the error callers get back from a failed guarded statement or
/// switch, never a wrapped copy, so it can be inspected with [`DbError::kind`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{}", display_db_error(.code, .message))]
pub struct DbError {
    /// Native server error code, when the driver exposes one.
    pub code: Option<u16>,
    /// SQLSTATE, when the driver exposes one.
    pub state: Option<String>,
    /// Server (or driver) error message.
    pub message: String,
}

fn display_db_error(code: &Option<u16>, message: &str) -> String {
    match code {
        Some(code) => format!("ERROR {}: {}", code, message),
        None => message.to_string(),
    }
}

impl DbError {
    /// Error reported by the server with a native code.
    pub fn server(code: u16, state: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            state: Some(state.into()),
            message: message.into(),
        }
    }

    /// Error without a native code (transport failures, driver errors).
    pub fn other(message: impl Into<String>) -> Self {
        Self {
            code: None,
            state: None,
            message: message.into(),
        }
    }

    /// Shorthand for a server-side lock wait timeout.
    pub fn lock_wait_timeout() -> Self {
        Self::server(
            ER_LOCK_WAIT_TIMEOUT,
            "HY000",
            "Lock wait timeout exceeded; try restarting transaction",
        )
    }

    /// Classify this error.
    ///
    /// The native code wins when present; message patterns are only consulted
    /// for errors that carry no code.
    pub fn kind(&self) -> DbErrorKind {
        match self.code {
            Some(ER_LOCK_WAIT_TIMEOUT) => DbErrorKind::LockWaitTimeout,
            Some(ER_NO_SUCH_THREAD) => DbErrorKind::VanishedTarget,
            Some(_) => DbErrorKind::Other,
            None if self.message.contains("Lock wait timeout exceeded") => {
                DbErrorKind::LockWaitTimeout
            }
            None if self.message.contains("Unknown thread id") => DbErrorKind::VanishedTarget,
            None => DbErrorKind::Other,
        }
    }

    /// True if this is a lock wait timeout.
    pub fn is_lock_wait_timeout(&self) -> bool {
        self.kind() == DbErrorKind::LockWaitTimeout
    }
}

/// Result type for raw database calls.
pub type DbResult<T> = std::result::Result<T, DbError>;

/// Main error type for cut-over operations.
#[derive(Error, Debug)]
pub enum CutoverError {
    /// Database error, passed through untouched
    #[error(transparent)]
    Database(#[from] DbError),

    /// Configuration error (invalid YAML, out-of-range values, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pre-flight check failed (missing tables, clashing names)
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Unexpected result shape from the server
    #[error("Unexpected result for `{sql}`: {message}")]
    UnexpectedResult { sql: String, message: String },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl CutoverError {
    /// Create an UnexpectedResult error
    pub fn unexpected(sql: impl Into<String>, message: impl Into<String>) -> Self {
        CutoverError::UnexpectedResult {
            sql: sql.into(),
            message: message.into(),
        }
    }

    /// The underlying database error, if this is one.
    pub fn as_db_error(&self) -> Option<&DbError> {
        match self {
            CutoverError::Database(e) => Some(e),
            _ => None,
        }
    }

    /// True if this wraps a lock wait timeout reported by the server.
    pub fn is_lock_wait_timeout(&self) -> bool {
        self.as_db_error()
            .map(DbError::is_lock_wait_timeout)
            .unwrap_or(false)
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for cut-over operations.
pub type Result<T> = std::result::Result<T, CutoverError>;
