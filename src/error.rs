//! Error types for preference storage operations.
//!
//! A stored value that no longer matches the type a store was declared with
//! is reported as [`PrefsError::Deserialization`] rather than aborting the
//! process.

use std::fmt;

use thiserror::Error;

use crate::value::RawValue;

/// Boxed error returned by fallible update handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur during preference storage operations.
#[derive(Debug, Error)]
pub enum PrefsError {
    /// A value is stored under the key but cannot be converted into the
    /// store's element type.
    #[error("invalid stored value for key {key:?}: {raw:?}")]
    Deserialization { key: String, raw: RawValue },

    /// Invalid key format.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// The write succeeded but one or more update handlers failed.
    #[error("{} update handler(s) failed for key {key:?}", .failures.len())]
    Notification {
        key: String,
        failures: Vec<HandlerFailure>,
    },

    /// The backing document could not be understood.
    #[error("corrupt preference data: {0}")]
    Corrupt(String),

    /// Serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for preference operations.
pub type Result<T> = std::result::Result<T, PrefsError>;

impl PrefsError {
    /// Returns true if this error was caused by persisted data that does not
    /// have the expected shape.
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            PrefsError::Deserialization { .. } | PrefsError::Corrupt(_)
        )
    }
}

impl From<serde_json::Error> for PrefsError {
    fn from(err: serde_json::Error) -> Self {
        PrefsError::Serialization(err.to_string())
    }
}

/// A single update handler failure collected during notification.
#[derive(Debug)]
pub struct HandlerFailure {
    /// Position of the handler in registration order.
    pub index: usize,
    /// The error the handler returned.
    pub error: BoxError,
}

impl fmt::Display for HandlerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handler #{}: {}", self.index, self.error)
    }
}
