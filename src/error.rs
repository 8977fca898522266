//! Error types for livewatch.
//!
//! All errors are strongly typed using thiserror so callers can match on
//! specific conditions. The reconciliation core itself has no fatal
//! conditions; errors come from caller contract violations (malformed
//! entries, bad configuration) and from the edges (storage, queues).

use thiserror::Error;

use crate::storage::StorageError;

/// Validation errors raised before any state is touched.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A poll entry is missing a required value or names another service.
    #[error("Entry {index} of the {service} poll has an invalid '{field}'")]
    MalformedEntry {
        /// Service the poll was submitted for.
        service: String,
        /// Position of the entry in the poll.
        index: usize,
        /// Wire name of the offending field.
        field: &'static str,
    },

    /// A configuration value is out of range.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// What is wrong with it.
        reason: String,
    },
}

/// Execution errors from the runtime plumbing around the core.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// A bounded queue rejected a submission.
    #[error("Queue '{path}' is full (capacity {capacity})")]
    QueueFull {
        /// Queue name.
        path: String,
        /// Configured capacity.
        capacity: usize,
    },

    /// The worker behind a channel has gone away.
    #[error("Channel '{path}' is disconnected")]
    Disconnected {
        /// Channel name.
        path: String,
    },

    /// A wait ran past its deadline.
    #[error("Operation timed out after {duration_ms}ms")]
    Timeout {
        /// How long was waited.
        duration_ms: u64,
    },

    /// The OS refused to start a worker thread.
    #[error("Failed to spawn worker '{name}': {message}")]
    Spawn {
        /// Thread name.
        name: String,
        /// OS error text.
        message: String,
    },
}

/// Top-level error type for livewatch.
#[derive(Debug, Error)]
pub enum LiveError {
    /// Rejected input.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Queue or worker failure.
    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    /// Persistence failure.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Broken internal invariant, such as a poisoned lock.
    #[error("Internal error: {message}")]
    Internal {
        /// Description.
        message: String,
    },
}

impl LiveError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is an execution error.
    #[must_use]
    pub const fn is_execution(&self) -> bool {
        matches!(self, Self::Execution(_))
    }

    /// Returns true if this is a storage error.
    #[must_use]
    pub const fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    /// Returns true if this is an internal error.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Validation(_) => false,
            Self::Execution(e) => matches!(e, ExecutionError::QueueFull { .. } | ExecutionError::Timeout { .. }),
            Self::Storage(e) => e.is_transient(),
            Self::Internal { .. } => false,
        }
    }
}

/// Result type alias for livewatch operations.
pub type LiveResult<T> = Result<T, LiveError>;
