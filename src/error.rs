//! Error types used by the coordinator and by worker loops.
//!
//! This module defines two main error enums:
//!
//! - [`CoordinatorError`]: misuse of the coordinator API (invalid sizing, no runtime).
//! - [`WorkerError`]: outcomes that end a worker cycle: cancellation, source
//!   failures, dispatch failures.
//!
//! Both types provide helper methods (`as_label`, `as_message`) for logging/metrics.
//! Worker errors never cross into the caller of `start`/`stop`; they are contained
//! and reported at the worker boundary.

use thiserror::Error;

/// # Errors produced by the coordinator API.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorError {
    /// Requested capacity exceeds the supported maximum.
    #[error("capacity {requested} out of range (max {max})")]
    CapacityOutOfRange {
        /// The rejected value.
        requested: usize,
        /// Largest accepted capacity.
        max: usize,
    },

    /// The coordinator was built outside of a Tokio runtime.
    #[error("no tokio runtime available")]
    RuntimeUnavailable,
}

impl CoordinatorError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use queuevisor::CoordinatorError;
    ///
    /// let err = CoordinatorError::CapacityOutOfRange { requested: usize::MAX, max: 10 };
    /// assert_eq!(err.as_label(), "coordinator_capacity_out_of_range");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            CoordinatorError::CapacityOutOfRange { .. } => "coordinator_capacity_out_of_range",
            CoordinatorError::RuntimeUnavailable => "coordinator_runtime_unavailable",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            CoordinatorError::CapacityOutOfRange { requested, max } => {
                format!("capacity {requested} rejected; allowed range is 0..={max}")
            }
            CoordinatorError::RuntimeUnavailable => {
                "coordinator must be built from within a tokio runtime".to_string()
            }
        }
    }
}

/// # Errors produced while a worker processes messages.
///
/// [`WorkerError::Canceled`] is the orderly exit path: it unwinds the worker
/// loop and is never reported as a failure. Every other variant terminates the
/// worker that raised it and is logged by the coordinator.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkerError {
    /// The coordinator is stopping (or the caller's token fired).
    #[error("context cancelled")]
    Canceled,

    /// Reading from the message source failed.
    #[error("source failed: {error}")]
    Source {
        /// The underlying error message.
        error: String,
    },

    /// The dispatcher raised an error for a message.
    #[error("dispatch failed: {error}")]
    Dispatch {
        /// The underlying error message.
        error: String,
    },

    /// Non-recoverable error raised outside of read/dispatch (factory, commit).
    #[error("fatal error: {error}")]
    Fatal {
        /// The underlying error message.
        error: String,
    },
}

impl WorkerError {
    /// Shorthand for [`WorkerError::Source`].
    pub fn source_failed(error: impl Into<String>) -> Self {
        WorkerError::Source { error: error.into() }
    }

    /// Shorthand for [`WorkerError::Dispatch`].
    pub fn dispatch_failed(error: impl Into<String>) -> Self {
        WorkerError::Dispatch { error: error.into() }
    }

    /// Shorthand for [`WorkerError::Fatal`].
    pub fn fatal(error: impl Into<String>) -> Self {
        WorkerError::Fatal { error: error.into() }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use queuevisor::WorkerError;
    ///
    /// assert_eq!(WorkerError::Canceled.as_label(), "worker_canceled");
    /// assert_eq!(WorkerError::dispatch_failed("boom").as_label(), "worker_dispatch_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            WorkerError::Canceled => "worker_canceled",
            WorkerError::Source { .. } => "worker_source_failed",
            WorkerError::Dispatch { .. } => "worker_dispatch_failed",
            WorkerError::Fatal { .. } => "worker_fatal",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            WorkerError::Canceled => "context cancelled".to_string(),
            WorkerError::Source { error } => format!("source: {error}"),
            WorkerError::Dispatch { error } => format!("dispatch: {error}"),
            WorkerError::Fatal { error } => format!("fatal: {error}"),
        }
    }

    /// True for the orderly cancellation outcome.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, WorkerError::Canceled)
    }
}
