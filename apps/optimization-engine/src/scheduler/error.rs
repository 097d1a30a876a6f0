//! Error types for scheduling.

use thiserror::Error;

/// Errors from scheduler construction.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// Concurrency limit must be at least one.
    #[error("Invalid concurrency limit: {concurrency}")]
    InvalidConcurrency {
        /// Requested limit.
        concurrency: usize,
    },
}
