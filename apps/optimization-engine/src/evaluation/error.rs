//! Error types for evaluation calls.

use thiserror::Error;

/// Errors from a single evaluation call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EvaluationError {
    /// The collaborator did not answer in time. The worker was discarded.
    #[error("Evaluation timed out after {seconds}s")]
    Timeout {
        /// Timeout duration in seconds.
        seconds: u64,
    },

    /// The collaborator answered with an error message.
    #[error("Evaluation collaborator reported an error: {message}")]
    Collaborator {
        /// Error message.
        message: String,
    },

    /// A strategy id has no mapping to the collaborator's vocabulary.
    #[error("No collaborator mapping for strategy '{strategy}'")]
    Mapping {
        /// Unmapped strategy id.
        strategy: String,
    },

    /// The worker process could not be started.
    #[error("Failed to start evaluation worker: {message}")]
    WorkerSpawn {
        /// Error message.
        message: String,
    },

    /// The worker closed its channel before answering.
    #[error("Evaluation worker exited before responding")]
    WorkerExited,

    /// Request or response could not be (de)serialized.
    #[error("Malformed evaluation message: {message}")]
    Protocol {
        /// Error message.
        message: String,
    },

    /// The run was cancelled before the call started.
    #[error("Evaluation cancelled")]
    Cancelled,
}

impl EvaluationError {
    /// Mapping failures are fatal for the call path; everything else degrades locally.
    #[must_use]
    pub const fn is_mapping(&self) -> bool {
        matches!(self, Self::Mapping { .. })
    }
}
