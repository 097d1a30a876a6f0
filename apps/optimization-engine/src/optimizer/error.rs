//! Error types for optimization and refinement.

use thiserror::Error;

use crate::domain::OptimizationScope;
use crate::evaluation::EvaluationError;

/// Errors from combination optimization.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OptimizerError {
    /// Strategy id is not in the catalog.
    #[error("Strategy '{id}' is not in the catalog")]
    UnknownStrategy {
        /// Missing strategy id.
        id: String,
    },

    /// The combination has no leg for the requested scope.
    #[error("Combination has no {scope} leg")]
    MissingLeg {
        /// Requested scope.
        scope: OptimizationScope,
    },

    /// A strategy id has no collaborator mapping. Fatal for the run.
    #[error("No collaborator mapping for strategy '{strategy}'")]
    Mapping {
        /// Unmapped strategy id.
        strategy: String,
    },

    /// An evaluation failed where no sentinel substitution applies.
    #[error("Evaluation failed: {0}")]
    Evaluation(EvaluationError),
}

impl OptimizerError {
    /// Whether this is a mapping failure.
    #[must_use]
    pub const fn is_mapping(&self) -> bool {
        matches!(self, Self::Mapping { .. })
    }
}

impl From<EvaluationError> for OptimizerError {
    fn from(err: EvaluationError) -> Self {
        match err {
            EvaluationError::Mapping { strategy } => Self::Mapping { strategy },
            other => Self::Evaluation(other),
        }
    }
}
