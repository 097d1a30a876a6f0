//! Crate-level error type.
//!
//! Every module has its own error enum; `EngineError` wraps them for callers
//! that drive a whole run and want one type plus a stable code.
//!
//! | Code | Source |
//! |------|--------|
//! | `INVALID_CONFIG` | configuration file, parse or validation |
//! | `MAPPING_FAILURE` | strategy id without collaborator mapping |
//! | `EVALUATION_TIMEOUT` | collaborator did not answer in time |
//! | `EVALUATION_FAILED` | any other evaluation failure |
//! | `UNKNOWN_STRATEGY` | strategy id missing from the catalog |
//! | `INSUFFICIENT_COVERAGE` | dataset cannot support the window plan |
//! | `NO_WINDOWS` | plan yields no window in range |
//! | `INVALID_PLAN` | unusable window plan or thresholds |
//! | `INVALID_CONCURRENCY` | scheduler limit of zero |
//! | `CANCELLED` | run was cancelled |

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ConfigError;
use crate::evaluation::EvaluationError;
use crate::optimizer::OptimizerError;
use crate::scheduler::SchedulerError;
use crate::validation::ValidationError;

/// Stable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Configuration could not be loaded or is invalid.
    InvalidConfig,
    /// Strategy id has no collaborator mapping.
    MappingFailure,
    /// Collaborator timed out.
    EvaluationTimeout,
    /// Collaborator or worker failure.
    EvaluationFailed,
    /// Strategy id not in the catalog.
    UnknownStrategy,
    /// Dataset coverage insufficient.
    InsufficientCoverage,
    /// No walk-forward window fits.
    NoWindows,
    /// Window plan or thresholds unusable.
    InvalidPlan,
    /// Scheduler concurrency invalid.
    InvalidConcurrency,
    /// Run cancelled.
    Cancelled,
}

impl ErrorCode {
    /// Reason string.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::InvalidConfig => "INVALID_CONFIG",
            Self::MappingFailure => "MAPPING_FAILURE",
            Self::EvaluationTimeout => "EVALUATION_TIMEOUT",
            Self::EvaluationFailed => "EVALUATION_FAILED",
            Self::UnknownStrategy => "UNKNOWN_STRATEGY",
            Self::InsufficientCoverage => "INSUFFICIENT_COVERAGE",
            Self::NoWindows => "NO_WINDOWS",
            Self::InvalidPlan => "INVALID_PLAN",
            Self::InvalidConcurrency => "INVALID_CONCURRENCY",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Whether retrying the same request can succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::EvaluationTimeout | Self::EvaluationFailed)
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.reason())
    }
}

/// Any error the engine can return.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Configuration error.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Evaluation error.
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    /// Scheduler error.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    /// Optimization error.
    #[error(transparent)]
    Optimizer(#[from] OptimizerError),

    /// Walk-forward validation error.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl EngineError {
    /// Stable code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Config(_) => ErrorCode::InvalidConfig,
            Self::Evaluation(err) => evaluation_code(err),
            Self::Scheduler(_) => ErrorCode::InvalidConcurrency,
            Self::Optimizer(err) => match err {
                OptimizerError::UnknownStrategy { .. } | OptimizerError::MissingLeg { .. } => {
                    ErrorCode::UnknownStrategy
                }
                OptimizerError::Mapping { .. } => ErrorCode::MappingFailure,
                OptimizerError::Evaluation(inner) => evaluation_code(inner),
            },
            Self::Validation(err) => match err {
                ValidationError::Coverage { .. } => ErrorCode::InsufficientCoverage,
                ValidationError::NoWindows { .. } => ErrorCode::NoWindows,
                ValidationError::InvalidPlan { .. } => ErrorCode::InvalidPlan,
                ValidationError::Evaluation(inner) => evaluation_code(inner),
                ValidationError::Optimization(OptimizerError::Mapping { .. }) => {
                    ErrorCode::MappingFailure
                }
                ValidationError::Optimization(OptimizerError::Evaluation(inner)) => {
                    evaluation_code(inner)
                }
                ValidationError::Optimization(_) => ErrorCode::UnknownStrategy,
            },
        }
    }
}

const fn evaluation_code(err: &EvaluationError) -> ErrorCode {
    match err {
        EvaluationError::Timeout { .. } => ErrorCode::EvaluationTimeout,
        EvaluationError::Mapping { .. } => ErrorCode::MappingFailure,
        EvaluationError::Cancelled => ErrorCode::Cancelled,
        EvaluationError::Collaborator { .. }
        | EvaluationError::WorkerSpawn { .. }
        | EvaluationError::WorkerExited
        | EvaluationError::Protocol { .. } => ErrorCode::EvaluationFailed,
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;
    use crate::validation::CoverageIssue;

    #[test_case(EvaluationError::Timeout { seconds: 30 }.into(), ErrorCode::EvaluationTimeout ; "timeout")]
    #[test_case(EvaluationError::Cancelled.into(), ErrorCode::Cancelled ; "cancelled")]
    #[test_case(OptimizerError::Mapping { strategy: "x".into() }.into(), ErrorCode::MappingFailure ; "optimizer mapping")]
    #[test_case(ValidationError::Coverage { issues: vec![CoverageIssue::EmptyDataset] }.into(), ErrorCode::InsufficientCoverage ; "coverage")]
    #[test_case(ValidationError::Evaluation(EvaluationError::Mapping { strategy: "x".into() }).into(), ErrorCode::MappingFailure ; "nested mapping")]
    #[test_case(SchedulerError::InvalidConcurrency { concurrency: 0 }.into(), ErrorCode::InvalidConcurrency ; "scheduler")]
    fn test_error_codes(err: EngineError, expected: ErrorCode) {
        assert_eq!(err.code(), expected);
    }

    #[test]
    fn test_message_is_transparent() {
        let err: EngineError = ValidationError::InvalidPlan {
            reason: "testing_months must be positive".to_string(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "Invalid walk-forward plan: testing_months must be positive"
        );
    }

    #[test]
    fn test_code_serializes_screaming_snake() {
        let Ok(json) = serde_json::to_string(&ErrorCode::InsufficientCoverage) else {
            panic!("serialize");
        };
        assert_eq!(json, "\"INSUFFICIENT_COVERAGE\"");
        assert_eq!(ErrorCode::NoWindows.to_string(), "NO_WINDOWS");
        assert!(ErrorCode::EvaluationTimeout.is_retryable());
        assert!(!ErrorCode::MappingFailure.is_retryable());
    }
}
