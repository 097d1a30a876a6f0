//! Error types for walk-forward validation.

use thiserror::Error;

use crate::evaluation::EvaluationError;
use crate::optimizer::OptimizerError;

use super::coverage::CoverageIssue;

/// Errors that stop a walk-forward run.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The dataset cannot support the planned windows. Nothing was evaluated.
    #[error("Dataset coverage insufficient ({} issue(s)): {}", .issues.len(), first_issue(.issues))]
    Coverage {
        /// Every coverage problem found.
        issues: Vec<CoverageIssue>,
    },

    /// The plan yields no window inside the available range.
    #[error("No walk-forward window fits between {start} and {end}")]
    NoWindows {
        /// Effective run start.
        start: String,
        /// Effective run end.
        end: String,
    },

    /// Window plan or thresholds are unusable.
    #[error("Invalid walk-forward plan: {reason}")]
    InvalidPlan {
        /// What is wrong.
        reason: String,
    },

    /// An evaluation failed in a way that aborts the run.
    #[error("Evaluation failed: {0}")]
    Evaluation(#[from] EvaluationError),

    /// Training-segment optimization failed in a way that aborts the run.
    #[error("Optimization failed: {0}")]
    Optimization(#[from] OptimizerError),
}

fn first_issue(issues: &[CoverageIssue]) -> String {
    issues.first().map(ToString::to_string).unwrap_or_default()
}

impl ValidationError {
    /// Whether the run stopped because a strategy has no collaborator mapping.
    #[must_use]
    pub const fn is_mapping(&self) -> bool {
        matches!(
            self,
            Self::Evaluation(EvaluationError::Mapping { .. })
                | Self::Optimization(OptimizerError::Mapping { .. })
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coverage_message_shows_first_issue() {
        let err = ValidationError::Coverage {
            issues: vec![CoverageIssue::EmptyDataset, CoverageIssue::EmptyDataset],
        };
        let message = err.to_string();
        assert!(message.contains("2 issue(s)"));
        assert!(message.contains("no dated rows"));
    }

    #[test]
    fn test_mapping_detection() {
        let err: ValidationError = OptimizerError::Mapping {
            strategy: "x".to_string(),
        }
        .into();
        assert!(err.is_mapping());

        let err: ValidationError = EvaluationError::Timeout { seconds: 5 }.into();
        assert!(!err.is_mapping());
    }
}
