//! Result types of combination optimization.

use serde::{Deserialize, Serialize};

use crate::domain::{Combination, EvaluationResult, OptimizationScope, ParamMap};

/// How the outer loop ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConvergenceStatus {
    /// A macro-iteration changed nothing.
    Converged {
        /// Macro-iterations run.
        iterations: u32,
    },
    /// The iteration limit was reached while parameters still moved.
    Capped {
        /// Macro-iterations run.
        iterations: u32,
    },
    /// Optimization failed; the original combination is kept.
    Failed {
        /// Failure description.
        reason: String,
    },
}

impl ConvergenceStatus {
    /// Short status label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Converged { .. } => "converged",
            Self::Capped { .. } => "capped",
            Self::Failed { .. } => "failed",
        }
    }

    /// Macro-iterations run (0 for failures).
    #[must_use]
    pub const fn iterations(&self) -> u32 {
        match self {
            Self::Converged { iterations } | Self::Capped { iterations } => *iterations,
            Self::Failed { .. } => 0,
        }
    }

    /// Whether optimization produced a usable combination.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }
}

/// Which keys of one scope moved during optimization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeChange {
    /// Optimized scope.
    pub scope: OptimizationScope,
    /// Keys whose values differ from the starting combination.
    pub changed_keys: Vec<String>,
    /// Number of tunable targets in the scope.
    pub total_targets: usize,
}

/// Result of optimizing one strategy leg.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyOptimization {
    /// Scope the parameters belong to (`Risk` for risk-control exits).
    pub scope: OptimizationScope,
    /// Optimized parameters.
    pub params: ParamMap,
    /// Passes over the target list.
    pub passes: u32,
    /// Whether a pass left the parameters unchanged.
    pub converged: bool,
    /// Metric of the last successful selection.
    pub metric: Option<f64>,
    /// Targets whose sweep had no usable metric.
    pub fallback_targets: Vec<String>,
}

/// Result of optimizing one combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceOutcome {
    /// Optimized combination (the original one on failure).
    pub combination: Combination,
    /// Combination as submitted.
    pub original: Combination,
    /// How the loop ended.
    pub status: ConvergenceStatus,
    /// Target metric of the final evaluation.
    pub final_metric: Option<f64>,
    /// Full metrics of the final evaluation.
    pub final_result: Option<EvaluationResult>,
    /// Combination label.
    pub label: String,
    /// Per-scope change summary.
    pub scope_changes: Vec<ScopeChange>,
}

impl ConvergenceOutcome {
    /// Failed outcome that keeps `original`.
    #[must_use]
    pub fn failed(original: &Combination, reason: impl Into<String>) -> Self {
        Self {
            combination: original.clone(),
            original: original.clone(),
            status: ConvergenceStatus::Failed {
                reason: reason.into(),
            },
            final_metric: None,
            final_result: None,
            label: original.label(),
            scope_changes: Vec::new(),
        }
    }
}

/// Estimated correlation between optimization trials.
///
/// Few changed keys means the trials explored little and are highly
/// correlated. Returns 0.5 when nothing was measured.
#[must_use]
pub fn trial_correlation(changes: &[ScopeChange]) -> f64 {
    let ratios: Vec<f64> = changes
        .iter()
        .filter(|c| c.total_targets > 0)
        .map(|c| (c.changed_keys.len() as f64 / c.total_targets as f64).min(1.0))
        .collect();

    if ratios.is_empty() {
        return 0.5;
    }
    let avg = ratios.iter().sum::<f64>() / ratios.len() as f64;
    0.6f64.mul_add(1.0 - avg, 0.2).clamp(0.0, 0.95)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(scope: OptimizationScope, changed: &[&str], total: usize) -> ScopeChange {
        ScopeChange {
            scope,
            changed_keys: changed.iter().map(|k| (*k).to_string()).collect(),
            total_targets: total,
        }
    }

    #[test]
    fn test_trial_correlation_defaults_to_half() {
        assert!((trial_correlation(&[]) - 0.5).abs() < f64::EPSILON);
        let only_empty = [change(OptimizationScope::Entry, &[], 0)];
        assert!((trial_correlation(&only_empty) - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_trial_correlation_from_changed_ratio() {
        let all_changed = [change(OptimizationScope::Entry, &["a", "b"], 2)];
        assert!((trial_correlation(&all_changed) - 0.2).abs() < 1e-12);

        let none_changed = [change(OptimizationScope::Exit, &[], 3)];
        assert!((trial_correlation(&none_changed) - 0.8).abs() < 1e-12);

        let mixed = [
            change(OptimizationScope::Entry, &["a"], 2),
            change(OptimizationScope::Exit, &["x", "y"], 2),
        ];
        // avg = 0.75
        assert!((trial_correlation(&mixed) - 0.35).abs() < 1e-12);
    }

    #[test]
    fn test_status_accessors() {
        let converged = ConvergenceStatus::Converged { iterations: 2 };
        assert_eq!(converged.as_str(), "converged");
        assert_eq!(converged.iterations(), 2);
        assert!(converged.is_success());

        let failed = ConvergenceStatus::Failed {
            reason: "timeout".to_string(),
        };
        assert!(!failed.is_success());
        assert_eq!(failed.iterations(), 0);
    }

    #[test]
    fn test_failed_outcome_keeps_original() {
        let combo = Combination::new("ma_cross", "ma_cross_exit");
        let outcome = ConvergenceOutcome::failed(&combo, "collaborator error");
        assert_eq!(outcome.combination, combo);
        assert_eq!(outcome.label, "ma_cross + ma_cross_exit");
        assert!(outcome.final_metric.is_none());
    }
}
