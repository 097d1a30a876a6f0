//! Coordinate-ascent optimization settings.

use serde::{Deserialize, Serialize};

use crate::domain::{OptimizationScope, RiskTargets, TargetMetric};

/// Accepted range for `parameter_trials`.
pub const TRIALS_RANGE: (u32, u32) = (5, 500);

/// Accepted range for `iteration_limit`.
pub const ITERATION_LIMIT_RANGE: (u32, u32) = (1, 100);

/// Optimization configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationConfig {
    /// Metric used to rank candidates.
    #[serde(default)]
    pub target_metric: TargetMetric,
    /// Trials budget per parameter (grid points, refinement evaluations).
    #[serde(default = "default_parameter_trials")]
    pub parameter_trials: u32,
    /// Maximum entry/exit macro-iterations.
    #[serde(default = "default_iteration_limit")]
    pub iteration_limit: u32,
    /// Maximum passes over one strategy's targets.
    #[serde(default = "default_max_internal_iterations")]
    pub max_internal_iterations: u32,
    /// Maximum combinations optimized at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Scopes the optimizer may touch.
    #[serde(default = "default_enabled_scopes")]
    pub enabled_scopes: Vec<OptimizationScope>,
    /// Ranges for stop-loss / take-profit.
    #[serde(default)]
    pub risk_targets: RiskTargets,
    /// Per-combination timeout in the batch scheduler (seconds, 0 = none).
    #[serde(default)]
    pub combination_timeout_secs: u64,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            target_metric: TargetMetric::default(),
            parameter_trials: default_parameter_trials(),
            iteration_limit: default_iteration_limit(),
            max_internal_iterations: default_max_internal_iterations(),
            concurrency: default_concurrency(),
            enabled_scopes: default_enabled_scopes(),
            risk_targets: RiskTargets::default(),
            combination_timeout_secs: 0,
        }
    }
}

impl OptimizationConfig {
    /// Trials clamped into the accepted range.
    #[must_use]
    pub fn trials(&self) -> u32 {
        self.parameter_trials.clamp(TRIALS_RANGE.0, TRIALS_RANGE.1)
    }

    /// Iteration limit clamped into the accepted range.
    #[must_use]
    pub fn iteration_limit(&self) -> u32 {
        self.iteration_limit
            .clamp(ITERATION_LIMIT_RANGE.0, ITERATION_LIMIT_RANGE.1)
    }

    /// Whether a scope may be optimized.
    #[must_use]
    pub fn scope_enabled(&self, scope: OptimizationScope) -> bool {
        self.enabled_scopes.contains(&scope)
    }
}

const fn default_parameter_trials() -> u32 {
    60
}

const fn default_iteration_limit() -> u32 {
    6
}

const fn default_max_internal_iterations() -> u32 {
    5
}

const fn default_concurrency() -> usize {
    4
}

fn default_enabled_scopes() -> Vec<OptimizationScope> {
    vec![OptimizationScope::Entry, OptimizationScope::Exit]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optimization_config_default() {
        let config = OptimizationConfig::default();
        assert_eq!(config.parameter_trials, 60);
        assert_eq!(config.iteration_limit, 6);
        assert_eq!(config.max_internal_iterations, 5);
        assert!(config.scope_enabled(OptimizationScope::Entry));
        assert!(!config.scope_enabled(OptimizationScope::Risk));
    }

    #[test]
    fn test_clamped_values() {
        let config = OptimizationConfig {
            parameter_trials: 10_000,
            iteration_limit: 0,
            ..Default::default()
        };
        assert_eq!(config.trials(), 500);
        assert_eq!(config.iteration_limit(), 1);
    }
}
