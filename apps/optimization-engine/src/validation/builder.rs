//! Builder for the walk-forward validator.

use std::sync::Arc;

use crate::config::ValidationConfig;
use crate::evaluation::Evaluator;
use crate::optimizer::CombinationConvergenceOptimizer;
use crate::refinement::LocalRefinementEngine;

use super::engine::WalkForwardValidator;
use super::error::ValidationError;
use super::types::{Thresholds, WindowMode, WindowPlan};

/// Builder for [`WalkForwardValidator`].
pub struct WalkForwardBuilder {
    evaluator: Arc<dyn Evaluator>,
    optimizer: Option<Arc<CombinationConvergenceOptimizer>>,
    refiner: Option<Arc<LocalRefinementEngine>>,
    config: ValidationConfig,
}

impl WalkForwardBuilder {
    /// Create a builder with default settings and no optimization.
    #[must_use]
    pub fn new(evaluator: Arc<dyn Evaluator>) -> Self {
        Self {
            evaluator,
            optimizer: None,
            refiner: None,
            config: ValidationConfig::default(),
        }
    }

    /// Replace every validation setting.
    #[must_use]
    pub const fn config(mut self, config: ValidationConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the window plan.
    #[must_use]
    pub const fn plan(mut self, plan: WindowPlan) -> Self {
        self.config.plan = plan;
        self
    }

    /// Set the window mode.
    #[must_use]
    pub const fn window_mode(mut self, mode: WindowMode) -> Self {
        self.config.plan.mode = mode;
        self
    }

    /// Set pass thresholds.
    #[must_use]
    pub const fn thresholds(mut self, thresholds: Thresholds) -> Self {
        self.config.thresholds = thresholds;
        self
    }

    /// Score against the strict benchmark.
    #[must_use]
    pub const fn strict_mode(mut self, strict: bool) -> Self {
        self.config.strict_mode = strict;
        self
    }

    /// Optimize each training segment with `optimizer`.
    #[must_use]
    pub fn optimizer(mut self, optimizer: Arc<CombinationConvergenceOptimizer>) -> Self {
        self.optimizer = Some(optimizer);
        self.config.optimize_windows = true;
        self
    }

    /// Refine each optimized training segment with `refiner`.
    #[must_use]
    pub fn refiner(mut self, refiner: Arc<LocalRefinementEngine>) -> Self {
        self.refiner = Some(refiner);
        self.config.refine_windows = true;
        self
    }

    /// Build the validator.
    ///
    /// # Errors
    ///
    /// `InvalidPlan` for a zero-length plan, non-finite thresholds or
    /// benchmarks, or window optimization requested without an optimizer.
    pub fn build(self) -> Result<WalkForwardValidator, ValidationError> {
        let invalid = |reason: &str| ValidationError::InvalidPlan {
            reason: reason.to_string(),
        };

        self.config
            .plan
            .check()
            .map_err(|reason| ValidationError::InvalidPlan { reason })?;
        if !self.config.thresholds.is_finite() {
            return Err(invalid("thresholds must be finite"));
        }
        if !self.config.loose_benchmark.is_finite() || !self.config.strict_benchmark.is_finite() {
            return Err(invalid("benchmarks must be finite"));
        }
        let confidence = self.config.min_track_record_confidence;
        if !(confidence > 0.0 && confidence < 1.0) {
            return Err(invalid("track record confidence must lie in (0, 1)"));
        }
        if self.config.optimize_windows && self.optimizer.is_none() {
            return Err(invalid("window optimization needs an optimizer"));
        }

        Ok(WalkForwardValidator::new(
            self.evaluator,
            self.optimizer,
            self.refiner,
            self.config,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OptimizationConfig;
    use crate::domain::{EvaluationResult, StrategyCatalog};
    use crate::evaluation::ScriptedEvaluator;

    fn evaluator() -> Arc<dyn Evaluator> {
        Arc::new(ScriptedEvaluator::new(|_, _| EvaluationResult::default()))
    }

    #[test]
    fn test_builder_pattern() {
        let optimizer = Arc::new(CombinationConvergenceOptimizer::new(
            evaluator(),
            Arc::new(StrategyCatalog::default()),
            OptimizationConfig::default(),
        ));
        let plan = WindowPlan {
            training_months: 24,
            testing_months: 6,
            step_months: 6,
            window_count: None,
            mode: WindowMode::Rolling,
        };

        let Ok(validator) = WalkForwardBuilder::new(evaluator())
            .plan(plan)
            .window_mode(WindowMode::Anchored)
            .strict_mode(true)
            .optimizer(optimizer)
            .build()
        else {
            panic!("valid builder");
        };

        let config = validator.config();
        assert_eq!(config.plan.training_months, 24);
        assert_eq!(config.plan.window_count, None);
        assert_eq!(config.plan.mode, WindowMode::Anchored);
        assert!(config.strict_mode);
        assert!(config.optimize_windows);
        assert!(!config.refine_windows);
    }

    #[test]
    fn test_builder_defaults() {
        let Ok(validator) = WalkForwardBuilder::new(evaluator()).build() else {
            panic!("defaults are valid");
        };
        let config = validator.config();

        assert_eq!(config.plan.training_months, 36);
        assert_eq!(config.plan.testing_months, 12);
        assert_eq!(config.plan.window_count, Some(3));
        assert_eq!(config.plan.mode, WindowMode::Rolling);
        assert!(!config.optimize_windows);
        assert!((validator.raw_trials() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rejects_zero_length_plan() {
        let plan = WindowPlan {
            testing_months: 0,
            ..WindowPlan::default()
        };
        let result = WalkForwardBuilder::new(evaluator()).plan(plan).build();
        assert!(matches!(result, Err(ValidationError::InvalidPlan { .. })));
    }

    #[test]
    fn test_rejects_non_finite_thresholds() {
        let thresholds = Thresholds {
            sharpe_ratio: f64::NAN,
            ..Thresholds::default()
        };
        let result = WalkForwardBuilder::new(evaluator()).thresholds(thresholds).build();
        assert!(matches!(result, Err(ValidationError::InvalidPlan { .. })));
    }

    #[test]
    fn test_optimization_requires_optimizer() {
        let config = ValidationConfig {
            optimize_windows: true,
            ..ValidationConfig::default()
        };
        let Err(err) = WalkForwardBuilder::new(evaluator()).config(config).build() else {
            panic!("optimizer missing");
        };
        assert!(err.to_string().contains("needs an optimizer"));
    }
}
