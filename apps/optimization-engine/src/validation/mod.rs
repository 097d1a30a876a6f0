//! Walk-forward validation and out-of-sample robustness scoring.
//!
//! - Rolling or anchored training/testing windows, checked against the dataset
//!   before anything is evaluated
//! - Optional per-window optimization (and refinement) on training data only
//! - Per-window PSR / DSR / minimum track record length and weighted quality
//! - Run-level aggregation: WFE-adjusted score, pooled-sample statistics and a
//!   three-level grade

mod aggregate;
mod analysis;
mod builder;
mod coverage;
mod engine;
mod error;
mod scoring;
mod stats;
mod types;
mod windowing;

pub use aggregate::{
    AggregateReport, OverfittingSummary, WFE_ADJUSTMENT_RANGE, WindowOptimization, WindowReport,
    aggregate, resolve_grade, walk_forward_efficiency,
};
pub use analysis::{AnalysisSettings, WindowAnalysis, analyze_window};
pub use builder::WalkForwardBuilder;
pub use coverage::{CoverageIssue, Segment, check_coverage};
pub use engine::{WalkForwardReport, WalkForwardValidator};
pub use error::ValidationError;
pub use scoring::{
    OosQuality, QualityComponent, QualityMetric, WindowVerdict, evaluate_window, oos_quality,
};
pub use stats::{
    SharpeSample, deflated_sharpe, effective_sample_size, effective_trials,
    min_track_record_length, normal_cdf, normal_inverse, probabilistic_sharpe,
};
pub use types::{Grade, Thresholds, ValidationState, Window, WindowMode, WindowPlan};
pub use windowing::{add_months, build_windows};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_plan_default() {
        let plan = WindowPlan::default();
        assert_eq!(plan.training_months, 36);
        assert_eq!(plan.testing_months, 12);
        assert_eq!(plan.step_months, 6);
        assert_eq!(plan.window_count, Some(3));
        assert_eq!(plan.mode, WindowMode::Rolling);
    }

    #[test]
    fn test_grade_order() {
        assert!(Grade::ProfessionalPass > Grade::ObserveFurther);
        assert!(Grade::ObserveFurther > Grade::NeedsAdjustment);
        assert!(Grade::NeedsAdjustment > Grade::NoResult);
    }
}
