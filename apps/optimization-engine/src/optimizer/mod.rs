//! Coordinate-ascent combination optimization.
//!
//! - `is_better_metric`: the single ranking rule (drawdown by magnitude)
//! - `select_best`: grid-point choice with first-valued fallback
//! - `CombinationConvergenceOptimizer`: inner per-leg and outer per-combination loops
//! - `BatchOptimizer`: many combinations through the scheduler

mod batch;
mod convergence;
mod error;
mod grid;
mod metric;
mod outcome;

pub use batch::{BatchItem, BatchOptimizer};
pub use convergence::CombinationConvergenceOptimizer;
pub use error::OptimizerError;
pub use grid::{GridSelection, select_best};
pub use metric::{is_better_metric, is_better_opt, rank_order};
pub use outcome::{
    ConvergenceOutcome, ConvergenceStatus, ScopeChange, StrategyOptimization, trial_correlation,
};
