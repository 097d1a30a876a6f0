// Allow unwrap/expect in tests - tests should panic on unexpected errors
// Allow test-specific patterns and pedantic lints in test code
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::needless_collect,
        clippy::option_if_let_else,
        clippy::default_trait_access,
        clippy::items_after_statements,
        clippy::or_fun_call
    )
)]

//! Optimization Engine - Rust Core Library
//!
//! Strategy-parameter optimization and walk-forward validation.
//!
//! # Components (bottom → top)
//!
//! - **Domain**: parameter targets, strategy catalog, combinations, metrics,
//!   dataset snapshot
//! - **Evaluation**: `EvaluationClient` runs backtests and sweeps in isolated
//!   worker processes, one per call, under timeouts
//! - **Scheduler**: `EvaluationScheduler` bounds in-flight work and keeps
//!   results in input order
//! - **Optimizer**: `CombinationConvergenceOptimizer` coordinate ascent over
//!   entry, exit and risk scopes until parameters stop moving
//! - **Refinement**: `LocalRefinementEngine` SPSA / CEM around a converged
//!   candidate, never worse than the seed
//! - **Validation**: `WalkForwardValidator` rolling or anchored windows with
//!   PSR, DSR, minimum track record length, WFE and a graded aggregate
//!
//! Every component takes an `OptimizationRunContext` (run id, cancellation,
//! progress observer, outcome log) instead of global state.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

/// Configuration loading and validation.
pub mod config;

/// Per-run context.
pub mod context;

/// Core domain types.
pub mod domain;

/// Crate-level error and error codes.
pub mod error;

/// Evaluation collaborator client.
pub mod evaluation;

/// Coordinate-ascent combination optimization.
pub mod optimizer;

/// SPSA / CEM local refinement.
pub mod refinement;

/// Bounded-concurrency scheduling.
pub mod scheduler;

/// Tracing subscriber setup.
pub mod telemetry;

/// Walk-forward validation.
pub mod validation;

pub use config::{Config, ConfigError, load_config, load_config_from_string};
pub use context::{OptimizationRunContext, OutcomeRecord};
pub use domain::{Combination, DatasetSnapshot, DateSpan, EvaluationResult, TargetMetric};
pub use error::{EngineError, ErrorCode};
pub use evaluation::{EvaluationClient, EvaluationError, Evaluator};
pub use optimizer::{BatchOptimizer, CombinationConvergenceOptimizer, ConvergenceOutcome};
pub use refinement::LocalRefinementEngine;
pub use scheduler::EvaluationScheduler;
pub use validation::{WalkForwardBuilder, WalkForwardReport, WalkForwardValidator};
