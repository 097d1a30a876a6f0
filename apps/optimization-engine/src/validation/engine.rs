//! Walk-forward validation engine.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{Instrument, Level, debug, info, span, warn};
use uuid::Uuid;

use crate::config::ValidationConfig;
use crate::context::{OptimizationRunContext, OutcomeRecord};
use crate::domain::{Combination, DatasetSnapshot, DateSpan, EvaluationResult};
use crate::evaluation::Evaluator;
use crate::optimizer::{CombinationConvergenceOptimizer, trial_correlation};
use crate::refinement::LocalRefinementEngine;

use super::aggregate::{AggregateReport, WindowOptimization, WindowReport, aggregate, walk_forward_efficiency};
use super::analysis::{AnalysisSettings, analyze_window};
use super::coverage::{CoverageIssue, check_coverage};
use super::error::ValidationError;
use super::types::{ValidationState, Window};
use super::windowing::build_windows;

/// Result of a walk-forward run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalkForwardReport {
    /// Run that produced the report.
    pub run_id: Uuid,
    /// `Done`, or `Cancelled` when windows were skipped.
    pub state: ValidationState,
    /// Combination the run started from.
    pub combination: Combination,
    /// Windows that were planned.
    pub planned_windows: usize,
    /// Per-window results, in window order.
    pub windows: Vec<WindowReport>,
    /// Aggregate over the finished windows.
    pub aggregate: AggregateReport,
    /// Start time.
    pub started_at: DateTime<Utc>,
    /// Finish time.
    pub finished_at: DateTime<Utc>,
}

impl WalkForwardReport {
    /// Whether cancellation cut the run short.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.state == ValidationState::Cancelled
    }
}

/// Runs walk-forward validation of one combination.
///
/// Windows run one after another. Per window the training segment is
/// optionally optimized (and refined), then both segments are evaluated with
/// the resulting parameters. Testing data never reaches the optimizer.
pub struct WalkForwardValidator {
    evaluator: Arc<dyn Evaluator>,
    optimizer: Option<Arc<CombinationConvergenceOptimizer>>,
    refiner: Option<Arc<LocalRefinementEngine>>,
    config: ValidationConfig,
    state: watch::Sender<ValidationState>,
}

impl std::fmt::Debug for WalkForwardValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalkForwardValidator")
            .field("config", &self.config)
            .field("optimizer", &self.optimizer.is_some())
            .field("refiner", &self.refiner.is_some())
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

impl WalkForwardValidator {
    /// Create a validator. Prefer [`WalkForwardBuilder`](super::WalkForwardBuilder).
    #[must_use]
    pub fn new(
        evaluator: Arc<dyn Evaluator>,
        optimizer: Option<Arc<CombinationConvergenceOptimizer>>,
        refiner: Option<Arc<LocalRefinementEngine>>,
        config: ValidationConfig,
    ) -> Self {
        let (state, _) = watch::channel(ValidationState::Idle);
        Self {
            evaluator,
            optimizer,
            refiner,
            config,
            state,
        }
    }

    /// Validation settings.
    #[must_use]
    pub const fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ValidationState {
        *self.state.borrow()
    }

    /// Receiver that sees every state transition.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ValidationState> {
        self.state.subscribe()
    }

    fn transition(&self, next: ValidationState) {
        let previous = self.state.send_replace(next);
        info!(from = %previous, to = %next, "Walk-forward state transition");
    }

    fn optimizing(&self) -> Option<&Arc<CombinationConvergenceOptimizer>> {
        self.optimizer.as_ref().filter(|_| self.config.optimize_windows)
    }

    /// Trials behind each window's parameters (1 without optimization).
    #[must_use]
    pub fn raw_trials(&self) -> f64 {
        self.optimizing()
            .map_or(1.0, |o| f64::from(o.config().trials()))
    }

    /// Validate `combination` over `requested`, limited to the dataset's span.
    ///
    /// Cancellation is checked before every window; a cancelled run returns
    /// the windows finished so far with state `Cancelled`.
    ///
    /// # Errors
    ///
    /// `Coverage` / `NoWindows` before any evaluation; `Evaluation` /
    /// `Optimization` when a strategy has no collaborator mapping. Other
    /// evaluation failures are recorded on the window and score it 0.
    pub async fn run(
        &self,
        ctx: &OptimizationRunContext,
        combination: &Combination,
        dataset: &DatasetSnapshot,
        requested: DateSpan,
    ) -> Result<WalkForwardReport, ValidationError> {
        let run_span = span!(Level::DEBUG, "walk_forward", run_id = %ctx.run_id());
        self.run_inner(ctx, combination, dataset, requested)
            .instrument(run_span)
            .await
    }

    async fn run_inner(
        &self,
        ctx: &OptimizationRunContext,
        combination: &Combination,
        dataset: &DatasetSnapshot,
        requested: DateSpan,
    ) -> Result<WalkForwardReport, ValidationError> {
        let started_at = Utc::now();
        self.transition(ValidationState::Windowing);

        let windows = match self.plan_windows(dataset, requested) {
            Ok(windows) => windows,
            Err(err) => {
                self.transition(ValidationState::Idle);
                return Err(err);
            }
        };
        info!(
            windows = windows.len(),
            combination = %combination.label(),
            optimize = self.optimizing().is_some(),
            "Starting walk-forward validation"
        );

        let settings = AnalysisSettings::from_config(&self.config, self.raw_trials());
        let mut reports = Vec::with_capacity(windows.len());
        let mut cancelled = false;

        for window in &windows {
            if ctx.is_cancelled() {
                info!(window = window.index, "Cancellation requested; skipping remaining windows");
                cancelled = true;
                break;
            }
            match self.run_window(ctx, combination, window, &settings).await {
                Ok(report) => reports.push(report),
                Err(err) => {
                    warn!(window = window.index, error = %err, "Walk-forward run aborted");
                    self.transition(ValidationState::Idle);
                    return Err(err);
                }
            }
        }

        self.transition(ValidationState::Aggregating);
        let aggregate = aggregate(&reports, &settings);
        let state = if cancelled {
            ValidationState::Cancelled
        } else {
            ValidationState::Done
        };
        self.transition(state);

        info!(
            windows = reports.len(),
            grade = ?aggregate.grade,
            total_score = ?aggregate.total_score,
            "Walk-forward validation complete"
        );
        ctx.record(OutcomeRecord::new(
            format!("walk-forward {}", combination.label()),
            aggregate.total_score,
            state.to_string(),
        ));

        Ok(WalkForwardReport {
            run_id: ctx.run_id(),
            state,
            combination: combination.clone(),
            planned_windows: windows.len(),
            windows: reports,
            aggregate,
            started_at,
            finished_at: Utc::now(),
        })
    }

    fn plan_windows(
        &self,
        dataset: &DatasetSnapshot,
        requested: DateSpan,
    ) -> Result<Vec<Window>, ValidationError> {
        self.config
            .plan
            .check()
            .map_err(|reason| ValidationError::InvalidPlan { reason })?;

        let Some(available) = dataset.availability() else {
            return Err(ValidationError::Coverage {
                issues: vec![CoverageIssue::EmptyDataset],
            });
        };
        let windows = build_windows(&self.config.plan, requested, available);
        if windows.is_empty() {
            return Err(ValidationError::NoWindows {
                start: requested.start.max(available.start).to_string(),
                end: requested.end.min(available.end).to_string(),
            });
        }

        let issues = check_coverage(&windows, &self.config.plan, dataset);
        if !issues.is_empty() {
            warn!(issues = issues.len(), "Dataset coverage check failed");
            return Err(ValidationError::Coverage { issues });
        }
        Ok(windows)
    }

    async fn run_window(
        &self,
        ctx: &OptimizationRunContext,
        combination: &Combination,
        window: &Window,
        settings: &AnalysisSettings,
    ) -> Result<WindowReport, ValidationError> {
        self.transition(ValidationState::Training(window.index));
        debug!(window = %window, "Window started");

        let (params, optimization) = self.optimize_training(ctx, combination, window).await?;
        let (training, training_error) = self.evaluate_segment(&params, window.training()).await?;

        self.transition(ValidationState::Testing(window.index));
        let (testing, testing_error) = self.evaluate_segment(&params, window.testing()).await?;

        let wfe = walk_forward_efficiency(training.as_ref(), testing.as_ref());
        let analysis = analyze_window(
            testing.as_ref(),
            wfe,
            &self.config.thresholds,
            settings,
            optimization.as_ref().map(|o| o.trial_correlation),
        );

        info!(
            window = window.index,
            training_return = ?training.as_ref().and_then(|r| r.annualized_return),
            testing_return = ?testing.as_ref().and_then(|r| r.annualized_return),
            wfe = ?wfe,
            window_score = analysis.window_score,
            pass = analysis.verdict.pass,
            "Window complete"
        );
        ctx.record(OutcomeRecord::new(
            format!("window {}", window.index + 1),
            Some(analysis.window_score),
            if analysis.verdict.pass { "pass" } else { "fail" },
        ));

        Ok(WindowReport {
            window: *window,
            combination: params,
            training,
            testing,
            training_error,
            testing_error,
            wfe,
            optimization,
            analysis,
        })
    }

    /// Parameters for a window, optimized on its training segment when enabled.
    async fn optimize_training(
        &self,
        ctx: &OptimizationRunContext,
        combination: &Combination,
        window: &Window,
    ) -> Result<(Combination, Option<WindowOptimization>), ValidationError> {
        let Some(optimizer) = self.optimizing() else {
            return Ok((combination.clone(), None));
        };
        let training = Some(window.training());

        let outcome = optimizer.optimize_combination(ctx, combination, training).await?;
        let mut params = outcome.combination.clone();
        let mut training_metric = outcome.final_metric;
        let mut refined = false;

        let refiner = self
            .refiner
            .as_ref()
            .filter(|r| {
                r.is_enabled() && self.config.refine_windows && outcome.status.is_success()
            });
        if let Some(refiner) = refiner {
            match refiner.refine(&params, training).await {
                Ok(refinement) if refinement.improved => {
                    params = refinement.combination;
                    training_metric = refinement.metric;
                    refined = true;
                }
                Ok(_) => {}
                Err(err) if err.is_mapping() => return Err(err.into()),
                Err(err) => {
                    warn!(window = window.index, error = %err, "Refinement failed, keeping converged parameters");
                }
            }
        }

        Ok((
            params,
            Some(WindowOptimization {
                trial_correlation: trial_correlation(&outcome.scope_changes),
                status: outcome.status,
                scope_changes: outcome.scope_changes,
                refined,
                training_metric,
            }),
        ))
    }

    /// Evaluate one segment. Mapping failures abort; others are recorded.
    async fn evaluate_segment(
        &self,
        combination: &Combination,
        period: DateSpan,
    ) -> Result<(Option<EvaluationResult>, Option<String>), ValidationError> {
        match self.evaluator.evaluate(combination, Some(period)).await {
            Ok(result) => Ok((Some(result), None)),
            Err(err) if err.is_mapping() => Err(err.into()),
            Err(err) => {
                warn!(period = %period, error = %err, "Segment evaluation failed");
                Ok((None, Some(err.to_string())))
            }
        }
    }
}
