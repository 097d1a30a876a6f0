//! Many combinations through the scheduler, each optimized independently.

use std::cell::RefCell;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::context::OptimizationRunContext;
use crate::domain::{Combination, DateSpan};
use crate::refinement::{LocalRefinementEngine, RefinementOutcome};
use crate::scheduler::{EvaluationScheduler, ScheduleReport, SchedulerConfig, SchedulerError};

use super::convergence::CombinationConvergenceOptimizer;
use super::error::OptimizerError;
use super::outcome::ConvergenceOutcome;

/// Result for one combination of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchItem {
    /// Coordinate-ascent result.
    pub convergence: ConvergenceOutcome,
    /// Refinement result, when refinement ran.
    pub refinement: Option<RefinementOutcome>,
}

impl BatchItem {
    /// Placeholder for a task that failed or never ran.
    #[must_use]
    pub fn fallback(original: &Combination) -> Self {
        Self {
            convergence: ConvergenceOutcome::failed(original, "unresolved"),
            refinement: None,
        }
    }

    /// Best combination: refined when refinement improved, else converged.
    #[must_use]
    pub fn best_combination(&self) -> &Combination {
        match &self.refinement {
            Some(refined) if refined.improved => &refined.combination,
            _ => &self.convergence.combination,
        }
    }

    /// Target metric of [`best_combination`](Self::best_combination).
    #[must_use]
    pub fn best_metric(&self) -> Option<f64> {
        match &self.refinement {
            Some(refined) if refined.improved => refined.metric,
            _ => self.convergence.final_metric,
        }
    }
}

/// Optimizes a list of combinations with bounded concurrency.
///
/// Each task owns a clone of its combination. A failed or timed-out task
/// yields the original combination; a mapping failure stops new launches and
/// is returned once in-flight tasks settle.
#[derive(Debug, Clone)]
pub struct BatchOptimizer {
    optimizer: Arc<CombinationConvergenceOptimizer>,
    refiner: Option<Arc<LocalRefinementEngine>>,
    scheduler: EvaluationScheduler,
}

impl BatchOptimizer {
    /// Create a batch optimizer.
    #[must_use]
    pub const fn new(
        optimizer: Arc<CombinationConvergenceOptimizer>,
        scheduler: EvaluationScheduler,
    ) -> Self {
        Self {
            optimizer,
            refiner: None,
            scheduler,
        }
    }

    /// Create a batch optimizer whose scheduler follows the optimizer's
    /// `concurrency` and `combination_timeout_secs`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConcurrency` if the configured concurrency is zero.
    pub fn from_config(
        optimizer: Arc<CombinationConvergenceOptimizer>,
    ) -> Result<Self, SchedulerError> {
        let scheduler = EvaluationScheduler::new(SchedulerConfig::from(optimizer.config()))?;
        Ok(Self::new(optimizer, scheduler))
    }

    /// Refine every converged combination when the refiner is enabled.
    #[must_use]
    pub fn with_refiner(mut self, refiner: Arc<LocalRefinementEngine>) -> Self {
        self.refiner = Some(refiner);
        self
    }

    /// Optimize every combination over `period`.
    ///
    /// # Errors
    ///
    /// Returns the first `Mapping` failure.
    pub async fn run(
        &self,
        ctx: &OptimizationRunContext,
        combinations: Vec<Combination>,
        period: Option<DateSpan>,
    ) -> Result<ScheduleReport<BatchItem>, OptimizerError> {
        let fatal: RefCell<Option<OptimizerError>> = RefCell::new(None);
        let total = combinations.len();

        info!(
            run_id = %ctx.run_id(),
            combinations = total,
            concurrency = self.scheduler.concurrency(),
            refine = self.active_refiner().is_some(),
            "Starting batch optimization"
        );

        let report = self
            .scheduler
            .run_with_fallback(ctx, combinations, BatchItem::fallback, |_, combination| {
                let fatal = &fatal;
                async move {
                    let result = self.optimize_one(ctx, &combination, period).await;
                    if let Err(err) = &result {
                        if err.is_mapping() {
                            warn!(error = %err, "Mapping failure, cancelling batch");
                            let mut slot = fatal.borrow_mut();
                            if slot.is_none() {
                                *slot = Some(err.clone());
                            }
                            ctx.cancel();
                        }
                    }
                    result
                }
            })
            .await;

        if let Some(err) = fatal.into_inner() {
            return Err(err);
        }

        info!(
            run_id = %ctx.run_id(),
            "Batch optimization complete: {}/{} optimized, {} fallbacks",
            total - report.fallbacks.len(),
            total,
            report.fallbacks.len()
        );
        Ok(report)
    }

    async fn optimize_one(
        &self,
        ctx: &OptimizationRunContext,
        combination: &Combination,
        period: Option<DateSpan>,
    ) -> Result<BatchItem, OptimizerError> {
        let convergence = self
            .optimizer
            .optimize_combination(ctx, combination, period)
            .await?;

        let refinement = match self.active_refiner() {
            Some(refiner) if convergence.status.is_success() => {
                Some(refiner.refine(&convergence.combination, period).await?)
            }
            _ => None,
        };

        Ok(BatchItem {
            convergence,
            refinement,
        })
    }

    fn active_refiner(&self) -> Option<&LocalRefinementEngine> {
        self.refiner.as_deref().filter(|r| r.is_enabled())
    }
}
