//! Coordinate-ascent optimizer for entry/exit combinations.
//!
//! Two nested loops:
//!
//! - inner (`optimize_strategy`): sweep one leg's targets in declaration
//!   order, writing each best value back before the next sweep, until a pass
//!   changes nothing or `max_internal_iterations` is reached
//! - outer (`optimize_combination`): alternate over the enabled scopes until a
//!   macro-iteration changes no leg or `iteration_limit` is reached

use std::sync::Arc;

use tracing::{Instrument, Level, debug, info, span, warn};

use crate::config::OptimizationConfig;
use crate::context::{OptimizationRunContext, OutcomeRecord};
use crate::domain::{
    Combination, DateSpan, OptimizationScope, ParamMap, ParameterTarget, StrategyCatalog,
    StrategyDescriptor, align_params, changed_keys, params_equal,
};
use crate::evaluation::{Evaluator, SweepRequest};

use super::error::OptimizerError;
use super::grid::select_best;
use super::outcome::{ConvergenceOutcome, ConvergenceStatus, ScopeChange, StrategyOptimization};

/// Optimizes combinations against one evaluator.
#[derive(Clone)]
pub struct CombinationConvergenceOptimizer {
    evaluator: Arc<dyn Evaluator>,
    catalog: Arc<StrategyCatalog>,
    config: OptimizationConfig,
}

impl std::fmt::Debug for CombinationConvergenceOptimizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CombinationConvergenceOptimizer")
            .field("strategies", &self.catalog.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl CombinationConvergenceOptimizer {
    /// Create an optimizer.
    #[must_use]
    pub fn new(
        evaluator: Arc<dyn Evaluator>,
        catalog: Arc<StrategyCatalog>,
        config: OptimizationConfig,
    ) -> Self {
        Self {
            evaluator,
            catalog,
            config,
        }
    }

    /// Optimization settings.
    #[must_use]
    pub const fn config(&self) -> &OptimizationConfig {
        &self.config
    }

    /// Strategy catalog.
    #[must_use]
    pub fn catalog(&self) -> &Arc<StrategyCatalog> {
        &self.catalog
    }

    /// Evaluator used for sweeps and final evaluations.
    #[must_use]
    pub fn evaluator(&self) -> &Arc<dyn Evaluator> {
        &self.evaluator
    }

    /// Optimize the parameters of one leg, everything else held fixed.
    ///
    /// Risk-control exit legs and the `Risk` scope optimize stop-loss and
    /// take-profit instead; the returned `scope` says which parameters were
    /// produced.
    ///
    /// # Errors
    ///
    /// `MissingLeg` / `UnknownStrategy` for an unusable scope, `Mapping` when
    /// the collaborator cannot map a strategy. Other evaluation failures keep
    /// the current value of the swept parameter.
    pub async fn optimize_strategy(
        &self,
        combination: &Combination,
        scope: OptimizationScope,
        period: Option<DateSpan>,
    ) -> Result<StrategyOptimization, OptimizerError> {
        if scope == OptimizationScope::Risk {
            return self.optimize_risk(combination, period).await;
        }

        let descriptor = self.descriptor_for(combination, scope)?;
        if descriptor.is_risk_control() {
            return self.optimize_risk(combination, period).await;
        }

        let targets = &descriptor.optimize_targets;
        if targets.is_empty() {
            return Ok(StrategyOptimization {
                scope,
                params: descriptor.default_params.clone(),
                passes: 0,
                converged: true,
                metric: None,
                fallback_targets: Vec::new(),
            });
        }

        let mut params = starting_params(combination, scope, descriptor);
        let mut working = combination.clone();
        working.set_params(scope, params.clone());

        let max_points = self.config.trials() as usize;
        let max_passes = self.config.max_internal_iterations.max(1);
        let mut passes = 0;
        let mut converged = false;
        let mut metric = None;
        let mut fallback_targets = Vec::new();

        while passes < max_passes {
            passes += 1;
            let before = params.clone();

            for target in targets {
                let Some(selection) = self
                    .sweep_target(&working, scope, target, max_points, period)
                    .await?
                else {
                    continue;
                };
                if selection.fallback {
                    if !fallback_targets.contains(&target.name) {
                        fallback_targets.push(target.name.clone());
                    }
                } else {
                    metric = Some(selection.metric);
                }
                let value = target.align(selection.value);
                params.insert(target.name.clone(), value);
                working.set_param(scope, &target.name, value);
            }

            debug!(
                strategy = %descriptor.id,
                %scope,
                pass = passes,
                ?params,
                "Strategy pass complete"
            );

            if params_equal(&before, &params) {
                converged = true;
                break;
            }
        }

        Ok(StrategyOptimization {
            scope,
            params,
            passes,
            converged,
            metric,
            fallback_targets,
        })
    }

    /// Optimize stop-loss, then take-profit, each with half the trial budget.
    ///
    /// # Errors
    ///
    /// Returns `Mapping` when the collaborator cannot map a strategy.
    pub async fn optimize_risk(
        &self,
        combination: &Combination,
        period: Option<DateSpan>,
    ) -> Result<StrategyOptimization, OptimizerError> {
        let scope = OptimizationScope::Risk;
        let targets = self.config.risk_targets.ordered();
        let max_points = (self.config.trials() / 2).max(2) as usize;

        let mut working = combination.clone();
        let mut params = align_params(&working.params_for(scope).unwrap_or_default(), &targets);
        working.set_params(scope, params.clone());
        let mut metric = None;
        let mut fallback_targets = Vec::new();

        for target in &targets {
            let Some(selection) = self
                .sweep_target(&working, scope, target, max_points, period)
                .await?
            else {
                continue;
            };
            if selection.fallback {
                fallback_targets.push(target.name.clone());
            } else {
                metric = Some(selection.metric);
            }
            let value = target.align(selection.value);
            params.insert(target.name.clone(), value);
            working.set_param(scope, &target.name, value);
        }

        Ok(StrategyOptimization {
            scope,
            params,
            passes: 1,
            converged: true,
            metric,
            fallback_targets,
        })
    }

    /// Optimize a whole combination to convergence and evaluate the result.
    ///
    /// Failures other than mapping failures never propagate: the original
    /// combination is returned with a `Failed` status.
    ///
    /// # Errors
    ///
    /// Returns `Mapping` when the collaborator cannot map a strategy.
    pub async fn optimize_combination(
        &self,
        ctx: &OptimizationRunContext,
        combination: &Combination,
        period: Option<DateSpan>,
    ) -> Result<ConvergenceOutcome, OptimizerError> {
        let label = combination.label();
        let run_span = span!(Level::DEBUG, "optimize_combination", combination = %label);
        let outcome = self
            .converge(ctx, combination, period)
            .instrument(run_span)
            .await;

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(err) if err.is_mapping() => {
                warn!(combination = %label, error = %err, "Mapping failure aborts optimization");
                return Err(err);
            }
            Err(err) => {
                warn!(combination = %label, error = %err, "Optimization failed, keeping original");
                ConvergenceOutcome::failed(combination, err.to_string())
            }
        };

        ctx.record(OutcomeRecord::new(
            outcome.label.clone(),
            outcome.final_metric,
            outcome.status.as_str(),
        ));
        Ok(outcome)
    }

    async fn converge(
        &self,
        ctx: &OptimizationRunContext,
        combination: &Combination,
        period: Option<DateSpan>,
    ) -> Result<ConvergenceOutcome, OptimizerError> {
        let scopes = self.active_scopes(combination);
        let limit = self.config.iteration_limit();
        let mut current = combination.clone();
        let mut status = ConvergenceStatus::Capped { iterations: limit };
        let mut touched: Vec<OptimizationScope> = Vec::new();

        info!(
            combination = %combination.label(),
            scopes = ?scopes,
            iteration_limit = limit,
            "Starting combination optimization"
        );

        for iteration in 1..=limit {
            if ctx.is_cancelled() {
                return Ok(ConvergenceOutcome::failed(combination, "cancelled"));
            }

            let mut changed = false;
            for &scope in &scopes {
                let result = self.optimize_strategy(&current, scope, period).await?;
                let before = current.params_for(result.scope).unwrap_or_default();
                if !params_equal(&before, &result.params) {
                    changed = true;
                    current.set_params(result.scope, result.params);
                }
                if !touched.contains(&result.scope) {
                    touched.push(result.scope);
                }
            }

            debug!(iteration, changed, "Macro-iteration complete");
            if !changed {
                status = ConvergenceStatus::Converged {
                    iterations: iteration,
                };
                break;
            }
        }

        let final_result = self.evaluator.evaluate(&current, period).await?;
        let final_metric = final_result.metric(self.config.target_metric);
        let scope_changes = touched
            .into_iter()
            .map(|scope| self.scope_change(combination, &current, scope))
            .collect();

        info!(
            combination = %combination.label(),
            status = status.as_str(),
            iterations = status.iterations(),
            final_metric = ?final_metric,
            "Combination optimization complete"
        );

        Ok(ConvergenceOutcome {
            label: current.label(),
            combination: current,
            original: combination.clone(),
            status,
            final_metric,
            final_result: Some(final_result),
            scope_changes,
        })
    }

    /// Enabled scopes that exist on `combination`, in optimization order.
    ///
    /// Stop-loss / take-profit are swept by at most one scope per iteration:
    /// the first risk-control leg, or `Risk` when no leg is risk-control.
    #[must_use]
    pub fn active_scopes(&self, combination: &Combination) -> Vec<OptimizationScope> {
        let mut scopes = Vec::new();
        let mut risk_swept = false;
        for scope in OptimizationScope::ALL {
            if !self.config.scope_enabled(scope) {
                continue;
            }
            let sweeps_risk = if scope == OptimizationScope::Risk {
                true
            } else {
                let Some(id) = combination.strategy_for(scope) else {
                    continue;
                };
                self.catalog
                    .get(id)
                    .is_some_and(StrategyDescriptor::is_risk_control)
            };
            if sweeps_risk {
                if risk_swept {
                    continue;
                }
                risk_swept = true;
            }
            scopes.push(scope);
        }
        scopes
    }

    async fn sweep_target(
        &self,
        working: &Combination,
        scope: OptimizationScope,
        target: &ParameterTarget,
        max_points: usize,
        period: Option<DateSpan>,
    ) -> Result<Option<super::grid::GridSelection>, OptimizerError> {
        let request = SweepRequest {
            combination: working,
            scope,
            target,
            max_points,
            period,
        };
        match self.evaluator.sweep(&request).await {
            Ok(points) => Ok(select_best(&points, self.config.target_metric)),
            Err(err) if err.is_mapping() => Err(err.into()),
            Err(err) => {
                warn!(
                    %scope,
                    param = %target.name,
                    error = %err,
                    "Sweep failed, keeping current value"
                );
                Ok(None)
            }
        }
    }

    fn descriptor_for(
        &self,
        combination: &Combination,
        scope: OptimizationScope,
    ) -> Result<&StrategyDescriptor, OptimizerError> {
        let id = combination
            .strategy_for(scope)
            .ok_or(OptimizerError::MissingLeg { scope })?;
        self.catalog
            .get(id)
            .ok_or_else(|| OptimizerError::UnknownStrategy { id: id.to_string() })
    }

    fn scope_change(
        &self,
        original: &Combination,
        current: &Combination,
        scope: OptimizationScope,
    ) -> ScopeChange {
        let total_targets = if scope == OptimizationScope::Risk {
            self.config.risk_targets.ordered().len()
        } else {
            self.descriptor_for(current, scope)
                .map_or(0, |d| d.optimize_targets.len())
        };
        ScopeChange {
            scope,
            changed_keys: changed_keys(
                &original.params_for(scope).unwrap_or_default(),
                &current.params_for(scope).unwrap_or_default(),
            ),
            total_targets,
        }
    }
}

/// Leg params (defaults when empty), missing targets filled from defaults, aligned.
fn starting_params(
    combination: &Combination,
    scope: OptimizationScope,
    descriptor: &StrategyDescriptor,
) -> ParamMap {
    let current = combination.params_for(scope).unwrap_or_default();
    let mut params = if current.is_empty() {
        descriptor.default_params.clone()
    } else {
        current
    };
    for target in &descriptor.optimize_targets {
        if !params.contains_key(&target.name) {
            let value = descriptor
                .default_params
                .get(&target.name)
                .copied()
                .unwrap_or(target.range.lower());
            params.insert(target.name.clone(), value);
        }
    }
    align_params(&params, &descriptor.optimize_targets)
}
