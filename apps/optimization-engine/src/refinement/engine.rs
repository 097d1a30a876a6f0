//! Local refinement of a converged combination.

use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use tracing::{Instrument, Level, info, span};

use crate::config::{RefinementConfig, RefinementMode};
use crate::domain::{
    Combination, DateSpan, EvaluationResult, RiskTargets, StrategyCatalog, TargetMetric,
};
use crate::evaluation::Evaluator;
use crate::optimizer::OptimizerError;

use super::cem::run_cem;
use super::probe::Probe;
use super::space::SearchSpace;
use super::spsa::run_spsa;

/// Spaces with at most this many dimensions use SPSA under `Auto`.
const SPSA_MAX_DIMENSIONS: usize = 2;

/// Algorithm that produced a refinement outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefinementMethod {
    /// Simultaneous perturbation.
    Spsa,
    /// Cross-entropy method.
    Cem,
    /// Nothing to tune.
    None,
}

/// Result of refining one combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefinementOutcome {
    /// Refined combination (the seed when `fallback`).
    pub combination: Combination,
    /// Metrics of `combination`.
    pub result: Option<EvaluationResult>,
    /// Target metric of `combination`.
    pub metric: Option<f64>,
    /// Target metric of the seed.
    pub seed_metric: Option<f64>,
    /// Whether refinement beat the seed.
    pub improved: bool,
    /// No improvement was found; the seed is returned unchanged.
    pub fallback: bool,
    /// Algorithm used.
    pub method: RefinementMethod,
    /// Collaborator evaluations spent.
    pub evaluations: usize,
}

/// SPSA / CEM search around a seed combination.
///
/// Never returns a combination that scores worse than the seed.
#[derive(Clone)]
pub struct LocalRefinementEngine {
    evaluator: Arc<dyn Evaluator>,
    catalog: Arc<StrategyCatalog>,
    metric: TargetMetric,
    risk_targets: RiskTargets,
    config: RefinementConfig,
}

impl std::fmt::Debug for LocalRefinementEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalRefinementEngine")
            .field("metric", &self.metric)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl LocalRefinementEngine {
    /// Create an engine.
    #[must_use]
    pub fn new(
        evaluator: Arc<dyn Evaluator>,
        catalog: Arc<StrategyCatalog>,
        metric: TargetMetric,
        risk_targets: RiskTargets,
        config: RefinementConfig,
    ) -> Self {
        Self {
            evaluator,
            catalog,
            metric,
            risk_targets,
            config,
        }
    }

    /// Refinement settings.
    #[must_use]
    pub const fn config(&self) -> &RefinementConfig {
        &self.config
    }

    /// Whether refinement is switched on.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Algorithm for a space with `dimensions` coordinates.
    #[must_use]
    pub const fn select_method(&self, dimensions: usize) -> RefinementMethod {
        match self.config.mode {
            _ if dimensions == 0 => RefinementMethod::None,
            RefinementMode::Spsa => RefinementMethod::Spsa,
            RefinementMode::Cem => RefinementMethod::Cem,
            RefinementMode::Auto if dimensions <= SPSA_MAX_DIMENSIONS => RefinementMethod::Spsa,
            RefinementMode::Auto => RefinementMethod::Cem,
        }
    }

    /// Refine `seed` on `period`.
    ///
    /// The seed is evaluated first. Failed candidate evaluations score as the
    /// sentinel and never displace the incumbent.
    ///
    /// # Errors
    ///
    /// `UnknownStrategy` if a leg is not in the catalog, `Mapping` when the
    /// collaborator cannot map a strategy.
    pub async fn refine(
        &self,
        seed: &Combination,
        period: Option<DateSpan>,
    ) -> Result<RefinementOutcome, OptimizerError> {
        let refine_span = span!(Level::DEBUG, "refine", combination = %seed.label());
        self.refine_inner(seed, period).instrument(refine_span).await
    }

    async fn refine_inner(
        &self,
        seed: &Combination,
        period: Option<DateSpan>,
    ) -> Result<RefinementOutcome, OptimizerError> {
        let space = SearchSpace::build(seed, &self.catalog, &self.risk_targets, &self.config)?;
        let method = self.select_method(space.len());
        let mut probe = Probe::new(self.evaluator.as_ref(), period, self.metric);
        let start = probe.score(seed.clone()).await?;
        let seed_metric = start.result.as_ref().and_then(|r| r.metric(self.metric));

        info!(
            combination = %seed.label(),
            dimensions = space.len(),
            method = ?method,
            trials = self.config.trials,
            seed_metric = ?seed_metric,
            "Starting local refinement"
        );

        let mut rng = match self.config.seed {
            Some(value) => StdRng::seed_from_u64(value),
            None => StdRng::from_os_rng(),
        };

        let trials = self.config.trials.max(1);
        let best = match method {
            RefinementMethod::None => start.clone(),
            RefinementMethod::Spsa => {
                run_spsa(&space, &mut probe, start.clone(), trials, &self.config, &mut rng).await?
            }
            RefinementMethod::Cem => {
                run_cem(&space, &mut probe, start.clone(), trials, &self.config, &mut rng).await?
            }
        };

        let improved = probe.better(best.score, start.score);
        let outcome = if improved {
            RefinementOutcome {
                metric: best.result.as_ref().and_then(|r| r.metric(self.metric)),
                combination: best.combination,
                result: best.result,
                seed_metric,
                improved: true,
                fallback: false,
                method,
                evaluations: probe.evaluations(),
            }
        } else {
            RefinementOutcome {
                combination: seed.clone(),
                result: start.result,
                metric: seed_metric,
                seed_metric,
                improved: false,
                fallback: true,
                method,
                evaluations: probe.evaluations(),
            }
        };

        info!(
            combination = %seed.label(),
            improved = outcome.improved,
            metric = ?outcome.metric,
            evaluations = outcome.evaluations,
            "Local refinement complete"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ParameterTarget, RiskManagement, StrategyDescriptor};
    use crate::evaluation::ScriptedEvaluator;

    fn catalog() -> Arc<StrategyCatalog> {
        Arc::new(StrategyCatalog::from_descriptors([
            StrategyDescriptor::new("ma_cross")
                .with_target(ParameterTarget::new("shortPeriod", 2.0, 20.0, 1.0), 5.0)
                .with_target(ParameterTarget::new("longPeriod", 10.0, 60.0, 5.0), 30.0),
            StrategyDescriptor::new("rsi_overbought")
                .with_target(ParameterTarget::new("threshold", 60.0, 90.0, 5.0), 70.0),
            StrategyDescriptor::new("hold"),
            StrategyDescriptor::new("fixed_stop_loss").risk_control(),
        ]))
    }

    fn bowl() -> ScriptedEvaluator {
        ScriptedEvaluator::new(|combo, _| {
            let short = combo.buy_params.get("shortPeriod").copied().unwrap_or(0.0);
            let long = combo.buy_params.get("longPeriod").copied().unwrap_or(0.0);
            let threshold = combo.sell_params.get("threshold").copied().unwrap_or(75.0);
            let stop = combo
                .risk_management
                .and_then(|r| r.stop_loss)
                .unwrap_or(10.0);
            let annualized = 30.0
                - (short - 9.0).abs()
                - (long - 45.0).abs() / 5.0
                - (threshold - 75.0).abs() / 5.0
                - (stop - 10.0).abs() / 2.0;
            EvaluationResult {
                annualized_return: Some(annualized),
                ..EvaluationResult::default()
            }
        })
    }

    fn engine(evaluator: ScriptedEvaluator, mode: RefinementMode) -> LocalRefinementEngine {
        LocalRefinementEngine::new(
            Arc::new(evaluator),
            catalog(),
            TargetMetric::AnnualizedReturn,
            RiskTargets::default(),
            RefinementConfig {
                enabled: true,
                mode,
                trials: 40,
                seed: Some(7),
                ..RefinementConfig::default()
            },
        )
    }

    fn seed() -> Combination {
        Combination::new("ma_cross", "hold").with_buy_params(
            [("shortPeriod".to_string(), 5.0), ("longPeriod".to_string(), 30.0)].into(),
        )
    }

    #[test]
    fn test_method_selection() {
        let auto = engine(bowl(), RefinementMode::Auto);
        assert_eq!(auto.select_method(0), RefinementMethod::None);
        assert_eq!(auto.select_method(2), RefinementMethod::Spsa);
        assert_eq!(auto.select_method(3), RefinementMethod::Cem);

        let forced = engine(bowl(), RefinementMode::Cem);
        assert_eq!(forced.select_method(1), RefinementMethod::Cem);
    }

    #[tokio::test]
    async fn test_spsa_improves_and_stays_in_range() {
        let engine = engine(bowl(), RefinementMode::Auto);
        let Ok(outcome) = engine.refine(&seed(), None).await else {
            panic!("refinement should succeed");
        };

        assert_eq!(outcome.method, RefinementMethod::Spsa);
        let (Some(metric), Some(seed_metric)) = (outcome.metric, outcome.seed_metric) else {
            panic!("metrics should be present");
        };
        assert!(metric >= seed_metric);
        assert!(outcome.evaluations <= 41);

        let short = outcome.combination.buy_params["shortPeriod"];
        let long = outcome.combination.buy_params["longPeriod"];
        assert!(ParameterTarget::new("s", 2.0, 20.0, 1.0).range.contains_aligned(short));
        assert!(ParameterTarget::new("l", 10.0, 60.0, 5.0).range.contains_aligned(long));
    }

    #[tokio::test]
    async fn test_cem_never_regresses() {
        let engine = engine(bowl(), RefinementMode::Auto);
        let combo = Combination::new("ma_cross", "fixed_stop_loss")
            .with_buy_params(
                [("shortPeriod".to_string(), 9.0), ("longPeriod".to_string(), 45.0)].into(),
            )
            .with_risk(RiskManagement {
                stop_loss: Some(10.0),
                take_profit: Some(20.0),
            });

        let Ok(outcome) = engine.refine(&combo, None).await else {
            panic!("refinement should succeed");
        };
        // Seed already sits at the optimum: nothing can beat it.
        assert_eq!(outcome.method, RefinementMethod::Cem);
        assert!(outcome.fallback);
        assert!(!outcome.improved);
        assert_eq!(outcome.combination, combo);
    }

    #[tokio::test]
    async fn test_seeded_runs_are_reproducible() {
        let first = engine(bowl(), RefinementMode::Cem).refine(&seed(), None).await;
        let second = engine(bowl(), RefinementMode::Cem).refine(&seed(), None).await;
        let (Ok(first), Ok(second)) = (first, second) else {
            panic!("refinement should succeed");
        };
        assert_eq!(first.combination, second.combination);
        assert_eq!(first.evaluations, second.evaluations);
    }

    #[tokio::test]
    async fn test_empty_space_returns_seed() {
        let engine = engine(bowl(), RefinementMode::Auto);
        let combo = Combination::new("hold", "hold");
        let Ok(outcome) = engine.refine(&combo, None).await else {
            panic!("refinement should succeed");
        };
        assert_eq!(outcome.method, RefinementMethod::None);
        assert!(outcome.fallback);
        assert_eq!(outcome.evaluations, 1);
    }

    #[tokio::test]
    async fn test_mapping_failure_propagates() {
        let engine = engine(bowl().with_unmapped("hold"), RefinementMode::Auto);
        let result = engine.refine(&seed(), None).await;
        assert!(matches!(result, Err(OptimizerError::Mapping { .. })));
    }

    #[tokio::test]
    async fn test_failing_evaluator_falls_back() {
        let engine = engine(bowl().with_failing("hold"), RefinementMode::Auto);
        let Ok(outcome) = engine.refine(&seed(), None).await else {
            panic!("non-mapping failures should not propagate");
        };
        assert!(outcome.fallback);
        assert_eq!(outcome.combination, seed());
        assert!(outcome.result.is_none());
    }
}
