//! Integration tests for coordinate-ascent optimization, batch scheduling and
//! local refinement, driven by a deterministic in-process evaluator.

use std::sync::Arc;

use optimization_engine::config::{
    OptimizationConfig, RefinementConfig, RefinementMode, load_config_from_string,
};
use optimization_engine::context::OptimizationRunContext;
use optimization_engine::domain::{
    Combination, EvaluationResult, OptimizationScope, ParameterTarget, RiskTargets,
    StrategyCatalog, StrategyDescriptor, TargetMetric,
};
use optimization_engine::evaluation::ScriptedEvaluator;
use optimization_engine::optimizer::{
    BatchOptimizer, CombinationConvergenceOptimizer, OptimizerError,
};
use optimization_engine::refinement::{LocalRefinementEngine, RefinementMethod};
use optimization_engine::scheduler::{EvaluationScheduler, SchedulerConfig};

fn short_target() -> ParameterTarget {
    ParameterTarget::new("shortPeriod", 2.0, 20.0, 1.0)
}

fn long_target() -> ParameterTarget {
    ParameterTarget::new("longPeriod", 10.0, 60.0, 5.0)
}

fn catalog() -> Arc<StrategyCatalog> {
    Arc::new(StrategyCatalog::from_descriptors([
        StrategyDescriptor::new("ma_cross")
            .with_target(short_target(), 5.0)
            .with_target(long_target(), 30.0),
        StrategyDescriptor::new("hold"),
    ]))
}

/// Sharpe peaks at shortPeriod 10 / longPeriod 40.
fn peak_evaluator() -> ScriptedEvaluator {
    ScriptedEvaluator::new(|combo, _| {
        let short = combo.buy_params.get("shortPeriod").copied().unwrap_or(0.0);
        let long = combo.buy_params.get("longPeriod").copied().unwrap_or(0.0);
        let sharpe = 2.0 - ((short - 10.0) / 10.0).powi(2) - ((long - 40.0) / 20.0).powi(2);
        EvaluationResult {
            sharpe_ratio: Some(sharpe),
            annualized_return: Some(sharpe * 10.0),
            max_drawdown: Some(15.0),
            ..EvaluationResult::default()
        }
    })
}

fn sharpe_config() -> OptimizationConfig {
    OptimizationConfig {
        target_metric: TargetMetric::SharpeRatio,
        enabled_scopes: vec![OptimizationScope::Entry, OptimizationScope::Exit],
        ..OptimizationConfig::default()
    }
}

fn seeded(short: f64, long: f64) -> Combination {
    Combination::new("ma_cross", "hold").with_buy_params(
        [
            ("shortPeriod".to_string(), short),
            ("longPeriod".to_string(), long),
        ]
        .into(),
    )
}

fn refiner(evaluator: Arc<ScriptedEvaluator>, mode: RefinementMode) -> LocalRefinementEngine {
    LocalRefinementEngine::new(
        evaluator,
        catalog(),
        TargetMetric::SharpeRatio,
        RiskTargets::default(),
        RefinementConfig {
            enabled: true,
            mode,
            trials: 40,
            seed: Some(42),
            ..RefinementConfig::default()
        },
    )
}

// ============================================================================
// Convergence
// ============================================================================

#[tokio::test]
async fn test_entry_leg_converges_to_peak_within_five_passes() {
    let optimizer =
        CombinationConvergenceOptimizer::new(Arc::new(peak_evaluator()), catalog(), sharpe_config());

    let Ok(result) = optimizer
        .optimize_strategy(&seeded(5.0, 30.0), OptimizationScope::Entry, None)
        .await
    else {
        panic!("optimization should succeed");
    };

    assert_eq!(result.params.get("shortPeriod"), Some(&10.0));
    assert_eq!(result.params.get("longPeriod"), Some(&40.0));
    assert!(result.converged);
    assert!(result.passes <= 5);
}

#[tokio::test]
async fn test_combination_outcome_stays_on_grid() {
    let optimizer =
        CombinationConvergenceOptimizer::new(Arc::new(peak_evaluator()), catalog(), sharpe_config());
    let ctx = OptimizationRunContext::new();

    let Ok(outcome) = optimizer
        .optimize_combination(&ctx, &seeded(5.0, 30.0), None)
        .await
    else {
        panic!("optimization should succeed");
    };

    assert!(outcome.status.is_success());
    let params = &outcome.combination.buy_params;
    let Some(short) = params.get("shortPeriod") else {
        panic!("shortPeriod missing");
    };
    let Some(long) = params.get("longPeriod") else {
        panic!("longPeriod missing");
    };
    assert!(short_target().range.contains_aligned(*short));
    assert!(long_target().range.contains_aligned(*long));
    assert_eq!(ctx.outcomes().len(), 1);
}

#[tokio::test]
async fn test_optimizer_is_deterministic() {
    let optimizer =
        CombinationConvergenceOptimizer::new(Arc::new(peak_evaluator()), catalog(), sharpe_config());
    let ctx = OptimizationRunContext::new();

    let Ok(first) = optimizer.optimize_combination(&ctx, &seeded(3.0, 55.0), None).await else {
        panic!("first run should succeed");
    };
    let Ok(second) = optimizer.optimize_combination(&ctx, &seeded(3.0, 55.0), None).await else {
        panic!("second run should succeed");
    };

    assert_eq!(first.combination, second.combination);
    assert_eq!(first.final_metric, second.final_metric);
    assert_eq!(first.status, second.status);
}

// ============================================================================
// Batch scheduling
// ============================================================================

#[tokio::test]
async fn test_batch_respects_concurrency_and_order() {
    let optimizer = Arc::new(CombinationConvergenceOptimizer::new(
        Arc::new(peak_evaluator()),
        catalog(),
        sharpe_config(),
    ));
    let Ok(scheduler) = EvaluationScheduler::new(SchedulerConfig::with_concurrency(2)) else {
        panic!("valid scheduler");
    };
    let batch = BatchOptimizer::new(optimizer, scheduler);
    let combinations: Vec<Combination> = (3..8)
        .map(|short| seeded(f64::from(short), 25.0))
        .collect();

    let ctx = OptimizationRunContext::new();
    let Ok(report) = batch.run(&ctx, combinations.clone(), None).await else {
        panic!("batch should succeed");
    };

    assert_eq!(report.results.len(), combinations.len());
    assert!(report.peak_in_flight <= 2);
    assert!(report.fallbacks.is_empty());
    for (slot, original) in report.results.iter().zip(&combinations) {
        let Some(item) = slot else {
            panic!("every slot should be filled");
        };
        assert_eq!(&item.convergence.original, original);
        assert_eq!(item.best_combination().buy_params.get("shortPeriod"), Some(&10.0));
    }
}

#[tokio::test]
async fn test_batch_concurrency_comes_from_yaml() {
    let yaml = r"
optimization:
  target_metric: sharpeRatio
  concurrency: 2
  combination_timeout_secs: 30
";
    let config = match load_config_from_string(yaml) {
        Ok(c) => c,
        Err(e) => panic!("should load config: {e}"),
    };
    let optimizer = Arc::new(CombinationConvergenceOptimizer::new(
        Arc::new(peak_evaluator()),
        catalog(),
        config.optimization,
    ));
    let Ok(batch) = BatchOptimizer::from_config(optimizer) else {
        panic!("valid concurrency");
    };
    let combinations: Vec<Combination> = (3..9)
        .map(|short| seeded(f64::from(short), 30.0))
        .collect();

    let Ok(report) = batch
        .run(&OptimizationRunContext::new(), combinations, None)
        .await
    else {
        panic!("batch should succeed");
    };

    assert_eq!(report.peak_in_flight, 2);
    assert_eq!(report.completed, 6);
    assert!(report.fallbacks.is_empty());
}

#[tokio::test]
async fn test_batch_stops_on_mapping_failure() {
    let evaluator = Arc::new(peak_evaluator().with_unmapped("hold"));
    let optimizer = Arc::new(CombinationConvergenceOptimizer::new(
        evaluator,
        catalog(),
        sharpe_config(),
    ));
    let Ok(scheduler) = EvaluationScheduler::new(SchedulerConfig::with_concurrency(1)) else {
        panic!("valid scheduler");
    };
    let batch = BatchOptimizer::new(optimizer, scheduler);
    let ctx = OptimizationRunContext::new();

    let result = batch
        .run(&ctx, vec![seeded(5.0, 30.0), seeded(6.0, 30.0)], None)
        .await;

    assert!(matches!(result, Err(OptimizerError::Mapping { .. })));
    assert!(ctx.is_cancelled());
}

// ============================================================================
// Refinement
// ============================================================================

#[tokio::test]
async fn test_spsa_refinement_never_regresses() {
    let evaluator = Arc::new(peak_evaluator());
    let engine = refiner(evaluator, RefinementMode::Auto);

    let Ok(outcome) = engine.refine(&seeded(6.0, 25.0), None).await else {
        panic!("refinement should succeed");
    };

    assert_eq!(outcome.method, RefinementMethod::Spsa);
    let (Some(metric), Some(seed_metric)) = (outcome.metric, outcome.seed_metric) else {
        panic!("metrics expected");
    };
    assert!(metric >= seed_metric);
    let params = &outcome.combination.buy_params;
    let Some(short) = params.get("shortPeriod") else {
        panic!("shortPeriod missing");
    };
    let Some(long) = params.get("longPeriod") else {
        panic!("longPeriod missing");
    };
    assert!(short_target().range.contains_aligned(*short));
    assert!(long_target().range.contains_aligned(*long));
}

#[tokio::test]
async fn test_cem_refinement_never_regresses() {
    let evaluator = Arc::new(peak_evaluator());
    let engine = refiner(evaluator.clone(), RefinementMode::Cem);

    let Ok(outcome) = engine.refine(&seeded(15.0, 20.0), None).await else {
        panic!("refinement should succeed");
    };

    assert_eq!(outcome.method, RefinementMethod::Cem);
    assert!(outcome.metric >= outcome.seed_metric);
    assert!(outcome.evaluations <= evaluator.calls());
    if !outcome.improved {
        assert_eq!(outcome.combination, seeded(15.0, 20.0));
    }
}

#[tokio::test]
async fn test_refinement_at_optimum_falls_back_to_seed() {
    let engine = refiner(Arc::new(peak_evaluator()), RefinementMode::Auto);

    let Ok(outcome) = engine.refine(&seeded(10.0, 40.0), None).await else {
        panic!("refinement should succeed");
    };

    assert!(!outcome.improved);
    assert!(outcome.fallback);
    assert_eq!(outcome.combination, seeded(10.0, 40.0));
}
