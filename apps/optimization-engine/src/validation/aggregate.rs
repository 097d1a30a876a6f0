//! Run-level aggregation of window analyses into a graded report.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{Combination, EvaluationResult, ReturnMoments};
use crate::optimizer::{ConvergenceStatus, ScopeChange};

use super::analysis::{AnalysisSettings, WindowAnalysis};
use super::scoring::{QualityMetric, median_components};
use super::stats::{
    SharpeSample, annualized_sharpe, average, combine_moments, deflated_sharpe,
    effective_sample_size, effective_trials, median, probabilistic_sharpe, sample_sharpe,
};
use super::types::{Grade, Window};

/// Bounds of the WFE adjustment applied to the median window score.
pub const WFE_ADJUSTMENT_RANGE: (f64, f64) = (0.8, 1.2);

/// Training-segment optimization summary of one window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowOptimization {
    /// Convergence status on the training segment.
    pub status: ConvergenceStatus,
    /// Keys moved per scope.
    pub scope_changes: Vec<ScopeChange>,
    /// Whether local refinement replaced the converged parameters.
    pub refined: bool,
    /// Target metric on the training segment.
    pub training_metric: Option<f64>,
    /// Estimated correlation between the trials spent.
    pub trial_correlation: f64,
}

/// Everything produced for one window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowReport {
    /// Window dates.
    pub window: Window,
    /// Parameters tested out-of-sample.
    pub combination: Combination,
    /// Training-segment metrics.
    pub training: Option<EvaluationResult>,
    /// Testing-segment metrics.
    pub testing: Option<EvaluationResult>,
    /// Why the training evaluation failed.
    pub training_error: Option<String>,
    /// Why the testing evaluation failed.
    pub testing_error: Option<String>,
    /// Walk-forward efficiency (percent).
    pub wfe: Option<f64>,
    /// Training optimization, when enabled.
    pub optimization: Option<WindowOptimization>,
    /// Testing-segment statistics.
    pub analysis: WindowAnalysis,
}

/// Walk-forward efficiency: testing over training annualized return, in
/// percent. Defined only for a positive training return.
#[must_use]
pub fn walk_forward_efficiency(
    training: Option<&EvaluationResult>,
    testing: Option<&EvaluationResult>,
) -> Option<f64> {
    let train = training?.annualized_return.filter(|v| v.is_finite())?;
    let test = testing?.annualized_return.filter(|v| v.is_finite())?;
    (train > 0.0).then(|| test / train * 100.0)
}

/// In-sample vs out-of-sample Sharpe comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct OverfittingSummary {
    /// Median training Sharpe.
    pub median_training_sharpe: Option<f64>,
    /// Median testing Sharpe.
    pub median_testing_sharpe: Option<f64>,
    /// Median of `(train - test) / |train|` over windows with both values.
    pub median_sharpe_degradation: Option<f64>,
    /// Windows whose testing Sharpe fell below training.
    pub degraded_windows: usize,
    /// Windows with both Sharpe values.
    pub compared_windows: usize,
}

impl OverfittingSummary {
    /// Compare training and testing Sharpe window by window.
    #[must_use]
    pub fn from_windows(windows: &[WindowReport]) -> Self {
        let sharpe = |r: Option<&EvaluationResult>| {
            r.and_then(|r| r.sharpe_ratio).filter(|v| v.is_finite())
        };
        let pairs: Vec<(f64, f64)> = windows
            .iter()
            .filter_map(|w| Some((sharpe(w.training.as_ref())?, sharpe(w.testing.as_ref())?)))
            .collect();

        Self {
            median_training_sharpe: median(windows.iter().map(|w| sharpe(w.training.as_ref()))),
            median_testing_sharpe: median(windows.iter().map(|w| sharpe(w.testing.as_ref()))),
            median_sharpe_degradation: median(
                pairs
                    .iter()
                    .filter(|(train, _)| *train != 0.0)
                    .map(|(train, test)| Some((train - test) / train.abs())),
            ),
            degraded_windows: pairs.iter().filter(|(train, test)| test < train).count(),
            compared_windows: pairs.len(),
        }
    }
}

/// Run-level report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateReport {
    /// Overall verdict.
    pub grade: Grade,
    /// Whether a non-positive pooled DSR lowered the grade.
    pub grade_downgraded: bool,
    /// Median window score times the WFE adjustment, in `[0, 1]`.
    pub total_score: Option<f64>,
    /// Windows analyzed.
    pub window_count: usize,
    /// Windows meeting every threshold.
    pub pass_count: usize,
    /// Pass share in percent.
    pub pass_rate: f64,

    /// Median window score.
    pub median_window_score: Option<f64>,
    /// Median WFE (percent).
    pub median_wfe: Option<f64>,
    /// Factor applied to the median window score.
    pub wfe_adjustment: f64,

    /// Median quality score.
    pub median_oos_quality: Option<f64>,
    /// Median unclamped quality.
    pub median_oos_quality_raw: Option<f64>,
    /// Median quality pass ratio.
    pub median_oos_pass_ratio: Option<f64>,
    /// Median normalized score per quality metric.
    pub quality_component_medians: BTreeMap<QualityMetric, f64>,
    /// Median credibility.
    pub median_credibility: Option<f64>,
    /// Median stat weight.
    pub median_stat_weight: Option<f64>,

    /// Median active PSR.
    pub median_psr: Option<f64>,
    /// Median loose PSR.
    pub median_psr_loose: Option<f64>,
    /// Median strict PSR.
    pub median_psr_strict: Option<f64>,
    /// Median active DSR.
    pub median_dsr: Option<f64>,
    /// Median loose DSR.
    pub median_dsr_loose: Option<f64>,
    /// Median strict DSR.
    pub median_dsr_strict: Option<f64>,
    /// Share of windows with active PSR at or above 0.95.
    pub psr_above_95_ratio: f64,
    /// Share of windows with active DSR below 0.5.
    pub dsr_below_50_ratio: f64,

    /// Median daily samples per window.
    pub median_sample_count: Option<f64>,
    /// Median effective samples per window.
    pub median_effective_sample_count: Option<f64>,
    /// Median minimum track record length.
    pub median_min_track_record_length: Option<f64>,
    /// Mean trial correlation.
    pub average_trial_correlation: Option<f64>,
    /// Trials after correlation discount, run-wide.
    pub overall_effective_trials: f64,

    /// Annualized Sharpe of pooled testing returns.
    pub overall_sharpe: Option<f64>,
    /// Daily Sharpe of pooled testing returns.
    pub overall_sample_sharpe: Option<f64>,
    /// Effective samples of pooled testing returns.
    pub overall_effective_sample_count: f64,
    /// PSR of pooled testing returns.
    pub overall_psr: Option<f64>,
    /// DSR of pooled testing returns.
    pub overall_dsr: Option<f64>,

    /// Mean testing annualized return.
    pub average_annualized_return: Option<f64>,
    /// Mean testing Sharpe.
    pub average_sharpe: Option<f64>,
    /// Mean testing Sortino.
    pub average_sortino: Option<f64>,
    /// Mean testing max drawdown.
    pub average_max_drawdown: Option<f64>,
    /// Median testing annualized return.
    pub median_annualized_return: Option<f64>,
    /// Median buy-and-hold annualized return.
    pub median_baseline_annualized_return: Option<f64>,
    /// Median testing Sharpe.
    pub median_sharpe: Option<f64>,
    /// Median testing Sortino.
    pub median_sortino: Option<f64>,
    /// Median testing max drawdown.
    pub median_max_drawdown: Option<f64>,
    /// Median testing win rate.
    pub median_win_rate: Option<f64>,
    /// Median testing trade count.
    pub median_trades: Option<f64>,

    /// Training vs testing Sharpe.
    pub overfitting: OverfittingSummary,
    /// Whether strict scoring was active.
    pub strict_mode: bool,
    /// Active daily Sharpe benchmark.
    pub benchmark: f64,
}

/// Grade from total score, median WFE ratio, PSR pass share and median DSR.
#[must_use]
pub fn resolve_grade(
    total_score: Option<f64>,
    median_wfe_ratio: Option<f64>,
    psr_ratio: f64,
    median_dsr: Option<f64>,
) -> Grade {
    let (Some(score), Some(wfe)) = (
        total_score.filter(|v| v.is_finite()),
        median_wfe_ratio.filter(|v| v.is_finite()),
    ) else {
        return Grade::NoResult;
    };
    if !psr_ratio.is_finite() {
        return Grade::NoResult;
    }

    let dsr_ok = median_dsr.filter(|d| d.is_finite()).is_none_or(|d| d >= 0.7);
    if score >= 0.70 && wfe >= 0.8 && psr_ratio >= 0.5 && dsr_ok {
        Grade::ProfessionalPass
    } else if score >= 0.50 && wfe >= 0.6 && psr_ratio >= 0.3 {
        Grade::ObserveFurther
    } else {
        Grade::NeedsAdjustment
    }
}

/// Aggregate every window of a run.
#[must_use]
pub fn aggregate(windows: &[WindowReport], settings: &AnalysisSettings) -> AggregateReport {
    let analyses: Vec<&WindowAnalysis> = windows.iter().map(|w| &w.analysis).collect();
    let tested: Vec<&EvaluationResult> = windows.iter().filter_map(|w| w.testing.as_ref()).collect();
    let window_count = windows.len();
    let share = |count: usize| {
        if window_count == 0 {
            0.0
        } else {
            count as f64 / window_count as f64
        }
    };

    let pass_count = analyses.iter().filter(|a| a.verdict.pass).count();

    let median_window_score = median(analyses.iter().map(|a| Some(a.window_score)));
    let median_wfe = median(analyses.iter().map(|a| a.wfe));
    let median_wfe_ratio = median_wfe.map(|w| w / 100.0);
    let wfe_adjustment = median_wfe_ratio.map_or(1.0, |r| {
        r.clamp(WFE_ADJUSTMENT_RANGE.0, WFE_ADJUSTMENT_RANGE.1)
    });
    let total_score = median_window_score
        .map(|s| s * wfe_adjustment)
        .filter(|s| s.is_finite())
        .map(|s| s.clamp(0.0, 1.0));

    let median_psr = median(analyses.iter().map(|a| a.psr));
    let median_dsr = median(analyses.iter().map(|a| a.dsr));
    let psr_above_95_ratio = share(analyses.iter().filter(|a| a.psr.is_some_and(|p| p >= 0.95)).count());
    let dsr_below_50_ratio = share(analyses.iter().filter(|a| a.dsr.is_some_and(|d| d < 0.5)).count());

    let average_trial_correlation = average(analyses.iter().map(|a| Some(a.trial_correlation)));
    let (overall_effective_trials, _) =
        effective_trials(settings.raw_trials, average_trial_correlation);

    let pooled = pooled_moments(&analyses);
    let overall_sharpe = pooled.as_ref().and_then(annualized_sharpe);
    let overall_sample_sharpe = pooled.as_ref().and_then(sample_sharpe);
    let overall_effective_sample_count = effective_sample_size(pooled.as_ref());
    let benchmark = settings.active_benchmark();
    let overall_sample = SharpeSample::new(
        overall_sample_sharpe,
        overall_effective_sample_count,
        pooled.as_ref(),
    );
    let overall_psr = overall_sample.and_then(|s| probabilistic_sharpe(&s, benchmark));
    let overall_dsr =
        overall_sample.and_then(|s| deflated_sharpe(&s, benchmark, overall_effective_trials));

    let mut grade = resolve_grade(total_score, median_wfe_ratio, psr_above_95_ratio, median_dsr);
    let mut grade_downgraded = false;
    if overall_dsr.is_some_and(|d| d <= 0.0) && grade.level() > 0 {
        grade = grade.downgraded();
        grade_downgraded = true;
    }

    let metric = |f: fn(&EvaluationResult) -> Option<f64>| tested.iter().map(move |r| f(r));

    AggregateReport {
        grade,
        grade_downgraded,
        total_score,
        window_count,
        pass_count,
        pass_rate: share(pass_count) * 100.0,
        median_window_score,
        median_wfe,
        wfe_adjustment,
        median_oos_quality: median(analyses.iter().map(|a| a.oos_quality.value)),
        median_oos_quality_raw: median(analyses.iter().map(|a| a.oos_quality.raw_value)),
        median_oos_pass_ratio: median(analyses.iter().map(|a| Some(a.oos_quality.pass_ratio))),
        quality_component_medians: median_components(analyses.iter().map(|a| &a.oos_quality)),
        median_credibility: median(analyses.iter().map(|a| a.credibility)),
        median_stat_weight: median(analyses.iter().map(|a| Some(a.stat_weight))),
        median_psr,
        median_psr_loose: median(analyses.iter().map(|a| a.psr_loose)),
        median_psr_strict: median(analyses.iter().map(|a| a.psr_strict)),
        median_dsr,
        median_dsr_loose: median(analyses.iter().map(|a| a.dsr_loose)),
        median_dsr_strict: median(analyses.iter().map(|a| a.dsr_strict)),
        psr_above_95_ratio,
        dsr_below_50_ratio,
        median_sample_count: median(analyses.iter().map(|a| Some(a.sample_count))),
        median_effective_sample_count: median(
            analyses.iter().map(|a| Some(a.effective_sample_count)),
        ),
        median_min_track_record_length: median(analyses.iter().map(|a| a.min_track_record_length)),
        average_trial_correlation,
        overall_effective_trials,
        overall_sharpe,
        overall_sample_sharpe,
        overall_effective_sample_count,
        overall_psr,
        overall_dsr,
        average_annualized_return: average(metric(|r| r.annualized_return)),
        average_sharpe: average(metric(|r| r.sharpe_ratio)),
        average_sortino: average(metric(|r| r.sortino_ratio)),
        average_max_drawdown: average(metric(|r| r.max_drawdown)),
        median_annualized_return: median(metric(|r| r.annualized_return)),
        median_baseline_annualized_return: median(metric(|r| r.baseline_annualized_return)),
        median_sharpe: median(metric(|r| r.sharpe_ratio)),
        median_sortino: median(metric(|r| r.sortino_ratio)),
        median_max_drawdown: median(metric(|r| r.max_drawdown)),
        median_win_rate: median(metric(|r| r.win_rate)),
        median_trades: median(metric(|r| r.trades_count)),
        overfitting: OverfittingSummary::from_windows(windows),
        strict_mode: settings.strict_mode,
        benchmark,
    }
}

/// Pooled testing moments; lag-1 autocorrelation is the mean of the windows'.
fn pooled_moments(analyses: &[&WindowAnalysis]) -> Option<ReturnMoments> {
    let mut pooled = combine_moments(analyses.iter().filter_map(|a| a.stats.as_ref()))?;
    pooled.lag1_autocorr = average(
        analyses
            .iter()
            .map(|a| a.stats.and_then(|s| s.lag1_autocorr)),
    );
    Some(pooled)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use test_case::test_case;

    use super::*;
    use crate::config::ValidationConfig;
    use crate::validation::analysis::analyze_window;
    use crate::validation::types::Thresholds;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        let Some(date) = NaiveDate::from_ymd_opt(y, m, d) else {
            panic!("invalid test date");
        };
        date
    }

    fn settings() -> AnalysisSettings {
        AnalysisSettings::from_config(&ValidationConfig::default(), 1.0)
    }

    fn returns(seed: u64, n: usize, drift: f64) -> Vec<f64> {
        // Deterministic pseudo-noise in [-0.01, 0.01].
        let mut state = seed;
        (0..n)
            .map(|_| {
                state = state.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
                let unit = (state >> 11) as f64 / (1u64 << 53) as f64;
                drift + (unit - 0.5) * 0.02
            })
            .collect()
    }

    fn report(index: usize, train_annual: f64, testing: EvaluationResult) -> WindowReport {
        let training = EvaluationResult {
            annualized_return: Some(train_annual),
            sharpe_ratio: Some(2.0),
            ..EvaluationResult::default()
        };
        let wfe = walk_forward_efficiency(Some(&training), Some(&testing));
        let analysis = analyze_window(Some(&testing), wfe, &Thresholds::default(), &settings(), None);
        WindowReport {
            window: Window {
                index,
                training_start: date(2015, 1, 1),
                training_end: date(2017, 12, 31),
                testing_start: date(2018, 1, 1),
                testing_end: date(2018, 12, 31),
            },
            combination: Combination::new("ma_cross", "ma_cross_exit"),
            training: Some(training),
            testing: Some(testing),
            training_error: None,
            testing_error: None,
            wfe,
            optimization: None,
            analysis,
        }
    }

    fn strong_testing(seed: u64) -> EvaluationResult {
        EvaluationResult {
            annualized_return: Some(20.0),
            sharpe_ratio: Some(1.8),
            sortino_ratio: Some(2.5),
            max_drawdown: Some(11.0),
            win_rate: Some(56.0),
            trades_count: Some(40.0),
            return_stats: Some(ReturnMoments::from_returns(&returns(seed, 750, 0.002))),
            ..EvaluationResult::default()
        }
    }

    #[test_case(Some(0.8), Some(1.0), 0.6, Some(0.9), Grade::ProfessionalPass ; "professional")]
    #[test_case(Some(0.8), Some(1.0), 0.6, None, Grade::ProfessionalPass ; "missing dsr ignored")]
    #[test_case(Some(0.8), Some(1.0), 0.6, Some(0.5), Grade::ObserveFurther ; "weak dsr")]
    #[test_case(Some(0.55), Some(0.7), 0.3, None, Grade::ObserveFurther ; "observe")]
    #[test_case(Some(0.4), Some(1.0), 1.0, None, Grade::NeedsAdjustment ; "low score")]
    #[test_case(None, Some(1.0), 1.0, None, Grade::NoResult ; "no score")]
    #[test_case(Some(0.9), None, 1.0, None, Grade::NoResult ; "no wfe")]
    fn test_resolve_grade(
        score: Option<f64>,
        wfe: Option<f64>,
        psr_ratio: f64,
        dsr: Option<f64>,
        expected: Grade,
    ) {
        assert_eq!(resolve_grade(score, wfe, psr_ratio, dsr), expected);
    }

    #[test]
    fn test_wfe_needs_positive_training_return() {
        let train = EvaluationResult {
            annualized_return: Some(10.0),
            ..EvaluationResult::default()
        };
        let test = EvaluationResult {
            annualized_return: Some(8.0),
            ..EvaluationResult::default()
        };
        assert_eq!(walk_forward_efficiency(Some(&train), Some(&test)), Some(80.0));

        let losing = EvaluationResult {
            annualized_return: Some(-3.0),
            ..EvaluationResult::default()
        };
        assert_eq!(walk_forward_efficiency(Some(&losing), Some(&test)), None);
        assert_eq!(walk_forward_efficiency(None, Some(&test)), None);
    }

    #[test]
    fn test_consistent_windows_grade_well() {
        let windows: Vec<WindowReport> = (0..3)
            .map(|i| report(i, 20.0, strong_testing(i as u64 + 1)))
            .collect();
        let aggregate = aggregate(&windows, &settings());

        assert_eq!(aggregate.window_count, 3);
        assert_eq!(aggregate.pass_count, 3);
        assert!((aggregate.pass_rate - 100.0).abs() < 1e-9);
        assert_eq!(aggregate.median_wfe, Some(100.0));
        assert!((aggregate.wfe_adjustment - 1.0).abs() < 1e-12);
        let Some(total) = aggregate.total_score else {
            panic!("total score defined");
        };
        assert!(total > 0.7, "{total}");
        assert_eq!(aggregate.grade, Grade::ProfessionalPass);
        assert!(!aggregate.grade_downgraded);
        assert!(aggregate.overall_sharpe.is_some_and(|s| s > 0.0));
        assert_eq!(aggregate.median_trades, Some(40.0));
        assert_eq!(aggregate.overfitting.compared_windows, 3);
        assert_eq!(aggregate.overfitting.degraded_windows, 3);
    }

    #[test]
    fn test_wfe_adjustment_is_clamped() {
        let windows: Vec<WindowReport> = (0..3)
            .map(|i| report(i, 60.0, strong_testing(i as u64 + 10)))
            .collect();
        let aggregate = aggregate(&windows, &settings());

        let Some(wfe) = aggregate.median_wfe else {
            panic!("wfe defined");
        };
        assert!((wfe - 100.0 / 3.0).abs() < 1e-9);
        assert!((aggregate.wfe_adjustment - 0.8).abs() < 1e-12);
        assert_eq!(aggregate.grade, Grade::NeedsAdjustment);
    }

    #[test]
    fn test_losing_windows_downgrade_or_fail() {
        let losing = |seed| EvaluationResult {
            annualized_return: Some(-6.0),
            sharpe_ratio: Some(-0.5),
            sortino_ratio: Some(-0.6),
            max_drawdown: Some(35.0),
            win_rate: Some(38.0),
            return_stats: Some(ReturnMoments::from_returns(&returns(seed, 750, -0.001))),
            ..EvaluationResult::default()
        };
        let windows: Vec<WindowReport> = (0..3).map(|i| report(i, 10.0, losing(i as u64 + 1))).collect();
        let aggregate = aggregate(&windows, &settings());

        assert_eq!(aggregate.pass_count, 0);
        assert!(aggregate.grade <= Grade::NeedsAdjustment);
        assert!(aggregate.overall_psr.is_some_and(|p| p < 0.5));
        assert!((aggregate.dsr_below_50_ratio - 1.0).abs() < 1e-12);
    }

    /// Windows graded on their own testing results, pooled over losing returns.
    fn with_losing_pool(mut windows: Vec<WindowReport>) -> Vec<WindowReport> {
        for (seed, window) in windows.iter_mut().enumerate() {
            window.analysis.stats =
                Some(ReturnMoments::from_returns(&returns(seed as u64 + 50, 750, -0.004)));
        }
        windows
    }

    #[test]
    fn test_non_positive_pooled_dsr_downgrades_one_level() {
        let strong: Vec<WindowReport> = (0..3)
            .map(|i| report(i, 20.0, strong_testing(i as u64 + 1)))
            .collect();
        let undamaged = aggregate(&strong, &settings());
        assert_eq!(undamaged.grade, Grade::ProfessionalPass);

        let aggregate = aggregate(&with_losing_pool(strong), &settings());

        assert!(aggregate.overall_sharpe.is_some_and(|s| s < 0.0));
        assert_eq!(aggregate.overall_dsr, Some(0.0));
        assert!(aggregate.grade_downgraded);
        assert_eq!(aggregate.grade, Grade::ObserveFurther);
        assert_eq!(aggregate.grade.level(), undamaged.grade.level() - 1);
        assert_eq!(aggregate.pass_count, undamaged.pass_count);
    }

    #[test]
    fn test_lowest_grade_is_not_downgraded() {
        let windows: Vec<WindowReport> = (0..3)
            .map(|i| report(i, 60.0, strong_testing(i as u64 + 10)))
            .collect();

        let aggregate = aggregate(&with_losing_pool(windows), &settings());

        assert_eq!(aggregate.overall_dsr, Some(0.0));
        assert_eq!(aggregate.grade, Grade::NeedsAdjustment);
        assert!(!aggregate.grade_downgraded);
    }

    #[test]
    fn test_empty_run() {
        let aggregate = aggregate(&[], &settings());
        assert_eq!(aggregate.grade, Grade::NoResult);
        assert_eq!(aggregate.total_score, None);
        assert_eq!(aggregate.pass_rate, 0.0);
        assert_eq!(aggregate.overall_psr, None);
    }
}
