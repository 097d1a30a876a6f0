//! Statistical analysis of one testing segment.

use serde::{Deserialize, Serialize};

use crate::config::ValidationConfig;
use crate::domain::{EvaluationResult, ReturnMoments};

use super::scoring::{OosQuality, WindowVerdict, evaluate_window, oos_quality, resolve_thresholds};
use super::stats::{
    SharpeSample, clamp01, credibility, deflated_sharpe, effective_sample_size, effective_trials,
    min_track_record_length, probabilistic_sharpe, sample_sharpe, stat_weight,
};
use super::types::Thresholds;

/// Stat weight ceiling when the sample is shorter than the minimum track record.
pub const THIN_SAMPLE_WEIGHT_CAP: f64 = 0.3;

/// Score multiplier for a window that misses its thresholds.
pub const FAILED_WINDOW_PENALTY: f64 = 0.5;

/// Benchmarks, mode and trial budget shared by every window of a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalysisSettings {
    /// Daily Sharpe benchmark in loose mode.
    pub loose_benchmark: f64,
    /// Daily Sharpe benchmark in strict mode.
    pub strict_benchmark: f64,
    /// Score against the strict benchmark.
    pub strict_mode: bool,
    /// Confidence for the minimum track record length.
    pub confidence: f64,
    /// Raw optimization trials behind each window (1 without optimization).
    pub raw_trials: f64,
}

impl AnalysisSettings {
    /// Settings from validation config and the trials spent per window.
    #[must_use]
    pub const fn from_config(config: &ValidationConfig, raw_trials: f64) -> Self {
        Self {
            loose_benchmark: config.loose_benchmark,
            strict_benchmark: config.strict_benchmark,
            strict_mode: config.strict_mode,
            confidence: config.min_track_record_confidence,
            raw_trials,
        }
    }

    /// Benchmark for the active mode.
    #[must_use]
    pub const fn active_benchmark(&self) -> f64 {
        if self.strict_mode {
            self.strict_benchmark
        } else {
            self.loose_benchmark
        }
    }
}

/// Everything computed for one testing segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowAnalysis {
    /// Weighted quality against thresholds.
    pub oos_quality: OosQuality,
    /// Threshold verdict.
    pub verdict: WindowVerdict,
    /// Thresholds actually applied.
    pub thresholds: Thresholds,
    /// PSR for the active mode.
    pub psr: Option<f64>,
    /// PSR against the loose benchmark.
    pub psr_loose: Option<f64>,
    /// PSR against the strict benchmark.
    pub psr_strict: Option<f64>,
    /// DSR for the active mode.
    pub dsr: Option<f64>,
    /// DSR against the loose benchmark.
    pub dsr_loose: Option<f64>,
    /// DSR against the strict benchmark.
    pub dsr_strict: Option<f64>,
    /// Credibility for the active mode.
    pub credibility: Option<f64>,
    /// Loose credibility.
    pub credibility_loose: Option<f64>,
    /// Strict credibility.
    pub credibility_strict: Option<f64>,
    /// Stat weight for the active mode.
    pub stat_weight: f64,
    /// Loose stat weight.
    pub stat_weight_loose: f64,
    /// Strict stat weight.
    pub stat_weight_strict: f64,
    /// Quality times stat weight, halved on a failed verdict.
    pub window_score: f64,
    /// Minimum track record length at the active benchmark.
    pub min_track_record_length: Option<f64>,
    /// Daily returns in the segment.
    pub sample_count: f64,
    /// Autocorrelation- and tail-adjusted sample count.
    pub effective_sample_count: f64,
    /// Effective samples reach the minimum track record length.
    pub sample_adequate: bool,
    /// Daily Sharpe of the segment.
    pub sample_sharpe: Option<f64>,
    /// Walk-forward efficiency (percent).
    pub wfe: Option<f64>,
    /// Whether strict scoring was active.
    pub strict_mode: bool,
    /// Estimated correlation between optimization trials.
    pub trial_correlation: f64,
    /// Trials after correlation discount.
    pub effective_trials: f64,
    /// Daily-return moments, for pooling.
    pub stats: Option<ReturnMoments>,
}

/// Analyze a testing result.
///
/// `testing` is `None` when the testing evaluation failed; the window then
/// scores 0. `trial_correlation` comes from the training optimization, when
/// one ran.
#[must_use]
pub fn analyze_window(
    testing: Option<&EvaluationResult>,
    wfe: Option<f64>,
    base_thresholds: &Thresholds,
    settings: &AnalysisSettings,
    trial_correlation: Option<f64>,
) -> WindowAnalysis {
    let thresholds = resolve_thresholds(testing, base_thresholds);
    let (trials, correlation) = effective_trials(settings.raw_trials, trial_correlation);
    let stats = testing.and_then(|r| r.return_stats);
    let sample_count = stats
        .map(|s| s.sample_count)
        .filter(|n| n.is_finite() && *n > 0.0)
        .unwrap_or(0.0);
    let effective_n = effective_sample_size(stats.as_ref());

    let quality = oos_quality(testing, &thresholds);
    let verdict = evaluate_window(testing, &thresholds);
    let sharpe = stats.as_ref().and_then(sample_sharpe);
    let sample = SharpeSample::new(sharpe, effective_n, stats.as_ref());

    let psr_at = |benchmark| sample.and_then(|s| probabilistic_sharpe(&s, benchmark));
    let dsr_at = |benchmark| sample.and_then(|s| deflated_sharpe(&s, benchmark, trials));

    let psr_loose = psr_at(settings.loose_benchmark);
    let mut psr_strict = psr_at(settings.strict_benchmark);
    let dsr_loose = dsr_at(settings.loose_benchmark);
    let dsr_strict = dsr_at(settings.strict_benchmark);

    let credibility_loose = credibility(psr_loose, dsr_loose);
    let mut credibility_strict = credibility(psr_strict, dsr_strict);
    let mut weight_loose = stat_weight(credibility_loose);
    let mut weight_strict = stat_weight(credibility_strict);

    let min_trl = sample.and_then(|s| {
        min_track_record_length(&s, settings.active_benchmark(), settings.confidence)
    });

    let thin = min_trl.is_some_and(|m| m.is_finite() && effective_n.is_finite() && effective_n < m);
    if thin {
        weight_loose = weight_loose.min(THIN_SAMPLE_WEIGHT_CAP);
        weight_strict = weight_strict.min(THIN_SAMPLE_WEIGHT_CAP);
        psr_strict = Some(0.0);
        credibility_strict = credibility(psr_strict, dsr_strict);
        weight_strict = weight_strict.min(stat_weight(credibility_strict));
    }

    let (psr, dsr, cred, mut weight) = if settings.strict_mode {
        (psr_strict, dsr_strict, credibility_strict, weight_strict)
    } else {
        (psr_loose, dsr_loose, credibility_loose, weight_loose)
    };
    if thin {
        weight = weight.min(THIN_SAMPLE_WEIGHT_CAP);
    }

    let mut window_score = quality.value.unwrap_or(0.0) * weight;
    if !verdict.pass {
        window_score *= FAILED_WINDOW_PENALTY;
    }

    let bounded = |v: Option<f64>| v.filter(|x| x.is_finite()).map(clamp01);
    WindowAnalysis {
        oos_quality: quality,
        verdict,
        thresholds,
        psr: bounded(psr),
        psr_loose: bounded(psr_loose),
        psr_strict: bounded(psr_strict),
        dsr: bounded(dsr),
        dsr_loose: bounded(dsr_loose),
        dsr_strict: bounded(dsr_strict),
        credibility: bounded(cred),
        credibility_loose: bounded(credibility_loose),
        credibility_strict: bounded(credibility_strict),
        stat_weight: weight,
        stat_weight_loose: weight_loose,
        stat_weight_strict: weight_strict,
        window_score,
        min_track_record_length: min_trl.filter(|m| m.is_finite()),
        sample_count,
        effective_sample_count: effective_n,
        sample_adequate: !thin,
        sample_sharpe: sharpe,
        wfe: wfe.filter(|w| w.is_finite()),
        strict_mode: settings.strict_mode,
        trial_correlation: correlation,
        effective_trials: trials,
        stats,
    }
}
