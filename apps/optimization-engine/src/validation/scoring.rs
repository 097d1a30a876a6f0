//! Threshold checks and out-of-sample quality scoring.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::EvaluationResult;

use super::stats::{clamp01, median};
use super::types::Thresholds;

/// Metrics that make up the quality score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QualityMetric {
    /// Annualized return, higher is better.
    AnnualizedReturn,
    /// Sharpe ratio, higher is better.
    SharpeRatio,
    /// Sortino ratio, higher is better.
    SortinoRatio,
    /// Max drawdown, lower is better.
    MaxDrawdown,
    /// Win rate, higher is better.
    WinRate,
}

impl QualityMetric {
    /// Every metric in scoring order.
    pub const ALL: [Self; 5] = [
        Self::AnnualizedReturn,
        Self::SharpeRatio,
        Self::SortinoRatio,
        Self::MaxDrawdown,
        Self::WinRate,
    ];

    /// Share of the quality score.
    #[must_use]
    pub const fn weight(self) -> f64 {
        match self {
            Self::AnnualizedReturn => 0.35,
            Self::SharpeRatio => 0.25,
            Self::SortinoRatio => 0.20,
            Self::MaxDrawdown | Self::WinRate => 0.10,
        }
    }

    /// Whether the threshold is a ceiling.
    #[must_use]
    pub const fn is_upper_bound(self) -> bool {
        matches!(self, Self::MaxDrawdown)
    }

    /// Finite value in `result`.
    #[must_use]
    pub fn value(self, result: &EvaluationResult) -> Option<f64> {
        let value = match self {
            Self::AnnualizedReturn => result.annualized_return,
            Self::SharpeRatio => result.sharpe_ratio,
            Self::SortinoRatio => result.sortino_ratio,
            Self::MaxDrawdown => result.max_drawdown,
            Self::WinRate => result.win_rate,
        };
        value.filter(|v| v.is_finite())
    }

    /// Threshold in `thresholds`.
    #[must_use]
    pub const fn threshold(self, thresholds: &Thresholds) -> f64 {
        match self {
            Self::AnnualizedReturn => thresholds.annualized_return,
            Self::SharpeRatio => thresholds.sharpe_ratio,
            Self::SortinoRatio => thresholds.sortino_ratio,
            Self::MaxDrawdown => thresholds.max_drawdown,
            Self::WinRate => thresholds.win_rate,
        }
    }

    const fn label(self) -> &'static str {
        match self {
            Self::AnnualizedReturn => "annualized return",
            Self::SharpeRatio => "sharpe",
            Self::SortinoRatio => "sortino",
            Self::MaxDrawdown => "max drawdown",
            Self::WinRate => "win rate",
        }
    }
}

/// Score of `value` against a floor: 1 at or above `threshold + |threshold|`,
/// linear below, 0 at `threshold - |threshold|`.
///
/// A near-zero threshold degrades to a pass/fail step.
#[must_use]
pub fn score_against_threshold(value: Option<f64>, threshold: f64) -> Option<f64> {
    let value = value.filter(|v| v.is_finite())?;
    if !threshold.is_finite() {
        return None;
    }
    if threshold.abs() < 1e-6 {
        return Some(if value >= threshold { 1.0 } else { 0.0 });
    }
    Some(clamp01(1.0 + (value - threshold) / threshold.abs()))
}

/// Score of `value` against a ceiling: 1 at or below, decaying linearly above.
#[must_use]
pub fn score_against_upper_bound(value: Option<f64>, threshold: f64) -> Option<f64> {
    let value = value.filter(|v| v.is_finite())?;
    if !threshold.is_finite() {
        return None;
    }
    if value <= threshold {
        return Some(1.0);
    }
    Some(clamp01(1.0 - (value - threshold) / threshold.abs().max(1.0)))
}

/// Thresholds for one testing segment: the annualized floor becomes the
/// segment's buy-and-hold return when the collaborator reports one.
#[must_use]
pub fn resolve_thresholds(result: Option<&EvaluationResult>, base: &Thresholds) -> Thresholds {
    let baseline = result
        .and_then(|r| r.baseline_annualized_return)
        .filter(|b| b.is_finite());
    match baseline {
        Some(baseline) => Thresholds {
            annualized_return: baseline,
            ..*base
        },
        None => *base,
    }
}

/// One metric's contribution to the quality score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityComponent {
    /// Metric value, if reported.
    pub value: Option<f64>,
    /// Threshold compared against.
    pub threshold: f64,
    /// Raw score, if both sides were finite.
    pub score: Option<f64>,
    /// Score in `[0, 1]` (0 when undefined).
    pub normalized: f64,
    /// Weight in the total.
    pub weight: f64,
    /// Whether the threshold was met.
    pub passed: bool,
}

/// Weighted out-of-sample quality of a testing segment.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OosQuality {
    /// Quality in `[0, 1]`; `None` without metrics.
    pub value: Option<f64>,
    /// Weighted mean before clamping.
    pub raw_value: Option<f64>,
    /// Weight share of the metrics that met their threshold.
    pub pass_ratio: f64,
    /// Per-metric detail.
    pub components: BTreeMap<QualityMetric, QualityComponent>,
}

/// Score a testing segment against its thresholds.
///
/// Metrics the collaborator did not report score 0 but keep their weight.
#[must_use]
pub fn oos_quality(result: Option<&EvaluationResult>, thresholds: &Thresholds) -> OosQuality {
    let Some(result) = result else {
        return OosQuality::default();
    };

    let mut components = BTreeMap::new();
    let mut weighted = 0.0;
    let mut weight_total = 0.0;
    let mut pass_weight = 0.0;

    for metric in QualityMetric::ALL {
        let value = metric.value(result);
        let threshold = metric.threshold(thresholds);
        let (score, passed) = if metric.is_upper_bound() {
            (
                score_against_upper_bound(value, threshold),
                value.is_some_and(|v| v <= threshold),
            )
        } else {
            (
                score_against_threshold(value, threshold),
                value.is_some_and(|v| v >= threshold),
            )
        };
        let normalized = score.map_or(0.0, clamp01);
        let weight = metric.weight();

        weighted += normalized * weight;
        weight_total += weight;
        if passed {
            pass_weight += weight;
        }
        components.insert(
            metric,
            QualityComponent {
                value,
                threshold,
                score,
                normalized,
                weight,
                passed,
            },
        );
    }

    let raw = weighted / weight_total;
    OosQuality {
        value: Some(clamp01(raw)),
        raw_value: Some(raw),
        pass_ratio: clamp01(pass_weight / weight_total),
        components,
    }
}

/// Per-metric median of the normalized component scores.
#[must_use]
pub fn median_components<'a>(
    qualities: impl IntoIterator<Item = &'a OosQuality>,
) -> BTreeMap<QualityMetric, f64> {
    let qualities: Vec<&OosQuality> = qualities.into_iter().collect();
    QualityMetric::ALL
        .into_iter()
        .filter_map(|metric| {
            let values = qualities
                .iter()
                .map(|q| q.components.get(&metric).map(|c| c.normalized));
            median(values).map(|m| (metric, m))
        })
        .collect()
}

/// Pass/fail verdict of a testing segment.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WindowVerdict {
    /// Every reported metric met its threshold (and at least one was reported).
    pub pass: bool,
    /// One line per failed check.
    pub reasons: Vec<String>,
}

/// Check the reported metrics of a testing segment against thresholds.
#[must_use]
pub fn evaluate_window(result: Option<&EvaluationResult>, thresholds: &Thresholds) -> WindowVerdict {
    let Some(result) = result else {
        return WindowVerdict {
            pass: false,
            reasons: vec!["no testing metrics".to_string()],
        };
    };

    let mut checked = 0;
    let mut reasons = Vec::new();
    for metric in QualityMetric::ALL {
        let Some(value) = metric.value(result) else {
            continue;
        };
        checked += 1;
        let threshold = metric.threshold(thresholds);
        if metric.is_upper_bound() {
            if value > threshold {
                reasons.push(format!(
                    "{} {value:.2} above {threshold:.2}",
                    metric.label()
                ));
            }
        } else if value < threshold {
            reasons.push(format!(
                "{} {value:.2} below {threshold:.2}",
                metric.label()
            ));
        }
    }

    WindowVerdict {
        pass: checked > 0 && reasons.is_empty(),
        reasons,
    }
}
