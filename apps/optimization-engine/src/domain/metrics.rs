//! Scalar metrics returned by the evaluation collaborator.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Metric used to rank candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum TargetMetric {
    /// Annualized return (percent).
    #[default]
    AnnualizedReturn,
    /// Sharpe ratio.
    SharpeRatio,
    /// Sortino ratio.
    SortinoRatio,
    /// Maximum drawdown (percent). Smaller magnitude is better.
    MaxDrawdown,
}

impl TargetMetric {
    /// Wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AnnualizedReturn => "annualizedReturn",
            Self::SharpeRatio => "sharpeRatio",
            Self::SortinoRatio => "sortinoRatio",
            Self::MaxDrawdown => "maxDrawdown",
        }
    }

    /// Whether a smaller magnitude ranks higher.
    #[must_use]
    pub const fn prefers_smaller_magnitude(&self) -> bool {
        matches!(self, Self::MaxDrawdown)
    }

    /// Worst possible value, substituted for failed evaluations.
    #[must_use]
    pub const fn sentinel(&self) -> f64 {
        if self.prefers_smaller_magnitude() {
            f64::INFINITY
        } else {
            f64::NEG_INFINITY
        }
    }
}

impl fmt::Display for TargetMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Daily-return moments of an evaluated period.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnMoments {
    /// Number of daily returns.
    #[serde(default)]
    pub sample_count: f64,
    /// Sum of returns.
    #[serde(default)]
    pub sum1: f64,
    /// Sum of squared returns.
    #[serde(default)]
    pub sum2: f64,
    /// Sum of cubed returns.
    #[serde(default)]
    pub sum3: f64,
    /// Sum of fourth powers.
    #[serde(default)]
    pub sum4: f64,
    /// Mean daily return.
    #[serde(default)]
    pub mean: Option<f64>,
    /// Sample standard deviation.
    #[serde(default)]
    pub std_dev: Option<f64>,
    /// Sample skewness.
    #[serde(default)]
    pub skewness: Option<f64>,
    /// Sample kurtosis (normal = 3).
    #[serde(default)]
    pub kurtosis: Option<f64>,
    /// Lag-1 autocorrelation.
    #[serde(default)]
    pub lag1_autocorr: Option<f64>,
}

impl ReturnMoments {
    /// Compute moments from a daily return series.
    #[must_use]
    pub fn from_returns(returns: &[f64]) -> Self {
        let n = returns.len() as f64;
        let mut moments = Self {
            sample_count: n,
            ..Self::default()
        };
        for r in returns {
            moments.sum1 += r;
            moments.sum2 += r * r;
            moments.sum3 += r * r * r;
            moments.sum4 += r * r * r * r;
        }
        if returns.is_empty() {
            return moments;
        }

        let mean = moments.sum1 / n;
        moments.mean = Some(mean);
        if returns.len() < 2 {
            return moments;
        }

        let m2: f64 = returns.iter().map(|r| (r - mean).powi(2)).sum();
        let m3: f64 = returns.iter().map(|r| (r - mean).powi(3)).sum();
        let m4: f64 = returns.iter().map(|r| (r - mean).powi(4)).sum();
        let variance = m2 / (n - 1.0);
        let std_dev = variance.sqrt();
        moments.std_dev = Some(std_dev);

        if std_dev > 0.0 {
            let pop_var = m2 / n;
            moments.skewness = Some((m3 / n) / pop_var.powf(1.5));
            moments.kurtosis = Some((m4 / n) / (pop_var * pop_var));

            let lagged: f64 = returns
                .windows(2)
                .map(|w| (w[0] - mean) * (w[1] - mean))
                .sum();
            moments.lag1_autocorr = Some(lagged / m2);
        }
        moments
    }

    /// Finite kurtosis if reported.
    #[must_use]
    pub fn finite_kurtosis(&self) -> Option<f64> {
        self.kurtosis.filter(|k| k.is_finite())
    }

    /// Finite skewness if reported.
    #[must_use]
    pub fn finite_skewness(&self) -> Option<f64> {
        self.skewness.filter(|s| s.is_finite())
    }
}

/// Scalar metrics of one backtest evaluation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
    /// Annualized return (percent).
    #[serde(default)]
    pub annualized_return: Option<f64>,
    /// Total return (percent).
    #[serde(default)]
    pub total_return: Option<f64>,
    /// Sharpe ratio.
    #[serde(default)]
    pub sharpe_ratio: Option<f64>,
    /// Sortino ratio.
    #[serde(default)]
    pub sortino_ratio: Option<f64>,
    /// Maximum drawdown (percent).
    #[serde(default)]
    pub max_drawdown: Option<f64>,
    /// Win rate (percent).
    #[serde(default)]
    pub win_rate: Option<f64>,
    /// Number of trades.
    #[serde(default)]
    pub trades_count: Option<f64>,
    /// Buy-and-hold annualized return over the same period.
    #[serde(default)]
    pub baseline_annualized_return: Option<f64>,
    /// Stop-loss level the collaborator actually applied.
    #[serde(default)]
    pub used_stop_loss: Option<f64>,
    /// Take-profit level the collaborator actually applied.
    #[serde(default)]
    pub used_take_profit: Option<f64>,
    /// Daily-return moments.
    #[serde(default, alias = "oosStats")]
    pub return_stats: Option<ReturnMoments>,
}

impl EvaluationResult {
    /// Finite value of a ranking metric.
    #[must_use]
    pub fn metric(&self, metric: TargetMetric) -> Option<f64> {
        let value = match metric {
            TargetMetric::AnnualizedReturn => self.annualized_return,
            TargetMetric::SharpeRatio => self.sharpe_ratio,
            TargetMetric::SortinoRatio => self.sortino_ratio,
            TargetMetric::MaxDrawdown => self.max_drawdown,
        };
        value.filter(|v| v.is_finite())
    }

    /// Metric value or the metric's worst-case sentinel.
    #[must_use]
    pub fn metric_or_sentinel(&self, metric: TargetMetric) -> f64 {
        self.metric(metric).unwrap_or_else(|| metric.sentinel())
    }
}
