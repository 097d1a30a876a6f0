//! Sharpe-ratio statistics for walk-forward scoring.
//!
//! - Normal CDF and its inverse
//! - Probabilistic and deflated Sharpe ratio (PSR / DSR)
//! - Minimum track record length
//! - Effective sample size and effective trial count
//! - Pooling of daily-return moments across windows
//!
//! Every function is total: undefined inputs give `None` rather than NaN.

use crate::config::TRADING_DAYS_PER_YEAR;
use crate::domain::ReturnMoments;

/// Annual risk-free rate used for excess returns.
pub const RISK_FREE_RATE: f64 = 0.01;

const ACKLAM_A: [f64; 6] = [
    -3.969_683_028_665_376e1,
    2.209_460_984_245_205e2,
    -2.759_285_104_469_687e2,
    1.383_577_518_672_690e2,
    -3.066_479_806_614_716e1,
    2.506_628_277_459_239,
];
const ACKLAM_B: [f64; 5] = [
    -5.447_609_879_822_406e1,
    1.615_858_368_580_409e2,
    -1.556_989_798_598_866e2,
    6.680_131_188_771_972e1,
    -1.328_068_155_288_572e1,
];
const ACKLAM_C: [f64; 6] = [
    -7.784_894_002_430_293e-3,
    -3.223_964_580_411_365e-1,
    -2.400_758_277_161_838,
    -2.549_732_539_343_734,
    4.374_664_141_464_968,
    2.938_163_982_698_783,
];
const ACKLAM_D: [f64; 4] = [
    7.784_695_709_041_462e-3,
    3.224_671_290_700_398e-1,
    2.445_134_137_142_996,
    3.754_408_661_907_416,
];
const ACKLAM_P_LOW: f64 = 0.024_25;

/// Clamp into `[0, 1]`; non-finite values become 0.
#[must_use]
pub fn clamp01(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Median of the finite values.
#[must_use]
pub fn median(values: impl IntoIterator<Item = Option<f64>>) -> Option<f64> {
    let mut finite: Vec<f64> = values
        .into_iter()
        .flatten()
        .filter(|v| v.is_finite())
        .collect();
    if finite.is_empty() {
        return None;
    }
    finite.sort_by(f64::total_cmp);
    let mid = finite.len() / 2;
    if finite.len() % 2 == 0 {
        Some(f64::midpoint(finite[mid - 1], finite[mid]))
    } else {
        Some(finite[mid])
    }
}

/// Mean of the finite values.
#[must_use]
pub fn average(values: impl IntoIterator<Item = Option<f64>>) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .flatten()
        .filter(|v| v.is_finite())
        .fold((0.0, 0_usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Standard normal CDF.
#[must_use]
pub fn normal_cdf(x: f64) -> f64 {
    0.5 * (1.0 + libm::erf(x / std::f64::consts::SQRT_2))
}

/// Inverse standard normal CDF (Acklam's rational approximation).
///
/// `p = 0` and `p = 1` map to the infinities; anything outside `[0, 1]` is
/// undefined.
#[must_use]
pub fn normal_inverse(p: f64) -> Option<f64> {
    if !p.is_finite() || !(0.0..=1.0).contains(&p) {
        return None;
    }
    if p == 0.0 {
        return Some(f64::NEG_INFINITY);
    }
    if p == 1.0 {
        return Some(f64::INFINITY);
    }

    let [a0, a1, a2, a3, a4, a5] = ACKLAM_A;
    let [b0, b1, b2, b3, b4] = ACKLAM_B;
    let [c0, c1, c2, c3, c4, c5] = ACKLAM_C;
    let [d0, d1, d2, d3] = ACKLAM_D;

    let tail = |q: f64| {
        (((((c0 * q + c1) * q + c2) * q + c3) * q + c4) * q + c5)
            / ((((d0 * q + d1) * q + d2) * q + d3) * q + 1.0)
    };

    let x = if p < ACKLAM_P_LOW {
        tail((-2.0 * p.ln()).sqrt())
    } else if p > 1.0 - ACKLAM_P_LOW {
        -tail((-2.0 * (1.0 - p).ln()).sqrt())
    } else {
        let q = p - 0.5;
        let r = q * q;
        (((((a0 * r + a1) * r + a2) * r + a3) * r + a4) * r + a5) * q
            / (((((b0 * r + b1) * r + b2) * r + b3) * r + b4) * r + 1.0)
    };
    x.is_finite().then_some(x)
}

/// Sharpe estimate and the shape of the returns it came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SharpeSample {
    /// Per-period (daily) Sharpe ratio.
    pub sharpe: f64,
    /// Number of observations (possibly effective).
    pub sample_count: f64,
    /// Return skewness (0 when unknown).
    pub skewness: Option<f64>,
    /// Return kurtosis (3 when unknown).
    pub kurtosis: Option<f64>,
}

impl SharpeSample {
    /// Build from a Sharpe value and moments; `None` for a non-finite Sharpe.
    #[must_use]
    pub fn new(sharpe: Option<f64>, sample_count: f64, moments: Option<&ReturnMoments>) -> Option<Self> {
        let sharpe = sharpe.filter(|s| s.is_finite())?;
        Some(Self {
            sharpe,
            sample_count,
            skewness: moments.and_then(ReturnMoments::finite_skewness),
            kurtosis: moments.and_then(ReturnMoments::finite_kurtosis),
        })
    }

    /// Variance term of the Sharpe estimator, if positive.
    fn variance_term(&self) -> Option<f64> {
        let skew = self.skewness.filter(|s| s.is_finite()).unwrap_or(0.0);
        let kurt = self.kurtosis.filter(|k| k.is_finite()).unwrap_or(3.0);
        let sr = self.sharpe;
        let term = ((kurt - 1.0) / 4.0).mul_add(sr * sr, 1.0 - skew * sr);
        (term.is_finite() && term > 0.0).then_some(term)
    }

    fn z_score(&self, benchmark: f64) -> Option<f64> {
        if !self.sample_count.is_finite() || self.sample_count <= 1.0 {
            return None;
        }
        let variance = self.variance_term()?;
        let denominator = (variance / (self.sample_count - 1.0)).sqrt();
        if !denominator.is_finite() || denominator <= 0.0 {
            return None;
        }
        let z = (self.sharpe - benchmark) / denominator;
        z.is_finite().then_some(z)
    }
}

/// Probability that the true Sharpe exceeds `benchmark`.
#[must_use]
pub fn probabilistic_sharpe(sample: &SharpeSample, benchmark: f64) -> Option<f64> {
    let z = sample.z_score(benchmark)?;
    Some(clamp01(normal_cdf(z)))
}

/// PSR deflated for the expected maximum of `trials` independent trials.
#[must_use]
pub fn deflated_sharpe(sample: &SharpeSample, benchmark: f64, trials: f64) -> Option<f64> {
    let z = sample.z_score(benchmark)?;
    let trials = if trials.is_finite() { trials.max(1.0) } else { 1.0 };
    let penalty = normal_inverse(1.0 - 1.0 / (2.0 * trials)).filter(|p| p.is_finite())?;
    Some(clamp01(normal_cdf(z - penalty)))
}

/// Observations needed for the Sharpe to beat `benchmark` at `confidence`.
///
/// Infinite when the Sharpe does not exceed the benchmark.
#[must_use]
pub fn min_track_record_length(sample: &SharpeSample, benchmark: f64, confidence: f64) -> Option<f64> {
    let diff = sample.sharpe - benchmark;
    if diff <= 0.0 {
        return Some(f64::INFINITY);
    }
    let variance = sample.variance_term()?;
    let z = normal_inverse(confidence).filter(|z| z.is_finite() && *z > 0.0)?;
    let length = 1.0 + (z * variance.sqrt() / diff).powi(2);
    length.is_finite().then_some(length)
}

/// Daily Sharpe of a moment set, net of the daily risk-free rate.
#[must_use]
pub fn sample_sharpe(moments: &ReturnMoments) -> Option<f64> {
    let mean = moments.mean.filter(|m| m.is_finite())?;
    let std_dev = moments.std_dev.filter(|s| s.is_finite() && *s != 0.0)?;
    let sharpe = (mean - RISK_FREE_RATE / TRADING_DAYS_PER_YEAR) / std_dev;
    sharpe.is_finite().then_some(sharpe)
}

/// Annualized Sharpe of a moment set.
#[must_use]
pub fn annualized_sharpe(moments: &ReturnMoments) -> Option<f64> {
    if !moments.sample_count.is_finite() || moments.sample_count < 2.0 {
        return None;
    }
    let mean = moments
        .mean
        .filter(|m| m.is_finite())
        .unwrap_or(moments.sum1 / moments.sample_count);
    let std_dev = moments.std_dev.filter(|s| s.is_finite() && *s > 0.0)?;
    let annual_std = std_dev * TRADING_DAYS_PER_YEAR.sqrt();
    let sharpe = mean.mul_add(TRADING_DAYS_PER_YEAR, -RISK_FREE_RATE) / annual_std;
    sharpe.is_finite().then_some(sharpe)
}

/// Sample count discounted for autocorrelation and fat tails.
///
/// Never exceeds the raw count; a degenerate adjustment yields 1.
#[must_use]
pub fn effective_sample_size(moments: Option<&ReturnMoments>) -> f64 {
    let Some(moments) = moments else {
        return 0.0;
    };
    let n = moments.sample_count;
    if !n.is_finite() {
        return 0.0;
    }
    if n <= 1.0 {
        return n.max(0.0);
    }

    let mut effective = n;
    if let Some(lag1) = moments.lag1_autocorr.filter(|r| r.is_finite()) {
        let rho = lag1.clamp(-0.99, 0.99);
        effective = n * (1.0 - rho) / (1.0 + rho);
    }
    if !effective.is_finite() || effective <= 0.0 {
        effective = n;
    }
    if let Some(kurtosis) = moments.finite_kurtosis() {
        if kurtosis > 3.0 {
            effective *= 3.0 / kurtosis;
        }
    }
    if !effective.is_finite() || effective <= 0.0 {
        return 1.0;
    }
    effective.min(n)
}

/// Trial count discounted for correlation between trials.
///
/// `correlation` defaults to 0.5 and is clamped into `[0, 1]`.
#[must_use]
pub fn effective_trials(raw_trials: f64, correlation: Option<f64>) -> (f64, f64) {
    let trials = if raw_trials.is_finite() && raw_trials > 0.0 {
        raw_trials.max(1.0)
    } else {
        1.0
    };
    let correlation = clamp01(correlation.filter(|c| c.is_finite()).unwrap_or(0.5));
    let effective = (trials - 1.0).mul_add(1.0 - correlation, 1.0).max(1.0);
    (effective, correlation)
}

/// `sqrt(PSR * DSR)`; 0 when either is non-positive.
#[must_use]
pub fn credibility(psr: Option<f64>, dsr: Option<f64>) -> Option<f64> {
    let psr = clamp01(psr.filter(|p| p.is_finite())?);
    let dsr = clamp01(dsr.filter(|d| d.is_finite())?);
    if psr <= 0.0 || dsr <= 0.0 {
        return Some(0.0);
    }
    Some((psr * dsr).sqrt())
}

/// Weight in `[0.2, 1]` a window's quality gets from its credibility.
#[must_use]
pub fn stat_weight(credibility: Option<f64>) -> f64 {
    match credibility.filter(|c| c.is_finite()) {
        Some(c) => 0.8f64.mul_add(c, 0.2).clamp(0.2, 1.0),
        None => 0.2,
    }
}

/// Pool raw power sums of several windows into one moment set.
///
/// Windows without samples are skipped; fewer than two pooled samples gives
/// `None`. Lag-1 autocorrelation is left unset.
#[must_use]
pub fn combine_moments<'a>(windows: impl IntoIterator<Item = &'a ReturnMoments>) -> Option<ReturnMoments> {
    let mut pooled = ReturnMoments::default();
    for stats in windows {
        if !stats.sample_count.is_finite() || stats.sample_count <= 0.0 {
            continue;
        }
        pooled.sample_count += stats.sample_count;
        pooled.sum1 += finite_or_zero(stats.sum1);
        pooled.sum2 += finite_or_zero(stats.sum2);
        pooled.sum3 += finite_or_zero(stats.sum3);
        pooled.sum4 += finite_or_zero(stats.sum4);
    }
    let n = pooled.sample_count;
    if n < 2.0 {
        return None;
    }

    let (s1, s2, s3, s4) = (pooled.sum1, pooled.sum2, pooled.sum3, pooled.sum4);
    let mean = s1 / n;
    let m2 = s2 - s1 * s1 / n;
    let variance = if m2 > 0.0 { m2 / (n - 1.0) } else { 0.0 };
    let std_dev = if variance > 0.0 { variance.sqrt() } else { 0.0 };
    let m3 = s3 - 3.0 * mean * s2 + 3.0 * mean * mean * s1 - n * mean.powi(3);
    let m4 = s4 - 4.0 * mean * s3 + 6.0 * mean * mean * s2 - 4.0 * mean.powi(3) * s1
        + n * mean.powi(4);

    pooled.mean = Some(mean);
    pooled.std_dev = Some(std_dev);
    if n > 2.0 && m2 > 0.0 {
        pooled.skewness = Some((n * (n - 1.0)).sqrt() * m3 / ((n - 2.0) * m2.powf(1.5)));
    }
    if n > 3.0 && variance > 0.0 {
        let denominator = (n - 1.0) * (n - 2.0) * (n - 3.0) * std_dev.powi(4);
        let correction = 3.0 * (n - 1.0) * (n - 1.0) / ((n - 2.0) * (n - 3.0));
        if denominator != 0.0 {
            pooled.kurtosis = Some(n * (n + 1.0) * m4 / denominator - correction + 3.0);
        }
    }
    Some(pooled)
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}
