//! Metric comparison used by every ranking decision.

use std::cmp::Ordering;

use crate::domain::TargetMetric;

/// Whether `a` ranks strictly better than `b` for `metric`.
///
/// A NaN `a` is never better; a NaN `b` always loses to a usable `a`.
/// `maxDrawdown` prefers the smaller magnitude, everything else the larger value.
#[must_use]
pub fn is_better_metric(a: f64, b: f64, metric: TargetMetric) -> bool {
    if a.is_nan() {
        return false;
    }
    if b.is_nan() {
        return true;
    }
    if metric.prefers_smaller_magnitude() {
        a.abs() < b.abs()
    } else {
        a > b
    }
}

/// `Option` form: `None` behaves like NaN.
#[must_use]
pub fn is_better_opt(a: Option<f64>, b: Option<f64>, metric: TargetMetric) -> bool {
    is_better_metric(a.unwrap_or(f64::NAN), b.unwrap_or(f64::NAN), metric)
}

/// Ordering that sorts better values first.
#[must_use]
pub fn rank_order(a: f64, b: f64, metric: TargetMetric) -> Ordering {
    if is_better_metric(a, b, metric) {
        Ordering::Less
    } else if is_better_metric(b, a, metric) {
        Ordering::Greater
    } else {
        Ordering::Equal
    }
}
