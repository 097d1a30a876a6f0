//! Grid-point selection from a parameter sweep.

use serde::{Deserialize, Serialize};

use crate::domain::TargetMetric;
use crate::evaluation::SweepPoint;

use super::metric::is_better_metric;

/// Value picked from one sweep.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSelection {
    /// Chosen parameter value.
    pub value: f64,
    /// Metric at that value (sentinel when `fallback`).
    pub metric: f64,
    /// No point had a usable metric; the first valued point was taken.
    pub fallback: bool,
}

/// Pick the best point of a sweep.
///
/// Points with a finite metric are ranked; ties keep the earlier point. With
/// no usable metric at all, the first point carrying a value is returned and
/// flagged. `None` means no point carried a value.
#[must_use]
pub fn select_best(points: &[SweepPoint], metric: TargetMetric) -> Option<GridSelection> {
    let mut best: Option<GridSelection> = None;

    for point in points {
        let Some(value) = point.param_value.filter(|v| v.is_finite()) else {
            continue;
        };
        let Some(score) = point.metrics.metric(metric) else {
            continue;
        };
        let better = best.is_none_or(|current| is_better_metric(score, current.metric, metric));
        if better {
            best = Some(GridSelection {
                value,
                metric: score,
                fallback: false,
            });
        }
    }

    best.or_else(|| {
        points
            .iter()
            .find_map(|p| p.param_value.filter(|v| v.is_finite()))
            .map(|value| GridSelection {
                value,
                metric: metric.sentinel(),
                fallback: true,
            })
    })
}
