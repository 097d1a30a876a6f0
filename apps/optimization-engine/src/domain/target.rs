//! Tunable parameter ranges and step alignment.

use serde::{Deserialize, Serialize};

/// Decimal precision kept after snapping a value to its step grid.
const ALIGN_SCALE: f64 = 1_000_000.0;

/// Slack used when counting whole steps inside a range.
const STEP_EPSILON: f64 = 1e-9;

/// Inclusive numeric range with a step size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamRange {
    /// Lower bound.
    pub from: f64,
    /// Upper bound.
    pub to: f64,
    /// Grid step (non-positive values are treated as 1).
    #[serde(default = "default_step")]
    pub step: f64,
}

const fn default_step() -> f64 {
    1.0
}

impl ParamRange {
    /// Create a new range.
    #[must_use]
    pub const fn new(from: f64, to: f64, step: f64) -> Self {
        Self { from, to, step }
    }

    /// Step actually used for alignment.
    #[must_use]
    pub fn effective_step(&self) -> f64 {
        if self.step.is_finite() && self.step > 0.0 {
            self.step
        } else {
            1.0
        }
    }

    /// Smaller of the two bounds.
    #[must_use]
    pub fn lower(&self) -> f64 {
        self.from.min(self.to)
    }

    /// Larger of the two bounds.
    #[must_use]
    pub fn upper(&self) -> f64 {
        self.from.max(self.to)
    }

    /// Number of whole steps between the bounds.
    #[must_use]
    pub fn max_steps(&self) -> f64 {
        ((self.upper() - self.lower()) / self.effective_step() + STEP_EPSILON)
            .floor()
            .max(0.0)
    }

    /// Range-to-step ratio, used to size exploration.
    #[must_use]
    pub fn step_ratio(&self) -> f64 {
        ((self.upper() - self.lower()) / self.effective_step()).max(1.0)
    }

    /// Clamp a value into the range. Non-finite values map to the lower bound.
    #[must_use]
    pub fn clamp(&self, value: f64) -> f64 {
        if !value.is_finite() {
            return self.lower();
        }
        value.clamp(self.lower(), self.upper())
    }

    /// Clamp a value and snap it to the nearest step multiple from the lower bound.
    ///
    /// Integer steps on an integer lower bound yield integer values.
    #[must_use]
    pub fn align(&self, value: f64) -> f64 {
        let step = self.effective_step();
        let lower = self.lower();
        let steps = ((self.clamp(value) - lower) / step)
            .round()
            .clamp(0.0, self.max_steps());

        let mut aligned = steps.mul_add(step, lower);
        if is_integral(step) && is_integral(lower) {
            aligned = aligned.round();
        }
        round_to_scale(aligned)
    }

    /// Whether a value lies in range and on the step grid.
    #[must_use]
    pub fn contains_aligned(&self, value: f64) -> bool {
        let tolerance = 1e-6 * self.effective_step().max(1.0);
        if value < self.lower() - tolerance || value > self.upper() + tolerance {
            return false;
        }
        let offset = (value - self.lower()) / self.effective_step();
        (offset - offset.round()).abs() < 1e-4
    }

    /// Map a value to `[0, 1]`. Degenerate ranges map to the midpoint.
    #[must_use]
    pub fn normalize(&self, value: f64) -> f64 {
        let span = self.upper() - self.lower();
        if span <= 0.0 || !span.is_finite() {
            return 0.5;
        }
        (self.clamp(value) - self.lower()) / span
    }

    /// Map a `[0, 1]` coordinate back into the range (not step-aligned).
    #[must_use]
    pub fn denormalize(&self, unit: f64) -> f64 {
        let span = self.upper() - self.lower();
        if span <= 0.0 || !span.is_finite() {
            return self.lower();
        }
        let unit = if unit.is_finite() { unit.clamp(0.0, 1.0) } else { 0.0 };
        unit.mul_add(span, self.lower())
    }

    /// Step-aligned grid values, at most `max_points` of them.
    ///
    /// Wider ranges are strided by whole steps; the upper grid point is always
    /// included.
    #[must_use]
    pub fn grid(&self, max_points: usize) -> Vec<f64> {
        let total = self.max_steps() as usize + 1;
        let max_points = max_points.max(2);
        let stride = total.div_ceil(max_points).max(1);
        let step = self.effective_step();
        let lower = self.lower();

        let mut values: Vec<f64> = (0..total)
            .step_by(stride)
            .map(|i| self.align((i as f64).mul_add(step, lower)))
            .collect();

        let last = self.align((total as f64 - 1.0).mul_add(step, lower));
        if values.last().is_none_or(|v| (v - last).abs() > f64::EPSILON) {
            values.push(last);
        }
        values
    }
}

/// One tunable numeric knob of a strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterTarget {
    /// Parameter name as the strategy declares it.
    pub name: String,
    /// Declared range.
    pub range: ParamRange,
}

impl ParameterTarget {
    /// Create a target.
    #[must_use]
    pub fn new(name: impl Into<String>, from: f64, to: f64, step: f64) -> Self {
        Self {
            name: name.into(),
            range: ParamRange::new(from, to, step),
        }
    }

    /// Clamp and step-align a value for this target.
    #[must_use]
    pub fn align(&self, value: f64) -> f64 {
        self.range.align(value)
    }
}

fn is_integral(value: f64) -> bool {
    value.is_finite() && (value - value.round()).abs() < f64::EPSILON
}

/// Round to six decimal places, matching the collaborator's precision.
#[must_use]
pub fn round_to_scale(value: f64) -> f64 {
    if !value.is_finite() {
        return value;
    }
    (value * ALIGN_SCALE).round() / ALIGN_SCALE
}
