//! Walk-forward validation settings.

use serde::{Deserialize, Serialize};

use crate::validation::{Thresholds, WindowPlan};

/// Trading days per year used to derive daily benchmarks.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Walk-forward validation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Window plan (lengths, step, count, mode).
    #[serde(default)]
    pub plan: WindowPlan,
    /// Per-metric pass thresholds.
    #[serde(default)]
    pub thresholds: Thresholds,
    /// Score against the strict Sharpe benchmark and zero PSR on thin samples.
    #[serde(default)]
    pub strict_mode: bool,
    /// Daily Sharpe benchmark in loose mode.
    #[serde(default)]
    pub loose_benchmark: f64,
    /// Daily Sharpe benchmark in strict mode (annual 1.0 by default).
    #[serde(default = "default_strict_benchmark")]
    pub strict_benchmark: f64,
    /// Confidence level for the minimum track record length.
    #[serde(default = "default_min_track_record_confidence")]
    pub min_track_record_confidence: f64,
    /// Re-optimize parameters on each training segment.
    #[serde(default)]
    pub optimize_windows: bool,
    /// Run local refinement after per-window optimization.
    #[serde(default)]
    pub refine_windows: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            plan: WindowPlan::default(),
            thresholds: Thresholds::default(),
            strict_mode: false,
            loose_benchmark: 0.0,
            strict_benchmark: default_strict_benchmark(),
            min_track_record_confidence: default_min_track_record_confidence(),
            optimize_windows: false,
            refine_windows: false,
        }
    }
}

impl ValidationConfig {
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

fn default_strict_benchmark() -> f64 {
    1.0 / TRADING_DAYS_PER_YEAR.sqrt()
}

const fn default_min_track_record_confidence() -> f64 {
    0.95
}
