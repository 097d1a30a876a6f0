//! Result types for scheduler runs.

use serde::{Deserialize, Serialize};

use super::status::TaskEntry;

/// Outcome of one scheduler run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleReport<R> {
    /// One slot per input task, in input order. `None` marks a failure,
    /// timeout or skipped task.
    pub results: Vec<Option<R>>,

    /// Status row per task.
    pub tasks: Vec<TaskEntry>,

    /// Tasks that settled (success or failure).
    pub completed: u64,

    /// Tasks that failed or timed out.
    pub failed: u64,

    /// Tasks never launched because of cancellation.
    pub skipped: u64,

    /// Highest number of tasks simultaneously in flight.
    pub peak_in_flight: usize,

    /// Whether cancellation stopped new launches.
    pub cancelled: bool,

    /// Indices whose slot holds a fallback value.
    #[serde(default)]
    pub fallbacks: Vec<usize>,

    /// Total wall time in milliseconds.
    pub total_time_ms: u64,
}

impl<R> ScheduleReport<R> {
    /// Fraction of tasks that produced a result.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn success_rate(&self) -> f64 {
        if self.results.is_empty() {
            0.0
        } else {
            let ok = self.completed.saturating_sub(self.failed);
            ok as f64 / self.results.len() as f64
        }
    }

    /// Results that succeeded, with their index.
    pub fn successful(&self) -> impl Iterator<Item = (usize, &R)> {
        self.results
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.as_ref().map(|r| (i, r)))
    }

    /// Whether the slot at `index` holds a fallback.
    #[must_use]
    pub fn is_fallback(&self, index: usize) -> bool {
        self.fallbacks.contains(&index)
    }
}
