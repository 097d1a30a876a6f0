//! Per-run context shared by every component.
//!
//! Holds the run id, the cancellation token, the progress observer and an
//! append-only log of finished outcomes. Components receive it by reference.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::scheduler::{NoOpProgressObserver, Progress, ProgressObserver};

/// One finished unit of work recorded in the run log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    /// What finished (combination label, window index, ...).
    pub label: String,
    /// Final metric value, if any.
    pub metric: Option<f64>,
    /// Short status string.
    pub status: String,
    /// When it was recorded.
    pub recorded_at: DateTime<Utc>,
}

impl OutcomeRecord {
    /// Record stamped now.
    #[must_use]
    pub fn new(label: impl Into<String>, metric: Option<f64>, status: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            metric,
            status: status.into(),
            recorded_at: Utc::now(),
        }
    }
}

/// State of one optimization or validation run.
pub struct OptimizationRunContext {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    cancel: CancellationToken,
    observer: Arc<dyn ProgressObserver>,
    outcomes: Mutex<Vec<OutcomeRecord>>,
}

impl std::fmt::Debug for OptimizationRunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OptimizationRunContext")
            .field("run_id", &self.run_id)
            .field("started_at", &self.started_at)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl Default for OptimizationRunContext {
    fn default() -> Self {
        Self::new()
    }
}

impl OptimizationRunContext {
    /// Fresh context with a new run id and a no-op observer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            cancel: CancellationToken::new(),
            observer: Arc::new(NoOpProgressObserver),
            outcomes: Mutex::new(Vec::new()),
        }
    }

    /// Use the given progress observer.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Use an externally owned cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Run identifier.
    #[must_use]
    pub const fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Run start time.
    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Cancellation token (clone to hand to other tasks).
    #[must_use]
    pub const fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Request cancellation. Takes effect at the next launch boundary.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Forward a progress snapshot to the observer.
    pub fn report_progress(&self, progress: &Progress) {
        self.observer.on_progress(progress);
    }

    /// Append a finished outcome.
    pub fn record(&self, record: OutcomeRecord) {
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
    }

    /// Snapshot of the outcome log.
    #[must_use]
    pub fn outcomes(&self) -> Vec<OutcomeRecord> {
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_ids_are_unique() {
        let a = OptimizationRunContext::new();
        let b = OptimizationRunContext::new();
        assert_ne!(a.run_id(), b.run_id());
    }

    #[test]
    fn test_cancel_is_visible_through_shared_token() {
        let token = CancellationToken::new();
        let ctx = OptimizationRunContext::new().with_cancellation(token.clone());
        assert!(!ctx.is_cancelled());

        token.cancel();
        assert!(ctx.is_cancelled());
    }

    #[test]
    fn test_outcome_log_is_append_only() {
        let ctx = OptimizationRunContext::new();
        ctx.record(OutcomeRecord::new("a/b", Some(1.5), "converged"));
        ctx.record(OutcomeRecord::new("c/d", None, "failed"));

        let log = ctx.outcomes();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].label, "a/b");
        assert_eq!(log[1].status, "failed");
    }
}
