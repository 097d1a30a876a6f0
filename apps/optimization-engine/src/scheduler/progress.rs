//! Progress counters for one scheduler run.

use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Settled / failed / skipped counts of a run, owned by the scheduling loop.
#[derive(Debug)]
pub struct ProgressTracker {
    total: u64,
    completed: u64,
    failed: u64,
    skipped: u64,
    started: Instant,
}

impl ProgressTracker {
    /// Tracker for `total` tasks, clock started now.
    #[must_use]
    pub fn new(total: u64) -> Self {
        Self {
            total,
            completed: 0,
            failed: 0,
            skipped: 0,
            started: Instant::now(),
        }
    }

    /// Count a settled task.
    pub const fn task_completed(&mut self, success: bool) {
        self.completed += 1;
        if !success {
            self.failed += 1;
        }
    }

    /// Count a task that was never launched.
    pub const fn task_skipped(&mut self) {
        self.skipped += 1;
    }

    /// Snapshot with throughput and ETA from the elapsed time.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn progress(&self) -> Progress {
        let elapsed = self.started.elapsed();
        let secs = elapsed.as_secs_f64();
        let tasks_per_sec = if secs > 0.0 {
            self.completed as f64 / secs
        } else {
            0.0
        };
        let remaining = self.total.saturating_sub(self.completed + self.skipped);
        let eta_secs = if tasks_per_sec > 0.0 {
            (remaining as f64 / tasks_per_sec) as u64
        } else {
            0
        };

        Progress {
            total: self.total,
            completed: self.completed,
            failed: self.failed,
            skipped: self.skipped,
            elapsed_secs: elapsed.as_secs(),
            eta_secs,
            tasks_per_sec,
        }
    }
}

/// Progress snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    /// Total number of tasks.
    pub total: u64,
    /// Settled tasks (success or failure).
    pub completed: u64,
    /// Failed tasks.
    pub failed: u64,
    /// Tasks skipped after cancellation.
    pub skipped: u64,
    /// Elapsed time in seconds.
    pub elapsed_secs: u64,
    /// Estimated time remaining in seconds.
    pub eta_secs: u64,
    /// Tasks settled per second.
    pub tasks_per_sec: f64,
}

impl Progress {
    /// Get completion percentage.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            (self.completed as f64 / self.total as f64) * 100.0
        }
    }
}

/// Receives a progress snapshot after every settled task.
#[cfg_attr(test, mockall::automock)]
pub trait ProgressObserver: Send + Sync {
    /// Called once per settled task.
    fn on_progress(&self, progress: &Progress);
}

/// Observer that ignores every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpProgressObserver;

impl ProgressObserver for NoOpProgressObserver {
    fn on_progress(&self, _progress: &Progress) {}
}

impl<F> ProgressObserver for F
where
    F: Fn(&Progress) + Send + Sync,
{
    fn on_progress(&self, progress: &Progress) {
        self(progress);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[test]
    fn test_progress_tracker() {
        let mut tracker = ProgressTracker::new(10);

        tracker.task_completed(true);
        tracker.task_completed(true);
        tracker.task_completed(false);
        tracker.task_skipped();

        let progress = tracker.progress();
        assert_eq!(progress.total, 10);
        assert_eq!(progress.completed, 3);
        assert_eq!(progress.failed, 1);
        assert_eq!(progress.skipped, 1);
        assert!((progress.percentage() - 30.0).abs() < 0.1);
    }

    #[test]
    fn test_empty_run_is_complete() {
        let progress = ProgressTracker::new(0).progress();
        assert!((progress.percentage() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_closure_observer() {
        let seen = Mutex::new(Vec::new());
        let observer = |p: &Progress| {
            if let Ok(mut guard) = seen.lock() {
                guard.push(p.completed);
            }
        };

        let mut tracker = ProgressTracker::new(2);
        tracker.task_completed(true);
        observer.on_progress(&tracker.progress());
        tracker.task_completed(true);
        observer.on_progress(&tracker.progress());

        let Ok(guard) = seen.lock() else {
            panic!("lock poisoned");
        };
        assert_eq!(*guard, vec![1, 2]);
    }
}
