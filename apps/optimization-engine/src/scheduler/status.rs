//! Per-task status board.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of one scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Not yet launched.
    Queued,
    /// Launched and awaiting completion.
    Running,
    /// Settled with a result.
    Done,
    /// Settled with an error or timeout.
    Error,
    /// Never launched because the run was cancelled.
    Skipped,
}

/// Status row for one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEntry {
    /// Input index.
    pub index: usize,
    /// Current state.
    pub state: TaskState,
    /// Launch time.
    pub started_at: Option<DateTime<Utc>>,
    /// Settle time.
    pub finished_at: Option<DateTime<Utc>>,
    /// Failure message for `Error`.
    pub error: Option<String>,
}

/// Status of every task in a run.
///
/// Mutated only by the scheduler loop, between awaits.
#[derive(Debug, Clone, Default)]
pub struct StatusBoard {
    entries: Vec<TaskEntry>,
}

impl StatusBoard {
    /// Board with `total` queued tasks.
    #[must_use]
    pub fn new(total: usize) -> Self {
        Self {
            entries: (0..total)
                .map(|index| TaskEntry {
                    index,
                    state: TaskState::Queued,
                    started_at: None,
                    finished_at: None,
                    error: None,
                })
                .collect(),
        }
    }

    /// Mark a task launched.
    pub fn mark_running(&mut self, index: usize) {
        if let Some(entry) = self.entries.get_mut(index) {
            entry.state = TaskState::Running;
            entry.started_at = Some(Utc::now());
        }
    }

    /// Mark a task settled successfully.
    pub fn mark_done(&mut self, index: usize) {
        self.settle(index, TaskState::Done, None);
    }

    /// Mark a task failed.
    pub fn mark_error(&mut self, index: usize, message: impl Into<String>) {
        self.settle(index, TaskState::Error, Some(message.into()));
    }

    /// Mark a task skipped.
    pub fn mark_skipped(&mut self, index: usize) {
        if let Some(entry) = self.entries.get_mut(index) {
            entry.state = TaskState::Skipped;
        }
    }

    fn settle(&mut self, index: usize, state: TaskState, error: Option<String>) {
        if let Some(entry) = self.entries.get_mut(index) {
            entry.state = state;
            entry.finished_at = Some(Utc::now());
            entry.error = error;
        }
    }

    /// Number of tasks in `state`.
    #[must_use]
    pub fn count(&self, state: TaskState) -> usize {
        self.entries.iter().filter(|e| e.state == state).count()
    }

    /// All rows in input order.
    #[must_use]
    pub fn entries(&self) -> &[TaskEntry] {
        &self.entries
    }

    /// Consume into rows.
    #[must_use]
    pub fn into_entries(self) -> Vec<TaskEntry> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_board_transitions() {
        let mut board = StatusBoard::new(3);
        board.mark_running(0);
        board.mark_running(1);
        assert_eq!(board.count(TaskState::Running), 2);

        board.mark_done(0);
        board.mark_error(1, "timed out");
        board.mark_skipped(2);

        let entries = board.entries();
        assert_eq!(entries[0].state, TaskState::Done);
        assert!(entries[0].started_at.is_some());
        assert!(entries[0].finished_at.is_some());
        assert_eq!(entries[1].error.as_deref(), Some("timed out"));
        assert_eq!(entries[2].state, TaskState::Skipped);
        assert!(entries[2].started_at.is_none());
    }

    #[test]
    fn test_out_of_range_index_is_ignored() {
        let mut board = StatusBoard::new(1);
        board.mark_done(5);
        assert_eq!(board.count(TaskState::Queued), 1);
    }
}
