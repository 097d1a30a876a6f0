//! Configuration for bounded-concurrency scheduling.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::OptimizationConfig;

/// Configuration for the evaluation scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Maximum number of tasks in flight.
    pub concurrency: usize,

    /// Timeout per individual task (seconds, 0 = no timeout).
    pub task_timeout_secs: u64,

    /// Whether to log a progress line after every completion.
    pub track_progress: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            task_timeout_secs: 0,
            track_progress: true,
        }
    }
}

impl SchedulerConfig {
    /// Config with the given concurrency and defaults elsewhere.
    #[must_use]
    pub fn with_concurrency(concurrency: usize) -> Self {
        Self {
            concurrency,
            ..Self::default()
        }
    }

    /// Set the per-task timeout.
    #[must_use]
    pub const fn task_timeout_secs(mut self, secs: u64) -> Self {
        self.task_timeout_secs = secs;
        self
    }

    /// Per-task timeout, if any.
    #[must_use]
    pub const fn task_timeout(&self) -> Option<Duration> {
        if self.task_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.task_timeout_secs))
        }
    }
}

impl From<&OptimizationConfig> for SchedulerConfig {
    /// Batch settings: `concurrency` and `combination_timeout_secs`.
    fn from(config: &OptimizationConfig) -> Self {
        Self::with_concurrency(config.concurrency).task_timeout_secs(config.combination_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheduler_config_default() {
        let config = SchedulerConfig::default();

        assert_eq!(config.concurrency, 4);
        assert!(config.track_progress);
        assert!(config.task_timeout().is_none());
    }

    #[test]
    fn test_task_timeout() {
        let config = SchedulerConfig::with_concurrency(2).task_timeout_secs(15);
        assert_eq!(config.task_timeout(), Some(Duration::from_secs(15)));
    }

    #[test]
    fn test_from_optimization_config() {
        let config = SchedulerConfig::from(&OptimizationConfig {
            concurrency: 3,
            combination_timeout_secs: 90,
            ..OptimizationConfig::default()
        });
        assert_eq!(config.concurrency, 3);
        assert_eq!(config.task_timeout(), Some(Duration::from_secs(90)));

        let unbounded = SchedulerConfig::from(&OptimizationConfig::default());
        assert_eq!(unbounded.concurrency, 4);
        assert!(unbounded.task_timeout().is_none());
    }
}
