//! Evaluation collaborator settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::default_true;

/// Evaluation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Timeout for a single backtest (seconds).
    #[serde(default = "default_backtest_timeout_secs")]
    pub backtest_timeout_secs: u64,
    /// Timeout for a parameter sweep (seconds).
    #[serde(default = "default_sweep_timeout_secs")]
    pub sweep_timeout_secs: u64,
    /// Send the dataset snapshot with every request.
    #[serde(default = "default_true")]
    pub use_cached_data: bool,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            backtest_timeout_secs: default_backtest_timeout_secs(),
            sweep_timeout_secs: default_sweep_timeout_secs(),
            use_cached_data: true,
        }
    }
}

impl EvaluationConfig {
    /// Backtest timeout.
    #[must_use]
    pub const fn backtest_timeout(&self) -> Duration {
        Duration::from_secs(self.backtest_timeout_secs)
    }

    /// Sweep timeout.
    #[must_use]
    pub const fn sweep_timeout(&self) -> Duration {
        Duration::from_secs(self.sweep_timeout_secs)
    }
}

const fn default_backtest_timeout_secs() -> u64 {
    30
}

const fn default_sweep_timeout_secs() -> u64 {
    60
}
