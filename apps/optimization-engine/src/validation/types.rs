//! Walk-forward plan, thresholds, windows and run states.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::DateSpan;

/// How training segments move between windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowMode {
    /// Training segment slides forward by the step.
    #[default]
    Rolling,
    /// Training segment keeps its start and grows by the step.
    Anchored,
}

/// Window lengths and count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowPlan {
    /// Training segment length in months.
    #[serde(default = "default_training_months")]
    pub training_months: u32,
    /// Testing segment length in months.
    #[serde(default = "default_testing_months")]
    pub testing_months: u32,
    /// Months between consecutive windows.
    #[serde(default = "default_step_months")]
    pub step_months: u32,
    /// Stop after this many windows (`None` = as many as fit).
    #[serde(default = "default_window_count")]
    pub window_count: Option<usize>,
    /// Rolling or anchored training.
    #[serde(default)]
    pub mode: WindowMode,
}

impl Default for WindowPlan {
    fn default() -> Self {
        Self {
            training_months: default_training_months(),
            testing_months: default_testing_months(),
            step_months: default_step_months(),
            window_count: default_window_count(),
            mode: WindowMode::default(),
        }
    }
}

impl WindowPlan {
    /// Check that every length is usable.
    ///
    /// # Errors
    ///
    /// Returns a reason when a month count or the window count is zero.
    pub fn check(&self) -> Result<(), String> {
        if self.training_months == 0 {
            return Err("training_months must be positive".to_string());
        }
        if self.testing_months == 0 {
            return Err("testing_months must be positive".to_string());
        }
        if self.step_months == 0 {
            return Err("step_months must be positive".to_string());
        }
        if self.window_count == Some(0) {
            return Err("window_count must be positive when set".to_string());
        }
        Ok(())
    }

    /// Minimum trading days a training segment must contain.
    #[must_use]
    pub fn min_training_days(&self) -> usize {
        ((f64::from(self.training_months) * 5.0).ceil() as usize).max(15)
    }

    /// Minimum trading days a testing segment must contain.
    #[must_use]
    pub fn min_testing_days(&self) -> usize {
        ((f64::from(self.testing_months) * 3.0).ceil() as usize).max(5)
    }
}

const fn default_training_months() -> u32 {
    36
}

const fn default_testing_months() -> u32 {
    12
}

const fn default_step_months() -> u32 {
    6
}

const fn default_window_count() -> Option<usize> {
    Some(3)
}

/// Per-metric pass thresholds for a testing segment (percent where relevant).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Minimum annualized return.
    #[serde(default = "default_annualized_return")]
    pub annualized_return: f64,
    /// Minimum Sharpe ratio.
    #[serde(default = "default_sharpe_ratio")]
    pub sharpe_ratio: f64,
    /// Minimum Sortino ratio.
    #[serde(default = "default_sortino_ratio")]
    pub sortino_ratio: f64,
    /// Maximum drawdown (positive percent).
    #[serde(default = "default_max_drawdown")]
    pub max_drawdown: f64,
    /// Minimum win rate.
    #[serde(default = "default_win_rate")]
    pub win_rate: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            annualized_return: default_annualized_return(),
            sharpe_ratio: default_sharpe_ratio(),
            sortino_ratio: default_sortino_ratio(),
            max_drawdown: default_max_drawdown(),
            win_rate: default_win_rate(),
        }
    }
}

impl Thresholds {
    /// Whether every threshold is a finite number.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        [
            self.annualized_return,
            self.sharpe_ratio,
            self.sortino_ratio,
            self.max_drawdown,
            self.win_rate,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

const fn default_annualized_return() -> f64 {
    8.0
}

const fn default_sharpe_ratio() -> f64 {
    1.0
}

const fn default_sortino_ratio() -> f64 {
    1.2
}

const fn default_max_drawdown() -> f64 {
    25.0
}

const fn default_win_rate() -> f64 {
    45.0
}

/// One training/testing pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Window {
    /// Position in the run, from 0.
    pub index: usize,
    /// First training day.
    pub training_start: NaiveDate,
    /// Last training day.
    pub training_end: NaiveDate,
    /// First testing day.
    pub testing_start: NaiveDate,
    /// Last testing day.
    pub testing_end: NaiveDate,
}

impl Window {
    /// Training period.
    #[must_use]
    pub const fn training(&self) -> DateSpan {
        DateSpan::new(self.training_start, self.training_end)
    }

    /// Testing period.
    #[must_use]
    pub const fn testing(&self) -> DateSpan {
        DateSpan::new(self.testing_start, self.testing_end)
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} train {} test {}",
            self.index + 1,
            self.training(),
            self.testing()
        )
    }
}

/// Validator lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "window", rename_all = "snake_case")]
pub enum ValidationState {
    /// Not started.
    #[default]
    Idle,
    /// Building and checking windows.
    Windowing,
    /// Optimizing / evaluating the training segment of a window.
    Training(usize),
    /// Evaluating the testing segment of a window.
    Testing(usize),
    /// Combining window results.
    Aggregating,
    /// Finished with a report.
    Done,
    /// Stopped by cancellation.
    Cancelled,
}

impl ValidationState {
    /// Whether the run has ended.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Cancelled)
    }
}

impl fmt::Display for ValidationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Windowing => write!(f, "windowing"),
            Self::Training(i) => write!(f, "training({i})"),
            Self::Testing(i) => write!(f, "testing({i})"),
            Self::Aggregating => write!(f, "aggregating"),
            Self::Done => write!(f, "done"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Overall verdict of a walk-forward run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grade {
    /// Not enough finite statistics to grade.
    NoResult,
    /// Fails the robustness bar.
    NeedsAdjustment,
    /// Promising but not conclusive.
    ObserveFurther,
    /// Passes every robustness bar.
    ProfessionalPass,
}

impl Grade {
    /// Numeric level (2, 1, 0, -1).
    #[must_use]
    pub const fn level(&self) -> i8 {
        match self {
            Self::ProfessionalPass => 2,
            Self::ObserveFurther => 1,
            Self::NeedsAdjustment => 0,
            Self::NoResult => -1,
        }
    }

    /// One level lower; `NeedsAdjustment` and `NoResult` stay put.
    #[must_use]
    pub const fn downgraded(self) -> Self {
        match self {
            Self::ProfessionalPass => Self::ObserveFurther,
            Self::ObserveFurther => Self::NeedsAdjustment,
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_defaults() {
        let plan = WindowPlan::default();
        assert_eq!(plan.training_months, 36);
        assert_eq!(plan.testing_months, 12);
        assert_eq!(plan.step_months, 6);
        assert_eq!(plan.window_count, Some(3));
        assert!(plan.check().is_ok());
        assert_eq!(plan.min_training_days(), 180);
        assert_eq!(plan.min_testing_days(), 36);
    }

    #[test]
    fn test_short_plan_uses_day_floors() {
        let plan = WindowPlan {
            training_months: 1,
            testing_months: 1,
            ..WindowPlan::default()
        };
        assert_eq!(plan.min_training_days(), 15);
        assert_eq!(plan.min_testing_days(), 5);
    }

    #[test]
    fn test_plan_rejects_zero_lengths() {
        let plan = WindowPlan {
            step_months: 0,
            ..WindowPlan::default()
        };
        let Err(reason) = plan.check() else {
            panic!("zero step should be rejected");
        };
        assert!(reason.contains("step_months"));

        let plan = WindowPlan {
            window_count: Some(0),
            ..WindowPlan::default()
        };
        assert!(plan.check().is_err());
    }

    #[test]
    fn test_thresholds_partial_yaml_keeps_defaults() {
        let thresholds: Thresholds = match serde_json::from_str(r#"{"win_rate": 50}"#) {
            Ok(t) => t,
            Err(e) => panic!("parse: {e}"),
        };
        assert_eq!(thresholds.win_rate, 50.0);
        assert_eq!(thresholds.sortino_ratio, 1.2);
        assert!(thresholds.is_finite());
    }

    #[test]
    fn test_grade_levels_and_downgrade() {
        assert_eq!(Grade::ProfessionalPass.level(), 2);
        assert_eq!(Grade::NoResult.level(), -1);
        assert_eq!(Grade::ProfessionalPass.downgraded(), Grade::ObserveFurther);
        assert_eq!(Grade::ObserveFurther.downgraded(), Grade::NeedsAdjustment);
        assert_eq!(Grade::NeedsAdjustment.downgraded(), Grade::NeedsAdjustment);
        assert_eq!(Grade::NoResult.downgraded(), Grade::NoResult);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ValidationState::Training(2).to_string(), "training(2)");
        assert!(ValidationState::Cancelled.is_terminal());
        assert!(!ValidationState::Testing(0).is_terminal());
    }

    #[test]
    fn test_downgrade_floors_at_needs_adjustment() {
        assert_eq!(Grade::ProfessionalPass.downgraded(), Grade::ObserveFurther);
        assert_eq!(Grade::ObserveFurther.downgraded(), Grade::NeedsAdjustment);
        assert_eq!(Grade::NeedsAdjustment.downgraded(), Grade::NeedsAdjustment);
        assert_eq!(Grade::NoResult.downgraded(), Grade::NoResult);
    }
}
