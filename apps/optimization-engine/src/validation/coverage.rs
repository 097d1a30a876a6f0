//! Dataset coverage checks run before any window is evaluated.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::DatasetSnapshot;

use super::types::{Window, WindowPlan};

/// Which half of a window an issue concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Segment {
    /// Training segment.
    Training,
    /// Testing segment.
    Testing,
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Training => write!(f, "training"),
            Self::Testing => write!(f, "testing"),
        }
    }
}

/// One reason a window cannot be evaluated on the dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CoverageIssue {
    /// Training starts before the first row.
    StartsBeforeData {
        /// 1-based window number.
        window: usize,
        /// Training start.
        start: NaiveDate,
        /// First dataset date.
        data_start: NaiveDate,
    },
    /// Testing ends after the last row.
    EndsAfterData {
        /// 1-based window number.
        window: usize,
        /// Testing end.
        end: NaiveDate,
        /// Last dataset date.
        data_end: NaiveDate,
    },
    /// A segment holds no trading days at all.
    NoTradingDays {
        /// 1-based window number.
        window: usize,
        /// Affected segment.
        segment: Segment,
    },
    /// A segment holds fewer trading days than required.
    TooFewTradingDays {
        /// 1-based window number.
        window: usize,
        /// Affected segment.
        segment: Segment,
        /// Trading days found.
        days: usize,
        /// Trading days required.
        required: usize,
    },
    /// The dataset has no dated rows.
    EmptyDataset,
}

impl fmt::Display for CoverageIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StartsBeforeData {
                window,
                start,
                data_start,
            } => write!(
                f,
                "window {window}: training starts {start}, before data begins {data_start}"
            ),
            Self::EndsAfterData {
                window,
                end,
                data_end,
            } => write!(
                f,
                "window {window}: testing ends {end}, after data ends {data_end}"
            ),
            Self::NoTradingDays { window, segment } => {
                write!(f, "window {window}: {segment} segment has no trading days")
            }
            Self::TooFewTradingDays {
                window,
                segment,
                days,
                required,
            } => write!(
                f,
                "window {window}: {segment} segment has {days} trading days, needs {required}"
            ),
            Self::EmptyDataset => write!(f, "dataset has no dated rows"),
        }
    }
}

/// Every coverage problem of `windows` against `dataset`.
#[must_use]
pub fn check_coverage(
    windows: &[Window],
    plan: &WindowPlan,
    dataset: &DatasetSnapshot,
) -> Vec<CoverageIssue> {
    if windows.is_empty() {
        return Vec::new();
    }
    let Some(available) = dataset.availability() else {
        return vec![CoverageIssue::EmptyDataset];
    };

    let min_training = plan.min_training_days();
    let min_testing = plan.min_testing_days();
    let mut issues = Vec::new();

    for window in windows {
        let number = window.index + 1;
        if window.training_start < available.start {
            issues.push(CoverageIssue::StartsBeforeData {
                window: number,
                start: window.training_start,
                data_start: available.start,
            });
        }
        if window.testing_end > available.end {
            issues.push(CoverageIssue::EndsAfterData {
                window: number,
                end: window.testing_end,
                data_end: available.end,
            });
        }

        let segments = [
            (Segment::Training, dataset.trading_days(&window.training()), min_training),
            (Segment::Testing, dataset.trading_days(&window.testing()), min_testing),
        ];
        for (segment, days, required) in segments {
            if days == 0 {
                issues.push(CoverageIssue::NoTradingDays {
                    window: number,
                    segment,
                });
            } else if days < required {
                issues.push(CoverageIssue::TooFewTradingDays {
                    window: number,
                    segment,
                    days,
                    required,
                });
            }
        }
    }
    issues
}
