//! Training/testing window construction.

use chrono::{Days, Months, NaiveDate};

use crate::domain::DateSpan;

use super::types::{Window, WindowMode, WindowPlan};

/// Add whole months, clamping the day to the end of a shorter month.
#[must_use]
pub fn add_months(date: NaiveDate, months: u32) -> Option<NaiveDate> {
    date.checked_add_months(Months::new(months))
}

fn shift_days(date: NaiveDate, days: i64) -> Option<NaiveDate> {
    if days >= 0 {
        date.checked_add_days(Days::new(days.unsigned_abs()))
    } else {
        date.checked_sub_days(Days::new(days.unsigned_abs()))
    }
}

/// Build the windows of a run.
///
/// The run covers the overlap of `requested` and `available`. Each window's
/// training segment spans `training_months` from the cursor, the testing
/// segment follows immediately, and the cursor advances by `step_months`.
/// Building stops at the first testing segment that would end past the
/// overlap, or once `window_count` windows exist. In anchored mode every
/// training segment starts at the beginning of the run.
#[must_use]
pub fn build_windows(plan: &WindowPlan, requested: DateSpan, available: DateSpan) -> Vec<Window> {
    let start = requested.start.max(available.start);
    let last = requested.end.min(available.end);
    let mut windows = Vec::new();
    if plan.check().is_err() {
        return windows;
    }

    let mut cursor = start;
    while cursor < last {
        let Some(window) = window_at(plan, start, cursor, windows.len()) else {
            break;
        };
        if window.testing_end > last {
            break;
        }
        windows.push(window);

        if plan.window_count.is_some_and(|count| windows.len() >= count) {
            break;
        }
        match add_months(cursor, plan.step_months) {
            Some(next) if next < last => cursor = next,
            _ => break,
        }
    }
    windows
}

fn window_at(plan: &WindowPlan, run_start: NaiveDate, cursor: NaiveDate, index: usize) -> Option<Window> {
    let training_end = shift_days(add_months(cursor, plan.training_months)?, -1)?;
    let testing_start = shift_days(training_end, 1)?;
    let testing_end = shift_days(add_months(testing_start, plan.testing_months)?, -1)?;
    let training_start = match plan.mode {
        WindowMode::Rolling => cursor,
        WindowMode::Anchored => run_start,
    };
    Some(Window {
        index,
        training_start,
        training_end,
        testing_start,
        testing_end,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        let Some(date) = NaiveDate::from_ymd_opt(y, m, d) else {
            panic!("invalid test date");
        };
        date
    }

    fn span(a: NaiveDate, b: NaiveDate) -> DateSpan {
        DateSpan::new(a, b)
    }

    #[test]
    fn test_month_addition_clamps() {
        assert_eq!(add_months(date(2020, 1, 31), 1), Some(date(2020, 2, 29)));
        assert_eq!(add_months(date(2021, 1, 31), 1), Some(date(2021, 2, 28)));
        assert_eq!(add_months(date(2015, 1, 1), 36), Some(date(2018, 1, 1)));
    }

    #[test]
    fn test_default_plan_windows() {
        let range = span(date(2015, 1, 1), date(2023, 1, 1));
        let windows = build_windows(&WindowPlan::default(), range, range);

        assert_eq!(windows.len(), 3);
        let first = windows[0];
        assert_eq!(first.training_start, date(2015, 1, 1));
        assert_eq!(first.training_end, date(2017, 12, 31));
        assert_eq!(first.testing_start, date(2018, 1, 1));
        assert_eq!(first.testing_end, date(2018, 12, 31));

        let second = windows[1];
        assert_eq!(second.training_start, date(2015, 7, 1));
        assert_eq!(second.testing_start, date(2018, 7, 1));
        assert_eq!(second.testing_end, date(2019, 6, 30));
        assert_eq!(windows[2].index, 2);
    }

    #[test]
    fn test_unbounded_count_fills_range() {
        let range = span(date(2015, 1, 1), date(2023, 1, 1));
        let plan = WindowPlan {
            window_count: None,
            ..WindowPlan::default()
        };
        let windows = build_windows(&plan, range, range);

        // Testing ends run 2018-12-31 .. 2022-12-31 in half-year steps.
        assert_eq!(windows.len(), 9);
        let Some(last) = windows.last() else {
            panic!("windows expected");
        };
        assert_eq!(last.testing_end, date(2022, 12, 31));
        assert!(windows.iter().all(|w| w.testing_end <= date(2023, 1, 1)));
    }

    #[test]
    fn test_range_is_intersected_with_availability() {
        let requested = span(date(2010, 1, 1), date(2023, 1, 1));
        let available = span(date(2016, 3, 15), date(2020, 6, 30));
        let plan = WindowPlan {
            training_months: 24,
            testing_months: 6,
            window_count: None,
            ..WindowPlan::default()
        };
        let windows = build_windows(&plan, requested, available);

        assert!(!windows.is_empty());
        assert_eq!(windows[0].training_start, date(2016, 3, 15));
        assert!(windows.iter().all(|w| w.testing_end <= date(2020, 6, 30)));
    }

    #[test]
    fn test_too_short_range_has_no_windows() {
        let range = span(date(2020, 1, 1), date(2021, 1, 1));
        assert!(build_windows(&WindowPlan::default(), range, range).is_empty());
    }

    #[test]
    fn test_anchored_training_grows() {
        let range = span(date(2015, 1, 1), date(2023, 1, 1));
        let plan = WindowPlan {
            mode: WindowMode::Anchored,
            ..WindowPlan::default()
        };
        let windows = build_windows(&plan, range, range);

        assert_eq!(windows.len(), 3);
        assert!(windows.iter().all(|w| w.training_start == date(2015, 1, 1)));
        assert_eq!(windows[1].training_end, date(2018, 6, 30));
        assert_eq!(windows[2].training_end, date(2018, 12, 31));
    }

    #[test]
    fn test_invalid_plan_has_no_windows() {
        let range = span(date(2015, 1, 1), date(2023, 1, 1));
        let plan = WindowPlan {
            testing_months: 0,
            ..WindowPlan::default()
        };
        assert!(build_windows(&plan, range, range).is_empty());
    }
}
