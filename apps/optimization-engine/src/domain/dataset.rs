//! Read-only price dataset snapshot and date spans.

use std::fmt;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Inclusive calendar date span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateSpan {
    /// First day.
    pub start: NaiveDate,
    /// Last day.
    pub end: NaiveDate,
}

impl DateSpan {
    /// Create a span.
    #[must_use]
    pub const fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Whether a date falls inside the span.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

impl fmt::Display for DateSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Immutable snapshot of the evaluation dataset.
///
/// Rows are forwarded verbatim to workers as `cachedData`; trading dates are
/// extracted once for coverage checks. Cloning shares the underlying data.
#[derive(Debug, Clone, Default)]
pub struct DatasetSnapshot {
    rows: Arc<Vec<Value>>,
    dates: Arc<Vec<NaiveDate>>,
}

impl DatasetSnapshot {
    /// Build from price rows. Rows without a parseable `date` are kept but not counted.
    #[must_use]
    pub fn from_rows(rows: Vec<Value>) -> Self {
        let mut dates: Vec<NaiveDate> = rows.iter().filter_map(row_date).collect();
        dates.sort_unstable();
        dates.dedup();
        Self {
            rows: Arc::new(rows),
            dates: Arc::new(dates),
        }
    }

    /// Build a date-only snapshot (rows carry just the date).
    #[must_use]
    pub fn from_dates(dates: impl IntoIterator<Item = NaiveDate>) -> Self {
        let rows = dates
            .into_iter()
            .map(|d| serde_json::json!({ "date": d.format("%Y-%m-%d").to_string() }))
            .collect();
        Self::from_rows(rows)
    }

    /// Shared rows.
    #[must_use]
    pub fn rows(&self) -> &Arc<Vec<Value>> {
        &self.rows
    }

    /// Whether the snapshot holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// First and last trading dates.
    #[must_use]
    pub fn availability(&self) -> Option<DateSpan> {
        Some(DateSpan::new(*self.dates.first()?, *self.dates.last()?))
    }

    /// Trading days inside a span.
    #[must_use]
    pub fn trading_days(&self, span: &DateSpan) -> usize {
        let lo = self.dates.partition_point(|d| *d < span.start);
        let hi = self.dates.partition_point(|d| *d <= span.end);
        hi.saturating_sub(lo)
    }
}

fn row_date(row: &Value) -> Option<NaiveDate> {
    let raw = row.get("date")?.as_str()?;
    let day = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
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

    #[test]
    fn test_snapshot_extracts_dates() {
        let snapshot = DatasetSnapshot::from_rows(vec![
            serde_json::json!({ "date": "2020-01-03", "close": 10.0 }),
            serde_json::json!({ "date": "2020-01-02T00:00:00Z", "close": 9.0 }),
            serde_json::json!({ "close": 11.0 }),
        ]);

        assert_eq!(snapshot.rows().len(), 3);
        let Some(span) = snapshot.availability() else {
            panic!("availability should exist");
        };
        assert_eq!(span.start, date(2020, 1, 2));
        assert_eq!(span.end, date(2020, 1, 3));
    }

    #[test]
    fn test_trading_days_counts_inclusive() {
        let snapshot = DatasetSnapshot::from_dates((1..=10).map(|d| date(2021, 3, d)));
        let span = DateSpan::new(date(2021, 3, 3), date(2021, 3, 5));
        assert_eq!(snapshot.trading_days(&span), 3);

        let outside = DateSpan::new(date(2022, 1, 1), date(2022, 2, 1));
        assert_eq!(snapshot.trading_days(&outside), 0);
    }
}
