//! Inclusive calendar-date windows.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// An inclusive range of calendar days.
///
/// Dates carry no time of day or timezone, so membership is a plain ordering
/// comparison on the transaction's own recorded date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl EvaluationWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ValidationError> {
        if end < start {
            return Err(ValidationError::InvalidValue {
                field: "window".into(),
                message: format!("end {end} is before start {start}"),
            });
        }
        Ok(Self { start, end })
    }

    pub fn single_day(day: NaiveDate) -> Self {
        Self { start: day, end: day }
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }

    /// Number of days covered, both ends included.
    pub fn len_days(&self) -> u32 {
        ((self.end - self.start).num_days() + 1) as u32
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.start.iter_days().take_while(move |d| *d <= self.end)
    }

    /// The last `n` days of this window, clamped to its start.
    pub fn trailing(&self, n: u32) -> Self {
        let span = i64::from(n.max(1)) - 1;
        let start = self
            .end
            .checked_sub_signed(chrono::Duration::days(span))
            .map_or(self.start, |d| d.max(self.start));
        Self { start, end: self.end }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    #[test]
    fn bounds_are_inclusive() {
        let w = EvaluationWindow::new(day(1), day(3)).unwrap();
        assert!(w.contains(day(1)));
        assert!(w.contains(day(3)));
        assert!(!w.contains(day(4)));
        assert_eq!(w.len_days(), 3);
        assert_eq!(w.days().collect::<Vec<_>>(), vec![day(1), day(2), day(3)]);
    }

    #[test]
    fn reversed_window_rejected() {
        assert!(EvaluationWindow::new(day(3), day(1)).is_err());
    }

    #[test]
    fn trailing_clamps_to_start() {
        let w = EvaluationWindow::new(day(1), day(10)).unwrap();
        assert_eq!(w.trailing(3), EvaluationWindow::new(day(8), day(10)).unwrap());
        assert_eq!(w.trailing(30), w);
        assert_eq!(w.trailing(0), EvaluationWindow::single_day(day(10)));
    }
}
