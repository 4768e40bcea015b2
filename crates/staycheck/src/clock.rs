//! Calendar clock for date-relative scenarios.
//!
//! Real runs read today's date in the local time zone; tests pin it with
//! [`FixedClock`] so that offset arithmetic is deterministic.

use chrono::{Local, NaiveDate};
use std::fmt::Debug;

/// Source of "today"
pub trait Clock: Debug + Send + Sync {
    /// Current calendar date
    fn today(&self) -> NaiveDate;
}

/// System clock in the local time zone
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Clock pinned to a fixed date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock {
    date: NaiveDate,
}

impl FixedClock {
    /// Pin the clock to `date`
    #[must_use]
    pub const fn new(date: NaiveDate) -> Self {
        Self { date }
    }

    /// Pin the clock to a `yyyy-MM-dd` string
    ///
    /// # Errors
    ///
    /// Returns error if the string is not an ISO date
    pub fn from_iso(iso: &str) -> Result<Self, chrono::ParseError> {
        NaiveDate::parse_from_str(iso.trim(), "%Y-%m-%d").map(Self::new)
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.date
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock_returns_pinned_date() {
        let clock = FixedClock::from_iso("2025-11-09").unwrap();
        assert_eq!(
            clock.today(),
            NaiveDate::from_ymd_opt(2025, 11, 9).unwrap()
        );
    }

    #[test]
    fn test_fixed_clock_rejects_localized_format() {
        assert!(FixedClock::from_iso("09/11/2025").is_err());
    }

    #[test]
    fn test_system_clock_is_close_to_local_now() {
        let today = SystemClock.today();
        let diff = (Local::now().date_naive() - today).num_days().abs();
        assert!(diff <= 1);
    }
}
