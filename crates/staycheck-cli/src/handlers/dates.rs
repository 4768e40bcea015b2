//! `staycheck dates`: stay arithmetic without a browser

use super::stay_range;
use crate::commands::DatesArgs;
use crate::error::{CliError, CliResult};
use crate::output::Reporter;
use serde::Serialize;
use staycheck::{Clock, DateFormat, DateRange, FixedClock, SystemClock};

/// Stay rendered in both site formats
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StayReport {
    /// Base date, ISO
    pub today: String,
    /// Check-in, `yyyy-MM-dd`
    pub check_in_iso: String,
    /// Check-out, `yyyy-MM-dd`
    pub check_out_iso: String,
    /// Check-in, `dd/MM/yyyy`
    pub check_in_localized: String,
    /// Check-out, `dd/MM/yyyy`
    pub check_out_localized: String,
    /// Number of nights
    pub nights: i64,
}

impl StayReport {
    /// Render `range` computed from `today`
    #[must_use]
    pub fn new(today: chrono::NaiveDate, range: &DateRange) -> Self {
        let (check_in_iso, check_out_iso) = range.iso();
        let (check_in_localized, check_out_localized) = range.localized();
        Self {
            today: DateFormat::Iso.format(today),
            check_in_iso,
            check_out_iso,
            check_in_localized,
            check_out_localized,
            nights: range.nights(),
        }
    }

    /// Aligned text table
    #[must_use]
    pub fn to_text(&self) -> String {
        format!(
            "today      {}\ncheck-in   {}  {}\ncheck-out  {}  {}\nnights     {}",
            self.today,
            self.check_in_iso,
            self.check_in_localized,
            self.check_out_iso,
            self.check_out_localized,
            self.nights
        )
    }
}

fn clock_for(today: Option<&str>) -> CliResult<Box<dyn Clock>> {
    match today {
        Some(iso) => FixedClock::from_iso(iso)
            .map(|c| Box::new(c) as Box<dyn Clock>)
            .map_err(|e| CliError::invalid_argument(format!("--today '{iso}': {e}"))),
        None => Ok(Box::new(SystemClock)),
    }
}

/// Compute and print the stay
pub fn execute_dates(args: &DatesArgs, reporter: &Reporter) -> CliResult<()> {
    let clock = clock_for(args.today.as_deref())?;
    let range = stay_range(clock.as_ref(), args.stay.offset, args.stay.nights)?;
    let report = StayReport::new(clock.today(), &range);
    if args.json {
        reporter.plain(&serde_json::to_string_pretty(&report)?);
    } else {
        reporter.plain(&report.to_text());
    }
    Ok(())
}
