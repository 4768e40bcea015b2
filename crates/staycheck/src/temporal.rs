//! Date ranges and cross-surface reconciliation.
//!
//! A [`DateRange`] is computed from a base date, an offset and a number of
//! nights, then checked against the surfaces the application renders it on:
//!
//! 1. `checkin`/`checkout` query parameters (ISO, authoritative)
//! 2. free visible text (ISO or `dd/MM/yyyy`)
//! 3. the confirmation panel (date-shaped tokens, plus its `<strong>` nodes)
//!
//! Every available surface is read and recorded; the first one in that order
//! that agrees with the expected range is reported as the match.

use crate::result::{HarnessError, HarnessResult};
use chrono::{Days, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Query parameter carrying the first night
pub const CHECKIN_PARAM: &str = "checkin";

/// Query parameter carrying the departure date
pub const CHECKOUT_PARAM: &str = "checkout";

/// Date-shaped token in either rendering the application uses
const DATE_TOKEN: &str = r"\b(\d{4}-\d{2}-\d{2}|\d{2}/\d{2}/\d{4})\b";

static DATE_PATTERN: Lazy<Result<Regex, regex::Error>> = Lazy::new(|| Regex::new(DATE_TOKEN));

/// Textual date representations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DateFormat {
    /// `yyyy-MM-dd`
    Iso,
    /// `dd/MM/yyyy`
    Localized,
}

impl DateFormat {
    /// Both formats, ISO first
    pub const ALL: [Self; 2] = [Self::Iso, Self::Localized];

    /// chrono format string
    #[must_use]
    pub const fn pattern(self) -> &'static str {
        match self {
            Self::Iso => "%Y-%m-%d",
            Self::Localized => "%d/%m/%Y",
        }
    }

    /// Render a date
    #[must_use]
    pub fn format(self, date: NaiveDate) -> String {
        date.format(self.pattern()).to_string()
    }

    /// Parse a date in this format
    #[must_use]
    pub fn parse(self, text: &str) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(text.trim(), self.pattern()).ok()
    }

    /// Parse a date in whichever format fits
    #[must_use]
    pub fn parse_any(text: &str) -> Option<NaiveDate> {
        Self::ALL.iter().find_map(|f| f.parse(text))
    }
}

/// Stay from `start` (check-in) to `end` (check-out), `start < end`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    /// Create a range, rejecting `end <= start`
    pub fn new(start: NaiveDate, end: NaiveDate) -> HarnessResult<Self> {
        if end <= start {
            return Err(HarnessError::InvalidRange {
                nights: (end - start).num_days(),
            });
        }
        Ok(Self { start, end })
    }

    /// Parse both boundaries in `format`
    #[must_use]
    pub fn parse(start: &str, end: &str, format: DateFormat) -> Option<Self> {
        Self::new(format.parse(start)?, format.parse(end)?).ok()
    }

    /// Check-in date
    #[must_use]
    pub const fn start(&self) -> NaiveDate {
        self.start
    }

    /// Check-out date
    #[must_use]
    pub const fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of nights
    #[must_use]
    pub fn nights(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    /// Both boundaries rendered in `format`
    #[must_use]
    pub fn format(&self, format: DateFormat) -> (String, String) {
        (format.format(self.start), format.format(self.end))
    }

    /// ISO pair
    #[must_use]
    pub fn iso(&self) -> (String, String) {
        self.format(DateFormat::Iso)
    }

    /// `dd/MM/yyyy` pair
    #[must_use]
    pub fn localized(&self) -> (String, String) {
        self.format(DateFormat::Localized)
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (start, end) = self.iso();
        write!(f, "{start} -> {end}")
    }
}

fn shift(base: NaiveDate, days: i64) -> HarnessResult<NaiveDate> {
    let shifted = if days >= 0 {
        base.checked_add_days(Days::new(days.unsigned_abs()))
    } else {
        base.checked_sub_days(Days::new(days.unsigned_abs()))
    };
    shifted.ok_or_else(|| HarnessError::DateOutOfRange {
        base: DateFormat::Iso.format(base),
        days,
    })
}

/// `start = base + offset_days`, `end = start + nights`.
///
/// Fails with [`HarnessError::InvalidRange`] when `nights < 1`, before any
/// other work.
pub fn compute_range(base: NaiveDate, offset_days: i64, nights: i64) -> HarnessResult<DateRange> {
    if nights < 1 {
        return Err(HarnessError::InvalidRange { nights });
    }
    let start = shift(base, offset_days)?;
    let end = shift(start, nights)?;
    DateRange::new(start, end)
}

/// Reads named parameters from the current address, percent-decoded
pub trait QueryParamReader {
    /// Value of `name`, `None` when absent
    fn query_param(&self, name: &str) -> HarnessResult<Option<String>>;
}

/// Supplies the page's visible text
pub trait FreeTextScanner {
    /// Concatenated visible text
    fn visible_text(&self) -> HarnessResult<String>;
}

/// Reads the structured confirmation panel
pub trait PanelReader {
    /// Full text of the panel
    fn panel_text(&self) -> HarnessResult<String>;

    /// Text of the panel's emphasised date nodes, in document order
    fn strong_dates(&self) -> HarnessResult<Vec<String>>;
}

/// Reads the month-grid calendar
pub trait CalendarReader {
    /// Number of "selected" range markers
    fn selected_marker_count(&self) -> HarnessResult<usize>;

    /// Labels of the day buttons in the month grid
    fn day_labels(&self) -> HarnessResult<Vec<String>>;
}

/// Query parameters of a URL string
#[derive(Debug, Clone)]
pub struct UrlParams {
    url: url::Url,
}

impl UrlParams {
    /// Parse an absolute URL
    pub fn parse(address: &str) -> HarnessResult<Self> {
        url::Url::parse(address.trim())
            .map(|url| Self { url })
            .map_err(|e| HarnessError::assertion(format!("cannot parse address '{address}': {e}")))
    }
}

impl QueryParamReader for UrlParams {
    fn query_param(&self, name: &str) -> HarnessResult<Option<String>> {
        Ok(self
            .url
            .query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned()))
    }
}

/// Fixed text, for snapshots taken earlier
#[derive(Debug, Clone, Default)]
pub struct TextSnapshot(pub String);

impl FreeTextScanner for TextSnapshot {
    fn visible_text(&self) -> HarnessResult<String> {
        Ok(self.0.clone())
    }
}

/// Fixed panel content
#[derive(Debug, Clone, Default)]
pub struct PanelSnapshot {
    /// Panel text
    pub text: String,
    /// Emphasised nodes
    pub strongs: Vec<String>,
}

impl PanelReader for PanelSnapshot {
    fn panel_text(&self) -> HarnessResult<String> {
        Ok(self.text.clone())
    }

    fn strong_dates(&self) -> HarnessResult<Vec<String>> {
        Ok(self.strongs.clone())
    }
}

/// Surfaces available for a reconciliation; any may be absent
#[derive(Clone, Copy, Default)]
pub struct ReconciliationSources<'a> {
    query: Option<&'a dyn QueryParamReader>,
    text: Option<&'a dyn FreeTextScanner>,
    panel: Option<&'a dyn PanelReader>,
}

impl<'a> ReconciliationSources<'a> {
    /// No sources
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the query-parameter reader
    #[must_use]
    pub fn with_query(mut self, reader: &'a dyn QueryParamReader) -> Self {
        self.query = Some(reader);
        self
    }

    /// Add the free-text scanner
    #[must_use]
    pub fn with_text(mut self, scanner: &'a dyn FreeTextScanner) -> Self {
        self.text = Some(scanner);
        self
    }

    /// Add the panel reader
    #[must_use]
    pub fn with_panel(mut self, reader: &'a dyn PanelReader) -> Self {
        self.panel = Some(reader);
        self
    }
}

/// Which surface agreed with the expected range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchSource {
    /// `checkin`/`checkout` parameters
    QueryParams,
    /// Free text scan
    FreeText,
    /// Confirmation panel
    Panel,
}

impl fmt::Display for MatchSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::QueryParams => "query parameters",
            Self::FreeText => "free text",
            Self::Panel => "confirmation panel",
        })
    }
}

/// Reading of one surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfaceCheck {
    /// Surface read
    pub source: MatchSource,
    /// Whether it agreed with the expected range
    pub matched: bool,
    /// What was observed
    pub observed: String,
}

/// Dates scraped from the confirmation surface
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConfirmationRecord {
    /// First date token, empty if none
    pub start: String,
    /// Second date token, empty if none
    pub end: String,
    /// Text the tokens were taken from
    pub raw: String,
}

impl ConfirmationRecord {
    /// Extract date tokens from `raw`.
    ///
    /// The first two tokens in document order are taken as (start, end);
    /// with one token `end` is left empty. The full token count is returned
    /// alongside so callers can flag extra dates.
    pub fn extract(raw: &str) -> HarnessResult<(Self, usize)> {
        let tokens = date_tokens(raw)?;
        let record = Self {
            start: tokens.first().cloned().unwrap_or_default(),
            end: tokens.get(1).cloned().unwrap_or_default(),
            raw: raw.to_string(),
        };
        Ok((record, tokens.len()))
    }

    /// Both boundaries present
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.start.is_empty() && !self.end.is_empty()
    }

    /// Parsed range, if both boundaries parse and are ordered
    #[must_use]
    pub fn range(&self) -> Option<DateRange> {
        DateRange::new(
            DateFormat::parse_any(&self.start)?,
            DateFormat::parse_any(&self.end)?,
        )
        .ok()
    }
}

fn date_tokens(text: &str) -> HarnessResult<Vec<String>> {
    let pattern = DATE_PATTERN
        .as_ref()
        .map_err(|e| HarnessError::assertion(format!("date pattern: {e}")))?;
    Ok(pattern
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect())
}

/// Verdict of a reconciliation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Range that was expected
    pub expected: DateRange,
    /// First surface in priority order that agreed
    pub matched: Option<MatchSource>,
    /// Every surface read, in priority order
    pub checks: Vec<SurfaceCheck>,
    /// Confirmation record, when the panel was read
    pub confirmation: Option<ConfirmationRecord>,
    /// Inconsistencies worth reporting even on success
    pub anomalies: Vec<String>,
}

impl MatchResult {
    /// Whether any surface agreed
    #[must_use]
    pub const fn is_match(&self) -> bool {
        self.matched.is_some()
    }

    /// Human-readable summary of every surface reading
    #[must_use]
    pub fn diagnostic(&self) -> String {
        let (start, end) = self.expected.iso();
        let mut lines = vec![format!("expected {start} -> {end}")];
        for check in &self.checks {
            lines.push(format!(
                "  [{}] {}: {}",
                if check.matched { "ok" } else { "--" },
                check.source,
                check.observed
            ));
        }
        for anomaly in &self.anomalies {
            lines.push(format!("  anomaly: {anomaly}"));
        }
        lines.join("\n")
    }

    /// Convert a non-match into [`HarnessError::AssertionFailed`]
    pub fn into_result(self) -> HarnessResult<Self> {
        if self.is_match() {
            Ok(self)
        } else {
            Err(HarnessError::assertion(format!(
                "date range not reflected on any surface\n{}",
                self.diagnostic()
            )))
        }
    }
}

/// Read every available surface and report which one agrees with `range`.
///
/// Source failures that leave the session unusable propagate; anything else
/// is recorded as a failed check so the other surfaces still get read.
pub fn verify_against_surfaces(
    range: &DateRange,
    sources: &ReconciliationSources<'_>,
) -> HarnessResult<MatchResult> {
    let mut result = MatchResult {
        expected: *range,
        matched: None,
        checks: Vec::new(),
        confirmation: None,
        anomalies: Vec::new(),
    };

    if let Some(reader) = sources.query {
        let check = recorded(MatchSource::QueryParams, check_query(range, reader))?;
        result.checks.push(check);
    }
    if let Some(scanner) = sources.text {
        let check = recorded(MatchSource::FreeText, check_text(range, scanner))?;
        result.checks.push(check);
    }
    if let Some(reader) = sources.panel {
        match check_panel(range, reader) {
            Ok(panel) => {
                result.anomalies.extend(panel.anomalies);
                result.confirmation = Some(panel.record);
                result.checks.push(panel.check);
            }
            Err(err) => result.checks.push(recorded(MatchSource::Panel, Err(err))?),
        }
    }

    result.matched = result.checks.iter().find(|c| c.matched).map(|c| c.source);
    match result.matched {
        Some(source) => tracing::info!(range = %range, %source, "date range reconciled"),
        None => tracing::debug!(range = %range, "date range not reconciled"),
    }
    for anomaly in &result.anomalies {
        tracing::warn!(range = %range, anomaly = %anomaly, "reconciliation anomaly");
    }
    Ok(result)
}

fn recorded(source: MatchSource, check: HarnessResult<SurfaceCheck>) -> HarnessResult<SurfaceCheck> {
    match check {
        Ok(check) => Ok(check),
        Err(err) if matches!(err, HarnessError::SessionClosed) || err.is_fatal_to_run() => Err(err),
        Err(err) => Ok(SurfaceCheck {
            source,
            matched: false,
            observed: format!("unreadable: {err}"),
        }),
    }
}

fn check_query(range: &DateRange, reader: &dyn QueryParamReader) -> HarnessResult<SurfaceCheck> {
    let checkin = reader.query_param(CHECKIN_PARAM)?;
    let checkout = reader.query_param(CHECKOUT_PARAM)?;
    let (start, end) = range.iso();
    Ok(SurfaceCheck {
        source: MatchSource::QueryParams,
        matched: checkin.as_deref() == Some(start.as_str())
            && checkout.as_deref() == Some(end.as_str()),
        observed: format!(
            "{CHECKIN_PARAM}={} {CHECKOUT_PARAM}={}",
            checkin.as_deref().unwrap_or("<absent>"),
            checkout.as_deref().unwrap_or("<absent>")
        ),
    })
}

fn check_text(range: &DateRange, scanner: &dyn FreeTextScanner) -> HarnessResult<SurfaceCheck> {
    let text = scanner.visible_text()?;
    let hit = DateFormat::ALL.iter().find(|format| {
        let (start, end) = range.format(**format);
        text.contains(&start) && text.contains(&end)
    });
    Ok(SurfaceCheck {
        source: MatchSource::FreeText,
        matched: hit.is_some(),
        observed: match hit {
            Some(format) => format!("both dates present ({format:?})"),
            None => format!("dates seen: [{}]", date_tokens(&text)?.join(", ")),
        },
    })
}

struct PanelReading {
    check: SurfaceCheck,
    record: ConfirmationRecord,
    anomalies: Vec<String>,
}

fn check_panel(range: &DateRange, reader: &dyn PanelReader) -> HarnessResult<PanelReading> {
    let raw = reader.panel_text()?;
    let (from_text, token_count) = ConfirmationRecord::extract(&raw)?;
    let strongs: Vec<String> = reader
        .strong_dates()?
        .into_iter()
        .map(|s| s.trim().to_string())
        .collect();
    let from_nodes = ConfirmationRecord {
        start: strongs.first().cloned().unwrap_or_default(),
        end: strongs.get(1).cloned().unwrap_or_default(),
        raw: strongs.join(" | "),
    };

    let mut anomalies = Vec::new();
    if token_count > 2 {
        anomalies.push(format!(
            "confirmation panel shows {token_count} dates; first two used"
        ));
    }

    let text_has_dates = token_count > 0;
    let nodes_have_dates = !from_nodes.start.is_empty();
    let diverged = text_has_dates
        && nodes_have_dates
        && from_text.range() != from_nodes.range();
    if diverged {
        anomalies.push(format!(
            "panel text reads {} -> {} but date nodes read {} -> {}",
            or_empty(&from_text.start),
            or_empty(&from_text.end),
            or_empty(&from_nodes.start),
            or_empty(&from_nodes.end)
        ));
    }

    let record = if text_has_dates { from_text } else { from_nodes };
    let matched = !diverged && record.range() == Some(*range);
    let observed = if record.start.is_empty() {
        "no dates found".to_string()
    } else if record.end.is_empty() {
        format!("{} -> <empty> (second date missing)", record.start)
    } else {
        format!("{} -> {}", record.start, record.end)
    };

    Ok(PanelReading {
        check: SurfaceCheck {
            source: MatchSource::Panel,
            matched,
            observed,
        },
        record,
        anomalies,
    })
}

fn or_empty(value: &str) -> &str {
    if value.is_empty() {
        "<empty>"
    } else {
        value
    }
}

/// Outcome of the calendar highlight check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarCheck {
    /// "Selected" markers found
    pub markers: usize,
    /// Day button for the check-in date present
    pub start_day_present: bool,
    /// Day button for the check-out date present
    pub end_day_present: bool,
    /// Labels seen, for diagnostics
    pub labels: Vec<String>,
}

impl CalendarCheck {
    /// At least one marker and both day buttons
    #[must_use]
    pub const fn passed(&self) -> bool {
        self.markers > 0 && self.start_day_present && self.end_day_present
    }

    /// Convert a failed check into [`HarnessError::AssertionFailed`]
    pub fn into_result(self) -> HarnessResult<Self> {
        if self.passed() {
            return Ok(self);
        }
        Err(HarnessError::assertion(format!(
            "calendar highlight mismatch: markers={}, start day present={}, end day present={}, day buttons=[{}]",
            self.markers,
            self.start_day_present,
            self.end_day_present,
            self.labels.join(", ")
        )))
    }
}

/// Whether a day-button label shows `day`, padded or not
#[must_use]
pub fn day_label_matches(label: &str, day: u32) -> bool {
    let label = label.trim();
    label == day.to_string() || label == format!("{day:02}")
}

/// Confirm a selection marker exists and both boundary days are in the grid
pub fn verify_calendar(range: &DateRange, reader: &dyn CalendarReader) -> HarnessResult<CalendarCheck> {
    use chrono::Datelike;

    let markers = reader.selected_marker_count()?;
    let labels: Vec<String> = reader
        .day_labels()?
        .into_iter()
        .map(|l| l.trim().to_string())
        .collect();
    let has = |day: u32| labels.iter().any(|l| day_label_matches(l, day));
    let check = CalendarCheck {
        markers,
        start_day_present: has(range.start().day()),
        end_day_present: has(range.end().day()),
        labels,
    };
    tracing::debug!(
        markers = check.markers,
        start = check.start_day_present,
        end = check.end_day_present,
        "calendar check"
    );
    Ok(check)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn date(iso: &str) -> NaiveDate {
        DateFormat::Iso.parse(iso).unwrap()
    }

    fn today() -> NaiveDate {
        date("2025-11-07")
    }

    mod range_tests {
        use super::*;

        #[test]
        fn test_offset_two_nights_three() {
            let range = compute_range(today(), 2, 3).unwrap();
            assert_eq!(
                range.iso(),
                ("2025-11-09".to_string(), "2025-11-12".to_string())
            );
            assert_eq!(range.nights(), 3);
        }

        #[test]
        fn test_negative_offset() {
            let range = compute_range(today(), -10, 1).unwrap();
            assert_eq!(range.start(), date("2025-10-28"));
            assert_eq!(range.end(), date("2025-10-29"));
        }

        #[test]
        fn test_zero_or_negative_nights_rejected() {
            assert!(matches!(
                compute_range(today(), 2, 0),
                Err(HarnessError::InvalidRange { nights: 0 })
            ));
            assert!(matches!(
                compute_range(today(), 2, -4),
                Err(HarnessError::InvalidRange { nights: -4 })
            ));
        }

        #[test]
        fn test_overflow_is_reported() {
            assert!(matches!(
                compute_range(NaiveDate::MAX, 1, 1),
                Err(HarnessError::DateOutOfRange { .. })
            ));
        }

        #[test]
        fn test_localized_format() {
            let range = compute_range(today(), 2, 1).unwrap();
            assert_eq!(
                range.localized(),
                ("09/11/2025".to_string(), "10/11/2025".to_string())
            );
        }

        #[test]
        fn test_new_rejects_unordered() {
            assert!(DateRange::new(today(), today()).is_err());
        }
    }

    mod surface_tests {
        use super::*;

        fn expected() -> DateRange {
            compute_range(today(), 2, 3).unwrap()
        }

        #[test]
        fn test_date_tokens_share_one_compiled_pattern() {
            let text = "Check-in 2025-11-09, check-out 12/11/2025, booked 2025-10-01";
            for _ in 0..3 {
                assert_eq!(
                    date_tokens(text).unwrap(),
                    vec!["2025-11-09", "12/11/2025", "2025-10-01"]
                );
            }
            let first: *const Regex = DATE_PATTERN.as_ref().unwrap();
            let second: *const Regex = DATE_PATTERN.as_ref().unwrap();
            assert_eq!(first, second);
        }

        #[test]
        fn test_query_params_win_over_stale_text() {
            let url = UrlParams::parse(
                "https://automationintesting.online/reservation/1?checkin=2025-11-09&checkout=2025-11-12",
            )
            .unwrap();
            let text = TextSnapshot("Selected: 01/01/2020 - 02/01/2020".to_string());
            let sources = ReconciliationSources::new().with_query(&url).with_text(&text);
            let result = verify_against_surfaces(&expected(), &sources).unwrap();
            assert_eq!(result.matched, Some(MatchSource::QueryParams));
            assert_eq!(result.checks.len(), 2);
            assert!(!result.checks[1].matched);
        }

        #[test]
        fn test_query_params_are_percent_decoded() {
            let url =
                UrlParams::parse("https://x.test/r?checkin=2025%2D11%2D09&checkout=2025-11-12").unwrap();
            assert_eq!(url.query_param("checkin").unwrap().as_deref(), Some("2025-11-09"));
            assert_eq!(url.query_param("missing").unwrap(), None);
        }

        #[test]
        fn test_free_text_accepts_localized() {
            let url = UrlParams::parse("https://x.test/reservation/1").unwrap();
            let text = TextSnapshot("Check in 09/11/2025 | Check out 12/11/2025".to_string());
            let sources = ReconciliationSources::new().with_query(&url).with_text(&text);
            let result = verify_against_surfaces(&expected(), &sources).unwrap();
            assert_eq!(result.matched, Some(MatchSource::FreeText));
        }

        #[test]
        fn test_free_text_needs_both_boundaries() {
            let text = TextSnapshot("Check in 2025-11-09".to_string());
            let sources = ReconciliationSources::new().with_text(&text);
            let result = verify_against_surfaces(&expected(), &sources).unwrap();
            assert!(!result.is_match());
            assert!(result.checks[0].observed.contains("2025-11-09"));
        }

        #[test]
        fn test_panel_two_dates() {
            let panel = PanelSnapshot {
                text: "Booking Confirmed\n2025-11-09 - 2025-11-12".to_string(),
                strongs: vec!["2025-11-09".to_string(), "2025-11-12".to_string()],
            };
            let sources = ReconciliationSources::new().with_panel(&panel);
            let result = verify_against_surfaces(&expected(), &sources).unwrap();
            assert_eq!(result.matched, Some(MatchSource::Panel));
            assert!(result.anomalies.is_empty());
            let record = result.confirmation.unwrap();
            assert_eq!(record.start, "2025-11-09");
            assert_eq!(record.end, "2025-11-12");
        }

        #[test]
        fn test_panel_single_date_fails_without_error() {
            let panel = PanelSnapshot {
                text: "Booking Confirmed\n2025-11-09".to_string(),
                strongs: Vec::new(),
            };
            let sources = ReconciliationSources::new().with_panel(&panel);
            let result = verify_against_surfaces(&expected(), &sources).unwrap();
            assert!(!result.is_match());
            let record = result.confirmation.clone().unwrap();
            assert_eq!(record.start, "2025-11-09");
            assert_eq!(record.end, "");
            assert!(result.checks[0].observed.contains("second date missing"));
            assert!(result.into_result().is_err());
        }

        #[test]
        fn test_panel_falls_back_to_nodes() {
            let panel = PanelSnapshot {
                text: "Booking Confirmed".to_string(),
                strongs: vec!["2025-11-09".to_string(), "2025-11-12".to_string()],
            };
            let sources = ReconciliationSources::new().with_panel(&panel);
            let result = verify_against_surfaces(&expected(), &sources).unwrap();
            assert_eq!(result.matched, Some(MatchSource::Panel));
        }

        #[test]
        fn test_panel_divergence_is_anomaly() {
            let panel = PanelSnapshot {
                text: "2025-11-09 - 2025-11-12".to_string(),
                strongs: vec!["2025-11-10".to_string(), "2025-11-12".to_string()],
            };
            let sources = ReconciliationSources::new().with_panel(&panel);
            let result = verify_against_surfaces(&expected(), &sources).unwrap();
            assert!(!result.is_match());
            assert_eq!(result.anomalies.len(), 1);
            assert!(result.diagnostic().contains("anomaly"));
        }

        #[test]
        fn test_panel_extra_dates_flagged() {
            let panel = PanelSnapshot {
                text: "2025-11-09 2025-11-12 2025-11-30".to_string(),
                strongs: Vec::new(),
            };
            let sources = ReconciliationSources::new().with_panel(&panel);
            let result = verify_against_surfaces(&expected(), &sources).unwrap();
            assert!(result.is_match());
            assert_eq!(result.anomalies.len(), 1);
        }

        struct ClosedPanel;

        impl PanelReader for ClosedPanel {
            fn panel_text(&self) -> HarnessResult<String> {
                Err(HarnessError::SessionClosed)
            }

            fn strong_dates(&self) -> HarnessResult<Vec<String>> {
                Err(HarnessError::SessionClosed)
            }
        }

        struct MissingPanel;

        impl PanelReader for MissingPanel {
            fn panel_text(&self) -> HarnessResult<String> {
                Err(HarnessError::ElementNotVisible {
                    intent: "Booking confirmation card".to_string(),
                    timeout_ms: 10,
                    attempted: Vec::new(),
                })
            }

            fn strong_dates(&self) -> HarnessResult<Vec<String>> {
                Ok(Vec::new())
            }
        }

        #[test]
        fn test_closed_session_propagates() {
            let sources = ReconciliationSources::new().with_panel(&ClosedPanel);
            assert!(matches!(
                verify_against_surfaces(&expected(), &sources),
                Err(HarnessError::SessionClosed)
            ));
        }

        #[test]
        fn test_unreadable_surface_is_recorded() {
            let sources = ReconciliationSources::new().with_panel(&MissingPanel);
            let result = verify_against_surfaces(&expected(), &sources).unwrap();
            assert!(!result.is_match());
            assert!(result.checks[0].observed.starts_with("unreadable"));
        }
    }

    mod calendar_tests {
        use super::*;

        struct Grid {
            markers: usize,
            labels: Vec<&'static str>,
        }

        impl CalendarReader for Grid {
            fn selected_marker_count(&self) -> HarnessResult<usize> {
                Ok(self.markers)
            }

            fn day_labels(&self) -> HarnessResult<Vec<String>> {
                Ok(self.labels.iter().map(ToString::to_string).collect())
            }
        }

        #[test]
        fn test_padded_and_unpadded_labels() {
            assert!(day_label_matches("9", 9));
            assert!(day_label_matches("09", 9));
            assert!(day_label_matches(" 12 ", 12));
            assert!(!day_label_matches("19", 9));
        }

        #[test]
        fn test_calendar_passes() {
            let range = compute_range(today(), 2, 1).unwrap();
            let grid = Grid {
                markers: 1,
                labels: vec!["08", "09", "10", "11"],
            };
            assert!(verify_calendar(&range, &grid).unwrap().passed());
        }

        #[test]
        fn test_calendar_without_marker_fails() {
            let range = compute_range(today(), 2, 1).unwrap();
            let grid = Grid {
                markers: 0,
                labels: vec!["9", "10"],
            };
            let check = verify_calendar(&range, &grid).unwrap();
            assert!(!check.passed());
            assert!(check.into_result().unwrap_err().to_string().contains("markers=0"));
        }
    }

    fn arb_date() -> impl Strategy<Value = NaiveDate> {
        (1990i32..2100, 1u32..=12, 1u32..=28)
            .prop_map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    proptest! {
        #[test]
        fn prop_range_invariants(base in arb_date(), offset in -3650i64..3650, nights in 1i64..90) {
            let range = compute_range(base, offset, nights).unwrap();
            prop_assert_eq!((range.start() - base).num_days(), offset);
            prop_assert_eq!(range.nights(), nights);
            prop_assert!(range.start() < range.end());
        }

        #[test]
        fn prop_non_positive_nights_rejected(base in arb_date(), offset in -365i64..365, nights in -30i64..1) {
            let rejected = matches!(
                compute_range(base, offset, nights),
                Err(HarnessError::InvalidRange { .. })
            );
            prop_assert!(rejected);
        }

        #[test]
        fn prop_formats_round_trip(base in arb_date(), offset in -365i64..365, nights in 1i64..30) {
            let range = compute_range(base, offset, nights).unwrap();
            for format in DateFormat::ALL {
                let (start, end) = range.format(format);
                prop_assert_eq!(DateRange::parse(&start, &end, format), Some(range));
            }
        }
    }
}
