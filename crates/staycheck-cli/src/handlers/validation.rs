//! `staycheck booking-validation`: empty submission must be rejected

use super::availability::search;
use super::Context;
use crate::commands::ValidationArgs;
use crate::error::CliResult;
use crate::output::Reporter;
use staycheck::pages::{BookingPage, HomePage};
use staycheck::ValidationMessageSet;
use std::time::Duration;

/// Phrases checked when none are given on the command line
pub const DEFAULT_PHRASES: [&str; 3] = [
    "Firstname should not be blank",
    "Lastname should not be blank",
    "must not be empty",
];

/// Phrases to look for: explicit ones, else [`DEFAULT_PHRASES`]
#[must_use]
pub fn expected_phrases(args: &ValidationArgs) -> Vec<String> {
    let explicit: Vec<String> = args
        .expected
        .iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();
    if explicit.is_empty() {
        DEFAULT_PHRASES.iter().map(ToString::to_string).collect()
    } else {
        explicit
    }
}

/// Report each expected phrase; returns whether all were present
pub fn check_phrases(messages: &ValidationMessageSet, phrases: &[String], reporter: &Reporter) -> bool {
    reporter.info(&format!("{} message(s): {}", messages.len(), messages.messages().join(" | ")));
    let borrowed: Vec<&str> = phrases.iter().map(String::as_str).collect();
    let missing = messages.missing_phrases(&borrowed);
    for phrase in &borrowed {
        reporter.check(!missing.contains(phrase), &format!("message contains '{phrase}'"));
    }
    missing.is_empty()
}

/// Run the validation scenario
pub fn execute_booking_validation(ctx: &Context, args: &ValidationArgs) -> CliResult<()> {
    let range = ctx.stay(args.stay.offset, args.stay.nights)?;
    let phrases = expected_phrases(args);
    let timeout = Duration::from_secs(args.timeout);

    ctx.run_scenario("booking-validation", |actions, reporter| {
        let home = HomePage::new(actions, &ctx.config.base_url);
        home.open()?;
        home.scroll_to_booking_section()?;
        search(&home, &range, reporter)?;
        let room = home.click_first_book_now()?;
        reporter.info(&format!("booking '{room}' with an empty form"));

        let booking = BookingPage::new(actions);
        booking.scroll_to_reserve()?;
        booking.click_reserve_now()?;
        booking.scroll_to_reserve()?;
        booking.click_reserve_now()?;

        let messages = booking.validation_messages(timeout)?;
        let passed = check_phrases(&messages, &phrases, reporter);
        booking.click_cancel()?;
        Ok(passed)
    })
}
