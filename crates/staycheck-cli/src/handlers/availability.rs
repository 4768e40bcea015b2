//! `staycheck availability`: search a stay and count bookable rooms

use super::{Context, EXPECTED_BOOKING_TITLE, EXPECTED_HEADER, EXPECTED_ROOMS_HEADER};
use crate::commands::StayArgs;
use crate::error::CliResult;
use crate::output::Reporter;
use staycheck::pages::{HomePage, PageObject};
use staycheck::{DateFormat, DateRange};

/// Landing checks shared by the browser scenarios; returns whether all passed
pub(crate) fn check_landing(home: &HomePage<'_, '_>, reporter: &Reporter) -> CliResult<bool> {
    let mut passed = reporter.check(home.is_loaded()?, "hero header visible");
    let header = home.header_text()?;
    passed &= reporter.check(
        header == EXPECTED_HEADER,
        &format!("header reads '{header}'"),
    );
    home.scroll_to_booking_section()?;
    let title = home.booking_section_title()?;
    passed &= reporter.check(
        title == EXPECTED_BOOKING_TITLE,
        &format!("booking section titled '{title}'"),
    );
    Ok(passed)
}

/// Enter `range` in the localized form the date pickers accept and search
pub(crate) fn search(home: &HomePage<'_, '_>, range: &DateRange, reporter: &Reporter) -> CliResult<()> {
    let (check_in, check_out) = range.localized();
    home.enter_dates(&check_in, &check_out)?;
    home.click_check_availability()?;
    reporter.info(&format!("searched {check_in} -> {check_out}"));
    Ok(())
}

/// Run the availability scenario
pub fn execute_availability(ctx: &Context, args: StayArgs) -> CliResult<()> {
    let today = ctx.stay(0, 1)?;
    let range = ctx.stay(args.offset, args.nights)?;

    ctx.run_scenario("availability", |actions, reporter| {
        let home = HomePage::new(actions, &ctx.config.base_url);
        home.open()?;
        reporter.info(&format!("page title '{}'", home.title()?));
        let mut passed = check_landing(&home, reporter)?;

        let (expected_in, expected_out) = today.format(DateFormat::Localized);
        let check_in = home.default_check_in()?;
        let check_out = home.default_check_out()?;
        passed &= reporter.check(
            check_in == expected_in && check_out == expected_out,
            &format!("defaults {check_in} -> {check_out} (expected {expected_in} -> {expected_out})"),
        );

        search(&home, &range, reporter)?;
        let rooms = home.rooms_header_text()?;
        passed &= reporter.check(
            rooms == EXPECTED_ROOMS_HEADER,
            &format!("rooms header reads '{rooms}'"),
        );
        let valid = home.count_valid_room_cards()?;
        passed &= reporter.check(valid > 0, &format!("{valid} bookable room card(s)"));
        Ok(passed)
    })
}
