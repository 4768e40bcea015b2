//! `staycheck book`: book the first room end to end

use super::availability::{check_landing, search};
use super::{data, Context};
use crate::commands::BookArgs;
use crate::error::CliResult;
use crate::output::Reporter;
use staycheck::pages::{BookingPage, HomePage, PageObject};
use staycheck::DateRange;

/// Guest details for the booking form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guest {
    /// First name
    pub first_name: String,
    /// Last name
    pub last_name: String,
    /// Email address
    pub email: String,
    /// UK mobile number, `07` plus nine digits
    pub phone: String,
}

impl Guest {
    /// Unique guest the booking form accepts
    #[must_use]
    pub fn generated() -> Self {
        let mut rng = rand::thread_rng();
        let (first_name, last_name) = data::person(&mut rng);
        Self {
            email: data::email(&mut rng, &first_name, &last_name),
            phone: data::uk_mobile(&mut rng),
            first_name,
            last_name,
        }
    }

    /// Generated guest with any explicit values applied
    #[must_use]
    pub fn from_args(args: &BookArgs) -> Self {
        let generated = Self::generated();
        Self {
            first_name: args.first_name.clone().unwrap_or(generated.first_name),
            last_name: args.last_name.clone().unwrap_or(generated.last_name),
            email: args.email.clone().unwrap_or(generated.email),
            phone: args.phone.clone().unwrap_or(generated.phone),
        }
    }
}

/// Booking page checks up to and including the calendar highlight
fn check_booking_page(
    booking: &BookingPage<'_, '_>,
    room: &str,
    range: &DateRange,
    reporter: &Reporter,
) -> CliResult<bool> {
    let mut passed = reporter.check(booking.is_loaded()?, "booking page loaded");
    passed &= reporter.check(booking.mentions_room(room)?, &format!("page mentions '{room}'"));
    passed &= reporter.check(booking.room_description_visible()?, "room description visible");
    passed &= reporter.check(booking.per_night_visible()?, "price per night visible");

    let dates = booking.verify_dates(range)?;
    reporter.reconciliation("selected dates", &dates);
    passed &= dates.is_match();

    passed &= reporter.check(booking.price_summary_visible()?, "price summary visible");

    let calendar = booking.verify_calendar(range)?;
    passed &= reporter.check(
        calendar.passed(),
        &format!(
            "calendar highlight ({} marker(s), check-in day {}, check-out day {})",
            calendar.markers,
            if calendar.start_day_present { "shown" } else { "missing" },
            if calendar.end_day_present { "shown" } else { "missing" },
        ),
    );
    Ok(passed)
}

/// Run the booking scenario
pub fn execute_book(ctx: &Context, args: &BookArgs) -> CliResult<()> {
    let range = ctx.stay(args.stay.offset, args.stay.nights)?;
    let guest = Guest::from_args(args);

    ctx.run_scenario("book", |actions, reporter| {
        let home = HomePage::new(actions, &ctx.config.base_url);
        home.open()?;
        let mut passed = check_landing(&home, reporter)?;
        search(&home, &range, reporter)?;

        let room = home.click_first_book_now()?;
        reporter.info(&format!("booking '{room}'"));
        let booking = BookingPage::new(actions);
        passed &= check_booking_page(&booking, &room, &range, reporter)?;

        booking.scroll_to_reserve()?;
        booking.click_reserve_now()?;
        passed &= reporter.check(booking.booking_fields_visible()?, "guest fields visible");
        booking.fill_booking_form(&guest.first_name, &guest.last_name, &guest.email, &guest.phone)?;
        reporter.info(&format!(
            "guest {} {} <{}> {}",
            guest.first_name, guest.last_name, guest.email, guest.phone
        ));
        booking.scroll_to_reserve()?;
        booking.click_reserve_now()?;

        let confirmed = booking.is_booking_confirmed()?;
        passed &= reporter.check(confirmed, "booking confirmed");
        if confirmed {
            let record = booking.verify_confirmed_dates(&range)?;
            reporter.reconciliation("confirmed dates", &record);
            passed &= record.is_match();
            booking.click_return_home()?;
        }
        Ok(passed)
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::commands::StayArgs;

    #[test]
    fn test_generated_guest_is_accepted_shape() {
        let guest = Guest::generated();
        assert!(guest.first_name.len() >= 3);
        assert!(guest.last_name.len() >= 3);
        assert!(guest.email.ends_with("@example.test"));
        assert_eq!(guest.email, guest.email.to_lowercase());
        assert_eq!(guest.phone.len(), 11);
        assert!(guest.phone.starts_with("07"));
        assert!(guest.phone.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_explicit_values_win() {
        let args = BookArgs {
            stay: StayArgs { offset: 1, nights: 2 },
            first_name: Some("Ada".to_string()),
            last_name: None,
            email: Some("ada@example.test".to_string()),
            phone: None,
        };
        let guest = Guest::from_args(&args);
        assert_eq!(guest.first_name, "Ada");
        assert_eq!(guest.email, "ada@example.test");
        assert!(guest.last_name.len() >= 3);
        assert!(guest.phone.starts_with("07"));
    }
}
