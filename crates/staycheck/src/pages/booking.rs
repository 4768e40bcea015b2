//! Room reservation page.
//!
//! Besides its own flows the page is the live source for every reconciliation
//! surface: it reads query parameters from the current address, scans
//! date-shaped text, and exposes the confirmation card and the month grid.

use super::PageObject;
use crate::action::{ActionEngine, ActionOutcome};
use crate::driver::Key;
use crate::locator::ElementIntent;
use crate::result::HarnessResult;
use crate::temporal::{
    verify_against_surfaces, verify_calendar, CalendarCheck, CalendarReader, DateRange,
    FreeTextScanner, MatchResult, PanelReader, QueryParamReader, ReconciliationSources, UrlParams,
};
use crate::validation::{ValidationAggregator, ValidationMessageSet};
use std::time::Duration;

const CONFIRMED_HEADING: &str =
    "//*[self::h2 or self::h3][contains(normalize-space(),'Booking Confirmed')]";

/// Reservation page reached from a room card
#[derive(Debug)]
pub struct BookingPage<'e, 's> {
    actions: &'e ActionEngine<'s>,
    book_this_room: ElementIntent,
    room_description: ElementIntent,
    per_night: ElementIntent,
    price_summary: ElementIntent,
    date_text: ElementIntent,
    calendar: ElementIntent,
    month_view: ElementIntent,
    selected_markers: ElementIntent,
    day_buttons: ElementIntent,
    first_name: ElementIntent,
    last_name: ElementIntent,
    email: ElementIntent,
    phone: ElementIntent,
    reserve_now: ElementIntent,
    confirmed_heading: ElementIntent,
    confirmed_card: ElementIntent,
    confirmed_dates: ElementIntent,
    return_home: ElementIntent,
    cancel: ElementIntent,
}

impl<'e, 's> BookingPage<'e, 's> {
    /// Page bound to an engine
    #[must_use]
    pub fn new(actions: &'e ActionEngine<'s>) -> Self {
        Self {
            actions,
            book_this_room: ElementIntent::new("Book This Room heading")
                .xpath("//*[self::h1 or self::h2 or self::h3][contains(.,'Book This Room')]"),
            room_description: ElementIntent::new("Room Description block").xpath(
                "//*[self::h2 or self::h3 or self::h4 or contains(@class,'card-title')]\
                 [contains(.,'Room Description')]",
            ),
            per_night: ElementIntent::new("Per-night price").xpath("//*[contains(.,'per night')]"),
            price_summary: ElementIntent::new("Price Summary block").xpath(
                "//*[contains(translate(., 'PRICE', 'price'),'price') \
                 and contains(translate(., 'SUMMARY', 'summary'),'summary')]",
            ),
            date_text: ElementIntent::new("Date-like text")
                .xpath("//*[contains(text(),'/') or contains(text(),'-')][not(self::script)]"),
            calendar: ElementIntent::new("Availability calendar").css(".rbc-calendar"),
            month_view: ElementIntent::new("Calendar month view").css(".rbc-month-view"),
            selected_markers: ElementIntent::new("Selected range marker").xpath(
                "//div[contains(@class,'rbc-event-content')][normalize-space()='Selected']",
            ),
            day_buttons: ElementIntent::new("Calendar day button")
                .xpath("//div[contains(@class,'rbc-month-view')]//button[@type='button']"),
            first_name: ElementIntent::new("First name field").css("input[name='firstname']"),
            last_name: ElementIntent::new("Last name field").css("input[name='lastname']"),
            email: ElementIntent::new("Email field").css("input[name='email']"),
            phone: ElementIntent::new("Phone field").css("input[name='phone']"),
            reserve_now: ElementIntent::new("Reserve Now button")
                .xpath("//button[normalize-space()='Reserve Now']"),
            confirmed_heading: ElementIntent::new("Booking Confirmed heading")
                .xpath(CONFIRMED_HEADING),
            confirmed_card: ElementIntent::new("Booking confirmation card").xpath(format!(
                "{CONFIRMED_HEADING}/ancestor::div[contains(@class,'card')][1]"
            )),
            confirmed_dates: ElementIntent::new("Confirmed date").xpath(
                "//div[contains(@class,'booking-card')]//p[contains(@class,'text-center')]//strong",
            ),
            return_home: ElementIntent::new("Return home link")
                .xpath("//a[normalize-space()='Return home' or normalize-space()='Return Home']"),
            cancel: ElementIntent::new("Cancel button").xpath("//button[normalize-space()='Cancel']"),
        }
    }

    /// "Room Description" block shows up
    pub fn room_description_visible(&self) -> HarnessResult<bool> {
        self.actions.becomes_visible(&self.room_description)
    }

    /// "per night" text shows up
    pub fn per_night_visible(&self) -> HarnessResult<bool> {
        self.actions.becomes_visible(&self.per_night)
    }

    /// "Price Summary" block shows up
    pub fn price_summary_visible(&self) -> HarnessResult<bool> {
        self.actions.becomes_visible(&self.price_summary)
    }

    /// Case-insensitive search for the room title in the page source
    pub fn mentions_room(&self, title: &str) -> HarnessResult<bool> {
        let source = self.actions.session().page_source()?;
        Ok(source.to_lowercase().contains(&title.trim().to_lowercase()))
    }

    /// Current address
    pub fn current_url(&self) -> HarnessResult<String> {
        self.actions.session().current_url()
    }

    /// Center the calendar in the viewport
    pub fn scroll_to_calendar(&self) -> HarnessResult<()> {
        self.actions.scroll_to(&self.calendar).map(|_| ())
    }

    /// Center the Reserve Now button in the viewport
    pub fn scroll_to_reserve(&self) -> HarnessResult<()> {
        self.actions.scroll_to(&self.reserve_now).map(|_| ())
    }

    /// Open the booking form, or submit it once filled
    pub fn click_reserve_now(&self) -> HarnessResult<ActionOutcome> {
        self.actions.click(&self.reserve_now)
    }

    /// All four guest fields show up
    pub fn booking_fields_visible(&self) -> HarnessResult<bool> {
        let mut all = true;
        for field in [&self.first_name, &self.last_name, &self.email, &self.phone] {
            let visible = self.actions.becomes_visible(field)?;
            tracing::debug!(field = field.name(), visible, "booking field");
            all &= visible;
        }
        Ok(all)
    }

    /// Replace each guest field, tabbing out after every one
    pub fn fill_booking_form(
        &self,
        first_name: &str,
        last_name: &str,
        email: &str,
        phone: &str,
    ) -> HarnessResult<Vec<ActionOutcome>> {
        let fields = [
            (&self.first_name, first_name),
            (&self.last_name, last_name),
            (&self.email, email),
            (&self.phone, phone),
        ];
        fields
            .into_iter()
            .map(|(intent, value)| self.actions.type_and_commit(intent, value, &[Key::Tab]))
            .collect()
    }

    /// "Booking Confirmed" heading shows up
    pub fn is_booking_confirmed(&self) -> HarnessResult<bool> {
        self.actions.becomes_visible(&self.confirmed_heading)
    }

    /// Leave the confirmation for the home page
    pub fn click_return_home(&self) -> HarnessResult<ActionOutcome> {
        self.actions.click(&self.return_home)
    }

    /// Abandon the booking form
    pub fn click_cancel(&self) -> HarnessResult<ActionOutcome> {
        self.actions.click(&self.cancel)
    }

    /// Messages shown after a rejected submission
    pub fn validation_messages(&self, timeout: Duration) -> HarnessResult<ValidationMessageSet> {
        ValidationAggregator::new(self.actions).collect(timeout)
    }

    /// Reconcile `range` against the address and visible date text
    pub fn verify_dates(&self, range: &DateRange) -> HarnessResult<MatchResult> {
        let sources = ReconciliationSources::new().with_query(self).with_text(self);
        verify_against_surfaces(range, &sources)
    }

    /// Reconcile `range` against the address, visible text and confirmation card
    pub fn verify_confirmed_dates(&self, range: &DateRange) -> HarnessResult<MatchResult> {
        let sources = ReconciliationSources::new()
            .with_query(self)
            .with_text(self)
            .with_panel(self);
        verify_against_surfaces(range, &sources)
    }

    /// Check the month grid highlights `range`
    pub fn verify_calendar(&self, range: &DateRange) -> HarnessResult<CalendarCheck> {
        self.scroll_to_calendar()?;
        verify_calendar(range, self)
    }
}

impl QueryParamReader for BookingPage<'_, '_> {
    fn query_param(&self, name: &str) -> HarnessResult<Option<String>> {
        UrlParams::parse(&self.current_url()?)?.query_param(name)
    }
}

impl FreeTextScanner for BookingPage<'_, '_> {
    fn visible_text(&self) -> HarnessResult<String> {
        let texts = self.actions.visible_texts(&self.date_text, None)?;
        Ok(texts
            .into_iter()
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" | "))
    }
}

impl PanelReader for BookingPage<'_, '_> {
    fn panel_text(&self) -> HarnessResult<String> {
        self.actions.read_text(&self.confirmed_card)
    }

    fn strong_dates(&self) -> HarnessResult<Vec<String>> {
        self.actions.visible_texts(&self.confirmed_dates, None)
    }
}

impl CalendarReader for BookingPage<'_, '_> {
    fn selected_marker_count(&self) -> HarnessResult<usize> {
        self.actions.wait_visible(&self.calendar)?;
        let count = self.actions.count(&self.selected_markers)?;
        tracing::debug!(count, "selected markers");
        Ok(count)
    }

    fn day_labels(&self) -> HarnessResult<Vec<String>> {
        self.actions.wait_visible(&self.month_view)?;
        self.actions.visible_texts(&self.day_buttons, None)
    }
}

impl PageObject for BookingPage<'_, '_> {
    fn page_name(&self) -> &'static str {
        "booking"
    }

    fn url_pattern(&self) -> &str {
        "/reservation/"
    }

    fn is_loaded(&self) -> HarnessResult<bool> {
        self.actions.becomes_visible(&self.book_this_room)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::action::{ActionConfig, Strategy};
    use crate::driver::mock::{MockDriver, MockElement};
    use crate::locator::Query;
    use crate::session::{Session, SessionConfig};
    use crate::temporal::{DateFormat, MatchSource};

    const ROOM_URL: &str =
        "https://automationintesting.online/reservation/1?checkin=2025-11-09&checkout=2025-11-12";

    fn range() -> DateRange {
        DateRange::parse("2025-11-09", "2025-11-12", DateFormat::Iso).unwrap()
    }

    fn xpath_of(intent: &ElementIntent) -> Query {
        intent.queries()[0].clone()
    }

    fn session_for(mock: &MockDriver) -> Session {
        Session::from_driver(Box::new(mock.clone()), SessionConfig::default())
    }

    mod reader_tests {
        use super::*;

        #[test]
        fn test_query_params_from_current_url() {
            let mock = MockDriver::new();
            mock.set_url(ROOM_URL);
            let session = session_for(&mock);
            let actions = ActionEngine::with_config(&session, ActionConfig::fast());
            let page = BookingPage::new(&actions);
            assert_eq!(page.query_param("checkin").unwrap().as_deref(), Some("2025-11-09"));
            assert_eq!(page.query_param("missing").unwrap(), None);
        }

        #[test]
        fn test_visible_text_joins_date_nodes() {
            let mock = MockDriver::new();
            let session = session_for(&mock);
            let actions = ActionEngine::with_config(&session, ActionConfig::fast());
            let page = BookingPage::new(&actions);
            let query = xpath_of(&page.date_text);
            mock.add(MockElement::new("a").bind(query.clone()).text("09/11/2025"));
            mock.add(MockElement::new("b").bind(query.clone()).text("12/11/2025"));
            mock.add(MockElement::new("c").bind(query).text("2024-01-01").hidden());
            assert_eq!(page.visible_text().unwrap(), "09/11/2025 | 12/11/2025");
        }

        #[test]
        fn test_mentions_room_ignores_case() {
            let mock = MockDriver::new();
            mock.set_source("<h1>Double Room</h1>");
            let session = session_for(&mock);
            let actions = ActionEngine::with_config(&session, ActionConfig::fast());
            let page = BookingPage::new(&actions);
            assert!(page.mentions_room("double").unwrap());
            assert!(!page.mentions_room("Suite").unwrap());
        }
    }

    mod flow_tests {
        use super::*;

        #[test]
        fn test_fill_booking_form_types_every_field() {
            let mock = MockDriver::new();
            for name in ["firstname", "lastname", "email", "phone"] {
                mock.add(
                    MockElement::new(name)
                        .bind(Query::css(format!("input[name='{name}']")))
                        .value("stale")
                        .sticky(),
                );
            }
            let session = session_for(&mock);
            let actions = ActionEngine::with_config(&session, ActionConfig::fast());
            let page = BookingPage::new(&actions);
            assert!(page.booking_fields_visible().unwrap());
            let outcomes = page
                .fill_booking_form("Ada", "Lovelace", "ada@example.com", "01234567890")
                .unwrap();
            assert_eq!(outcomes.len(), 4);
            assert_eq!(mock.value_of("firstname").unwrap(), "Ada");
            assert_eq!(mock.value_of("phone").unwrap(), "01234567890");
        }

        #[test]
        fn test_reserve_falls_back_when_header_covers_button() {
            let mock = MockDriver::new();
            let session = session_for(&mock);
            let actions = ActionEngine::with_config(&session, ActionConfig::fast());
            let page = BookingPage::new(&actions);
            mock.add(
                MockElement::new("reserve")
                    .bind(xpath_of(&page.reserve_now))
                    .block(Strategy::Direct),
            );
            let outcome = page.click_reserve_now().unwrap();
            assert_eq!(outcome.strategy, Strategy::Pointer);
            assert!(mock.was_called("pointer_click:reserve"));
        }

        #[test]
        fn test_confirmed_dates_reconcile_through_all_surfaces() {
            let mock = MockDriver::new();
            mock.set_url(ROOM_URL);
            let session = session_for(&mock);
            let actions = ActionEngine::with_config(&session, ActionConfig::fast());
            let page = BookingPage::new(&actions);
            mock.add(
                MockElement::new("heading")
                    .bind(xpath_of(&page.confirmed_heading))
                    .text("Booking Confirmed"),
            );
            mock.add(
                MockElement::new("card")
                    .bind(xpath_of(&page.confirmed_card))
                    .text("Booking Confirmed\nYour booking has been confirmed for:\n2025-11-09 - 2025-11-12"),
            );
            mock.add(
                MockElement::new("s1")
                    .bind(xpath_of(&page.confirmed_dates))
                    .text("2025-11-09"),
            );
            mock.add(
                MockElement::new("s2")
                    .bind(xpath_of(&page.confirmed_dates))
                    .text("2025-11-12"),
            );
            assert!(page.is_booking_confirmed().unwrap());
            let result = page.verify_confirmed_dates(&range()).unwrap();
            assert_eq!(result.matched, Some(MatchSource::QueryParams));
            assert_eq!(result.checks.len(), 3);
            assert!(result.checks.iter().all(|c| c.matched));
            assert!(result.anomalies.is_empty());
        }

        #[test]
        fn test_calendar_highlight() {
            let mock = MockDriver::new();
            let session = session_for(&mock);
            let actions = ActionEngine::with_config(&session, ActionConfig::fast());
            let page = BookingPage::new(&actions);
            mock.add(MockElement::new("cal").bind(Query::css(".rbc-calendar")));
            mock.add(MockElement::new("month").bind(Query::css(".rbc-month-view")));
            mock.add(
                MockElement::new("sel")
                    .bind(xpath_of(&page.selected_markers))
                    .text("Selected"),
            );
            for (i, label) in ["08", "09", "10", "11", "12"].iter().enumerate() {
                mock.add(
                    MockElement::new(format!("d{i}"))
                        .bind(xpath_of(&page.day_buttons))
                        .text(*label),
                );
            }
            let check = page.verify_calendar(&range()).unwrap();
            assert!(check.passed());
            assert_eq!(check.markers, 1);
            assert!(mock.was_called("scroll_into_view:cal"));
        }
    }
}
