use super::{displayed_text_within, PageObject};
use crate::action::{ActionEngine, ActionOutcome};
use crate::driver::Key;
use crate::locator::ElementIntent;
use crate::result::{HarnessError, HarnessResult};

/// Landing page: hero, availability search, room cards, navbar
#[derive(Debug)]
pub struct HomePage<'e, 's> {
    actions: &'e ActionEngine<'s>,
    base_url: String,
    header: ElementIntent,
    cookie_consent: ElementIntent,
    booking_section: ElementIntent,
    booking_section_title: ElementIntent,
    check_in: ElementIntent,
    check_out: ElementIntent,
    check_availability: ElementIntent,
    rooms_header: ElementIntent,
    rooms_section: ElementIntent,
    room_cards: ElementIntent,
    card_title: ElementIntent,
    card_price: ElementIntent,
    card_book: ElementIntent,
    navbar: ElementIntent,
    navbar_toggler: ElementIntent,
    contact_link: ElementIntent,
}

impl<'e, 's> HomePage<'e, 's> {
    /// Home page under `base_url`
    #[must_use]
    pub fn new(actions: &'e ActionEngine<'s>, base_url: impl Into<String>) -> Self {
        Self {
            actions,
            base_url: base_url.into(),
            header: ElementIntent::new("Hero header").css("h1.display-4.fw-bold.mb-4"),
            cookie_consent: ElementIntent::new("Cookie consent button").css("button.fc-cta-consent"),
            booking_section: ElementIntent::new("Booking section").css("section#booking"),
            booking_section_title: ElementIntent::new("Booking section title")
                .css("section#booking h3.card-title"),
            check_in: ElementIntent::new("Check-in date field")
                .xpath("//label[@for='checkin']/following-sibling::div//input")
                .css("section#booking input[name='checkin']"),
            check_out: ElementIntent::new("Check-out date field")
                .xpath("//label[@for='checkout']/following-sibling::div//input")
                .css("section#booking input[name='checkout']"),
            check_availability: ElementIntent::new("Check Availability button")
                .xpath("//button[contains(text(),'Check Availability')]"),
            rooms_header: ElementIntent::new("Our Rooms header").css("h2.display-5"),
            rooms_section: ElementIntent::new("Rooms section").css("section#rooms"),
            room_cards: ElementIntent::new("Room card").css("section#rooms .room-card"),
            card_title: ElementIntent::new("Room title").css("h5.card-title"),
            card_price: ElementIntent::new("Room price").css(".fw-bold.fs-5"),
            card_book: ElementIntent::new("Book now link").css("a.btn.btn-primary"),
            navbar: ElementIntent::new("Navbar").css("nav.navbar"),
            navbar_toggler: ElementIntent::new("Navbar toggler").css("button.navbar-toggler"),
            contact_link: ElementIntent::new("Contact nav link")
                .xpath("//nav//a[normalize-space()='Contact' or contains(@href,'#contact')]"),
        }
    }

    /// Navigate to the home page and dismiss the cookie banner if shown
    pub fn open(&self) -> HarnessResult<()> {
        let url = format!("{}/", self.base_url.trim_end_matches('/'));
        self.actions.session().navigate(&url)?;
        if self.actions.is_visible(&self.cookie_consent)? {
            self.actions.click(&self.cookie_consent)?;
            tracing::debug!("cookie banner dismissed");
        }
        Ok(())
    }

    /// Document title
    pub fn title(&self) -> HarnessResult<String> {
        self.actions.session().title()
    }

    /// Whether the hero header shows up
    pub fn header_visible(&self) -> HarnessResult<bool> {
        self.actions.becomes_visible(&self.header)
    }

    /// Hero header text
    pub fn header_text(&self) -> HarnessResult<String> {
        self.actions.read_text(&self.header)
    }

    /// Scroll the availability search into view
    pub fn scroll_to_booking_section(&self) -> HarnessResult<()> {
        self.actions.scroll_to(&self.booking_section).map(|_| ())
    }

    /// Title of the availability search card
    pub fn booking_section_title(&self) -> HarnessResult<String> {
        self.actions.read_text(&self.booking_section_title)
    }

    /// Pre-filled check-in value
    pub fn default_check_in(&self) -> HarnessResult<String> {
        Ok(self.actions.read_value(&self.check_in)?.trim().to_string())
    }

    /// Pre-filled check-out value
    pub fn default_check_out(&self) -> HarnessResult<String> {
        Ok(self.actions.read_value(&self.check_out)?.trim().to_string())
    }

    /// Replace both date fields, closing the picker after each
    pub fn enter_dates(&self, check_in: &str, check_out: &str) -> HarnessResult<Vec<ActionOutcome>> {
        let commit = [Key::Tab, Key::Escape];
        let first = self.actions.type_and_commit(&self.check_in, check_in, &commit)?;
        let second = self.actions.type_and_commit(&self.check_out, check_out, &commit)?;
        tracing::info!(check_in, check_out, "dates entered");
        Ok(vec![first, second])
    }

    /// Submit the availability search
    pub fn click_check_availability(&self) -> HarnessResult<ActionOutcome> {
        self.actions.click(&self.check_availability)
    }

    /// "Our Rooms" header text
    pub fn rooms_header_text(&self) -> HarnessResult<String> {
        self.actions.read_text(&self.rooms_header)
    }

    /// Cards with a visible title, a non-empty price and a visible Book button
    pub fn count_valid_room_cards(&self) -> HarnessResult<usize> {
        self.actions.wait_visible(&self.rooms_section)?;
        let cards = self.actions.resolver().find_all(&self.room_cards, None)?.elements;
        let mut valid = 0;
        for (index, card) in cards.iter().enumerate() {
            let title = displayed_text_within(self.actions, card, &self.card_title)?
                .filter(|t| !t.is_empty());
            let price = displayed_text_within(self.actions, card, &self.card_price)?
                .filter(|p| !p.is_empty());
            let book = displayed_text_within(self.actions, card, &self.card_book)?;
            if title.is_some() && price.is_some() && book.is_some() {
                valid += 1;
            } else {
                tracing::debug!(
                    card = index + 1,
                    title = title.is_some(),
                    price = price.is_some(),
                    book = book.is_some(),
                    "incomplete room card"
                );
            }
        }
        tracing::info!(cards = cards.len(), valid, "room cards checked");
        Ok(valid)
    }

    /// Click Book on the first card that shows one; returns that card's title
    pub fn click_first_book_now(&self) -> HarnessResult<String> {
        self.actions.wait_visible(&self.rooms_section)?;
        let cards = self.actions.resolver().find_all(&self.room_cards, None)?.elements;
        for card in &cards {
            let Some(title) = displayed_text_within(self.actions, card, &self.card_title)? else {
                continue;
            };
            if displayed_text_within(self.actions, card, &self.card_book)?.is_none() {
                continue;
            }
            self.actions.click_within(&self.card_book, card)?;
            tracing::info!(room = %title, "book now clicked");
            return Ok(title);
        }
        Err(HarnessError::NotFound {
            intent: "Room card with a visible Book now link".to_string(),
            attempted: self
                .room_cards
                .describe_queries()
                .into_iter()
                .chain(self.card_book.describe_queries())
                .collect(),
        })
    }

    /// Open the Contact section from the navbar, expanding it when collapsed
    pub fn open_contact(&self) -> HarnessResult<ActionOutcome> {
        self.actions.wait_visible(&self.navbar)?;
        if !self.actions.is_visible(&self.contact_link)?
            && self.actions.is_visible(&self.navbar_toggler)?
        {
            tracing::debug!("expanding collapsed navbar");
            self.actions.click(&self.navbar_toggler)?;
        }
        self.actions.click(&self.contact_link)
    }
}

impl PageObject for HomePage<'_, '_> {
    fn page_name(&self) -> &'static str {
        "home"
    }

    fn url_pattern(&self) -> &str {
        "/"
    }

    fn is_loaded(&self) -> HarnessResult<bool> {
        self.header_visible()
    }
}
