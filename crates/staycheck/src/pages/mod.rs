//! Page façades for the booking site.
//!
//! Pages only name intents and sequence engine calls; waiting, scrolling and
//! fallback strategies live in [`crate::action`], date and message checks in
//! [`crate::temporal`] and [`crate::validation`].

mod booking;
mod contact;
mod home;

pub use booking::BookingPage;
pub use contact::{ContactForm, ContactPage};
pub use home::HomePage;

use crate::action::ActionEngine;
use crate::driver::ElementHandle;
use crate::locator::ElementIntent;
use crate::result::HarnessResult;

/// Common surface of every page
pub trait PageObject {
    /// Page name for logs
    fn page_name(&self) -> &'static str;

    /// Path fragment the page lives under
    fn url_pattern(&self) -> &str;

    /// Whether the page's landmark element became visible
    fn is_loaded(&self) -> HarnessResult<bool>;
}

/// Trimmed text of the first displayed match of `intent` inside `parent`
pub(crate) fn displayed_text_within(
    actions: &ActionEngine<'_>,
    parent: &ElementHandle,
    intent: &ElementIntent,
) -> HarnessResult<Option<String>> {
    let resolution = actions.resolver().find_all(intent, Some(parent))?;
    actions.session().with_driver(|d| {
        for element in &resolution.elements {
            if d.is_displayed(element)? {
                return Ok(Some(d.text(element)?.trim().to_string()));
            }
        }
        Ok(None)
    })
}
