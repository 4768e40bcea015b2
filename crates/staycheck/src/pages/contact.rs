use super::PageObject;
use crate::action::{ActionEngine, ActionOutcome};
use crate::driver::ScrollBlock;
use crate::locator::{ElementIntent, Query};
use crate::result::HarnessResult;
use serde::{Deserialize, Serialize};

/// Values for the "Send Us a Message" form
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactForm {
    /// Full name
    pub name: String,
    /// Email address
    pub email: String,
    /// Phone number
    pub phone: String,
    /// Subject line
    pub subject: String,
    /// Message body
    pub message: String,
}

/// Contact section of the home page
#[derive(Debug)]
pub struct ContactPage<'e, 's> {
    actions: &'e ActionEngine<'s>,
    section: ElementIntent,
    heading: ElementIntent,
    name: ElementIntent,
    email: ElementIntent,
    phone: ElementIntent,
    subject: ElementIntent,
    message: ElementIntent,
    submit: ElementIntent,
    confirm_heading: ElementIntent,
    confirm_subject: ElementIntent,
}

impl<'e, 's> ContactPage<'e, 's> {
    /// Page bound to an engine
    #[must_use]
    pub fn new(actions: &'e ActionEngine<'s>) -> Self {
        let thanks = "//h3[starts-with(normalize-space(),'Thanks for getting in touch')]";
        Self {
            actions,
            section: ElementIntent::new("Contact section").css("section#contact"),
            heading: ElementIntent::new("Send Us a Message heading").xpath(
                "//section[@id='contact']//h3[contains(normalize-space(),'Send Us a Message')]",
            ),
            name: ElementIntent::new("Contact name field")
                .test_id("ContactName")
                .css("#name"),
            email: ElementIntent::new("Contact email field")
                .test_id("ContactEmail")
                .css("#email"),
            phone: ElementIntent::new("Contact phone field")
                .test_id("ContactPhone")
                .css("#phone"),
            subject: ElementIntent::new("Contact subject field")
                .test_id("ContactSubject")
                .css("#subject"),
            message: ElementIntent::new("Contact message field")
                .css("textarea[data-testid='ContactDescription']")
                .or(Query::css("textarea#description")),
            submit: ElementIntent::new("Contact Submit button")
                .xpath("//section[@id='contact']//button[normalize-space()='Submit']"),
            confirm_heading: ElementIntent::new("Contact confirmation heading").xpath(thanks),
            confirm_subject: ElementIntent::new("Contact confirmation subject").xpath(format!(
                "{thanks}/following::p[contains(translate(@style,\
                 'ABCDEFGHIJKLMNOPQRSTUVWXYZ','abcdefghijklmnopqrstuvwxyz'),'font-weight')][1]"
            )),
        }
    }

    /// Wait for the section and its heading, then align it to the top
    pub fn wait_for_section(&self) -> HarnessResult<()> {
        let section = self.actions.wait_visible(&self.section)?;
        self.actions.wait_visible(&self.heading)?;
        self.actions
            .session()
            .with_driver(|d| d.scroll_into_view(&section, ScrollBlock::Start))
    }

    /// Every form field shows up
    pub fn all_fields_visible(&self) -> HarnessResult<bool> {
        for field in self.fields() {
            if !self.actions.becomes_visible(field)? {
                tracing::debug!(field = field.name(), "contact field missing");
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Replace every field with `form`
    pub fn fill(&self, form: &ContactForm) -> HarnessResult<Vec<ActionOutcome>> {
        let values = [&form.name, &form.email, &form.phone, &form.subject, &form.message];
        let outcomes = self
            .fields()
            .into_iter()
            .zip(values)
            .map(|(intent, value)| self.actions.type_text(intent, value))
            .collect::<HarnessResult<Vec<_>>>()?;
        tracing::info!(subject = %form.subject, "contact form filled");
        Ok(outcomes)
    }

    /// Submit the form
    pub fn submit(&self) -> HarnessResult<ActionOutcome> {
        self.actions.click(&self.submit)
    }

    /// "Thanks for getting in touch ..." heading
    pub fn confirmation_heading(&self) -> HarnessResult<String> {
        self.actions.read_text(&self.confirm_heading)
    }

    /// Subject echoed back in bold under the heading
    pub fn confirmation_subject(&self) -> HarnessResult<String> {
        self.actions.read_text(&self.confirm_subject)
    }

    fn fields(&self) -> [&ElementIntent; 5] {
        [&self.name, &self.email, &self.phone, &self.subject, &self.message]
    }
}

impl PageObject for ContactPage<'_, '_> {
    fn page_name(&self) -> &'static str {
        "contact"
    }

    fn url_pattern(&self) -> &str {
        "/#contact"
    }

    fn is_loaded(&self) -> HarnessResult<bool> {
        self.actions.becomes_visible(&self.heading)
    }
}
