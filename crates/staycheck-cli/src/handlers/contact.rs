//! `staycheck contact`: send a message through the contact form

use super::{data, Context};
use crate::commands::ContactArgs;
use crate::error::CliResult;
use crate::output::Reporter;
use staycheck::pages::{ContactForm, ContactPage, HomePage};

/// Heading prefix shown after a successful submission
pub const CONFIRMATION_PREFIX: &str = "Thanks for getting in touch";

/// Unique, valid values for one submission
#[must_use]
pub fn generated_form() -> ContactForm {
    let mut rng = rand::thread_rng();
    let (first, last) = data::person(&mut rng);
    ContactForm {
        email: data::email(&mut rng, &first, &last),
        phone: data::uk_mobile(&mut rng),
        subject: data::subject(&mut rng),
        message: data::message(&mut rng),
        name: format!("{first} {last}"),
    }
}

/// Generated form with any explicit values applied
#[must_use]
pub fn form_from_args(args: &ContactArgs) -> ContactForm {
    let mut form = generated_form();
    if let Some(name) = &args.name {
        form.name.clone_from(name);
    }
    if let Some(subject) = &args.subject {
        form.subject.clone_from(subject);
    }
    form
}

/// Compare the confirmation against what was sent; returns whether all matched
pub fn check_confirmation(
    form: &ContactForm,
    heading: &str,
    subject: &str,
    reporter: &Reporter,
) -> bool {
    let first_name = form.name.split_whitespace().next().unwrap_or_default();
    let mut passed = reporter.check(
        heading.starts_with(CONFIRMATION_PREFIX),
        &format!("confirmation heading '{heading}'"),
    );
    passed &= reporter.check(
        heading.contains(first_name),
        &format!("heading names the sender '{first_name}'"),
    );
    passed &= reporter.check(
        subject == form.subject,
        &format!("subject echoed as '{subject}'"),
    );
    passed
}

/// Run the contact scenario
pub fn execute_contact(ctx: &Context, args: &ContactArgs) -> CliResult<()> {
    let form = form_from_args(args);

    ctx.run_scenario("contact", |actions, reporter| {
        let home = HomePage::new(actions, &ctx.config.base_url);
        home.open()?;
        home.open_contact()?;

        let contact = ContactPage::new(actions);
        contact.wait_for_section()?;
        let mut passed = reporter.check(contact.all_fields_visible()?, "contact fields visible");
        contact.fill(&form)?;
        contact.submit()?;

        let heading = contact.confirmation_heading()?;
        let subject = contact.confirmation_subject()?;
        passed &= check_confirmation(&form, &heading, &subject, reporter);
        Ok(passed)
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::output::ColorChoice;

    #[test]
    fn test_generated_form_is_plausible() {
        let form = generated_form();
        assert_eq!(form.name.split_whitespace().count(), 2);
        assert!(form.email.ends_with("@example.test"));
        assert_eq!(form.phone.len(), 11);
        assert!(form.phone.chars().all(|c| c.is_ascii_digit()));
        assert!(form.subject.len() >= 5);
        assert!(form.message.len() >= 20);
    }

    #[test]
    fn test_explicit_name_and_subject() {
        let form = form_from_args(&ContactArgs {
            name: Some("Grace Hopper".to_string()),
            subject: Some("Early check-in".to_string()),
        });
        assert_eq!(form.name, "Grace Hopper");
        assert_eq!(form.subject, "Early check-in");
        assert!(form.email.contains('@'));
    }

    #[test]
    fn test_confirmation_matches_sender() {
        let reporter = Reporter::new(ColorChoice::Never);
        let form = form_from_args(&ContactArgs {
            name: Some("Grace Hopper".to_string()),
            subject: Some("Early check-in".to_string()),
        });
        assert!(check_confirmation(
            &form,
            "Thanks for getting in touch Grace Hopper!",
            "Early check-in",
            &reporter
        ));
        assert!(!check_confirmation(
            &form,
            "Thanks for getting in touch Alan Turing!",
            "Early check-in",
            &reporter
        ));
        assert!(!check_confirmation(
            &form,
            "Thanks for getting in touch Grace Hopper!",
            "Late check-out",
            &reporter
        ));
    }
}
