//! CLI command definitions

use crate::output::ColorChoice;
use clap::{Args, Parser, Subcommand};
use staycheck::config::ConfigKey;
use staycheck::{Backend, ConfigSources};
use std::path::PathBuf;

/// Staycheck: resilient end-to-end checks for the booking site
#[derive(Parser, Debug)]
#[command(name = "staycheck")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v info, -vv debug, -vvv trace); `RUST_LOG` wins
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Color output
    #[arg(long, value_enum, default_value = "auto", global = true)]
    pub color: ColorChoice,

    /// Browser backend
    #[arg(long, global = true, value_parser = parse_backend)]
    pub browser: Option<Backend>,

    /// Run without a visible window
    #[arg(long, global = true)]
    pub headless: bool,

    /// Remote WebDriver endpoint
    #[arg(long, global = true)]
    pub remote_url: Option<String>,

    /// Application base URL
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Implicit wait in seconds
    #[arg(long, global = true)]
    pub implicit_wait: Option<u64>,

    /// Page load timeout in seconds
    #[arg(long, global = true)]
    pub page_load_timeout: Option<u64>,

    /// YAML configuration file (default: ./staycheck.yaml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Flags as the explicit-property configuration layer
    #[must_use]
    pub fn config_sources(&self) -> ConfigSources {
        ConfigSources::new()
            .with_optional_property(ConfigKey::Browser, self.browser.map(|b| b.to_string()))
            .with_optional_property(ConfigKey::Headless, self.headless.then_some("true"))
            .with_optional_property(ConfigKey::RemoteUrl, self.remote_url.clone())
            .with_optional_property(ConfigKey::BaseUrl, self.base_url.clone())
            .with_optional_property(
                ConfigKey::ImplicitWait,
                self.implicit_wait.map(|s| s.to_string()),
            )
            .with_optional_property(
                ConfigKey::PageLoadTimeout,
                self.page_load_timeout.map(|s| s.to_string()),
            )
    }
}

fn parse_backend(value: &str) -> Result<Backend, String> {
    value.parse::<Backend>().map_err(|e| e.to_string())
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compute a stay relative to today without opening a browser
    Dates(DatesArgs),

    /// Search availability and count bookable rooms
    Availability(StayArgs),

    /// Book the first room and reconcile the dates on every surface
    Book(BookArgs),

    /// Send a message through the contact form
    Contact(ContactArgs),

    /// Submit an empty booking form and check the validation messages
    BookingValidation(ValidationArgs),
}

/// Stay offset and length
#[derive(Args, Debug, Clone, Copy)]
pub struct StayArgs {
    /// Days from today until check-in
    #[arg(long, default_value = "1", allow_hyphen_values = true)]
    pub offset: i64,

    /// Nights to stay
    #[arg(long, default_value = "2", allow_hyphen_values = true)]
    pub nights: i64,
}

/// Arguments for the dates command
#[derive(Args, Debug, Clone)]
pub struct DatesArgs {
    /// Stay to compute
    #[command(flatten)]
    pub stay: StayArgs,

    /// Pin "today" to an ISO date instead of the system clock
    #[arg(long)]
    pub today: Option<String>,

    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the book command
#[derive(Args, Debug, Clone)]
pub struct BookArgs {
    /// Stay to book
    #[command(flatten)]
    pub stay: StayArgs,

    /// Guest first name (generated when omitted)
    #[arg(long)]
    pub first_name: Option<String>,

    /// Guest last name (generated when omitted)
    #[arg(long)]
    pub last_name: Option<String>,

    /// Guest email (generated when omitted)
    #[arg(long)]
    pub email: Option<String>,

    /// Guest phone (generated when omitted)
    #[arg(long)]
    pub phone: Option<String>,
}

/// Arguments for the contact command
#[derive(Args, Debug, Clone)]
pub struct ContactArgs {
    /// Sender name (generated when omitted)
    #[arg(long)]
    pub name: Option<String>,

    /// Subject line (generated when omitted)
    #[arg(long)]
    pub subject: Option<String>,
}

/// Arguments for the booking-validation command
#[derive(Args, Debug, Clone)]
pub struct ValidationArgs {
    /// Stay to open the booking page for
    #[command(flatten)]
    pub stay: StayArgs,

    /// Phrase that must appear among the messages; repeatable
    #[arg(long = "expect")]
    pub expected: Vec<String>,

    /// Seconds to wait for messages to render
    #[arg(long, default_value = "5")]
    pub timeout: u64,
}
