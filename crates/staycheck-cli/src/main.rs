//! Staycheck: resilient end-to-end checks for the booking site
//!
//! ## Usage
//!
//! ```bash
//! staycheck dates --offset 5 --nights 2     # Compute a stay, no browser
//! staycheck availability --headless         # Search and count rooms
//! staycheck book --browser firefox          # Book and reconcile dates
//! staycheck contact                         # Send a contact message
//! staycheck booking-validation              # Empty form is rejected
//! ```

use clap::Parser;
use staycheck::HarnessConfig;
use staycheck_cli::{handlers, logging, Cli, CliResult, Commands, Context, Reporter};
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(e.exit_status())
        }
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.json_logs)?;

    let context = || -> CliResult<Context> {
        let config = HarnessConfig::load(cli.config_sources(), cli.config.as_deref())?;
        tracing::debug!(?config, "configuration resolved");
        Ok(Context::new(config, Reporter::new(cli.color)))
    };

    match &cli.command {
        Commands::Dates(args) => handlers::execute_dates(args, &Reporter::new(cli.color)),
        Commands::Availability(args) => handlers::execute_availability(&context()?, *args),
        Commands::Book(args) => handlers::execute_book(&context()?, args),
        Commands::Contact(args) => handlers::execute_contact(&context()?, args),
        Commands::BookingValidation(args) => {
            handlers::execute_booking_validation(&context()?, args)
        }
    }
}
