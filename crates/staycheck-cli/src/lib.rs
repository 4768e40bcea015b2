//! Staycheck CLI library
//!
//! Command definitions, logging setup, verdict output and the scenario
//! handlers behind the `staycheck` binary.

#![warn(missing_docs)]

mod commands;
mod error;
pub mod handlers;
pub mod logging;
mod output;

pub use commands::{BookArgs, Cli, Commands, ContactArgs, DatesArgs, StayArgs, ValidationArgs};
pub use error::{CliError, CliResult};
pub use handlers::Context;
pub use output::{ColorChoice, Reporter};
