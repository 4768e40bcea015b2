//! Staycheck: end-to-end harness for a hotel booking web application.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      STAYCHECK Architecture                      │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  SessionManager ──► Session ──► Driver (cdp | webdriver | mock)  │
//! │                        │                                         │
//! │                        ▼                                         │
//! │   LocatorResolver ◄── ActionEngine (Direct → Pointer → Forced)   │
//! │                        │                                         │
//! │                        ▼                                         │
//! │        Pages: HomePage │ BookingPage │ ContactPage               │
//! │                        │                                         │
//! │           ┌────────────┴─────────────┐                           │
//! │           ▼                          ▼                           │
//! │   temporal reconciliation    validation aggregation              │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use staycheck::{ActionEngine, HarnessConfig, SessionManager};
//! use staycheck::pages::HomePage;
//!
//! # fn main() -> staycheck::HarnessResult<()> {
//! let config = HarnessConfig::default();
//! let manager = SessionManager::default();
//! let session = manager.scoped(&config.session_config())?;
//! let actions = ActionEngine::new(&session);
//! let home = HomePage::new(&actions, &config.base_url);
//! home.open()?;
//! println!("{}", home.header_text()?);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod action;
pub mod clock;
pub mod config;
pub mod driver;
pub mod locator;
pub mod pages;
mod result;
pub mod session;
pub mod temporal;
pub mod validation;
pub mod wait;

pub use action::{ActionConfig, ActionEngine, ActionKind, ActionOutcome, Strategy};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{ConfigSources, HarnessConfig};
pub use driver::{Driver, ElementHandle, Key, KeyInput};
pub use locator::{ElementIntent, LocatorResolver, Query};
pub use result::{HarnessError, HarnessResult};
pub use session::{
    Backend, BrowserFactory, DriverFactory, Session, SessionConfig, SessionGuard, SessionManager,
};
#[cfg(unix)]
pub use session::{install_shutdown_hook, ShutdownHook};
pub use temporal::{compute_range, verify_against_surfaces, DateFormat, DateRange, MatchResult};
pub use validation::{ValidationAggregator, ValidationMessageSet};
