//! Configuration, paths and small shared helpers for credbroker.

mod config;
mod error;
mod logging;
mod paths;
mod poll;
mod urls;

pub use config::{Config, DEFAULT_LOG_LEVEL, DEFAULT_SSO_REGION};
pub use error::{CoreError, CoreResult};
pub use logging::init_logging;
pub use paths::Paths;
pub use poll::sleep_or_interrupt;
pub use urls::{is_url, url_has_domain};

/// Application name, used for the keychain service and client registration.
pub const APP_NAME: &str = "credbroker";
