//! Local relay for browser-hosted MFA frames.
//!
//! Some factors (Duo Web v2) can only be completed inside a web frame. The
//! relay binds an ephemeral loopback port, serves a page embedding the
//! provider-issued frame parameters and, in proxy mode, forwards the frame's
//! completion POST to the provider and hands the provider's response back
//! to the waiting caller through a one-shot channel.

mod browser;
mod page;
mod server;

pub use browser::{BrowserOpener, SystemBrowser};
pub use page::{DuoFrame, DEFAULT_DUO_SCRIPT_URL};
pub use server::{CallbackRelay, RelayMode, POST_ACTION_ROUTE};

#[cfg(any(test, feature = "test-util"))]
pub use browser::RecordingBrowser;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Failed to start callback relay: {0}")]
    Bind(std::io::Error),

    #[error("Callback relay I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Http(#[from] broker_http::HttpError),

    #[error("Failed to open browser: {0}")]
    Browser(String),

    #[error("Timed out after {0}s waiting for the browser callback")]
    Timeout(u64),

    #[error("Interrupted while waiting for the browser callback")]
    Interrupted,

    #[error("Completion body of {size} bytes exceeds the {limit} byte limit")]
    BodyTooLarge { size: usize, limit: usize },

    /// The relay stopped before a completion arrived, or it never relays one.
    #[error("Callback relay closed without a completion")]
    Closed,
}

pub type RelayResult<T> = Result<T, RelayError>;
