//! HTTP capability used by every provider integration.
//!
//! Providers never touch `reqwest` directly: they build an [`HttpRequest`],
//! hand it to an [`HttpClient`] and get status, headers and body back. The
//! client applies per-kind defaults (JSON for REST calls, HTML for
//! browser-style and SAML calls) and the transport underneath is swappable,
//! which is how provider state machines are tested without a network.

mod client;
mod request;
mod response;
mod transport;

#[cfg(any(test, feature = "test-util"))]
mod mock;

pub use client::HttpClient;
pub use request::{HttpRequest, RequestBody};
pub use response::{require_path, require_str_path, HttpResponse, RestResponse};
pub use reqwest::Method;
pub use transport::{HttpTransport, ReqwestTransport};

#[cfg(any(test, feature = "test-util"))]
pub use mock::MockTransport;

use saml_assertion::SamlError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HttpError {
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Transport failure not originating from reqwest.
    #[error("HTTP transport error: {0}")]
    Connection(String),

    #[error("Invalid request header {0}")]
    InvalidHeader(String),

    /// A key the caller relies on is absent from a JSON response.
    #[error("Missing key in response: {0}")]
    MissingKey(String),

    #[error("Unexpected type for {key}: expected {expected}")]
    UnexpectedType { key: String, expected: &'static str },

    #[error(transparent)]
    Saml(#[from] SamlError),
}

pub type HttpResult<T> = Result<T, HttpError>;
