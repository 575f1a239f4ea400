//! SAML assertion consumption.
//!
//! Decodes a base64-or-raw `SAMLResponse`, parses its first attribute
//! statement into an ordered multi-valued map, and extracts the
//! `SAMLResponse` field from the auto-submitting HTML form identity
//! providers return to the browser.

mod assertion;
mod attributes;
mod form;

pub use assertion::SamlAssertion;
pub use attributes::SamlAttributes;
pub use form::extract_saml_response;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SamlError {
    /// The document is not well-formed XML.
    #[error("Invalid SAML assertion XML: {0}")]
    Xml(String),

    /// The HTML page had no `SAMLResponse` input.
    #[error("SAML response not found")]
    ResponseNotFound,
}

pub type SamlResult<T> = Result<T, SamlError>;
