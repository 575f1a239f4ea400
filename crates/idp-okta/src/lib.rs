//! Okta identity provider.
//!
//! Authenticates with the Okta Authentication API (password, then an MFA
//! factor when the org demands one), keeps the resulting `sid` session in
//! the `okta` record, lists the user's app links and fetches SAML
//! assertions for app URLs on the configured Okta domain.

mod client;
mod data;
mod provider;

pub use client::{factor_by_id, factor_ids_by_type, OktaClient, OktaSession};
pub use data::{OktaData, OKTA_RECORD};
pub use provider::{prompt_factor_args, OktaProvider};

pub const PROVIDER_NAME: &str = "Okta";
