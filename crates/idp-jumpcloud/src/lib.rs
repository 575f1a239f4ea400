//! JumpCloud identity provider.
//!
//! Signs in to the JumpCloud user console (XSRF token, password, then TOTP
//! or Duo when required), keeps the console session cookie in the
//! `jumpcloud` record and fetches SAML assertions for the user's
//! `sso.jumpcloud.com` applications.

mod client;
mod data;
mod provider;

pub use client::{JumpCloudClient, JumpCloudSession, SESSION_COOKIE};
pub use data::{JumpCloudData, JUMPCLOUD_RECORD};
pub use provider::{prompt_factor_args, JumpCloudProvider};

pub const PROVIDER_NAME: &str = "JumpCloud";

/// Host serving every JumpCloud SSO application.
pub const SSO_DOMAIN: &str = "sso.jumpcloud.com";
