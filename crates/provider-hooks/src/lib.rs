//! Provider plugin contract and the machinery shared by identity providers.
//!
//! - [`Provider`] / [`ProviderRegistry`]: the three hook operations and
//!   their dispatch (broadcast-collect, first-responder, fire-and-forget).
//! - [`AuthnTracker`]: the password + MFA authentication state machine every
//!   identity provider drives.
//! - [`Factor`] / [`select_factor`]: MFA factor model and selection.
//! - [`Prompter`]: how providers ask the user for input.
//! - [`Aliases`]: URL aliases shared by the CLI and credential providers.
//! - [`output`]: table and record rendering for command output.

mod alias;
mod authn;
mod factor;
pub mod output;
mod prompt;
mod provider;
mod registry;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use alias::{Aliases, ALIAS_RECORD};
pub use authn::{AuthnInput, AuthnOutcome, AuthnState, AuthnTracker, MfaChallenge};
pub use factor::{select_factor, Factor};
pub use prompt::Prompter;
pub use provider::{CommandContext, Provider, ProviderEnv, ProviderFactory, SamlApplication, SamlResolver};
pub use registry::ProviderRegistry;

use broker_config_and_utils::CoreError;
use broker_http::HttpError;
use broker_storage::StorageError;
use callback_relay::RelayError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    /// Required settings (domain, username, password) are not stored yet.
    #[error("{provider} is not configured (run `credbroker {command}` to set it up)")]
    NotConfigured { provider: String, command: String },

    /// The provider rejected a call.
    #[error("{provider}: {}", provider_message(.code.as_deref(), .message))]
    Provider {
        provider: String,
        code: Option<String>,
        message: String,
    },

    #[error("{provider} MFA verification failed: {reason}")]
    Mfa { provider: String, reason: String },

    #[error("Unknown or unimplemented {provider} factor type: {factor_type}")]
    UnknownFactor { provider: String, factor_type: String },

    #[error("Invalid choice {choice}: expected 0 to {max}")]
    InvalidChoice { choice: usize, max: usize },

    #[error("No providers responded for SAML application URL: {0}")]
    UnhandledUrl(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("No such alias: {0}")]
    NoSuchAlias(String),

    #[error("Prompt failed: {0}")]
    Prompt(String),

    #[error("Invalid authentication state transition: {0}")]
    InvalidTransition(String),

    /// A command finished and the process should exit with this status
    /// (e.g. the exit code of a child process run on the user's behalf).
    #[error("Exited with status {0}")]
    Exit(i32),

    #[error(transparent)]
    Http(#[from] HttpError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Relay(#[from] RelayError),
}

impl ProviderError {
    pub fn provider(provider: &str, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.to_string(),
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(provider: &str, code: &str, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.to_string(),
            code: Some(code.to_string()),
            message: message.into(),
        }
    }

    pub fn mfa(provider: &str, reason: impl Into<String>) -> Self {
        Self::Mfa {
            provider: provider.to_string(),
            reason: reason.into(),
        }
    }

    pub fn not_configured(provider: &str, command: &str) -> Self {
        Self::NotConfigured {
            provider: provider.to_string(),
            command: command.to_string(),
        }
    }

    /// Missing setup rather than a failed authentication; callers should
    /// prompt for configuration instead of retrying.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::NotConfigured { .. })
    }
}

fn provider_message(code: Option<&str>, message: &str) -> String {
    match code {
        Some(code) => format!("{} - {}", code, message),
        None => message.to_string(),
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            ProviderError::with_code("Okta", "E0000004", "Authentication failed").to_string(),
            "Okta: E0000004 - Authentication failed"
        );
        assert_eq!(
            ProviderError::provider("JumpCloud", "Invalid credentials").to_string(),
            "JumpCloud: Invalid credentials"
        );
        assert_eq!(
            ProviderError::mfa("Okta", "REJECTED").to_string(),
            "Okta MFA verification failed: REJECTED"
        );
    }

    #[test]
    fn test_configuration_errors_are_distinct() {
        let err = ProviderError::not_configured("Okta", "okta");
        assert!(err.is_configuration());
        assert_eq!(err.to_string(), "Okta is not configured (run `credbroker okta` to set it up)");
        assert!(!ProviderError::provider("Okta", "nope").is_configuration());
    }
}
