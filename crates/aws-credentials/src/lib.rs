//! AWS credential issuance for credbroker.
//!
//! Named role credentials are cached in the `aws` keychain record and
//! renewed on demand, either through the SSO device-authorization flow or
//! by exchanging a SAML assertion at STS, optionally followed by a second
//! `AssumeRole` (role chaining).

mod api;
mod cache;
mod credentials;
mod provider;
mod sdk_api;
mod sso;

#[cfg(test)]
mod testing;

pub use api::{
    AssumeRoleRequest, AwsApi, ClientRegistration, DeviceAuthorization, SamlRoleRequest, SsoAccount,
    TemporaryCredentials, TokenPoll,
};
pub use cache::{AwsCache, AWS_RECORD};
pub use credentials::{CredentialSource, RoleCredentials};
pub use provider::AwsProvider;
pub use sdk_api::AwsSdkApi;
pub use sso::{normalize_start_url, sso_accounts, AwsContext, SsoAuthorization, SsoRegistration};

use broker_config_and_utils::CoreError;
use broker_storage::{MissingFields, StorageError};
use provider_hooks::ProviderError;
use thiserror::Error;

pub const PROVIDER_NAME: &str = "AWS";

/// SAML attribute carrying `RoleArn,PrincipalArn` pairs.
pub const ROLE_ATTRIBUTE: &str = "https://aws.amazon.com/SAML/Attributes/Role";
pub const SESSION_DURATION_ATTRIBUTE: &str = "https://aws.amazon.com/SAML/Attributes/SessionDuration";

#[derive(Error, Debug)]
pub enum AwsError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Core(#[from] CoreError),

    /// Credentials were defined without their identity fields.
    #[error(transparent)]
    MissingFields(#[from] MissingFields),

    /// An AWS service rejected a call.
    #[error("AWS {service} error: {code} - {message}")]
    Api {
        service: String,
        code: String,
        message: String,
    },

    #[error("No role ARN found in SAML assertion")]
    NoRoleArn,

    #[error("No such credentials: {0}")]
    NoSuchCredentials(String),

    #[error("Credentials already exist: {0}")]
    CredentialsExist(String),

    #[error("Invalid AWS response: {0}")]
    InvalidResponse(String),

    /// A call never produced a service response (dispatch, timeout,
    /// unreadable response).
    #[error("AWS {service} request failed: {message}")]
    Sdk { service: String, message: String },

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("command not found: {0}")]
    CommandNotFound(String),
}

impl AwsError {
    /// Shell-style exit status for failures to start a command.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::PermissionDenied(_) => Some(126),
            Self::CommandNotFound(_) => Some(127),
            _ => None,
        }
    }
}

impl From<AwsError> for ProviderError {
    fn from(error: AwsError) -> Self {
        match error {
            AwsError::Provider(e) => e,
            AwsError::Storage(e) => ProviderError::Storage(e),
            AwsError::Core(e) => ProviderError::Core(e),
            AwsError::MissingFields(e) => ProviderError::Storage(StorageError::MissingFields(e)),
            AwsError::Api { code, message, .. } => ProviderError::with_code(PROVIDER_NAME, &code, message),
            other => ProviderError::provider(PROVIDER_NAME, other.to_string()),
        }
    }
}

pub type AwsResult<T> = Result<T, AwsError>;
