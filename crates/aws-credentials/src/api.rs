//! The AWS operations credential renewal needs, behind a trait so the
//! renewal logic can be exercised without AWS.

use crate::AwsResult;
use async_trait::async_trait;
use serde::Serialize;

/// `RegisterClient` result.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientRegistration {
    pub client_id: String,
    pub client_secret: String,
    /// Unix seconds.
    pub client_secret_expires_at: f64,
}

/// `StartDeviceAuthorization` result.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceAuthorization {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri_complete: String,
    /// Seconds the device code stays valid.
    pub expires_in: u64,
    /// Seconds to wait between token polls.
    pub interval: u64,
}

/// One `CreateToken` poll.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenPoll {
    Token { access_token: String, expires_in: u64 },
    /// The user has not approved the device yet.
    Pending,
    /// Polling too fast; back off before the next poll.
    SlowDown,
}

/// Temporary credential triple with its expiry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemporaryCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    /// Unix seconds.
    pub expiration_timestamp: f64,
}

/// An account visible through an SSO access token, with its role names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SsoAccount {
    pub account_id: String,
    pub account_name: String,
    pub email_address: String,
    pub roles: Vec<String>,
}

/// `AssumeRoleWithSAML` parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SamlRoleRequest {
    pub role_arn: String,
    pub principal_arn: String,
    /// Base64 SAML response.
    pub saml_assertion: String,
    /// Omitted so the role's default applies.
    pub duration_seconds: Option<i64>,
}

/// `AssumeRole` parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct AssumeRoleRequest {
    pub role_arn: String,
    pub role_session_name: String,
    pub external_id: Option<String>,
}

/// SSO OIDC, SSO portal and STS operations.
///
/// `sts_endpoint` overrides the global STS endpoint when set.
#[async_trait]
pub trait AwsApi: Send + Sync {
    async fn register_client(&self, client_name: &str) -> AwsResult<ClientRegistration>;

    async fn start_device_authorization(
        &self,
        client_id: &str,
        client_secret: &str,
        start_url: &str,
    ) -> AwsResult<DeviceAuthorization>;

    async fn create_token(&self, client_id: &str, client_secret: &str, device_code: &str) -> AwsResult<TokenPoll>;

    async fn get_role_credentials(
        &self,
        access_token: &str,
        account_id: &str,
        role_name: &str,
    ) -> AwsResult<TemporaryCredentials>;

    /// Accounts with their role names, every page.
    async fn list_accounts(&self, access_token: &str) -> AwsResult<Vec<SsoAccount>>;

    async fn assume_role_with_saml(
        &self,
        request: &SamlRoleRequest,
        sts_endpoint: Option<&str>,
    ) -> AwsResult<TemporaryCredentials>;

    /// ARN of the identity `credentials` belong to.
    async fn get_caller_identity(
        &self,
        credentials: &TemporaryCredentials,
        sts_endpoint: Option<&str>,
    ) -> AwsResult<String>;

    async fn assume_role(
        &self,
        credentials: &TemporaryCredentials,
        request: &AssumeRoleRequest,
        sts_endpoint: Option<&str>,
    ) -> AwsResult<TemporaryCredentials>;
}
