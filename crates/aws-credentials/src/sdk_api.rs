//! [`AwsApi`] over the AWS SDK clients for SSO OIDC, the SSO portal and STS.

use crate::api::{
    AssumeRoleRequest, AwsApi, ClientRegistration, DeviceAuthorization, SamlRoleRequest, SsoAccount,
    TemporaryCredentials, TokenPoll,
};
use crate::{AwsError, AwsResult};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, SdkConfig};
use aws_sdk_sso::Client as SsoClient;
use aws_sdk_ssooidc::operation::create_token::CreateTokenError;
use aws_sdk_ssooidc::Client as SsoOidcClient;
use aws_sdk_sts::config::{Credentials, Region};
use aws_sdk_sts::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_sts::Client as StsClient;
use tracing::debug;
use url::Url;

const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";
const STS_GLOBAL_REGION: &str = "us-east-1";
const PAGE_SIZE: i32 = 100;
/// Provider name attached to credentials handed to chained STS clients.
const CREDENTIALS_SOURCE: &str = "credbroker";

pub struct AwsSdkApi {
    base: SdkConfig,
    oidc: SsoOidcClient,
    sso: SsoClient,
}

impl AwsSdkApi {
    /// Clients for the SSO region. Nothing is read from the environment:
    /// SSO and SAML calls are unsigned and chained STS calls carry their
    /// own credentials.
    pub fn new(sso_region: &str) -> Self {
        let base = SdkConfig::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(sso_region.to_string()))
            .build();
        Self {
            oidc: SsoOidcClient::new(&base),
            sso: SsoClient::new(&base),
            base,
        }
    }

    fn sts(&self, credentials: Option<&TemporaryCredentials>, sts_endpoint: Option<&str>) -> StsClient {
        let endpoint = sts_endpoint.filter(|e| !e.is_empty());
        let mut config = aws_sdk_sts::config::Builder::from(&self.base).region(Region::new(sts_region(endpoint)));
        if let Some(endpoint) = endpoint {
            config = config.endpoint_url(endpoint);
        }
        if let Some(credentials) = credentials {
            config = config.credentials_provider(Credentials::new(
                &credentials.access_key_id,
                &credentials.secret_access_key,
                Some(credentials.session_token.clone()),
                None,
                CREDENTIALS_SOURCE,
            ));
        }
        StsClient::from_conf(config.build())
    }

    async fn account_roles(&self, access_token: &str, account_id: &str) -> AwsResult<Vec<String>> {
        let roles = self
            .sso
            .list_account_roles()
            .access_token(access_token)
            .account_id(account_id)
            .max_results(PAGE_SIZE)
            .into_paginator()
            .items()
            .send()
            .collect::<Result<Vec<_>, _>>()
            .await
            .map_err(|e| sdk_error("sso", e))?;

        Ok(roles
            .iter()
            .filter_map(|role| role.role_name())
            .map(str::to_string)
            .collect())
    }
}

#[async_trait]
impl AwsApi for AwsSdkApi {
    async fn register_client(&self, client_name: &str) -> AwsResult<ClientRegistration> {
        let output = self
            .oidc
            .register_client()
            .client_name(client_name)
            .client_type("public")
            .send()
            .await
            .map_err(|e| sdk_error("sso-oidc", e))?;

        Ok(ClientRegistration {
            client_id: required("clientId", output.client_id())?,
            client_secret: required("clientSecret", output.client_secret())?,
            client_secret_expires_at: output.client_secret_expires_at() as f64,
        })
    }

    async fn start_device_authorization(
        &self,
        client_id: &str,
        client_secret: &str,
        start_url: &str,
    ) -> AwsResult<DeviceAuthorization> {
        let output = self
            .oidc
            .start_device_authorization()
            .client_id(client_id)
            .client_secret(client_secret)
            .start_url(start_url)
            .send()
            .await
            .map_err(|e| sdk_error("sso-oidc", e))?;

        Ok(DeviceAuthorization {
            device_code: required("deviceCode", output.device_code())?,
            user_code: output.user_code().unwrap_or_default().to_string(),
            verification_uri_complete: required("verificationUriComplete", output.verification_uri_complete())?,
            expires_in: u64::try_from(output.expires_in()).unwrap_or_default(),
            interval: u64::try_from(output.interval()).ok().filter(|i| *i > 0).unwrap_or(1),
        })
    }

    async fn create_token(&self, client_id: &str, client_secret: &str, device_code: &str) -> AwsResult<TokenPoll> {
        let result = self
            .oidc
            .create_token()
            .client_id(client_id)
            .client_secret(client_secret)
            .grant_type(DEVICE_CODE_GRANT)
            .device_code(device_code)
            .send()
            .await;

        match result {
            Ok(output) => Ok(TokenPoll::Token {
                access_token: required("accessToken", output.access_token())?,
                expires_in: u64::try_from(output.expires_in()).unwrap_or_default(),
            }),
            Err(error) => match error.as_service_error().and_then(pending_poll) {
                Some(poll) => Ok(poll),
                None => Err(sdk_error("sso-oidc", error)),
            },
        }
    }

    async fn get_role_credentials(
        &self,
        access_token: &str,
        account_id: &str,
        role_name: &str,
    ) -> AwsResult<TemporaryCredentials> {
        let output = self
            .sso
            .get_role_credentials()
            .access_token(access_token)
            .account_id(account_id)
            .role_name(role_name)
            .send()
            .await
            .map_err(|e| sdk_error("sso", e))?;

        let credentials = output
            .role_credentials()
            .ok_or_else(|| AwsError::InvalidResponse("Missing roleCredentials".to_string()))?;

        Ok(TemporaryCredentials {
            access_key_id: required("accessKeyId", credentials.access_key_id())?,
            secret_access_key: required("secretAccessKey", credentials.secret_access_key())?,
            session_token: required("sessionToken", credentials.session_token())?,
            // Milliseconds.
            expiration_timestamp: credentials.expiration() as f64 / 1000.0,
        })
    }

    async fn list_accounts(&self, access_token: &str) -> AwsResult<Vec<SsoAccount>> {
        let listed = self
            .sso
            .list_accounts()
            .access_token(access_token)
            .max_results(PAGE_SIZE)
            .into_paginator()
            .items()
            .send()
            .collect::<Result<Vec<_>, _>>()
            .await
            .map_err(|e| sdk_error("sso", e))?;

        let mut accounts = Vec::with_capacity(listed.len());
        for account in listed {
            let account_id = account.account_id().unwrap_or_default().to_string();
            let roles = self.account_roles(access_token, &account_id).await?;
            accounts.push(SsoAccount {
                account_name: account.account_name().unwrap_or_default().to_string(),
                email_address: account.email_address().unwrap_or_default().to_string(),
                account_id,
                roles,
            });
        }
        Ok(accounts)
    }

    async fn assume_role_with_saml(
        &self,
        request: &SamlRoleRequest,
        sts_endpoint: Option<&str>,
    ) -> AwsResult<TemporaryCredentials> {
        debug!(role_arn = %request.role_arn, sts_endpoint, "AssumeRoleWithSAML");
        let output = self
            .sts(None, sts_endpoint)
            .assume_role_with_saml()
            .role_arn(&request.role_arn)
            .principal_arn(&request.principal_arn)
            .saml_assertion(&request.saml_assertion)
            .set_duration_seconds(request.duration_seconds.and_then(|d| i32::try_from(d).ok()))
            .send()
            .await
            .map_err(|e| sdk_error("sts", e))?;

        sts_credentials(output.credentials())
    }

    async fn get_caller_identity(
        &self,
        credentials: &TemporaryCredentials,
        sts_endpoint: Option<&str>,
    ) -> AwsResult<String> {
        let output = self
            .sts(Some(credentials), sts_endpoint)
            .get_caller_identity()
            .send()
            .await
            .map_err(|e| sdk_error("sts", e))?;
        required("Arn", output.arn())
    }

    async fn assume_role(
        &self,
        credentials: &TemporaryCredentials,
        request: &AssumeRoleRequest,
        sts_endpoint: Option<&str>,
    ) -> AwsResult<TemporaryCredentials> {
        debug!(role_arn = %request.role_arn, sts_endpoint, "AssumeRole");
        let output = self
            .sts(Some(credentials), sts_endpoint)
            .assume_role()
            .role_arn(&request.role_arn)
            .role_session_name(&request.role_session_name)
            .set_external_id(request.external_id.clone())
            .send()
            .await
            .map_err(|e| sdk_error("sts", e))?;

        sts_credentials(output.credentials())
    }
}

/// Token poll states that keep the device flow going.
fn pending_poll(error: &CreateTokenError) -> Option<TokenPoll> {
    match error {
        CreateTokenError::AuthorizationPendingException(_) => Some(TokenPoll::Pending),
        CreateTokenError::SlowDownException(_) => Some(TokenPoll::SlowDown),
        _ => None,
    }
}

/// Region STS calls are made in: taken from regional endpoints
/// (`sts.<region>.amazonaws.com`), otherwise the global endpoint's.
fn sts_region(endpoint: Option<&str>) -> String {
    endpoint
        .and_then(|endpoint| Url::parse(endpoint).ok())
        .and_then(|url| url.host_str().map(str::to_string))
        .and_then(|host| {
            let region = host.strip_prefix("sts.")?.strip_suffix(".amazonaws.com")?;
            (!region.is_empty() && !region.contains('.')).then(|| region.to_string())
        })
        .unwrap_or_else(|| STS_GLOBAL_REGION.to_string())
}

fn sts_credentials(credentials: Option<&aws_sdk_sts::types::Credentials>) -> AwsResult<TemporaryCredentials> {
    let credentials = credentials.ok_or_else(|| AwsError::InvalidResponse("Missing Credentials".to_string()))?;
    Ok(TemporaryCredentials {
        access_key_id: credentials.access_key_id().to_string(),
        secret_access_key: credentials.secret_access_key().to_string(),
        session_token: credentials.session_token().to_string(),
        expiration_timestamp: credentials.expiration().as_secs_f64(),
    })
}

fn required(field: &str, value: Option<&str>) -> AwsResult<String> {
    value
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AwsError::InvalidResponse(format!("Missing {}", field)))
}

/// Service errors keep the AWS error code; everything else (dispatch,
/// timeouts, unparseable responses) is reported with its full context.
fn sdk_error<E, R>(service: &str, error: SdkError<E, R>) -> AwsError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    match error.as_service_error() {
        Some(err) => AwsError::Api {
            service: service.to_string(),
            code: err.code().unwrap_or("Unknown").to_string(),
            message: err.message().unwrap_or("No message").to_string(),
        },
        None => AwsError::Sdk {
            service: service.to_string(),
            message: DisplayErrorContext(&error).to_string(),
        },
    }
}
