//! In-memory [`AwsApi`] for renewal tests.

use crate::api::{
    AssumeRoleRequest, AwsApi, ClientRegistration, DeviceAuthorization, SamlRoleRequest, SsoAccount,
    TemporaryCredentials, TokenPoll,
};
use crate::{AwsCache, AwsContext, AwsError, AwsResult};
use async_trait::async_trait;
use broker_storage::now_timestamp;
use parking_lot::Mutex;
use provider_hooks::testing::TestEnv;
use provider_hooks::SamlResolver;
use saml_assertion::SamlAssertion;
use std::collections::VecDeque;
use tokio::time::Instant;

pub(crate) const ROLE: &str =
    "arn:aws:iam::123456789012:role/Test,arn:aws:iam::123456789012:saml-provider/Example";
pub(crate) const CALLER_ARN: &str = "arn:aws:sts::123456789012:assumed-role/Test/user@example.com";

/// Canned AWS answers. Token polls are served from a queue; once it is
/// empty every poll is `Pending`.
pub(crate) struct MockAwsApi {
    pub registration: ClientRegistration,
    pub device: DeviceAuthorization,
    pub sso_credentials: TemporaryCredentials,
    pub saml_credentials: TemporaryCredentials,
    pub chained_credentials: TemporaryCredentials,
    pub accounts: Vec<SsoAccount>,
    token_polls: Mutex<VecDeque<TokenPoll>>,
    token_error: Option<String>,
    calls: Mutex<Vec<String>>,
    token_poll_times: Mutex<Vec<Instant>>,
    saml_requests: Mutex<Vec<(SamlRoleRequest, Option<String>)>>,
    assume_requests: Mutex<Vec<(TemporaryCredentials, AssumeRoleRequest)>>,
}

impl MockAwsApi {
    pub fn new() -> Self {
        Self {
            registration: ClientRegistration {
                client_id: "client-id".to_string(),
                client_secret: "client-secret".to_string(),
                client_secret_expires_at: now_timestamp() + 90.0 * 86_400.0,
            },
            device: DeviceAuthorization {
                device_code: "device-code".to_string(),
                user_code: "ABCD-EFGH".to_string(),
                verification_uri_complete: "https://device.sso.us-east-1.amazonaws.com/?user_code=ABCD-EFGH"
                    .to_string(),
                expires_in: 600,
                interval: 1,
            },
            sso_credentials: fresh("ASIASSO"),
            saml_credentials: fresh("ASIASAML"),
            chained_credentials: fresh("ASIACHAINED"),
            accounts: vec![SsoAccount {
                account_id: "123456789012".to_string(),
                account_name: "dev".to_string(),
                email_address: "aws-dev@example.com".to_string(),
                roles: vec!["Admin".to_string(), "ReadOnly".to_string()],
            }],
            token_polls: Mutex::new(VecDeque::from([Self::token("access-token")])),
            token_error: None,
            calls: Mutex::new(Vec::new()),
            token_poll_times: Mutex::new(Vec::new()),
            saml_requests: Mutex::new(Vec::new()),
            assume_requests: Mutex::new(Vec::new()),
        }
    }

    pub fn token(access_token: &str) -> TokenPoll {
        TokenPoll::Token {
            access_token: access_token.to_string(),
            expires_in: 28_800,
        }
    }

    pub fn with_token_polls(self, polls: Vec<TokenPoll>) -> Self {
        *self.token_polls.lock() = polls.into();
        self
    }

    /// Every token poll fails with `code`.
    pub fn with_token_error(mut self, code: &str) -> Self {
        self.token_error = Some(code.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls.lock().iter().filter(|c| *c == call).count()
    }

    pub fn token_poll_times(&self) -> Vec<Instant> {
        self.token_poll_times.lock().clone()
    }

    pub fn saml_requests(&self) -> Vec<(SamlRoleRequest, Option<String>)> {
        self.saml_requests.lock().clone()
    }

    pub fn assume_requests(&self) -> Vec<(TemporaryCredentials, AssumeRoleRequest)> {
        self.assume_requests.lock().clone()
    }

    fn record(&self, call: &str) {
        self.calls.lock().push(call.to_string());
    }
}

pub(crate) fn fresh(access_key_id: &str) -> TemporaryCredentials {
    TemporaryCredentials {
        access_key_id: access_key_id.to_string(),
        secret_access_key: format!("{}-secret", access_key_id),
        session_token: format!("{}-token", access_key_id),
        expiration_timestamp: now_timestamp() + 3_600.0,
    }
}

/// An assertion whose attribute statement holds `attributes`, one value each.
pub(crate) fn assertion_with(attributes: &[(&str, &str)]) -> SamlAssertion {
    let attributes: String = attributes
        .iter()
        .map(|(name, value)| {
            format!(
                r#"<saml2:Attribute Name="{}"><saml2:AttributeValue>{}</saml2:AttributeValue></saml2:Attribute>"#,
                name, value
            )
        })
        .collect();
    let xml = format!(
        r#"<saml2p:Response xmlns:saml2p="urn:oasis:names:tc:SAML:2.0:protocol" xmlns:saml2="urn:oasis:names:tc:SAML:2.0:assertion"><saml2:Assertion><saml2:AttributeStatement>{}</saml2:AttributeStatement></saml2:Assertion></saml2p:Response>"#,
        attributes
    );
    SamlAssertion::from_xml(xml).unwrap()
}

pub(crate) fn context<'a>(
    env: &'a TestEnv,
    cache: &'a AwsCache,
    api: &'a MockAwsApi,
    resolver: &'a dyn SamlResolver,
) -> AwsContext<'a> {
    AwsContext {
        cache,
        api,
        browser: env.browser.as_ref(),
        prompter: env.prompter.as_ref(),
        resolver,
        client_name: "credbroker",
        device_auth_timeout: env.env.config.device_auth_timeout(),
    }
}

#[async_trait]
impl AwsApi for MockAwsApi {
    async fn register_client(&self, _client_name: &str) -> AwsResult<ClientRegistration> {
        self.record("register_client");
        Ok(self.registration.clone())
    }

    async fn start_device_authorization(
        &self,
        _client_id: &str,
        _client_secret: &str,
        _start_url: &str,
    ) -> AwsResult<DeviceAuthorization> {
        self.record("start_device_authorization");
        // A fresh flow starts with a fresh token queue.
        let mut polls = self.token_polls.lock();
        if polls.is_empty() && self.count("create_token") > 0 {
            polls.push_back(Self::token("access-token"));
        }
        Ok(self.device.clone())
    }

    async fn create_token(&self, _client_id: &str, _client_secret: &str, _device_code: &str) -> AwsResult<TokenPoll> {
        self.record("create_token");
        self.token_poll_times.lock().push(Instant::now());
        if let Some(code) = &self.token_error {
            return Err(AwsError::Api {
                service: "sso-oidc".to_string(),
                code: code.clone(),
                message: "denied".to_string(),
            });
        }
        Ok(self.token_polls.lock().pop_front().unwrap_or(TokenPoll::Pending))
    }

    async fn get_role_credentials(
        &self,
        _access_token: &str,
        _account_id: &str,
        _role_name: &str,
    ) -> AwsResult<TemporaryCredentials> {
        self.record("get_role_credentials");
        Ok(self.sso_credentials.clone())
    }

    async fn list_accounts(&self, _access_token: &str) -> AwsResult<Vec<SsoAccount>> {
        self.record("list_accounts");
        Ok(self.accounts.clone())
    }

    async fn assume_role_with_saml(
        &self,
        request: &SamlRoleRequest,
        sts_endpoint: Option<&str>,
    ) -> AwsResult<TemporaryCredentials> {
        self.record("assume_role_with_saml");
        self.saml_requests
            .lock()
            .push((request.clone(), sts_endpoint.map(str::to_string)));
        Ok(self.saml_credentials.clone())
    }

    async fn get_caller_identity(
        &self,
        _credentials: &TemporaryCredentials,
        _sts_endpoint: Option<&str>,
    ) -> AwsResult<String> {
        self.record("get_caller_identity");
        Ok(CALLER_ARN.to_string())
    }

    async fn assume_role(
        &self,
        credentials: &TemporaryCredentials,
        request: &AssumeRoleRequest,
        _sts_endpoint: Option<&str>,
    ) -> AwsResult<TemporaryCredentials> {
        self.record("assume_role");
        self.assume_requests
            .lock()
            .push((credentials.clone(), request.clone()));
        Ok(self.chained_credentials.clone())
    }
}
