//! SSO client registration and the OAuth2 device-authorization flow.

use crate::api::{AwsApi, DeviceAuthorization, SsoAccount, TokenPoll};
use crate::{AwsCache, AwsResult};
use broker_config_and_utils::{is_url, sleep_or_interrupt, CoreError};
use broker_storage::{format_ttl, now_timestamp, require_fields, Cacheable};
use callback_relay::BrowserOpener;
use provider_hooks::{Prompter, SamlResolver};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Seconds added to the poll interval on every `slow_down`.
const SLOW_DOWN_SECS: u64 = 5;

/// What renewing AWS entities needs besides the entity itself.
pub struct AwsContext<'a> {
    pub cache: &'a AwsCache,
    pub api: &'a dyn AwsApi,
    pub browser: &'a dyn BrowserOpener,
    pub prompter: &'a dyn Prompter,
    /// Answers SAML URLs for SAML-sourced credentials.
    pub resolver: &'a dyn SamlResolver,
    /// Name the OIDC client registers under.
    pub client_name: &'a str,
    /// Overall deadline for device-authorization polling.
    pub device_auth_timeout: Option<Duration>,
}

/// The public OIDC client credbroker registers once and reuses until AWS
/// expires its secret.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SsoRegistration {
    pub client_id: String,
    pub client_secret: String,
    pub expiration_timestamp: f64,
}

impl Cacheable for SsoRegistration {
    fn expiration_timestamp(&self) -> f64 {
        self.expiration_timestamp
    }
}

impl SsoRegistration {
    pub fn load(&mut self, cache: &AwsCache) -> AwsResult<()> {
        if let Some(cached) = cache.registration_slot() {
            self.hydrate_from(&cached)?;
        }
        Ok(())
    }

    /// Returns whether AWS was called.
    pub async fn renew(&mut self, ctx: &AwsContext<'_>, force: bool) -> AwsResult<bool> {
        self.load(ctx.cache)?;
        if !self.needs_renewal(force) {
            debug!(ttl = %self.ttl_display(), "Reusing SSO client registration");
            return Ok(false);
        }

        info!(client_name = %ctx.client_name, "Registering SSO client");
        let registration = ctx.api.register_client(ctx.client_name).await?;
        self.client_id = registration.client_id;
        self.client_secret = registration.client_secret;
        self.expiration_timestamp = registration.client_secret_expires_at;

        ctx.cache.set_registration(self)?;
        Ok(true)
    }
}

/// An SSO access token for one start URL.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SsoAuthorization {
    pub start_url: String,
    pub access_token: String,
    pub expiration_timestamp: f64,
}

impl Cacheable for SsoAuthorization {
    fn expiration_timestamp(&self) -> f64 {
        self.expiration_timestamp
    }
}

impl SsoAuthorization {
    pub fn new(start_url: &str) -> AwsResult<Self> {
        require_fields("SSO authorization", &[("start_url", start_url)])?;
        Ok(Self {
            start_url: start_url.to_string(),
            ..Default::default()
        })
    }

    pub fn load(&mut self, cache: &AwsCache) -> AwsResult<()> {
        if let Some(cached) = cache.authorization_slot(&self.start_url) {
            self.hydrate_from(&cached)?;
        }
        Ok(())
    }

    /// Run the device flow unless the cached token is still valid.
    /// Returns whether AWS was called.
    pub async fn renew(
        &mut self,
        ctx: &AwsContext<'_>,
        registration: &SsoRegistration,
        force: bool,
    ) -> AwsResult<bool> {
        self.load(ctx.cache)?;
        if !self.needs_renewal(force) {
            debug!(start_url = %self.start_url, ttl = %self.ttl_display(), "Reusing SSO authorization");
            return Ok(false);
        }

        info!(start_url = %self.start_url, "Starting SSO device authorization");
        let authorization = ctx
            .api
            .start_device_authorization(&registration.client_id, &registration.client_secret, &self.start_url)
            .await?;

        if let Err(e) = ctx.browser.open(&authorization.verification_uri_complete) {
            warn!(error = %e, "Could not open the verification URL");
        }
        ctx.prompter.status(&format!(
            "Waiting for device authorization (code {}): {}",
            authorization.user_code, authorization.verification_uri_complete
        ));

        let poll = poll_for_token(ctx.api, registration, &authorization);
        let (access_token, expires_in) = match ctx.device_auth_timeout {
            Some(limit) => tokio::time::timeout(limit, poll)
                .await
                .map_err(|_| CoreError::Timeout(limit.as_secs()))??,
            None => poll.await?,
        };

        self.access_token = access_token;
        self.expiration_timestamp = now_timestamp() + expires_in as f64;
        debug!(start_url = %self.start_url, ttl = %format_ttl(expires_in as f64), "SSO authorization granted");

        ctx.cache.set_authorization(self)?;
        Ok(true)
    }
}

/// Poll `CreateToken` until the user approves the device. `slow_down`
/// widens the interval for the rest of the flow.
async fn poll_for_token(
    api: &dyn AwsApi,
    registration: &SsoRegistration,
    authorization: &DeviceAuthorization,
) -> AwsResult<(String, u64)> {
    let mut interval = Duration::from_secs(authorization.interval.max(1));
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        debug!(attempt, "Requesting SSO token");
        match api
            .create_token(&registration.client_id, &registration.client_secret, &authorization.device_code)
            .await?
        {
            TokenPoll::Token {
                access_token,
                expires_in,
            } => return Ok((access_token, expires_in)),
            TokenPoll::Pending => {}
            TokenPoll::SlowDown => {
                interval += Duration::from_secs(SLOW_DOWN_SECS);
                debug!(interval_secs = interval.as_secs(), "SSO token polling slowed down");
            }
        }
        sleep_or_interrupt(interval).await?;
    }
}

/// A valid access token for `start_url`, registering the client and
/// running the device flow as needed.
pub(crate) async fn sso_access_token(ctx: &AwsContext<'_>, start_url: &str, force: bool) -> AwsResult<String> {
    let mut registration = SsoRegistration::default();
    registration.renew(ctx, false).await?;

    let mut authorization = SsoAuthorization::new(start_url)?;
    authorization.renew(ctx, &registration, force).await?;
    Ok(authorization.access_token)
}

/// Accounts and roles the user can reach through `start_url`.
pub async fn sso_accounts(ctx: &AwsContext<'_>, start_url: &str, force: bool) -> AwsResult<Vec<SsoAccount>> {
    let access_token = sso_access_token(ctx, start_url, force).await?;
    ctx.api.list_accounts(&access_token).await
}

/// Bare subdomains become `https://<subdomain>.awsapps.com/start#/`.
pub fn normalize_start_url(subdomain_or_url: &str) -> String {
    if is_url(subdomain_or_url) {
        subdomain_or_url.to_string()
    } else {
        format!("https://{}.awsapps.com/start#/", subdomain_or_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{context, MockAwsApi};
    use crate::AwsError;
    use provider_hooks::testing::{FixedResolver, TestEnv};

    const START_URL: &str = "https://example.awsapps.com/start#/";

    #[test]
    fn test_normalize_start_url() {
        assert_eq!(normalize_start_url("example"), START_URL);
        assert_eq!(normalize_start_url("https://d-1234.awsapps.com/start"), "https://d-1234.awsapps.com/start");
    }

    #[test]
    fn test_authorization_requires_start_url() {
        let err = SsoAuthorization::new(" ").unwrap_err();
        assert_eq!(err.to_string(), "Missing required fields for SSO authorization: start_url");
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_down_widens_poll_interval() {
        let env = TestEnv::new();
        let api = MockAwsApi::new().with_token_polls(vec![
            TokenPoll::Pending,
            TokenPoll::Pending,
            TokenPoll::SlowDown,
            MockAwsApi::token("at"),
        ]);
        let cache = AwsCache::open(env.storage.clone()).unwrap();
        let resolver = FixedResolver::unhandled();
        let ctx = context(&env, &cache, &api, &resolver);

        let token = sso_access_token(&ctx, START_URL, false).await.unwrap();
        assert_eq!(token, "at");

        let gaps: Vec<u64> = api
            .token_poll_times()
            .windows(2)
            .map(|pair| (pair[1] - pair[0]).as_secs())
            .collect();
        assert_eq!(gaps, vec![1, 1, 6]);
        assert!(gaps.windows(2).all(|pair| pair[0] <= pair[1]));

        assert_eq!(env.browser.urls(), vec![api.device.verification_uri_complete.clone()]);
        assert_eq!(env.prompter.statuses().len(), 1);
    }

    #[tokio::test]
    async fn test_cached_registration_and_authorization_are_reused() {
        let env = TestEnv::new();
        let api = MockAwsApi::new();
        let cache = AwsCache::open(env.storage.clone()).unwrap();
        let resolver = FixedResolver::unhandled();
        let ctx = context(&env, &cache, &api, &resolver);

        sso_access_token(&ctx, START_URL, false).await.unwrap();
        sso_access_token(&ctx, START_URL, false).await.unwrap();
        assert_eq!(api.calls(), vec!["register_client", "start_device_authorization", "create_token"]);

        // Another organization needs its own authorization, not a new client.
        sso_access_token(&ctx, "https://other.awsapps.com/start#/", false)
            .await
            .unwrap();
        assert_eq!(api.count("register_client"), 1);
        assert_eq!(api.count("start_device_authorization"), 2);
    }

    #[tokio::test]
    async fn test_force_reauthorizes_but_keeps_registration() {
        let env = TestEnv::new();
        let api = MockAwsApi::new();
        let cache = AwsCache::open(env.storage.clone()).unwrap();
        let resolver = FixedResolver::unhandled();
        let ctx = context(&env, &cache, &api, &resolver);

        sso_access_token(&ctx, START_URL, false).await.unwrap();
        sso_access_token(&ctx, START_URL, true).await.unwrap();
        assert_eq!(api.count("register_client"), 1);
        assert_eq!(api.count("start_device_authorization"), 2);
    }

    #[tokio::test]
    async fn test_expired_registration_is_renewed() {
        let env = TestEnv::new();
        let api = MockAwsApi::new();
        let cache = AwsCache::open(env.storage.clone()).unwrap();
        cache
            .set_registration(&SsoRegistration {
                client_id: "stale".to_string(),
                client_secret: "stale".to_string(),
                expiration_timestamp: now_timestamp() - 1.0,
            })
            .unwrap();
        let resolver = FixedResolver::unhandled();
        let ctx = context(&env, &cache, &api, &resolver);

        let mut registration = SsoRegistration::default();
        assert!(registration.renew(&ctx, false).await.unwrap());
        assert_eq!(registration.client_id, api.registration.client_id);
        assert!(!registration.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn test_device_polling_deadline() {
        let env = TestEnv::new();
        let api = MockAwsApi::new().with_token_polls(Vec::new());
        let cache = AwsCache::open(env.storage.clone()).unwrap();
        let resolver = FixedResolver::unhandled();
        let ctx = context(&env, &cache, &api, &resolver);

        let err = sso_access_token(&ctx, START_URL, false).await.unwrap_err();
        assert!(matches!(err, AwsError::Core(CoreError::Timeout(5))));
        assert!(cache.authorization_slot(START_URL).is_none());
    }

    #[tokio::test]
    async fn test_terminal_token_error_fails_flow() {
        let env = TestEnv::new();
        let api = MockAwsApi::new().with_token_error("AccessDeniedException");
        let cache = AwsCache::open(env.storage.clone()).unwrap();
        let resolver = FixedResolver::unhandled();
        let ctx = context(&env, &cache, &api, &resolver);

        let err = sso_access_token(&ctx, START_URL, false).await.unwrap_err();
        assert!(matches!(err, AwsError::Api { code, .. } if code == "AccessDeniedException"));
    }

    #[tokio::test]
    async fn test_sso_accounts() {
        let env = TestEnv::new();
        let api = MockAwsApi::new();
        let cache = AwsCache::open(env.storage.clone()).unwrap();
        let resolver = FixedResolver::unhandled();
        let ctx = context(&env, &cache, &api, &resolver);

        let accounts = sso_accounts(&ctx, START_URL, false).await.unwrap();
        assert_eq!(accounts, api.accounts);
    }
}
