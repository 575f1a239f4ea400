use crate::PROVIDER_NAME;
use broker_http::{require_str_path, HttpClient, HttpRequest, Method, RestResponse};
use callback_relay::{BrowserOpener, CallbackRelay, DuoFrame, RelayMode};
use provider_hooks::{
    AuthnInput, AuthnOutcome, AuthnState, AuthnTracker, Factor, MfaChallenge, ProviderError, ProviderResult,
    SamlApplication,
};
use saml_assertion::SamlAssertion;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// JumpCloud user console session cookie.
pub const SESSION_COOKIE: &str = "_jumpcloud_user_console_";

const CONSOLE_URL: &str = "https://console.jumpcloud.com/userconsole";

/// Console session: the cookie plus the XSRF token issued alongside it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JumpCloudSession {
    pub cookie: String,
    pub xsrf: String,
}

/// Client for the JumpCloud user console API.
pub struct JumpCloudClient {
    http: HttpClient,
    browser: Arc<dyn BrowserOpener>,
    email: String,
    password: String,
    session: JumpCloudSession,
    relay_timeout: Option<Duration>,
    tracker: AuthnTracker,
}

impl JumpCloudClient {
    pub fn new(
        http: HttpClient,
        browser: Arc<dyn BrowserOpener>,
        email: &str,
        password: &str,
        session: JumpCloudSession,
    ) -> Self {
        Self {
            http,
            browser,
            email: email.to_string(),
            password: password.to_string(),
            session,
            relay_timeout: None,
            tracker: AuthnTracker::new(PROVIDER_NAME),
        }
    }

    pub fn with_relay_timeout(mut self, relay_timeout: Option<Duration>) -> Self {
        self.relay_timeout = relay_timeout;
        self
    }

    pub fn session(&self) -> &JumpCloudSession {
        &self.session
    }

    pub fn authn_state(&self) -> &AuthnState {
        self.tracker.state()
    }

    fn url(path: &str) -> String {
        format!("{}/{}", CONSOLE_URL, path)
    }

    /// Console API request carrying the session cookie and XSRF header.
    /// Redirects are not followed so an expired session shows up as a
    /// redirect to the login page.
    fn request(&self, method: Method, url: &str) -> HttpRequest {
        HttpRequest::new(method, url)
            .header("X-Requested-With", "XMLHttpRequest")
            .header("X-Xsrftoken", self.session.xsrf.clone())
            .cookie(SESSION_COOKIE, &self.session.cookie)
            .no_redirects()
    }

    async fn rest(&self, method: Method, url: &str, body: Option<Value>) -> ProviderResult<RestResponse> {
        let mut request = self.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }
        Ok(self.http.rest_request(request).await?)
    }

    /// Authenticate the user.
    ///
    /// With `lazy`, an existing console session is reused when the
    /// current-user call still answers. Otherwise a fresh XSRF token and
    /// session cookie are fetched before the password is submitted.
    pub async fn auth(&mut self, lazy: bool) -> ProviderResult<AuthnOutcome> {
        self.tracker.reset()?;

        if lazy {
            let response = self.current_user().await?;
            let location = response.response().header("location").unwrap_or_default();
            if response.is_success() && !location.contains("/login") {
                debug!("Reusing existing session");
                self.tracker.transition(AuthnInput::SessionReused)?;
                return Ok(AuthnOutcome::Success(response));
            }
        }

        self.xsrf().await?;

        info!(email = %self.email, "Authenticating");
        self.tracker.transition(AuthnInput::CredentialsSubmitted)?;
        let response = self
            .rest(
                Method::POST,
                &Self::url("auth"),
                Some(json!({"email": self.email, "password": self.password})),
            )
            .await?;
        self.keep_session_cookie(&response);

        if response.status() == 401 && response.contains_key("factors") {
            debug!("MFA required");
            let factors = available_factors(&response);
            self.tracker.transition(AuthnInput::MfaDemanded)?;
            return Ok(AuthnOutcome::MfaRequired(MfaChallenge { factors, response }));
        }

        if !response.is_success() {
            self.tracker.transition(AuthnInput::Rejected)?;
            return Err(ProviderError::provider(PROVIDER_NAME, message(&response)));
        }

        self.tracker.transition(AuthnInput::Accepted)?;
        Ok(AuthnOutcome::Success(response))
    }

    /// Fetch a new XSRF token and the session cookie it belongs to.
    pub async fn xsrf(&mut self) -> ProviderResult<RestResponse> {
        debug!("Requesting XSRF token");
        let response = self.rest(Method::GET, &Self::url("xsrf"), None).await?;

        let xsrf = response.require_str("xsrf")?.to_string();
        let cookie = response
            .response()
            .cookie(SESSION_COOKIE)
            .ok_or_else(|| ProviderError::provider(PROVIDER_NAME, "No session cookie in XSRF response"))?
            .to_string();

        debug!("Saving session data");
        self.session = JumpCloudSession { cookie, xsrf };
        Ok(response)
    }

    fn keep_session_cookie(&mut self, response: &RestResponse) {
        if let Some(cookie) = response.response().cookie(SESSION_COOKIE) {
            self.session.cookie = cookie.to_string();
        }
    }

    /// Verify one of the offered factors. `totp` needs `otp`; `duo` runs
    /// the Duo frame through the local relay.
    pub async fn verify(&mut self, factor_type: &str, otp: Option<&str>) -> ProviderResult<RestResponse> {
        self.tracker.transition(AuthnInput::FactorSubmitted)?;

        let result = match factor_type {
            "totp" => self.auth_totp(otp.unwrap_or_default()).await,
            "duo" => self.auth_duo().await,
            other => Err(ProviderError::UnknownFactor {
                provider: PROVIDER_NAME.to_string(),
                factor_type: other.to_string(),
            }),
        };

        match result {
            Ok(response) => {
                self.keep_session_cookie(&response);
                self.tracker.transition(AuthnInput::Accepted)?;
                Ok(response)
            }
            Err(e) => {
                self.tracker.transition(AuthnInput::Rejected)?;
                Err(e)
            }
        }
    }

    async fn auth_totp(&self, otp: &str) -> ProviderResult<RestResponse> {
        let response = self
            .rest(Method::POST, &Self::url("auth/totp"), Some(json!({"otp": otp})))
            .await?;
        if !response.is_success() {
            return Err(ProviderError::mfa(PROVIDER_NAME, message(&response)));
        }
        Ok(response)
    }

    /// The Duo frame posts to the relay, which forwards the signed response
    /// to JumpCloud with this session's headers and cookie.
    async fn auth_duo(&self) -> ProviderResult<RestResponse> {
        let url = Self::url("auth/duo");
        let response = self.rest(Method::GET, &url, None).await?;

        let frame = DuoFrame::new(
            &format!("JumpCloud ({})", self.email),
            response.require_str("api_host")?,
            response.require_str("sig_request")?,
            &url,
        )
        .with_form_arg("token", response.require_str("token")?);

        let forward = self.request(Method::POST, &url);
        let relay = CallbackRelay::start(&frame, RelayMode::Proxy(forward), self.http.clone()).await?;
        relay.open(self.browser.as_ref())?;

        let response = relay.wait(self.relay_timeout).await?.into_rest();
        if !response.is_success() {
            return Err(ProviderError::mfa(PROVIDER_NAME, message(&response)));
        }
        Ok(response)
    }

    pub async fn current_user(&self) -> ProviderResult<RestResponse> {
        self.rest(Method::GET, &Self::url("api/self"), None).await
    }

    pub async fn applications(&self) -> ProviderResult<Vec<SamlApplication>> {
        debug!("Requesting applications");
        let response = self.rest(Method::GET, &Self::url("api/applications"), None).await?;
        if !response.is_success() {
            return Err(ProviderError::provider(PROVIDER_NAME, message(&response)));
        }
        response
            .as_array()
            .iter()
            .map(|app| -> ProviderResult<SamlApplication> {
                Ok(SamlApplication::new(
                    require_str_path(app, &["displayLabel"])?,
                    require_str_path(app, &["ssoUrl"])?,
                ))
            })
            .collect()
    }

    /// Fetch the assertion for one of the user's own applications.
    pub async fn saml_request(&self, url: &str) -> ProviderResult<SamlAssertion> {
        let known = self.applications().await?.iter().any(|app| app.url == url);
        if !known {
            return Err(ProviderError::provider(PROVIDER_NAME, format!("Unknown SSO URL: {}", url)));
        }
        let request = HttpRequest::get(url).cookie(SESSION_COOKIE, &self.session.cookie);
        Ok(self.http.saml_request(request).await?)
    }
}

fn message(response: &RestResponse) -> String {
    response
        .get_str("message")
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {}", response.status()))
}

/// Factors the account can use right now.
fn available_factors(response: &RestResponse) -> Vec<Factor> {
    response
        .get("factors")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
        .iter()
        .filter(|f| f.get("status").and_then(Value::as_str) == Some("available"))
        .filter_map(|f| f.get("type").and_then(Value::as_str))
        .map(|factor_type| Factor::new(factor_type, factor_type))
        .collect()
}
