use crate::PROVIDER_NAME;
use broker_config_and_utils::sleep_or_interrupt;
use broker_http::{require_str_path, HttpClient, HttpRequest, Method, RestResponse};
use callback_relay::{BrowserOpener, CallbackRelay, DuoFrame, RelayMode};
use provider_hooks::{
    AuthnInput, AuthnOutcome, AuthnState, AuthnTracker, Factor, MfaChallenge, ProviderError, ProviderResult,
    SamlApplication,
};
use saml_assertion::SamlAssertion;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Okta's session cookie.
const SESSION_COOKIE: &str = "sid";

/// An Okta session as stored between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OktaSession {
    pub id: String,
    pub refresh_url: String,
}

/// Client for the Okta Authentication, Sessions and Users APIs.
pub struct OktaClient {
    http: HttpClient,
    browser: Arc<dyn BrowserOpener>,
    domain: String,
    username: String,
    password: String,
    session: OktaSession,
    poll_interval: Duration,
    tracker: AuthnTracker,
}

impl OktaClient {
    pub fn new(
        http: HttpClient,
        browser: Arc<dyn BrowserOpener>,
        domain: &str,
        username: &str,
        password: &str,
        session: OktaSession,
    ) -> Self {
        Self {
            http,
            browser,
            domain: domain.to_string(),
            username: username.to_string(),
            password: password.to_string(),
            session,
            poll_interval: Duration::from_secs(2),
            tracker: AuthnTracker::new(PROVIDER_NAME),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn session(&self) -> &OktaSession {
        &self.session
    }

    pub fn authn_state(&self) -> &AuthnState {
        self.tracker.state()
    }

    fn api_url(&self, path: &str) -> String {
        format!("https://{}/api/v1{}", self.domain, path)
    }

    async fn rest(&self, method: Method, url: &str, body: Option<Value>) -> ProviderResult<RestResponse> {
        let mut request = HttpRequest::new(method, url).cookie(SESSION_COOKIE, &self.session.id);
        if let Some(body) = body {
            request = request.json(body);
        }
        Ok(self.http.rest_request(request).await?)
    }

    /// Authenticate the user.
    ///
    /// With `lazy`, the stored session is refreshed first and reused when
    /// Okta accepts it. Otherwise (or when that fails) the password is
    /// submitted. An org that requires MFA yields
    /// [`AuthnOutcome::MfaRequired`]; continue with [`OktaClient::verify`].
    pub async fn authn(&mut self, lazy: bool) -> ProviderResult<AuthnOutcome> {
        self.tracker.reset()?;

        if lazy {
            match self.session_refresh().await {
                Ok(response) if response.is_success() => {
                    debug!("Reusing existing session");
                    self.tracker.transition(AuthnInput::SessionReused)?;
                    return Ok(AuthnOutcome::Success(response));
                }
                Ok(response) => {
                    debug!(status = response.status(), "Session refresh rejected");
                }
                Err(ProviderError::Provider { message, .. }) => {
                    debug!(reason = %message, "Session not reusable");
                }
                Err(e) => return Err(e),
            }
        }

        info!(username = %self.username, domain = %self.domain, "Authenticating");
        self.tracker.transition(AuthnInput::CredentialsSubmitted)?;
        let response = self
            .rest(
                Method::POST,
                &self.api_url("/authn"),
                Some(json!({"username": self.username, "password": self.password})),
            )
            .await?;

        let status = response.get_str("status").map(str::to_string);
        match status.as_deref() {
            Some("MFA_REQUIRED") => {
                debug!("MFA required");
                let factors = parse_factors(&response)?;
                self.tracker.transition(AuthnInput::MfaDemanded)?;
                Ok(AuthnOutcome::MfaRequired(MfaChallenge { factors, response }))
            }
            Some("SUCCESS") => {
                let session_token = response.require_str("sessionToken")?.to_string();
                self.session_create(&session_token).await?;
                self.tracker.transition(AuthnInput::Accepted)?;
                Ok(AuthnOutcome::Success(response))
            }
            status => {
                self.tracker.transition(AuthnInput::Rejected)?;
                Err(match response.get_str("errorCode") {
                    Some(code) => ProviderError::with_code(
                        PROVIDER_NAME,
                        code,
                        response.get_str("errorSummary").unwrap_or_default(),
                    ),
                    None => ProviderError::provider(
                        PROVIDER_NAME,
                        format!("Unexpected authentication status: {}", status.unwrap_or("none")),
                    ),
                })
            }
        }
    }

    /// Verify `factor_id` from `challenge`, polling while Okta reports
    /// `WAITING` (push approval, Duo frame). Creates the session on success.
    pub async fn verify(
        &mut self,
        challenge: &MfaChallenge,
        factor_id: &str,
        factor_args: Map<String, Value>,
    ) -> ProviderResult<RestResponse> {
        let factor = factor_by_id(&challenge.response, factor_id)
            .ok_or_else(|| ProviderError::mfa(PROVIDER_NAME, format!("unknown factor {}", factor_id)))?;
        let url = require_str_path(factor, &["_links", "verify", "href"])?.to_string();
        let factor_type = factor.get("factorType").and_then(Value::as_str).unwrap_or_default();

        let mut data = factor_args;
        data.insert(
            "stateToken".to_string(),
            Value::String(challenge.response.require_str("stateToken")?.to_string()),
        );
        let data = Value::Object(data);

        self.tracker.transition(AuthnInput::FactorSubmitted)?;

        // Kept alive until verification ends; dropping it stops the listener.
        let mut _relay: Option<CallbackRelay> = None;
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            debug!(attempt, "Checking MFA verification status");
            let response = self.rest(Method::POST, &url, Some(data.clone())).await?;

            if factor_type == "web" && attempt == 1 {
                _relay = Some(self.verify_web(&response).await?);
            }

            let factor_result = response.get_str("factorResult").unwrap_or_default();
            if factor_result == "WAITING" {
                self.tracker.transition(AuthnInput::Waiting)?;
                sleep_or_interrupt(self.poll_interval).await?;
                continue;
            }

            if response.get_str("status") == Some("SUCCESS") {
                let session_token = response.require_str("sessionToken")?.to_string();
                self.session_create(&session_token).await?;
                self.tracker.transition(AuthnInput::Accepted)?;
                return Ok(response);
            }

            self.tracker.transition(AuthnInput::Rejected)?;
            let reason = if factor_result.is_empty() {
                response.get_str("errorSummary").unwrap_or("no factor result")
            } else {
                factor_result
            };
            return Err(ProviderError::mfa(PROVIDER_NAME, reason));
        }
    }

    /// Show the Duo frame for a `web` factor. The frame posts straight to
    /// Okta, so the verify loop keeps polling for the result.
    async fn verify_web(&self, response: &RestResponse) -> ProviderResult<CallbackRelay> {
        let verification = response.require_path(&["_embedded", "factor", "_embedded", "verification"])?;
        let frame = DuoFrame::new(
            &format!("Okta ({})", self.username),
            require_str_path(verification, &["host"])?,
            require_str_path(verification, &["signature"])?,
            require_str_path(verification, &["_links", "complete", "href"])?,
        )
        .with_form_arg("stateToken", response.require_str("stateToken")?)
        .with_script_url(require_str_path(verification, &["_links", "script", "href"])?);

        let relay = CallbackRelay::start(&frame, RelayMode::Direct, self.http.clone()).await?;
        relay.open(self.browser.as_ref())?;
        Ok(relay)
    }

    /// Exchange a one-time session token for a session and keep its id and
    /// refresh link.
    pub async fn session_create(&mut self, session_token: &str) -> ProviderResult<RestResponse> {
        debug!("Creating session");
        let response = self
            .rest(
                Method::POST,
                &self.api_url("/sessions"),
                Some(json!({"sessionToken": session_token})),
            )
            .await?;

        if response.get_str("status") == Some("ACTIVE") {
            debug!("Saving session data");
            self.session = OktaSession {
                id: response.require_str("id")?.to_string(),
                refresh_url: require_str_path(response.data(), &["_links", "refresh", "href"])?.to_string(),
            };
        }
        Ok(response)
    }

    pub async fn session_refresh(&self) -> ProviderResult<RestResponse> {
        if self.session.refresh_url.is_empty() {
            return Err(ProviderError::provider(PROVIDER_NAME, "No session refresh URL found"));
        }
        debug!("Refreshing session");
        self.rest(Method::POST, &self.session.refresh_url, None).await
    }

    /// The user's app links as applications.
    pub async fn app_links(&self) -> ProviderResult<Vec<SamlApplication>> {
        debug!("Requesting app links");
        let response = self
            .rest(Method::GET, &self.api_url("/users/me/appLinks"), None)
            .await?;
        if !response.is_success() {
            return Err(api_error(&response));
        }
        response
            .as_array()
            .iter()
            .map(|link| -> ProviderResult<SamlApplication> {
                Ok(SamlApplication::new(
                    require_str_path(link, &["label"])?,
                    require_str_path(link, &["linkUrl"])?,
                ))
            })
            .collect()
    }

    pub async fn saml_request(&self, url: &str) -> ProviderResult<SamlAssertion> {
        let request = HttpRequest::get(url).cookie(SESSION_COOKIE, &self.session.id);
        Ok(self.http.saml_request(request).await?)
    }
}

fn api_error(response: &RestResponse) -> ProviderError {
    match response.get_str("errorCode") {
        Some(code) => ProviderError::with_code(
            PROVIDER_NAME,
            code,
            response.get_str("errorSummary").unwrap_or_default(),
        ),
        None => ProviderError::provider(PROVIDER_NAME, format!("HTTP {}", response.status())),
    }
}

fn embedded_factors(response: &RestResponse) -> ProviderResult<&[Value]> {
    let factors = response.require_path(&["_embedded", "factors"])?;
    Ok(factors.as_array().map(Vec::as_slice).unwrap_or_default())
}

fn parse_factors(response: &RestResponse) -> ProviderResult<Vec<Factor>> {
    embedded_factors(response)?
        .iter()
        .map(|factor| -> ProviderResult<Factor> {
            Ok(Factor::new(
                require_str_path(factor, &["id"])?,
                require_str_path(factor, &["factorType"])?,
            )
            .with_provider(factor.get("provider").and_then(Value::as_str).unwrap_or_default())
            .with_profile(factor.get("profile").cloned().unwrap_or(Value::Null)))
        })
        .collect()
}

/// Ids of the offered factors of `factor_type`.
pub fn factor_ids_by_type(response: &RestResponse, factor_type: &str) -> ProviderResult<Vec<String>> {
    Ok(embedded_factors(response)?
        .iter()
        .filter(|f| f.get("factorType").and_then(Value::as_str) == Some(factor_type))
        .filter_map(|f| f.get("id").and_then(Value::as_str).map(str::to_string))
        .collect())
}

pub fn factor_by_id<'a>(response: &'a RestResponse, id: &str) -> Option<&'a Value> {
    embedded_factors(response)
        .ok()?
        .iter()
        .find(|f| f.get("id").and_then(Value::as_str) == Some(id))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use broker_http::{HttpResponse, MockTransport};
    use callback_relay::RecordingBrowser;

    pub(crate) const DOMAIN: &str = "example.okta.com";
    pub(crate) const AUTHN: &str = "https://example.okta.com/api/v1/authn";
    pub(crate) const SESSIONS: &str = "https://example.okta.com/api/v1/sessions";
    pub(crate) const REFRESH: &str = "https://example.okta.com/api/v1/sessions/me/lifecycle/refresh";
    pub(crate) const APP_LINKS: &str = "https://example.okta.com/api/v1/users/me/appLinks";
    pub(crate) const PUSH_VERIFY: &str = "https://example.okta.com/api/v1/authn/factors/opf1/verify";
    pub(crate) const SMS_VERIFY: &str = "https://example.okta.com/api/v1/authn/factors/sms1/verify";
    pub(crate) const WEB_VERIFY: &str = "https://example.okta.com/api/v1/authn/factors/dsf1/verify";

    pub(crate) fn session_active() -> HttpResponse {
        HttpResponse::new(200).with_json(&json!({
            "id": "102sessionid",
            "status": "ACTIVE",
            "_links": {"refresh": {"href": REFRESH}}
        }))
    }

    pub(crate) fn mfa_required(factors: Value) -> HttpResponse {
        HttpResponse::new(200).with_json(&json!({
            "status": "MFA_REQUIRED",
            "stateToken": "state-token",
            "_embedded": {"factors": factors}
        }))
    }

    pub(crate) fn push_factor() -> Value {
        json!({
            "id": "opf1",
            "factorType": "push",
            "provider": "OKTA",
            "profile": {"name": "Phone"},
            "_links": {"verify": {"href": PUSH_VERIFY}}
        })
    }

    pub(crate) fn sms_factor() -> Value {
        json!({
            "id": "sms1",
            "factorType": "sms",
            "provider": "OKTA",
            "profile": {"phoneNumber": "+1 XXX-XXX-1234"},
            "_links": {"verify": {"href": SMS_VERIFY}}
        })
    }

    fn client(mock: &Arc<MockTransport>, session: OktaSession) -> OktaClient {
        OktaClient::new(
            HttpClient::new(mock.clone()),
            Arc::new(RecordingBrowser::new()),
            DOMAIN,
            "user@example.com",
            "hunter2",
            session,
        )
        .with_poll_interval(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_authn_success_creates_session() {
        let mock = Arc::new(MockTransport::new());
        mock.on(
            Method::POST,
            AUTHN,
            HttpResponse::new(200).with_json(&json!({"status": "SUCCESS", "sessionToken": "one-time"})),
        );
        mock.on(Method::POST, SESSIONS, session_active());

        let mut client = client(&mock, OktaSession::default());
        assert!(client.authn(false).await.unwrap().is_success());
        assert_eq!(client.session().id, "102sessionid");
        assert_eq!(client.session().refresh_url, REFRESH);
        assert_eq!(*client.authn_state(), AuthnState::Success);

        let authn = &mock.requests_to(&Method::POST, AUTHN)[0];
        assert_eq!(authn.json_field("username"), Some(&json!("user@example.com")));
        assert_eq!(authn.cookie_header(), None);
        let create = &mock.requests_to(&Method::POST, SESSIONS)[0];
        assert_eq!(create.json_field("sessionToken"), Some(&json!("one-time")));
    }

    #[tokio::test]
    async fn test_lazy_authn_reuses_session() {
        let mock = Arc::new(MockTransport::new());
        mock.on(Method::POST, REFRESH, HttpResponse::new(200).with_json(&json!({"status": "ACTIVE"})));

        let session = OktaSession {
            id: "existing".to_string(),
            refresh_url: REFRESH.to_string(),
        };
        let mut client = client(&mock, session);
        assert!(client.authn(true).await.unwrap().is_success());

        assert_eq!(mock.count(&Method::POST, AUTHN), 0);
        assert_eq!(
            mock.requests_to(&Method::POST, REFRESH)[0].cookie_header().as_deref(),
            Some("sid=existing")
        );
    }

    #[tokio::test]
    async fn test_lazy_authn_falls_back_without_refresh_url() {
        let mock = Arc::new(MockTransport::new());
        mock.on(
            Method::POST,
            AUTHN,
            HttpResponse::new(200).with_json(&json!({"status": "SUCCESS", "sessionToken": "t"})),
        );
        mock.on(Method::POST, SESSIONS, session_active());

        let mut client = client(&mock, OktaSession::default());
        assert!(client.authn(true).await.unwrap().is_success());
        assert_eq!(mock.count(&Method::POST, AUTHN), 1);
    }

    #[tokio::test]
    async fn test_lazy_authn_falls_back_on_expired_session() {
        let mock = Arc::new(MockTransport::new());
        mock.on(
            Method::POST,
            REFRESH,
            HttpResponse::new(404).with_json(&json!({"errorCode": "E0000007"})),
        );
        mock.on(
            Method::POST,
            AUTHN,
            HttpResponse::new(200).with_json(&json!({"status": "SUCCESS", "sessionToken": "t"})),
        );
        mock.on(Method::POST, SESSIONS, session_active());

        let session = OktaSession {
            id: "stale".to_string(),
            refresh_url: REFRESH.to_string(),
        };
        let mut client = client(&mock, session);
        assert!(client.authn(true).await.unwrap().is_success());
        assert_eq!(client.session().id, "102sessionid");
    }

    #[tokio::test]
    async fn test_authn_error_code() {
        let mock = Arc::new(MockTransport::new());
        mock.on(
            Method::POST,
            AUTHN,
            HttpResponse::new(401).with_json(&json!({
                "errorCode": "E0000004",
                "errorSummary": "Authentication failed"
            })),
        );

        let mut client = client(&mock, OktaSession::default());
        let err = client.authn(false).await.unwrap_err();
        assert_eq!(err.to_string(), "Okta: E0000004 - Authentication failed");
        assert!(!err.to_string().contains("hunter2"));
        assert_eq!(*client.authn_state(), AuthnState::Failed);
    }

    #[tokio::test]
    async fn test_transport_errors_propagate() {
        let mock = Arc::new(MockTransport::new());
        mock.fail(Method::POST, AUTHN, "connection refused");

        let mut client = client(&mock, OktaSession::default());
        assert!(matches!(
            client.authn(false).await,
            Err(ProviderError::Http(broker_http::HttpError::Connection(_)))
        ));
        assert_eq!(mock.count(&Method::POST, AUTHN), 1);
    }

    #[tokio::test]
    async fn test_mfa_push_polls_until_success() {
        let mock = Arc::new(MockTransport::new());
        mock.on(Method::POST, AUTHN, mfa_required(json!([push_factor(), sms_factor()])));
        let waiting = HttpResponse::new(200).with_json(&json!({"status": "MFA_CHALLENGE", "factorResult": "WAITING"}));
        mock.on(Method::POST, PUSH_VERIFY, waiting.clone())
            .on(Method::POST, PUSH_VERIFY, waiting)
            .on(
                Method::POST,
                PUSH_VERIFY,
                HttpResponse::new(200).with_json(&json!({"status": "SUCCESS", "sessionToken": "t"})),
            );
        mock.on(Method::POST, SESSIONS, session_active());

        let mut client = client(&mock, OktaSession::default());
        let challenge = match client.authn(false).await.unwrap() {
            AuthnOutcome::MfaRequired(challenge) => challenge,
            other => panic!("expected MFA, got {:?}", other),
        };
        assert_eq!(challenge.factors.len(), 2);
        assert_eq!(challenge.factors[0].factor_type, "push");
        assert_eq!(*client.authn_state(), AuthnState::MfaRequired);

        client.verify(&challenge, "opf1", Map::new()).await.unwrap();

        let polls = mock.requests_to(&Method::POST, PUSH_VERIFY);
        assert_eq!(polls.len(), 3);
        assert!(polls.iter().all(|r| r.json_field("stateToken") == Some(&json!("state-token"))));
        assert_eq!(client.session().id, "102sessionid");
        assert_eq!(mock.count(&Method::POST, AUTHN), 1);
    }

    #[tokio::test]
    async fn test_mfa_rejected() {
        let mock = Arc::new(MockTransport::new());
        mock.on(Method::POST, AUTHN, mfa_required(json!([push_factor()])));
        mock.on(
            Method::POST,
            PUSH_VERIFY,
            HttpResponse::new(200).with_json(&json!({"status": "MFA_CHALLENGE", "factorResult": "REJECTED"})),
        );

        let mut client = client(&mock, OktaSession::default());
        let AuthnOutcome::MfaRequired(challenge) = client.authn(false).await.unwrap() else {
            panic!("expected MFA");
        };
        let err = client.verify(&challenge, "opf1", Map::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "Okta MFA verification failed: REJECTED");
        assert_eq!(*client.authn_state(), AuthnState::Failed);
    }

    #[tokio::test]
    async fn test_passcode_is_sent_with_state_token() {
        let mock = Arc::new(MockTransport::new());
        mock.on(Method::POST, AUTHN, mfa_required(json!([sms_factor()])));
        mock.on(
            Method::POST,
            SMS_VERIFY,
            HttpResponse::new(200).with_json(&json!({"status": "SUCCESS", "sessionToken": "t"})),
        );
        mock.on(Method::POST, SESSIONS, session_active());

        let mut client = client(&mock, OktaSession::default());
        let AuthnOutcome::MfaRequired(challenge) = client.authn(false).await.unwrap() else {
            panic!("expected MFA");
        };
        let mut args = Map::new();
        args.insert("passCode".to_string(), json!("123456"));
        client.verify(&challenge, "sms1", args).await.unwrap();

        let sent = &mock.requests_to(&Method::POST, SMS_VERIFY)[0];
        assert_eq!(sent.json_field("passCode"), Some(&json!("123456")));
        assert_eq!(sent.json_field("stateToken"), Some(&json!("state-token")));
    }

    #[tokio::test]
    async fn test_web_factor_opens_relay_once() {
        let mock = Arc::new(MockTransport::new());
        let web_factor = json!({
            "id": "dsf1",
            "factorType": "web",
            "provider": "DUO",
            "_links": {"verify": {"href": WEB_VERIFY}}
        });
        mock.on(Method::POST, AUTHN, mfa_required(json!([web_factor])));
        let waiting = HttpResponse::new(200).with_json(&json!({
            "status": "MFA_CHALLENGE",
            "factorResult": "WAITING",
            "stateToken": "state-token",
            "_embedded": {"factor": {"_embedded": {"verification": {
                "host": "api-1.duosecurity.com",
                "signature": "TX|sig:APP|sig",
                "_links": {
                    "complete": {"href": "https://example.okta.com/api/v1/authn/factors/dsf1/lifecycle/duoCallback"},
                    "script": {"href": "https://example.okta.com/js/sections/duo/Duo-Web-v2.6.js"}
                }
            }}}}
        }));
        mock.on(Method::POST, WEB_VERIFY, waiting.clone())
            .on(Method::POST, WEB_VERIFY, waiting)
            .on(
                Method::POST,
                WEB_VERIFY,
                HttpResponse::new(200).with_json(&json!({"status": "SUCCESS", "sessionToken": "t"})),
            );
        mock.on(Method::POST, SESSIONS, session_active());

        let browser = Arc::new(RecordingBrowser::new());
        let mut client = OktaClient::new(
            HttpClient::new(mock.clone()),
            browser.clone(),
            DOMAIN,
            "user@example.com",
            "hunter2",
            OktaSession::default(),
        )
        .with_poll_interval(Duration::from_millis(1));

        let AuthnOutcome::MfaRequired(challenge) = client.authn(false).await.unwrap() else {
            panic!("expected MFA");
        };
        client.verify(&challenge, "dsf1", Map::new()).await.unwrap();

        let opened = browser.urls();
        assert_eq!(opened.len(), 1);
        assert!(opened[0].starts_with("http://127.0.0.1:"));
        assert_eq!(mock.count(&Method::POST, WEB_VERIFY), 3);
    }

    #[tokio::test]
    async fn test_app_links() {
        let mock = Arc::new(MockTransport::new());
        mock.on(
            Method::GET,
            APP_LINKS,
            HttpResponse::new(200).with_json(&json!([
                {"label": "AWS", "linkUrl": "https://example.okta.com/home/amazon_aws/0oa1/272"},
                {"label": "Slack", "linkUrl": "https://example.okta.com/home/slack/0oa2/123"}
            ])),
        );

        let client = client(&mock, OktaSession::default());
        let apps = client.app_links().await.unwrap();
        assert_eq!(apps[0], SamlApplication::new("AWS", "https://example.okta.com/home/amazon_aws/0oa1/272"));
        assert_eq!(apps.len(), 2);
    }

    #[test]
    fn test_factor_helpers() {
        let response = mfa_required(json!([push_factor(), sms_factor(), push_factor()])).into_rest();
        assert_eq!(factor_ids_by_type(&response, "push").unwrap(), vec!["opf1", "opf1"]);
        assert_eq!(factor_ids_by_type(&response, "call").unwrap(), Vec::<String>::new());
        assert_eq!(
            factor_by_id(&response, "sms1").and_then(|f| f.get("factorType")),
            Some(&json!("sms"))
        );
        assert!(factor_by_id(&response, "nope").is_none());

        let empty = HttpResponse::new(200).into_rest();
        assert!(factor_ids_by_type(&empty, "push").is_err());
    }
}
