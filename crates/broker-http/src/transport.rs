use crate::{HttpError, HttpRequest, HttpResponse, HttpResult, RequestBody};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, COOKIE};
use reqwest::redirect::Policy;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Sends requests. Implemented by [`ReqwestTransport`] in production and by
/// an in-memory mock in tests.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> HttpResult<HttpResponse>;
}

/// `reqwest`-backed transport.
///
/// Two clients share nothing but configuration: one follows redirects, the
/// other returns 3xx responses so callers can inspect `Location`. Both keep
/// a cookie jar for the life of the process; explicit cookies on a request
/// are sent as a `Cookie` header on top of it.
pub struct ReqwestTransport {
    client: Client,
    no_redirect_client: Client,
}

impl ReqwestTransport {
    pub fn new() -> HttpResult<Self> {
        let client = Client::builder()
            .cookie_store(true)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        let no_redirect_client = Client::builder()
            .cookie_store(true)
            .timeout(REQUEST_TIMEOUT)
            .redirect(Policy::none())
            .build()?;
        Ok(Self {
            client,
            no_redirect_client,
        })
    }

    fn header_map(request: &HttpRequest) -> HttpResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        for (name, value) in &request.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| HttpError::InvalidHeader(name.clone()))?;
            let header_value =
                HeaderValue::from_str(value).map_err(|_| HttpError::InvalidHeader(name.clone()))?;
            headers.insert(header_name, header_value);
        }
        if let Some(cookies) = request.cookie_header() {
            let value = HeaderValue::from_str(&cookies)
                .map_err(|_| HttpError::InvalidHeader("Cookie".to_string()))?;
            headers.insert(COOKIE, value);
        }
        Ok(headers)
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> HttpResult<HttpResponse> {
        let client = if request.follow_redirects {
            &self.client
        } else {
            &self.no_redirect_client
        };
        let headers = Self::header_map(&request)?;

        let mut builder = client.request(request.method.clone(), &request.url);
        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Form(pairs) => builder.form(pairs),
            RequestBody::Text(text) => builder.body(text.clone()),
        };
        // Applied after the body so explicit headers win over the body's
        // content type.
        let response = builder.headers(headers).send().await?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response.text().await?;

        debug!(
            method = %request.method,
            url = %request.url,
            status,
            body_len = body.len(),
            "HTTP response"
        );

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
