use crate::{HttpRequest, HttpResponse, HttpResult, HttpTransport, ReqwestTransport, RequestBody, RestResponse};
use saml_assertion::{extract_saml_response, SamlAssertion};
use std::sync::Arc;
use tracing::debug;

const JSON: &str = "application/json";
const HTML: &str = "text/html";
const FORM: &str = "application/x-www-form-urlencoded";

/// Shared handle to an [`HttpTransport`] with per-kind request defaults.
#[derive(Clone)]
pub struct HttpClient {
    transport: Arc<dyn HttpTransport>,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient").finish_non_exhaustive()
    }
}

impl HttpClient {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    /// Client over the real network.
    pub fn with_reqwest() -> HttpResult<Self> {
        Ok(Self::new(Arc::new(ReqwestTransport::new()?)))
    }

    /// Send a request as-is.
    pub async fn send(&self, request: HttpRequest) -> HttpResult<HttpResponse> {
        debug!(method = %request.method, url = %request.url, "HTTP request");
        self.transport.send(request).await
    }

    /// JSON API call. Defaults `Accept` to JSON and `Content-Type` to match
    /// the body; caller headers take precedence.
    pub async fn rest_request(&self, request: HttpRequest) -> HttpResult<RestResponse> {
        let content_type = match request.body {
            RequestBody::Form(_) => FORM,
            _ => JSON,
        };
        let request = request
            .default_header("Accept", JSON)
            .default_header("Content-Type", content_type);
        Ok(self.send(request).await?.into_rest())
    }

    /// Browser-style request expecting an HTML page.
    pub async fn html_request(&self, request: HttpRequest) -> HttpResult<HttpResponse> {
        let request = request
            .default_header("Accept", HTML)
            .default_header("Content-Type", HTML);
        self.send(request).await
    }

    /// Fetch an HTML page and parse the SAML assertion carried in its
    /// `SAMLResponse` form field.
    pub async fn saml_request(&self, request: HttpRequest) -> HttpResult<SamlAssertion> {
        let response = self.html_request(request).await?;
        let encoded = extract_saml_response(&response.body)?;
        Ok(SamlAssertion::new(&encoded)?)
    }
}
