use crate::{HttpError, HttpRequest, HttpResponse, HttpResult, HttpTransport, Method};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

#[derive(Clone)]
enum Reply {
    Response(HttpResponse),
    Failure(String),
}

/// In-memory transport with canned replies per `(method, url)`.
///
/// URLs are matched without their query string. Replies queued for a route
/// are returned in order and the last one repeats, which models polling
/// endpoints. Every request is recorded.
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<(Method, String), VecDeque<Reply>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

fn route_url(url: &str) -> String {
    url.split('?').next().unwrap_or(url).to_string()
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, method: Method, url: &str, response: HttpResponse) -> &Self {
        self.push(method, url, Reply::Response(response))
    }

    /// Queue a transport failure.
    pub fn fail(&self, method: Method, url: &str, message: &str) -> &Self {
        self.push(method, url, Reply::Failure(message.to_string()))
    }

    fn push(&self, method: Method, url: &str, reply: Reply) -> &Self {
        self.routes
            .lock()
            .entry((method, route_url(url)))
            .or_default()
            .push_back(reply);
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    pub fn requests_to(&self, method: &Method, url: &str) -> Vec<HttpRequest> {
        let url = route_url(url);
        self.requests
            .lock()
            .iter()
            .filter(|request| &request.method == method && route_url(&request.url) == url)
            .cloned()
            .collect()
    }

    pub fn count(&self, method: &Method, url: &str) -> usize {
        self.requests_to(method, url).len()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> HttpResult<HttpResponse> {
        let key = (request.method.clone(), route_url(&request.url));
        self.requests.lock().push(request);

        let reply = {
            let mut routes = self.routes.lock();
            match routes.get_mut(&key) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };

        match reply {
            Some(Reply::Response(response)) => Ok(response),
            Some(Reply::Failure(message)) => Err(HttpError::Connection(message)),
            None => Err(HttpError::Connection(format!(
                "no mock response for {} {}",
                key.0, key.1
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replies_in_order_then_repeat() {
        let mock = MockTransport::new();
        mock.on(Method::POST, "https://x/poll", HttpResponse::new(400))
            .on(Method::POST, "https://x/poll", HttpResponse::new(200));

        let statuses = [
            mock.send(HttpRequest::post("https://x/poll")).await.unwrap().status,
            mock.send(HttpRequest::post("https://x/poll?a=b")).await.unwrap().status,
            mock.send(HttpRequest::post("https://x/poll")).await.unwrap().status,
        ];
        assert_eq!(statuses, [400, 200, 200]);
        assert_eq!(mock.count(&Method::POST, "https://x/poll"), 3);
    }

    #[tokio::test]
    async fn test_unrouted_and_failures() {
        let mock = MockTransport::new();
        mock.fail(Method::GET, "https://x/down", "connection refused");

        assert!(matches!(
            mock.send(HttpRequest::get("https://x/down")).await,
            Err(HttpError::Connection(msg)) if msg == "connection refused"
        ));
        assert!(mock.send(HttpRequest::get("https://x/other")).await.is_err());
        assert_eq!(mock.requests().len(), 2);
    }
}
