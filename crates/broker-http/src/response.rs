use crate::{HttpError, HttpResult};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Status, headers and body of a completed request.
///
/// Header names are stored lowercase; lookups are case-insensitive.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_json(self, body: &Value) -> Self {
        self.with_header("content-type", "application/json")
            .with_body(body.to_string())
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_ascii_lowercase(), value.into()));
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// First header named `name`.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Value of cookie `name` from the `Set-Cookie` headers.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .filter(|(header, _)| header.eq_ignore_ascii_case("set-cookie"))
            .filter_map(|(_, value)| value.split(';').next())
            .filter_map(|pair| pair.split_once('='))
            .find(|(cookie, _)| cookie.trim() == name)
            .map(|(_, value)| value.trim())
    }

    pub fn json<T: DeserializeOwned>(&self) -> HttpResult<T> {
        serde_json::from_str(&self.body).map_err(|e| HttpError::UnexpectedType {
            key: format!("response body ({})", e),
            expected: "JSON document",
        })
    }

    pub fn into_rest(self) -> RestResponse {
        RestResponse::from_response(self)
    }
}

/// A response whose body was decoded as JSON.
///
/// A body that is not JSON decodes as an empty object, so callers can look
/// keys up uniformly and report a missing key instead of a parse failure.
#[derive(Debug, Clone, PartialEq)]
pub struct RestResponse {
    response: HttpResponse,
    data: Value,
}

impl RestResponse {
    pub fn from_response(response: HttpResponse) -> Self {
        let data = serde_json::from_str(&response.body).unwrap_or_else(|_| Value::Object(Map::new()));
        Self { response, data }
    }

    pub fn response(&self) -> &HttpResponse {
        &self.response
    }

    pub fn status(&self) -> u16 {
        self.response.status
    }

    pub fn is_success(&self) -> bool {
        self.response.is_success()
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.get(key).is_some()
    }

    pub fn require(&self, key: &str) -> HttpResult<&Value> {
        require_path(&self.data, &[key])
    }

    pub fn require_str(&self, key: &str) -> HttpResult<&str> {
        require_str_path(&self.data, &[key])
    }

    pub fn require_path(&self, path: &[&str]) -> HttpResult<&Value> {
        require_path(&self.data, path)
    }

    /// Elements of a top-level array body; empty for anything else.
    pub fn as_array(&self) -> &[Value] {
        self.data.as_array().map(Vec::as_slice).unwrap_or_default()
    }
}

/// Walk `path` through nested objects.
pub fn require_path<'a>(value: &'a Value, path: &[&str]) -> HttpResult<&'a Value> {
    let mut current = value;
    for (depth, key) in path.iter().enumerate() {
        current = current
            .get(*key)
            .ok_or_else(|| HttpError::MissingKey(path[..=depth].join(".")))?;
    }
    Ok(current)
}

pub fn require_str_path<'a>(value: &'a Value, path: &[&str]) -> HttpResult<&'a str> {
    require_path(value, path)?
        .as_str()
        .ok_or_else(|| HttpError::UnexpectedType {
            key: path.join("."),
            expected: "string",
        })
}
