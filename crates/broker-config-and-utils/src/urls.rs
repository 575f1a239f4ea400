//! URL predicates.

use url::Url;

/// True when `value` parses as an absolute URL with a host.
pub fn is_url(value: &str) -> bool {
    Url::parse(value)
        .map(|url| url.host_str().is_some_and(|host| !host.is_empty()))
        .unwrap_or(false)
}

/// True when the host of `url` is exactly `domain` (case-insensitive).
pub fn url_has_domain(url: &str, domain: &str) -> bool {
    if domain.is_empty() {
        return false;
    }
    Url::parse(url)
        .ok()
        .and_then(|url| url.host_str().map(|host| host.eq_ignore_ascii_case(domain)))
        .unwrap_or(false)
}
