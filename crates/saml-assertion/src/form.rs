use crate::{SamlError, SamlResult};
use regex::Regex;
use std::sync::OnceLock;

fn input_tag() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<input\b[^>]*>").expect("valid input tag regex"))
}

fn tag_attribute() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?s)([A-Za-z_:][-A-Za-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#)
            .expect("valid attribute regex")
    })
}

/// Find the value of the first `<input name="SAMLResponse">` in an HTML page.
pub fn extract_saml_response(html: &str) -> SamlResult<String> {
    for tag in input_tag().find_iter(html) {
        let mut name = None;
        let mut value = None;

        for caps in tag_attribute().captures_iter(tag.as_str()) {
            let raw = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map(|m| m.as_str())
                .unwrap_or_default();

            match caps[1].to_ascii_lowercase().as_str() {
                "name" => name = Some(raw),
                "value" => value = Some(raw),
                _ => {}
            }
        }

        if name == Some("SAMLResponse") {
            let raw = value.unwrap_or_default();
            return Ok(quick_xml::escape::unescape(raw)
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| raw.to_string()));
        }
    }

    Err(SamlError::ResponseNotFound)
}
