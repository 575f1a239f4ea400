use crate::{SamlError, SamlResult};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::Serialize;
use tracing::debug;

/// Attributes of the first `AttributeStatement` in a SAML document.
///
/// Names keep document order and values keep their order within an
/// attribute. When a name repeats, the first attribute wins and later ones
/// are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SamlAttributes {
    entries: Vec<(String, Vec<String>)>,
}

impl SamlAttributes {
    pub fn parse(xml: &str) -> SamlResult<Self> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut attributes = Self::default();
        let mut in_statement = false;
        let mut statement_seen = false;
        let mut current: Option<(String, Vec<String>)> = None;
        let mut value: Option<String> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => match e.local_name().as_ref() {
                    b"AttributeStatement" if !statement_seen => in_statement = true,
                    b"Attribute" if in_statement => current = Some((attribute_name(&e)?, Vec::new())),
                    b"AttributeValue" if current.is_some() => value = Some(String::new()),
                    _ => {}
                },
                Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                    b"Attribute" if in_statement => attributes.insert(attribute_name(&e)?, Vec::new()),
                    b"AttributeValue" => {
                        if let Some((_, values)) = current.as_mut() {
                            values.push(String::new());
                        }
                    }
                    _ => {}
                },
                Ok(Event::Text(text)) => {
                    if let Some(value) = value.as_mut() {
                        let text = text.unescape().map_err(|e| SamlError::Xml(e.to_string()))?;
                        value.push_str(&text);
                    }
                }
                Ok(Event::CData(data)) => {
                    if let Some(value) = value.as_mut() {
                        value.push_str(&String::from_utf8_lossy(&data));
                    }
                }
                Ok(Event::End(e)) => match e.local_name().as_ref() {
                    b"AttributeValue" => {
                        if let (Some(finished), Some((_, values))) = (value.take(), current.as_mut()) {
                            values.push(finished);
                        }
                    }
                    b"Attribute" => {
                        if let Some((name, values)) = current.take() {
                            attributes.insert(name, values);
                        }
                    }
                    b"AttributeStatement" if in_statement => {
                        in_statement = false;
                        statement_seen = true;
                    }
                    _ => {}
                },
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(SamlError::Xml(format!(
                        "parse error at byte {}: {}",
                        reader.error_position(),
                        e
                    )))
                }
                _ => {}
            }
        }

        Ok(attributes)
    }

    fn insert(&mut self, name: String, values: Vec<String>) {
        if self.contains(&name) {
            debug!(attribute = %name, "Ignoring repeated SAML attribute");
            return;
        }
        self.entries.push((name, values));
    }

    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, values)| values.as_slice())
    }

    /// First value of `name`, if the attribute exists and has one.
    pub fn first(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|values| values.first()).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn attribute_name(element: &BytesStart<'_>) -> SamlResult<String> {
    for attr in element.attributes().flatten() {
        if attr.key.local_name().as_ref() == b"Name" {
            let value = attr
                .unescape_value()
                .map_err(|e| SamlError::Xml(e.to_string()))?;
            return Ok(value.into_owned());
        }
    }
    Err(SamlError::Xml("Attribute element without a Name".to_string()))
}
