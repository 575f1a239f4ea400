use crate::{SamlAttributes, SamlResult};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::fmt;

/// An immutable SAML response: raw XML, its base64 form and the parsed
/// attribute statement.
///
/// Two assertions are equal when their XML is byte-for-byte equal.
#[derive(Clone)]
pub struct SamlAssertion {
    xml: String,
    b64encoded: String,
    attributes: SamlAttributes,
}

impl SamlAssertion {
    /// Accepts either the base64 `SAMLResponse` form value or raw XML.
    ///
    /// Input that decodes as base64 into UTF-8 is treated as encoded;
    /// anything else is taken as the XML itself.
    pub fn new(data: &str) -> SamlResult<Self> {
        let xml = decode_base64_utf8(data).unwrap_or_else(|| data.to_string());
        Self::from_xml(xml)
    }

    pub fn from_xml(xml: String) -> SamlResult<Self> {
        let attributes = SamlAttributes::parse(&xml)?;
        tracing::debug!(attributes = attributes.len(), xml_len = xml.len(), "Parsed SAML assertion");
        let b64encoded = STANDARD.encode(xml.as_bytes());
        Ok(Self {
            xml,
            b64encoded,
            attributes,
        })
    }

    pub fn xml(&self) -> &str {
        &self.xml
    }

    /// Standard base64 of the XML, as STS `AssumeRoleWithSAML` expects it.
    pub fn b64encoded(&self) -> &str {
        &self.b64encoded
    }

    pub fn attributes(&self) -> &SamlAttributes {
        &self.attributes
    }
}

fn decode_base64_utf8(data: &str) -> Option<String> {
    let compact: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if compact.is_empty() {
        return None;
    }
    let bytes = STANDARD.decode(compact).ok()?;
    String::from_utf8(bytes).ok()
}

impl PartialEq for SamlAssertion {
    fn eq(&self, other: &Self) -> bool {
        self.xml == other.xml
    }
}

impl Eq for SamlAssertion {}

// Assertions are bearer credentials; keep them out of debug output.
impl fmt::Debug for SamlAssertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SamlAssertion")
            .field("xml_len", &self.xml.len())
            .field("attributes", &self.attributes.names().collect::<Vec<_>>())
            .finish()
    }
}

impl fmt::Display for SamlAssertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.xml)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::SamlError;

    pub(crate) const RESPONSE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<samlp:Response xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" ID="_8e8dc5f69a98cc4c1ff3427e5ce34606fd672f91e6" Version="2.0" IssueInstant="2014-07-17T01:01:48Z" Destination="http://sp.example.com/demo1/index.php?acs" InResponseTo="ONELOGIN_4fee3b046395c4e751011e97f8900b5273d56685">
  <saml:Issuer>http://idp.example.com/metadata.php</saml:Issuer>
  <samlp:Status>
    <samlp:StatusCode Value="urn:oasis:names:tc:SAML:2.0:status:Success"/>
  </samlp:Status>
  <saml:Assertion xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xmlns:xs="http://www.w3.org/2001/XMLSchema" ID="_d71a3a8e9fcc45c9e9d248ef7049393fc8f04e5f75" Version="2.0" IssueInstant="2014-07-17T01:01:48Z">
    <saml:Issuer>http://idp.example.com/metadata.php</saml:Issuer>
    <saml:Subject>
      <saml:NameID SPNameQualifier="http://sp.example.com/demo1/metadata.php" Format="urn:oasis:names:tc:SAML:2.0:nameid-format:transient">_ce3d2948b4cf20146dee0a0b3dd6f69b6cf86f62d7</saml:NameID>
    </saml:Subject>
    <saml:AttributeStatement>
      <saml:Attribute Name="uid" NameFormat="urn:oasis:names:tc:SAML:2.0:attrname-format:basic">
        <saml:AttributeValue xsi:type="xs:string">test</saml:AttributeValue>
      </saml:Attribute>
      <saml:Attribute Name="mail" NameFormat="urn:oasis:names:tc:SAML:2.0:attrname-format:basic">
        <saml:AttributeValue xsi:type="xs:string">test@example.com</saml:AttributeValue>
      </saml:Attribute>
      <saml:Attribute Name="eduPersonAffiliation" NameFormat="urn:oasis:names:tc:SAML:2.0:attrname-format:basic">
        <saml:AttributeValue xsi:type="xs:string">users</saml:AttributeValue>
        <saml:AttributeValue xsi:type="xs:string">examplerole1</saml:AttributeValue>
      </saml:Attribute>
    </saml:AttributeStatement>
  </saml:Assertion>
</samlp:Response>"#;

    #[test]
    fn test_raw_xml_input() {
        let assertion = SamlAssertion::new(RESPONSE_XML).unwrap();
        assert_eq!(assertion.xml(), RESPONSE_XML);
        assert_eq!(
            STANDARD.decode(assertion.b64encoded()).unwrap(),
            RESPONSE_XML.as_bytes()
        );
        assert_eq!(assertion.attributes().len(), 3);
    }

    #[test]
    fn test_base64_input_equals_raw_input() {
        let encoded = STANDARD.encode(RESPONSE_XML);
        let from_b64 = SamlAssertion::new(&encoded).unwrap();
        let from_raw = SamlAssertion::new(RESPONSE_XML).unwrap();

        assert_eq!(from_b64, from_raw);
        assert_eq!(from_b64.b64encoded(), encoded);
        assert_eq!(from_b64.attributes(), from_raw.attributes());
    }

    #[test]
    fn test_base64_with_line_breaks() {
        let encoded = STANDARD.encode(RESPONSE_XML);
        let wrapped: String = encoded
            .as_bytes()
            .chunks(76)
            .map(|chunk| std::str::from_utf8(chunk).unwrap())
            .collect::<Vec<_>>()
            .join("\r\n");

        assert_eq!(SamlAssertion::new(&wrapped).unwrap().xml(), RESPONSE_XML);
    }

    #[test]
    fn test_malformed_xml_is_rejected() {
        let err = SamlAssertion::new("<samlp:Response><saml:Assertion></samlp:Response>").unwrap_err();
        assert!(matches!(err, SamlError::Xml(_)));
    }

    #[test]
    fn test_debug_hides_xml() {
        let assertion = SamlAssertion::new(RESPONSE_XML).unwrap();
        let debug = format!("{:?}", assertion);
        assert!(!debug.contains("test@example.com"));
        assert!(debug.contains("eduPersonAffiliation"));
    }
}
