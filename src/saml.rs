//! Decoding and structural parsing of the captured SAML response.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::{Error, Result};

/// One entry of the assertion's attribute statement, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

/// Subject confirmation data of the assertion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubjectConfirmation {
    pub recipient: String,
    pub not_on_or_after: String,
}

/// Validity window of the assertion's conditions element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidityWindow {
    pub not_before: String,
    pub not_on_or_after: String,
}

/// Read-only structured view of a decoded SAML response document.
///
/// This exists solely to extract the role mapping; the raw base64 string is
/// what gets forwarded to STS, never a re-serialization of this.
#[derive(Debug, Clone)]
pub struct SamlAssertion {
    pub issuer: String,
    pub subject_confirmation: SubjectConfirmation,
    pub conditions: ValidityWindow,
    pub attributes: Vec<Attribute>,
}

impl SamlAssertion {
    /// Decode a base64-encoded response and parse its XML.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let decoded = STANDARD.decode(encoded)?;
        Self::from_xml(&decoded)
    }

    /// Parse a decoded XML document. Namespace prefixes vary across identity
    /// providers, so elements are matched on their local names.
    pub fn from_xml(xml: &[u8]) -> Result<Self> {
        let mut reader = Reader::from_reader(xml);
        reader.config_mut().trim_text(true);

        let mut issuer = String::new();
        let mut subject_confirmation = SubjectConfirmation::default();
        let mut conditions = ValidityWindow::default();
        let mut attributes = Vec::new();

        let mut saw_assertion = false;
        let mut in_issuer = false;
        let mut current_attribute: Option<String> = None;
        let mut in_attribute_value = false;
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e) | Event::Empty(ref e)) => match local_name(e) {
                    b"Assertion" => saw_assertion = true,
                    b"Issuer" if issuer.is_empty() => in_issuer = true,
                    b"SubjectConfirmationData" => {
                        subject_confirmation.recipient = attr_value(e, b"Recipient");
                        subject_confirmation.not_on_or_after = attr_value(e, b"NotOnOrAfter");
                    }
                    b"Conditions" => {
                        conditions.not_before = attr_value(e, b"NotBefore");
                        conditions.not_on_or_after = attr_value(e, b"NotOnOrAfter");
                    }
                    b"Attribute" => current_attribute = Some(attr_value(e, b"Name")),
                    b"AttributeValue" => in_attribute_value = current_attribute.is_some(),
                    _ => {}
                },
                Ok(Event::Text(e)) => {
                    if in_issuer {
                        issuer = String::from_utf8_lossy(e.as_ref()).to_string();
                        in_issuer = false;
                    } else if in_attribute_value {
                        if let Some(name) = current_attribute.as_ref() {
                            attributes.push(Attribute {
                                name: name.clone(),
                                value: String::from_utf8_lossy(e.as_ref()).to_string(),
                            });
                        }
                        in_attribute_value = false;
                    }
                }
                Ok(Event::End(ref e)) => match e.name().local_name().into_inner() {
                    b"Issuer" => in_issuer = false,
                    b"Attribute" => current_attribute = None,
                    b"AttributeValue" => in_attribute_value = false,
                    _ => {}
                },
                Ok(Event::Eof) => break,
                Err(err) => return Err(Error::Parse(err.to_string())),
                _ => {}
            }
            buf.clear();
        }

        if !saw_assertion {
            return Err(Error::Parse(
                "document contains no Assertion element".to_string(),
            ));
        }

        Ok(Self {
            issuer,
            subject_confirmation,
            conditions,
            attributes,
        })
    }
}

fn local_name<'e>(e: &'e BytesStart<'_>) -> &'e [u8] {
    e.name().local_name().into_inner()
}

fn attr_value(e: &BytesStart<'_>, name: &[u8]) -> String {
    e.attributes()
        .filter_map(std::result::Result::ok)
        .find(|attr| attr.key.local_name().as_ref() == name)
        .map(|attr| String::from_utf8_lossy(&attr.value).to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<saml2p:Response xmlns:saml2p="urn:oasis:names:tc:SAML:2.0:protocol"
    Destination="https://signin.aws.amazon.com/saml" Version="2.0">
  <saml2:Issuer xmlns:saml2="urn:oasis:names:tc:SAML:2.0:assertion">https://idp.example.com/saml</saml2:Issuer>
  <saml2:Assertion xmlns:saml2="urn:oasis:names:tc:SAML:2.0:assertion" Version="2.0">
    <saml2:Issuer>https://idp.example.com/saml</saml2:Issuer>
    <saml2:Subject>
      <saml2:NameID Format="urn:oasis:names:tc:SAML:1.1:nameid-format:emailAddress">alice@example.com</saml2:NameID>
      <saml2:SubjectConfirmation Method="urn:oasis:names:tc:SAML:2.0:cm:bearer">
        <saml2:SubjectConfirmationData Recipient="https://signin.aws.amazon.com/saml"
            NotOnOrAfter="2024-01-01T00:10:00Z"/>
      </saml2:SubjectConfirmation>
    </saml2:Subject>
    <saml2:Conditions NotBefore="2024-01-01T00:00:00Z" NotOnOrAfter="2024-01-01T01:00:00Z">
      <saml2:AudienceRestriction>
        <saml2:Audience>urn:amazon:webservices</saml2:Audience>
      </saml2:AudienceRestriction>
    </saml2:Conditions>
    <saml2:AttributeStatement>
      <saml2:Attribute Name="https://aws.amazon.com/SAML/Attributes/RoleSessionName">
        <saml2:AttributeValue>alice@example.com</saml2:AttributeValue>
      </saml2:Attribute>
      <saml2:Attribute Name="https://aws.amazon.com/SAML/Attributes/Role">
        <saml2:AttributeValue>arn:aws:iam::111:role/X,arn:aws:iam::111:saml-provider/Y</saml2:AttributeValue>
      </saml2:Attribute>
    </saml2:AttributeStatement>
  </saml2:Assertion>
</saml2p:Response>"#;

    #[test]
    fn parses_the_document_structure() {
        let assertion = SamlAssertion::from_xml(SAMPLE.as_bytes()).unwrap();

        assert_eq!(assertion.issuer, "https://idp.example.com/saml");
        assert_eq!(
            assertion.subject_confirmation.recipient,
            "https://signin.aws.amazon.com/saml"
        );
        assert_eq!(
            assertion.subject_confirmation.not_on_or_after,
            "2024-01-01T00:10:00Z"
        );
        assert_eq!(assertion.conditions.not_before, "2024-01-01T00:00:00Z");
        assert_eq!(assertion.conditions.not_on_or_after, "2024-01-01T01:00:00Z");
    }

    #[test]
    fn attribute_order_is_preserved() {
        let assertion = SamlAssertion::from_xml(SAMPLE.as_bytes()).unwrap();

        let pairs: Vec<(&str, &str)> = assertion
            .attributes
            .iter()
            .map(|a| (a.name.as_str(), a.value.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                (
                    "https://aws.amazon.com/SAML/Attributes/RoleSessionName",
                    "alice@example.com"
                ),
                (
                    "https://aws.amazon.com/SAML/Attributes/Role",
                    "arn:aws:iam::111:role/X,arn:aws:iam::111:saml-provider/Y"
                ),
            ]
        );
    }

    #[test]
    fn multi_valued_attributes_become_one_pair_per_value() {
        let xml = r#"<Response><Assertion><AttributeStatement>
            <Attribute Name="https://aws.amazon.com/SAML/Attributes/Role">
                <AttributeValue>first</AttributeValue>
                <AttributeValue>second</AttributeValue>
            </Attribute>
        </AttributeStatement></Assertion></Response>"#;

        let assertion = SamlAssertion::from_xml(xml.as_bytes()).unwrap();
        let values: Vec<&str> = assertion
            .attributes
            .iter()
            .map(|a| a.value.as_str())
            .collect();
        assert_eq!(values, vec!["first", "second"]);
    }

    #[test]
    fn round_trips_through_base64() {
        let encoded = STANDARD.encode(SAMPLE.as_bytes());
        let assertion = SamlAssertion::from_base64(&encoded).unwrap();
        assert_eq!(assertion.attributes.len(), 2);
    }

    #[test]
    fn invalid_base64_is_a_decode_error() {
        let err = SamlAssertion::from_base64("not valid base64!@#").unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn malformed_xml_is_a_parse_error() {
        let encoded = STANDARD.encode("<Response><Assertion></Response>");
        let err = SamlAssertion::from_base64(&encoded).unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn document_without_assertion_is_a_parse_error() {
        let err = SamlAssertion::from_xml(b"<LogoutResponse/>").unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }
}
