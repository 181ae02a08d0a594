//! SOAP XML reader.
//!
//! Uses quick-xml, which never expands entities. A textual pre-scan rejects
//! DOCTYPE and entity declarations before the event loop starts, and the
//! loop rejects processing instructions, so XXE payloads never reach the
//! tree. Header and Body are typed as they are read; their children stay
//! generic until a typed accessor coerces them.

use crate::config::{ParsingConfig, SoapModelConfig};
use crate::constants::{is_reserved_name, Protocol, BODY, ENVELOPE, HEADER, XML_NS};
use crate::error::{Result, SoapError};
use crate::name::{split_qualified, QName};
use crate::tree::{Attribute, ElementData, NodeId, NodeKind, SoapDocument};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::{debug, warn};

/// Parse raw bytes as a SOAP envelope.
pub fn parse_document(data: &[u8], config: &SoapModelConfig) -> Result<SoapDocument> {
    let xml_str = std::str::from_utf8(data)
        .map_err(|e| SoapError::XmlParse(format!("Invalid UTF-8: {}", e)))?;

    check_xxe_patterns(xml_str, &config.parsing)?;

    let mut reader = Reader::from_str(xml_str);
    reader.config_mut().trim_text(config.parsing.trim_whitespace);

    let mut doc = SoapDocument::with_config(config);
    let mut stack: Vec<NodeId> = Vec::new();
    let mut element_count = 0usize;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let id = open_element(&mut doc, &stack, e, config.parsing.max_depth)?;
                element_count += 1;
                stack.push(id);
            }

            Ok(Event::Empty(ref e)) => {
                open_element(&mut doc, &stack, e, config.parsing.max_depth)?;
                element_count += 1;
            }

            Ok(Event::End(_)) => {
                stack.pop();
            }

            Ok(Event::Text(ref e)) => {
                let text = e
                    .unescape()
                    .map_err(|e| SoapError::XmlParse(format!("XML parse error: {}", e)))?;
                push_text(&mut doc, &stack, &text)?;
            }

            Ok(Event::CData(e)) => {
                let bytes = e.into_inner();
                let text = std::str::from_utf8(&bytes)
                    .map_err(|e| SoapError::XmlParse(format!("Invalid UTF-8 in CDATA: {}", e)))?;
                push_text(&mut doc, &stack, text)?;
            }

            Ok(Event::PI(_)) if config.parsing.block_processing_instructions => {
                warn!("processing instruction rejected");
                return Err(SoapError::XxeDetected(
                    "Processing instructions are not allowed".to_string(),
                ));
            }

            Ok(Event::DocType(_)) if config.parsing.block_doctype => {
                return Err(SoapError::XxeDetected(
                    "DOCTYPE declarations are not allowed".to_string(),
                ));
            }

            Ok(Event::Eof) => break,

            Err(e) => {
                return Err(SoapError::XmlParse(format!(
                    "XML parse error at position {}: {}",
                    reader.buffer_position(),
                    e
                )));
            }

            // Comments, the XML declaration and allowed PIs/DOCTYPEs carry no content.
            _ => {}
        }

        buf.clear();
    }

    if !stack.is_empty() {
        return Err(SoapError::XmlParse("Unclosed element at end of input".to_string()));
    }
    let envelope = doc.envelope()?;
    if doc.body(envelope)?.is_none() {
        return Err(SoapError::InvalidStructure("envelope has no body".to_string()));
    }

    debug!(
        protocol = %doc.bound_protocol()?,
        elements = element_count,
        "SOAP document parsed"
    );
    Ok(doc)
}

impl SoapDocument {
    /// Parse a SOAP envelope from bytes.
    pub fn from_xml(data: &[u8], config: &SoapModelConfig) -> Result<Self> {
        parse_document(data, config)
    }
}

/// Check for XXE attack patterns.
fn check_xxe_patterns(xml: &str, config: &ParsingConfig) -> Result<()> {
    if config.block_doctype && (xml.contains("<!DOCTYPE") || xml.contains("<!doctype")) {
        return Err(SoapError::XxeDetected(
            "DOCTYPE declarations are not allowed".to_string(),
        ));
    }

    if config.block_external_entities {
        if xml.contains("<!ENTITY") || xml.contains("<!entity") {
            return Err(SoapError::XxeDetected(
                "Entity declarations are not allowed".to_string(),
            ));
        }

        let has_doctype = xml.contains("<!DOCTYPE") || xml.contains("<!doctype");
        if has_doctype && (xml.contains("SYSTEM") || xml.contains("PUBLIC")) {
            return Err(SoapError::XxeDetected(
                "External entity references are not allowed".to_string(),
            ));
        }
    }

    Ok(())
}

/// Build the element for a start tag and attach it under the current parent.
fn open_element(
    doc: &mut SoapDocument,
    stack: &[NodeId],
    e: &BytesStart,
    max_depth: u32,
) -> Result<NodeId> {
    if stack.len() >= max_depth as usize {
        return Err(SoapError::XmlParse(format!(
            "Maximum nesting depth of {} exceeded",
            max_depth
        )));
    }
    let parent = stack.last().copied();
    if parent.is_none() && doc.root().is_some() {
        return Err(SoapError::XmlParse("Multiple root elements".to_string()));
    }

    let raw_name = utf8(e.name().as_ref())?.to_string();
    let mut data = ElementData::new(QName::local(""));
    let mut raw_attributes = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|e| SoapError::XmlParse(format!("Invalid attribute: {}", e)))?;
        let key = utf8(attr.key.as_ref())?.to_string();
        let value = attr
            .unescape_value()
            .map_err(|e| SoapError::XmlParse(format!("Invalid attribute value: {}", e)))?
            .into_owned();
        if key == "xmlns" {
            data.namespaces.insert(String::new(), value);
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            if value.is_empty() {
                return Err(SoapError::XmlParse(format!(
                    "Prefix '{}' cannot be bound to an empty namespace",
                    prefix
                )));
            }
            data.namespaces.insert(prefix.to_string(), value);
        } else {
            raw_attributes.push((key, value));
        }
    }

    data.name = resolve(doc, parent, &data, &raw_name, true)?;
    for (key, value) in raw_attributes {
        let name = resolve(doc, parent, &data, &key, false)?;
        let previous = data.attributes.insert(
            name.clone(),
            Attribute {
                name: name.clone(),
                value,
            },
        );
        if previous.is_some() {
            return Err(SoapError::XmlParse(format!("Duplicate attribute {}", name)));
        }
    }

    let kind = element_kind(doc, parent, &data.name)?;
    doc.append_element(parent, kind, data)
}

/// Resolve `prefix:local` against the element's own declarations, then the
/// parent's scope. Unprefixed attributes are never in a namespace.
fn resolve(
    doc: &SoapDocument,
    parent: Option<NodeId>,
    data: &ElementData,
    raw: &str,
    is_element: bool,
) -> Result<QName> {
    let (prefix, local) = split_qualified(raw);
    if local.is_empty() {
        return Err(SoapError::XmlParse(format!("Invalid name '{}'", raw)));
    }
    if prefix.is_empty() && !is_element {
        return Ok(QName::local(local));
    }
    let uri = match data.namespaces.get(prefix) {
        Some(uri) => Some(uri.as_str()),
        None if prefix == "xml" => Some(XML_NS),
        None => match parent {
            Some(parent) => doc.namespace_uri(parent, prefix)?,
            None => None,
        },
    };
    match uri {
        Some(uri) => Ok(QName::new(uri, local, prefix)),
        None if prefix.is_empty() => Ok(QName::local(local)),
        None => Err(SoapError::XmlParse(format!(
            "Undeclared namespace prefix '{}'",
            prefix
        ))),
    }
}

/// Decide the kind of a new element and check the envelope structure.
fn element_kind(doc: &SoapDocument, parent: Option<NodeId>, name: &QName) -> Result<NodeKind> {
    let Some(parent) = parent else {
        if name.local_name() != ENVELOPE {
            return Err(SoapError::InvalidStructure(format!(
                "root element {} is not a SOAP Envelope",
                name
            )));
        }
        let found = Protocol::from_envelope_ns(name.namespace_uri()).ok_or_else(|| {
            SoapError::VersionMismatch(format!(
                "'{}' is not a SOAP envelope namespace",
                name.namespace_uri()
            ))
        })?;
        let expected = doc.protocol();
        if expected != Protocol::Dynamic && expected != found {
            return Err(SoapError::VersionMismatch(format!(
                "expected {}, found {}",
                expected, found
            )));
        }
        return Ok(NodeKind::Envelope);
    };

    if doc.kind(parent)? == NodeKind::Envelope {
        let ns = doc.envelope_ns()?;
        let header = doc.header(parent)?;
        let body = doc.body(parent)?;
        if name.namespace_uri() == ns && name.local_name() == HEADER {
            let first_element = doc
                .children(parent)?
                .iter()
                .all(|c| doc.kind(*c).is_ok_and(|k| k == NodeKind::Text));
            if header.is_some() || !first_element {
                return Err(SoapError::InvalidStructure(
                    "Header must be the first child of the Envelope".to_string(),
                ));
            }
            return Ok(NodeKind::Header);
        }
        if name.namespace_uri() == ns && name.local_name() == BODY {
            if body.is_some() {
                return Err(SoapError::InvalidStructure(
                    "Envelope has more than one Body".to_string(),
                ));
            }
            return Ok(NodeKind::Body);
        }
        if doc.bound_protocol()? == Protocol::Soap12 {
            return Err(SoapError::InvalidStructure(format!(
                "{} is not allowed in a SOAP 1.2 Envelope",
                name
            )));
        }
    }

    if is_reserved_name(name) {
        return Err(SoapError::ReservedName(name.to_string()));
    }
    Ok(NodeKind::Element)
}

fn push_text(doc: &mut SoapDocument, stack: &[NodeId], text: &str) -> Result<()> {
    let Some(parent) = stack.last().copied() else {
        if text.trim().is_empty() {
            return Ok(());
        }
        return Err(SoapError::XmlParse("Text outside the root element".to_string()));
    };
    if text.is_empty() {
        return Ok(());
    }
    if !doc.kind(parent)?.accepts_text() && !text.trim().is_empty() {
        return Err(SoapError::InvalidStructure(format!(
            "{} cannot contain character data",
            doc.element_qname(parent)?
        )));
    }
    doc.append_text(parent, text.to_string())?;
    Ok(())
}

fn utf8(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes).map_err(|e| SoapError::XmlParse(format!("Invalid UTF-8: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{URI_NS_SOAP_1_1_ENVELOPE, URI_NS_SOAP_1_2_ENVELOPE};

    const SOAP_11_SAMPLE: &str = r#"<?xml version="1.0"?>
<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
  <soap:Header>
    <m:Trans xmlns:m="http://example.org/trans" soap:mustUnderstand="1">234</m:Trans>
  </soap:Header>
  <soap:Body>
    <m:GetPrice xmlns:m="http://example.org/stock">
      <m:Item>Apples</m:Item>
    </m:GetPrice>
  </soap:Body>
</soap:Envelope>"#;

    const SOAP_12_SAMPLE: &str = r#"<?xml version="1.0"?>
<soap:Envelope xmlns:soap="http://www.w3.org/2003/05/soap-envelope">
  <soap:Body>
    <GetUser xmlns="http://example.org/users">
      <UserId>123</UserId>
    </GetUser>
  </soap:Body>
</soap:Envelope>"#;

    fn parse(xml: &str) -> Result<SoapDocument> {
        parse_document(xml.as_bytes(), &SoapModelConfig::default())
    }

    fn dynamic() -> SoapModelConfig {
        let mut config = SoapModelConfig::default();
        config.protocol.version = Protocol::Dynamic;
        config
    }

    #[test]
    fn test_parse_soap_11() {
        let mut doc = parse(SOAP_11_SAMPLE).unwrap();
        let envelope = doc.envelope().unwrap();
        assert_eq!(doc.bound_protocol().unwrap(), Protocol::Soap11);

        let header = doc.header(envelope).unwrap().unwrap();
        let blocks = doc.examine_all_header_elements(header).unwrap();
        assert_eq!(blocks.len(), 1);
        assert!(doc.must_understand(blocks[0]).unwrap());
        assert_eq!(doc.text_content(blocks[0]).unwrap(), "234");

        let body = doc.body(envelope).unwrap().unwrap();
        let entries = doc.child_elements(body).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(doc.kind(entries[0]).unwrap(), NodeKind::BodyElement);
        assert_eq!(
            doc.element_qname(entries[0]).unwrap(),
            &QName::with_namespace("http://example.org/stock", "GetPrice")
        );
    }

    #[test]
    fn test_parse_soap_12_default_namespace() {
        let doc = parse_document(SOAP_12_SAMPLE.as_bytes(), &dynamic()).unwrap();
        let envelope = doc.envelope().unwrap();
        assert_eq!(doc.bound_protocol().unwrap(), Protocol::Soap12);
        assert!(doc.header(envelope).unwrap().is_none());

        let body = doc.body(envelope).unwrap().unwrap();
        let op = doc.children(body).unwrap()[0];
        let user_id = doc.children(op).unwrap()[0];
        assert_eq!(
            doc.element_qname(user_id).unwrap().namespace_uri(),
            "http://example.org/users"
        );
    }

    #[test]
    fn test_version_mismatch() {
        assert!(matches!(parse(SOAP_12_SAMPLE), Err(SoapError::VersionMismatch(_))));
        let other = r#"<e:Envelope xmlns:e="urn:not-soap"><e:Body/></e:Envelope>"#;
        assert!(matches!(parse(other), Err(SoapError::VersionMismatch(_))));
    }

    #[test]
    fn test_xxe_detection() {
        let xxe_payload = r#"<?xml version="1.0"?>
<!DOCTYPE foo [<!ENTITY xxe SYSTEM "file:///etc/passwd">]>
<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
  <soap:Body>&xxe;</soap:Body>
</soap:Envelope>"#;

        let result = parse(xxe_payload);
        assert!(matches!(result, Err(SoapError::XxeDetected(_))));
    }

    #[test]
    fn test_processing_instruction_blocked() {
        let xml = format!(
            r#"<?xml version="1.0"?><?evil stuff?><s:Envelope xmlns:s="{}"><s:Body/></s:Envelope>"#,
            URI_NS_SOAP_1_1_ENVELOPE
        );
        assert!(matches!(parse(&xml), Err(SoapError::XxeDetected(_))));

        let mut config = SoapModelConfig::default();
        config.parsing.block_processing_instructions = false;
        assert!(parse_document(xml.as_bytes(), &config).is_ok());
    }

    #[test]
    fn test_structure_errors() {
        let ns = URI_NS_SOAP_1_1_ENVELOPE;
        let header_after_body =
            format!(r#"<s:Envelope xmlns:s="{ns}"><s:Body/><s:Header/></s:Envelope>"#);
        assert!(matches!(
            parse(&header_after_body),
            Err(SoapError::InvalidStructure(_))
        ));

        let no_body = format!(r#"<s:Envelope xmlns:s="{ns}"><s:Header/></s:Envelope>"#);
        assert!(matches!(parse(&no_body), Err(SoapError::InvalidStructure(_))));

        let nested_envelope = format!(
            r#"<s:Envelope xmlns:s="{ns}"><s:Body><s:Envelope/></s:Body></s:Envelope>"#
        );
        assert!(matches!(parse(&nested_envelope), Err(SoapError::ReservedName(_))));

        let text_in_body = format!(r#"<s:Envelope xmlns:s="{ns}"><s:Body>loose</s:Body></s:Envelope>"#);
        assert!(matches!(parse(&text_in_body), Err(SoapError::InvalidStructure(_))));

        let undeclared = format!(r#"<s:Envelope xmlns:s="{ns}"><s:Body><x:Op/></s:Body></s:Envelope>"#);
        assert!(matches!(parse(&undeclared), Err(SoapError::XmlParse(_))));

        let extra_in_12 = format!(
            r#"<s:Envelope xmlns:s="{}"><s:Body/><x:Extra xmlns:x="urn:x"/></s:Envelope>"#,
            URI_NS_SOAP_1_2_ENVELOPE
        );
        assert!(matches!(
            parse_document(extra_in_12.as_bytes(), &dynamic()),
            Err(SoapError::InvalidStructure(_))
        ));
    }

    #[test]
    fn test_multiple_roots_rejected() {
        let ns = URI_NS_SOAP_1_1_ENVELOPE;
        let two_envelopes = format!(
            r#"<s:Envelope xmlns:s="{ns}"><s:Body><a:First xmlns:a="urn:a"/></s:Body></s:Envelope><s:Envelope xmlns:s="{ns}"><s:Body><b:Second xmlns:b="urn:b"/></s:Body></s:Envelope>"#
        );
        assert!(matches!(parse(&two_envelopes), Err(SoapError::XmlParse(_))));

        let trailing_empty =
            format!(r#"<s:Envelope xmlns:s="{ns}"><s:Body/></s:Envelope><s:Envelope xmlns:s="{ns}"/>"#);
        assert!(matches!(parse(&trailing_empty), Err(SoapError::XmlParse(_))));
    }

    #[test]
    fn test_depth_limit() {
        let mut config = SoapModelConfig::default();
        config.parsing.max_depth = 3;
        let ns = URI_NS_SOAP_1_1_ENVELOPE;
        let ok = format!(r#"<s:Envelope xmlns:s="{ns}"><s:Body><a/></s:Body></s:Envelope>"#);
        assert!(parse_document(ok.as_bytes(), &config).is_ok());
        let deep = format!(r#"<s:Envelope xmlns:s="{ns}"><s:Body><a><b/></a></s:Body></s:Envelope>"#);
        assert!(matches!(
            parse_document(deep.as_bytes(), &config),
            Err(SoapError::XmlParse(_))
        ));
    }

    #[test]
    fn test_cdata_and_comments() {
        let xml = format!(
            r#"<s:Envelope xmlns:s="{}"><s:Body><!-- note --><m:Op xmlns:m="urn:m"><![CDATA[<raw>]]></m:Op></s:Body></s:Envelope>"#,
            URI_NS_SOAP_1_1_ENVELOPE
        );
        let doc = parse(&xml).unwrap();
        let body = doc.body(doc.envelope().unwrap()).unwrap().unwrap();
        let children = doc.children(body).unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(doc.text_content(children[0]).unwrap(), "<raw>");
    }

    #[test]
    fn test_invalid_utf8() {
        let result = parse_document(&[0x3c, 0xff, 0xfe], &SoapModelConfig::default());
        assert!(matches!(result, Err(SoapError::XmlParse(_))));
    }
}
