//! Integration tests for the zentinel-soap-model crate.
//!
//! These tests exercise the public API surface end-to-end, combining
//! construction, coercion, parsing, serialization and configuration.

use zentinel_soap_model::constants::{
    URI_NS_SOAP_1_1_ENVELOPE, URI_NS_SOAP_1_2_ENVELOPE, URI_SOAP_1_2_ROLE_NEXT,
    URI_SOAP_ACTOR_NEXT,
};
use zentinel_soap_model::{
    fault_envelope, parse_document, FaultCode, Fragment, Name, NodeId, NodeKind, Protocol,
    QName, SoapDocument, SoapError, SoapModelConfig, WriterConfig,
};

// ============================================================================
// Helpers
// ============================================================================

fn new_message(protocol: Protocol) -> (SoapDocument, NodeId, NodeId, NodeId) {
    let mut doc = SoapDocument::new(protocol);
    let envelope = doc.create_envelope().unwrap();
    let header = doc.add_header(envelope).unwrap();
    let body = doc.add_body(envelope).unwrap();
    (doc, envelope, header, body)
}

fn compact() -> WriterConfig {
    WriterConfig {
        xml_declaration: false,
        indent: None,
    }
}

fn dynamic_config() -> SoapModelConfig {
    let mut config = SoapModelConfig::default();
    config.protocol.version = Protocol::Dynamic;
    config
}

const STOCK_QUOTE_11: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
  <soap:Header>
    <t:Transaction xmlns:t="urn:trans" soap:mustUnderstand="1">5</t:Transaction>
    <t:Trace xmlns:t="urn:trans" soap:actor="urn:logger">on</t:Trace>
  </soap:Header>
  <soap:Body>
    <m:GetLastTradePrice xmlns:m="urn:stock">
      <m:symbol>DIS</m:symbol>
    </m:GetLastTradePrice>
  </soap:Body>
</soap:Envelope>"#;

// ============================================================================
// Scenario: SOAP 1.2 header block
// ============================================================================

#[test]
fn test_soap12_header_block_scenario() {
    let (mut doc, _, header, _) = new_message(Protocol::Soap12);
    let foo = doc
        .add_header_element(header, &QName::with_namespace("urn:x", "Foo"))
        .unwrap();
    doc.set_must_understand(foo, true).unwrap();

    assert_eq!(doc.kind(foo).unwrap(), NodeKind::HeaderElement);
    assert_eq!(doc.namespace_uri(foo, "").unwrap(), Some("urn:x"));

    assert!(doc.must_understand(foo).unwrap());
    assert_eq!(doc.role(foo).unwrap(), URI_SOAP_1_2_ROLE_NEXT);
    assert_eq!(
        doc.role(foo).unwrap(),
        format!("{}/role/next", URI_NS_SOAP_1_2_ENVELOPE)
    );
    assert!(!doc.relay(foo).unwrap());
}

// ============================================================================
// Protocol-dependent header semantics
// ============================================================================

#[test]
fn test_role_and_relay_unsupported_under_soap11() {
    let (mut doc, _, header, _) = new_message(Protocol::Soap11);
    let block = doc
        .add_header_element(header, &QName::new("urn:x", "Foo", "x"))
        .unwrap();

    let errors = [
        doc.set_role(block, "urn:r").unwrap_err(),
        doc.role(block).unwrap_err(),
        doc.set_relay(block, true).unwrap_err(),
        doc.relay(block).unwrap_err(),
    ];
    for err in errors {
        assert!(matches!(err, SoapError::UnsupportedForProtocol { .. }));
        assert_eq!(err.code().as_str(), "UNSUPPORTED_FOR_PROTOCOL");
    }
    assert_eq!(doc.actor(block).unwrap(), URI_SOAP_ACTOR_NEXT);
}

#[test]
fn test_dynamic_document_resolves_protocol_at_call_time() {
    let mut doc = SoapDocument::new(Protocol::Dynamic);
    assert!(matches!(doc.bound_protocol(), Err(SoapError::ProtocolUnbound)));

    let envelope = doc.create_envelope_as(Protocol::Soap11).unwrap();
    let header = doc.add_header(envelope).unwrap();
    let block = doc
        .add_header_element(header, &QName::new("urn:x", "Foo", "x"))
        .unwrap();
    assert!(matches!(
        doc.set_relay(block, true),
        Err(SoapError::UnsupportedForProtocol { .. })
    ));

    let parsed = parse_document(
        format!(
            r#"<e:Envelope xmlns:e="{}"><e:Header><x:Foo xmlns:x="urn:x"/></e:Header><e:Body/></e:Envelope>"#,
            URI_NS_SOAP_1_2_ENVELOPE
        )
        .as_bytes(),
        &dynamic_config(),
    );
    let mut doc = parsed.unwrap();
    let envelope = doc.envelope().unwrap();
    let header = doc.header(envelope).unwrap().unwrap();
    let block = doc.examine_all_header_elements(header).unwrap()[0];
    doc.set_relay(block, true).unwrap();
    assert!(doc.relay(block).unwrap());
}

// ============================================================================
// Structural guarantees
// ============================================================================

#[test]
fn test_reserved_envelope_child_rejected_and_tree_unchanged() {
    let (mut doc, _, _, body) = new_message(Protocol::Soap11);
    let op = doc.add_child_element_ns(body, "Op", "m", "urn:m").unwrap();
    let before = doc.to_xml_string(&compact()).unwrap();
    let count = doc.node_count();

    for parent in [body, op] {
        let err = doc
            .add_child_element_ns(parent, "Envelope", "soap", URI_NS_SOAP_1_1_ENVELOPE)
            .unwrap_err();
        assert!(matches!(err, SoapError::ReservedName(_)));
    }
    let fragment = Fragment::new(QName::new("urn:m", "Wrapper", "m")).with_child(
        Fragment::new(QName::new(URI_NS_SOAP_1_1_ENVELOPE, "Envelope", "soap")),
    );
    assert!(matches!(
        doc.add_child_fragment(op, &fragment),
        Err(SoapError::ReservedName(_))
    ));

    assert_eq!(doc.node_count(), count);
    assert_eq!(doc.to_xml_string(&compact()).unwrap(), before);
}

#[test]
fn test_structural_elements_cannot_be_renamed() {
    let (mut doc, envelope, header, body) = new_message(Protocol::Soap12);
    for id in [envelope, header, body] {
        assert!(matches!(
            doc.set_element_qname(id, &QName::new("urn:x", "Other", "x")),
            Err(SoapError::IllegalRename(_))
        ));
    }
}

#[test]
fn test_fragment_under_header_becomes_header_block() {
    let (mut doc, _, header, _) = new_message(Protocol::Soap11);
    let fragment = Fragment::new(QName::new("urn:sec", "Security", "sec"))
        .with_namespace("sec", "urn:sec")
        .with_child(Fragment::new(QName::new("urn:sec", "Token", "sec")).with_text("abc"));

    let block = doc.add_child_fragment(header, &fragment).unwrap();
    assert_eq!(doc.kind(block).unwrap(), NodeKind::HeaderElement);
    doc.set_must_understand(block, true).unwrap();
    assert_eq!(
        doc.examine_must_understand_header_elements(header, URI_SOAP_ACTOR_NEXT)
            .unwrap(),
        vec![block]
    );
    assert_eq!(doc.text_content(block).unwrap(), "abc");
}

// ============================================================================
// Coercion and stale handles
// ============================================================================

#[test]
fn test_coercion_preserves_subtree_and_invalidates_old_handle() {
    let config = SoapModelConfig::default();
    let mut doc = SoapDocument::from_xml(STOCK_QUOTE_11.as_bytes(), &config).unwrap();
    let envelope = doc.envelope().unwrap();
    let body = doc.body(envelope).unwrap().unwrap();

    let raw = doc.children(body).unwrap()[0];
    assert_eq!(doc.kind(raw).unwrap(), NodeKind::Element);
    let raw_children = doc.children(raw).unwrap().len();
    let raw_attributes = doc.all_attributes_as_qnames(raw).unwrap();
    let raw_text = doc.text_content(raw).unwrap();

    let entry = doc.child_elements(body).unwrap()[0];
    assert_eq!(doc.kind(entry).unwrap(), NodeKind::BodyElement);
    assert_eq!(doc.children(entry).unwrap().len(), raw_children);
    assert_eq!(doc.all_attributes_as_qnames(entry).unwrap(), raw_attributes);
    assert_eq!(doc.text_content(entry).unwrap(), raw_text);

    assert!(matches!(
        doc.add_text_node(raw, "lost"),
        Err(SoapError::StaleNode)
    ));
    assert!(!doc.text_content(entry).unwrap().contains("lost"));
}

// ============================================================================
// Parse / inspect / write
// ============================================================================

#[test]
fn test_parse_and_examine_by_actor() {
    let mut doc = SoapDocument::from_xml(STOCK_QUOTE_11.as_bytes(), &SoapModelConfig::default())
        .unwrap();
    let envelope = doc.envelope().unwrap();
    let header = doc.header(envelope).unwrap().unwrap();

    let next = doc.examine_header_elements(header, URI_SOAP_ACTOR_NEXT).unwrap();
    assert_eq!(next.len(), 1);
    assert_eq!(doc.element_qname(next[0]).unwrap().local_name(), "Transaction");
    assert!(doc.must_understand(next[0]).unwrap());

    let logger = doc.extract_header_elements(header, "urn:logger").unwrap();
    assert_eq!(logger.len(), 1);
    assert_eq!(logger[0].text_content(), "on");
    assert_eq!(doc.examine_all_header_elements(header).unwrap().len(), 1);
}

#[test]
fn test_parse_write_parse_is_stable() {
    let config = SoapModelConfig::default();
    let doc = SoapDocument::from_xml(STOCK_QUOTE_11.as_bytes(), &config).unwrap();
    let first = doc.to_xml_string(&compact()).unwrap();
    let reparsed = SoapDocument::from_xml(first.as_bytes(), &config).unwrap();
    let second = reparsed.to_xml_string(&compact()).unwrap();
    assert_eq!(first, second);
    assert!(first.contains(r#"<m:symbol>DIS</m:symbol>"#));
    assert!(first.contains(r#"soap:mustUnderstand="1""#));
}

#[test]
fn test_indented_output() {
    let (mut doc, _, _, body) = new_message(Protocol::Soap11);
    doc.add_child_element_ns(body, "Ping", "m", "urn:m").unwrap();
    let xml = doc
        .to_xml_string(&WriterConfig {
            xml_declaration: true,
            indent: Some(2),
        })
        .unwrap();
    assert!(xml.contains("\n  <env:Header/>"));
    assert!(xml.contains("\n    <m:Ping xmlns:m=\"urn:m\"/>"));
}

// ============================================================================
// Faults
// ============================================================================

#[test]
fn test_fault_envelope_round_trip() {
    let xml = fault_envelope(
        Protocol::Soap12,
        FaultCode::Sender,
        "Missing symbol",
        &WriterConfig::default(),
    )
    .unwrap();
    assert!(xml.contains("<env:Value>env:Sender</env:Value>"));
    assert!(xml.contains(r#"<env:Text xml:lang="en">Missing symbol</env:Text>"#));

    let mut doc = SoapDocument::from_xml(xml.as_bytes(), &dynamic_config()).unwrap();
    let envelope = doc.envelope().unwrap();
    let body = doc.body(envelope).unwrap().unwrap();
    assert!(doc.has_fault(body).unwrap());
    let fault = doc.fault(body).unwrap().unwrap();
    assert_eq!(
        doc.fault_code(fault).unwrap(),
        QName::with_namespace(URI_NS_SOAP_1_2_ENVELOPE, "Sender")
    );
    assert_eq!(doc.fault_reason(fault).unwrap().as_deref(), Some("Missing symbol"));
}

// ============================================================================
// Attributes and namespaces through both facades
// ============================================================================

#[test]
fn test_name_and_qname_facades_agree() {
    let (mut doc, _, _, body) = new_message(Protocol::Soap11);
    let op = doc.add_child_element_ns(body, "Op", "m", "urn:m").unwrap();
    doc.add_attribute(op, &Name::new("lang", "m", "urn:m"), "en").unwrap();

    let qnames = doc.all_attributes_as_qnames(op).unwrap();
    let names = doc.all_attributes(op).unwrap();
    assert_eq!(qnames.len(), names.len());
    assert_eq!(QName::from(names[0].clone()), qnames[0]);
    assert_eq!(
        doc.attribute_value_qname(op, &QName::with_namespace("urn:m", "lang")).unwrap(),
        Some("en")
    );
    assert!(doc.remove_attribute_qname(op, &qnames[0]).unwrap());
    assert_eq!(doc.attribute_value(op, &names[0]).unwrap(), None);
}

#[test]
fn test_create_qname_in_scope() {
    let (mut doc, envelope, _, body) = new_message(Protocol::Soap11);
    let op = doc.add_child_element_ns(body, "Op", "m", "urn:m").unwrap();
    let qname = doc.create_qname(op, "Item", "env").unwrap();
    assert_eq!(qname.namespace_uri(), URI_NS_SOAP_1_1_ENVELOPE);
    assert!(matches!(
        doc.create_qname(envelope, "Item", "m"),
        Err(SoapError::UnresolvedPrefix(_))
    ));
    let visible = doc.visible_namespace_prefixes(op).unwrap();
    assert_eq!(visible, vec!["m".to_string(), "env".to_string()]);
    assert_eq!(doc.namespace_prefixes(op).unwrap(), vec!["m".to_string()]);
}

#[test]
fn test_config_drives_document_defaults() {
    let yaml = r#"
protocol:
  version: "1.2"
  envelope_prefix: soap
serialization:
  xml_declaration: false
"#;
    let config = SoapModelConfig::from_yaml_str(yaml).unwrap();
    let mut doc = SoapDocument::with_config(&config);
    let envelope = doc.create_envelope().unwrap();
    doc.add_body(envelope).unwrap();
    let xml = doc.to_xml_string(&config.serialization).unwrap();
    assert_eq!(
        xml,
        format!(
            r#"<soap:Envelope xmlns:soap="{0}"><soap:Body/></soap:Envelope>"#,
            URI_NS_SOAP_1_2_ENVELOPE
        )
    );
}
