//! XML serialization of a [`SoapDocument`].
//!
//! Namespace declarations are written where they are stored. Any binding an
//! element or attribute name needs that is not in scope at that point (for
//! example after a move, or for names whose prefix is bound higher up to a
//! different URI) is declared on the element as it is written.

use crate::config::WriterConfig;
use crate::error::{Result, SoapError};
use crate::tree::{NodeId, Payload, SoapDocument};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use tracing::trace;

/// Serialize the document as XML text.
pub fn to_xml(doc: &SoapDocument, config: &WriterConfig) -> Result<String> {
    let root = doc
        .root()
        .ok_or_else(|| SoapError::InvalidStructure("document has no envelope".to_string()))?;
    let mut writer = match config.indent {
        Some(width) if width > 0 => Writer::new_with_indent(Vec::new(), b' ', width),
        _ => Writer::new(Vec::new()),
    };
    if config.xml_declaration {
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(write_error)?;
    }
    let mut scope = Vec::new();
    write_node(doc, &mut writer, root, &mut scope)?;
    String::from_utf8(writer.into_inner()).map_err(|e| SoapError::XmlWrite(e.to_string()))
}

impl SoapDocument {
    /// Serialize this document as XML text.
    pub fn to_xml_string(&self, config: &WriterConfig) -> Result<String> {
        to_xml(self, config)
    }
}

/// Bindings in effect while writing; searched from the end.
type Scope = Vec<(String, String)>;

fn in_scope<'a>(scope: &'a Scope, prefix: &str) -> Option<&'a str> {
    if prefix == "xml" {
        return Some(crate::constants::XML_NS);
    }
    scope
        .iter()
        .rev()
        .find(|(p, _)| p == prefix)
        .map(|(_, uri)| uri.as_str())
        .filter(|uri| !uri.is_empty())
}

fn write_node(
    doc: &SoapDocument,
    writer: &mut Writer<Vec<u8>>,
    id: NodeId,
    scope: &mut Scope,
) -> Result<()> {
    let node = doc.node(id)?;
    let data = match &node.payload {
        Payload::Text(text) => {
            return writer
                .write_event(Event::Text(BytesText::new(text)))
                .map_err(write_error);
        }
        Payload::Element(data) => data,
    };

    let mark = scope.len();
    let mut declarations: Vec<(String, String)> = data
        .namespaces
        .iter()
        .map(|(p, u)| (p.clone(), u.clone()))
        .collect();
    scope.extend(declarations.iter().cloned());

    let mut required = vec![(data.name.prefix(), data.name.namespace_uri())];
    for attr in data.attributes.values() {
        if !attr.name.prefix().is_empty() {
            required.push((attr.name.prefix(), attr.name.namespace_uri()));
        }
    }
    for (prefix, uri) in required {
        if prefix == "xml" || in_scope(scope, prefix).unwrap_or("") == uri {
            continue;
        }
        trace!(prefix, uri, "declaring namespace on output");
        declarations.retain(|(p, _)| p != prefix);
        declarations.push((prefix.to_string(), uri.to_string()));
        scope.push((prefix.to_string(), uri.to_string()));
    }

    let tag = data.name.qualified_name();
    let mut start = BytesStart::new(tag.as_str());
    for (prefix, uri) in &declarations {
        if prefix.is_empty() {
            start.push_attribute(("xmlns", uri.as_str()));
        } else {
            start.push_attribute((format!("xmlns:{}", prefix).as_str(), uri.as_str()));
        }
    }
    for attr in data.attributes.values() {
        start.push_attribute((attr.name.qualified_name().as_str(), attr.value.as_str()));
    }

    if data.children.is_empty() {
        writer.write_event(Event::Empty(start)).map_err(write_error)?;
    } else {
        writer.write_event(Event::Start(start)).map_err(write_error)?;
        for child in &data.children {
            write_node(doc, writer, *child, scope)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new(tag.as_str())))
            .map_err(write_error)?;
    }
    scope.truncate(mark);
    Ok(())
}

fn write_error<E: std::fmt::Display>(e: E) -> SoapError {
    SoapError::XmlWrite(e.to_string())
}
