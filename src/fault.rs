//! SOAP Fault construction and inspection for both protocol versions.
//!
//! SOAP 1.1 faults carry unqualified `faultcode`/`faultstring`/`detail`
//! children; SOAP 1.2 faults carry `Code/Value`, `Reason/Text` and `Detail`
//! in the envelope namespace.

use crate::config::WriterConfig;
use crate::constants::{
    soap_data_encoding_unknown_fault, soap_must_understand_fault, soap_receiver_fault,
    soap_sender_fault, soap_version_mismatch_fault, Protocol, FAULT, SOAP_ENV_PREFIX,
    URI_NS_SOAP_1_1_ENVELOPE, XML_NS,
};
use crate::element::validate_text;
use crate::error::{Result, SoapError};
use crate::fragment::Fragment;
use crate::name::{split_qualified, QName};
use crate::tree::{NodeId, NodeKind, SoapDocument};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Standard fault codes, named after SOAP 1.2. Under SOAP 1.1 `Sender` and
/// `Receiver` map to `Client` and `Server`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FaultCode {
    VersionMismatch,
    MustUnderstand,
    DataEncodingUnknown,
    #[serde(alias = "Client")]
    Sender,
    #[serde(alias = "Server")]
    Receiver,
}

impl FaultCode {
    /// Qualified name of this code under `protocol`.
    pub fn qname(&self, protocol: Protocol) -> Result<QName> {
        match protocol {
            Protocol::Soap12 => Ok(match self {
                Self::VersionMismatch => soap_version_mismatch_fault(),
                Self::MustUnderstand => soap_must_understand_fault(),
                Self::DataEncodingUnknown => soap_data_encoding_unknown_fault(),
                Self::Sender => soap_sender_fault(),
                Self::Receiver => soap_receiver_fault(),
            }),
            Protocol::Soap11 => {
                let local = match self {
                    Self::VersionMismatch => "VersionMismatch",
                    Self::MustUnderstand => "MustUnderstand",
                    Self::Sender => "Client",
                    Self::Receiver => "Server",
                    Self::DataEncodingUnknown => {
                        return Err(SoapError::unsupported(
                            protocol.as_str(),
                            "DataEncodingUnknown fault code",
                        ))
                    }
                };
                Ok(QName::new(URI_NS_SOAP_1_1_ENVELOPE, local, SOAP_ENV_PREFIX))
            }
            Protocol::Dynamic => Err(SoapError::ProtocolUnbound),
        }
    }
}

impl fmt::Display for FaultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::VersionMismatch => "VersionMismatch",
            Self::MustUnderstand => "MustUnderstand",
            Self::DataEncodingUnknown => "DataEncodingUnknown",
            Self::Sender => "Sender",
            Self::Receiver => "Receiver",
        };
        f.write_str(name)
    }
}

impl FromStr for FaultCode {
    type Err = SoapError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "VersionMismatch" => Ok(Self::VersionMismatch),
            "MustUnderstand" => Ok(Self::MustUnderstand),
            "DataEncodingUnknown" => Ok(Self::DataEncodingUnknown),
            "Sender" | "Client" => Ok(Self::Sender),
            "Receiver" | "Server" => Ok(Self::Receiver),
            other => Err(SoapError::InvalidArgument(format!(
                "unknown fault code '{}'",
                other
            ))),
        }
    }
}

impl SoapDocument {
    /// Add a Fault to `body`. A body holds at most one fault.
    pub fn add_fault(&mut self, body: NodeId, code: FaultCode, reason: &str) -> Result<NodeId> {
        self.expect_kind(body, NodeKind::Body)?;
        validate_text(reason)?;
        let protocol = self.bound_protocol()?;
        let code_name = code.qname(protocol)?;
        let ns = self.envelope_ns()?;
        let prefix = self.envelope_prefix_at(body)?;
        let code_value = format!("{}:{}", prefix, code_name.local_name());
        let env = |local: &str| QName::new(ns, local, prefix.as_str());

        let fault = match protocol {
            Protocol::Soap12 => Fragment::new(env(FAULT))
                .with_child(
                    Fragment::new(env("Code"))
                        .with_child(Fragment::new(env("Value")).with_text(code_value)),
                )
                .with_child(
                    Fragment::new(env("Reason")).with_child(
                        Fragment::new(env("Text"))
                            .with_attribute(QName::new(XML_NS, "lang", "xml"), "en")
                            .with_text(reason),
                    ),
                ),
            _ => Fragment::new(env(FAULT))
                .with_child(Fragment::new(QName::local("faultcode")).with_text(code_value))
                .with_child(Fragment::new(QName::local("faultstring")).with_text(reason)),
        };

        let id = self.add_child_fragment(body, &fault)?;
        debug!(%code, %protocol, "fault added");
        Ok(id)
    }

    /// The body's Fault, coerced, if any.
    pub fn fault(&mut self, body: NodeId) -> Result<Option<NodeId>> {
        self.expect_kind(body, NodeKind::Body)?;
        for child in self.child_elements(body)? {
            if self.kind(child)? == NodeKind::Fault {
                return Ok(Some(child));
            }
        }
        Ok(None)
    }

    pub fn has_fault(&self, body: NodeId) -> Result<bool> {
        let ns = self.envelope_ns()?;
        Ok(self.find_child(body, ns, FAULT)?.is_some())
    }

    /// Fault code, resolved from its `prefix:local` text in scope.
    pub fn fault_code(&self, fault: NodeId) -> Result<QName> {
        let value_node = match self.fault_protocol(fault)? {
            Protocol::Soap12 => {
                let ns = self.envelope_ns()?;
                let code = self.required_child(fault, ns, "Code")?;
                self.required_child(code, ns, "Value")?
            }
            _ => self.required_child(fault, "", "faultcode")?,
        };
        let text = self.text_content(value_node)?;
        let (prefix, local) = split_qualified(text.trim());
        let uri = match self.namespace_uri(value_node, prefix)? {
            Some(uri) => uri,
            None if prefix.is_empty() => "",
            None => return Err(SoapError::UnresolvedPrefix(prefix.to_string())),
        };
        Ok(QName::new(uri, local, prefix))
    }

    /// Fault reason text (`faultstring`, or the first `Reason/Text`).
    pub fn fault_reason(&self, fault: NodeId) -> Result<Option<String>> {
        let node = match self.fault_protocol(fault)? {
            Protocol::Soap12 => {
                let ns = self.envelope_ns()?;
                match self.find_child(fault, ns, "Reason")? {
                    Some(reason) => self.find_child(reason, ns, "Text")?,
                    None => None,
                }
            }
            _ => self.find_child(fault, "", "faultstring")?,
        };
        node.map(|id| self.text_content(id)).transpose()
    }

    /// Add the detail container to a fault.
    pub fn add_fault_detail(&mut self, fault: NodeId) -> Result<NodeId> {
        let name = self.detail_name(fault)?;
        if self
            .find_child(fault, name.namespace_uri(), name.local_name())?
            .is_some()
        {
            return Err(SoapError::InvalidStructure(
                "fault already has a detail".to_string(),
            ));
        }
        self.add_child_element_qname(fault, &name)
    }

    /// The fault's detail container, if any.
    pub fn fault_detail(&self, fault: NodeId) -> Result<Option<NodeId>> {
        let name = self.detail_name(fault)?;
        self.find_child(fault, name.namespace_uri(), name.local_name())
    }

    fn detail_name(&self, fault: NodeId) -> Result<QName> {
        Ok(match self.fault_protocol(fault)? {
            Protocol::Soap12 => {
                let ns = self.envelope_ns()?;
                let prefix = self.envelope_prefix_at(fault)?;
                QName::new(ns, "Detail", prefix)
            }
            _ => QName::local("detail"),
        })
    }

    /// Protocol of the document, after checking `fault` names a Fault.
    fn fault_protocol(&self, fault: NodeId) -> Result<Protocol> {
        let ns = self.envelope_ns()?;
        let name = self.element_qname(fault)?;
        if name.local_name() != FAULT || name.namespace_uri() != ns {
            return Err(SoapError::InvalidArgument(format!("{} is not a SOAP fault", name)));
        }
        self.bound_protocol()
    }

    fn required_child(&self, id: NodeId, ns: &str, local: &str) -> Result<NodeId> {
        self.find_child(id, ns, local)?.ok_or_else(|| {
            SoapError::InvalidStructure(format!("fault is missing its {} element", local))
        })
    }
}

/// Serialize a complete envelope whose body is a single fault.
pub fn fault_envelope(
    protocol: Protocol,
    code: FaultCode,
    reason: &str,
    config: &WriterConfig,
) -> Result<String> {
    let mut doc = SoapDocument::new(protocol);
    let envelope = doc.create_envelope()?;
    let body = doc.add_body(envelope)?;
    doc.add_fault(body, code, reason)?;
    doc.to_xml_string(config)
}
