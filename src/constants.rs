//! SOAP protocol constants and the per-version strategy table.

use crate::error::SoapError;
use crate::name::QName;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// SOAP namespace URIs.
pub const URI_NS_SOAP_1_1_ENVELOPE: &str = "http://schemas.xmlsoap.org/soap/envelope/";
pub const URI_NS_SOAP_1_2_ENVELOPE: &str = "http://www.w3.org/2003/05/soap-envelope";
pub const URI_NS_SOAP_ENCODING: &str = "http://schemas.xmlsoap.org/soap/encoding/";
pub const URI_NS_SOAP_1_2_ENCODING: &str = "http://www.w3.org/2003/05/soap-encoding";

/// Namespace bound to the reserved `xml` prefix.
pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";
/// Namespace of `xmlns` declarations.
pub const XMLNS_NS: &str = "http://www.w3.org/2000/xmlns/";

pub const SOAP_1_1_CONTENT_TYPE: &str = "text/xml";
pub const SOAP_1_2_CONTENT_TYPE: &str = "application/soap+xml";

pub const URI_SOAP_ACTOR_NEXT: &str = "http://schemas.xmlsoap.org/soap/actor/next";
pub const URI_SOAP_1_2_ROLE_NEXT: &str = "http://www.w3.org/2003/05/soap-envelope/role/next";
pub const URI_SOAP_1_2_ROLE_NONE: &str = "http://www.w3.org/2003/05/soap-envelope/role/none";
pub const URI_SOAP_1_2_ROLE_ULTIMATE_RECEIVER: &str =
    "http://www.w3.org/2003/05/soap-envelope/role/ultimateReceiver";

/// Prefix used for the SOAP 1.2 fault code names.
pub const SOAP_ENV_PREFIX: &str = "env";

pub const DYNAMIC_SOAP_PROTOCOL: &str = "Dynamic Protocol";
pub const SOAP_1_1_PROTOCOL: &str = "SOAP 1.1 Protocol";
pub const SOAP_1_2_PROTOCOL: &str = "SOAP 1.2 Protocol";
pub const DEFAULT_SOAP_PROTOCOL: Protocol = Protocol::Soap11;

/// Local names of the structurally fixed SOAP elements.
pub const ENVELOPE: &str = "Envelope";
pub const HEADER: &str = "Header";
pub const BODY: &str = "Body";
pub const FAULT: &str = "Fault";

/// Header block attribute local names.
pub(crate) const ATTR_ACTOR: &str = "actor";
pub(crate) const ATTR_ROLE: &str = "role";
pub(crate) const ATTR_MUST_UNDERSTAND: &str = "mustUnderstand";
pub(crate) const ATTR_RELAY: &str = "relay";
pub(crate) const ATTR_ENCODING_STYLE: &str = "encodingStyle";

/// SOAP protocol versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Protocol {
    /// SOAP 1.1 (namespace: http://schemas.xmlsoap.org/soap/envelope/)
    #[default]
    #[serde(rename = "1.1")]
    Soap11,
    /// SOAP 1.2 (namespace: http://www.w3.org/2003/05/soap-envelope)
    #[serde(rename = "1.2")]
    Soap12,
    /// Version decided by the envelope the document is built from
    #[serde(rename = "dynamic")]
    Dynamic,
}

impl Protocol {
    /// Human-readable protocol name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Soap11 => SOAP_1_1_PROTOCOL,
            Self::Soap12 => SOAP_1_2_PROTOCOL,
            Self::Dynamic => DYNAMIC_SOAP_PROTOCOL,
        }
    }

    /// Envelope namespace URI; `None` for [`Protocol::Dynamic`].
    pub fn envelope_ns(&self) -> Option<&'static str> {
        match self {
            Self::Soap11 => Some(URI_NS_SOAP_1_1_ENVELOPE),
            Self::Soap12 => Some(URI_NS_SOAP_1_2_ENVELOPE),
            Self::Dynamic => None,
        }
    }

    pub fn encoding_ns(&self) -> Option<&'static str> {
        match self {
            Self::Soap11 => Some(URI_NS_SOAP_ENCODING),
            Self::Soap12 => Some(URI_NS_SOAP_1_2_ENCODING),
            Self::Dynamic => None,
        }
    }

    /// MIME content type for messages of this version.
    pub fn content_type(&self) -> Option<&'static str> {
        match self {
            Self::Soap11 => Some(SOAP_1_1_CONTENT_TYPE),
            Self::Soap12 => Some(SOAP_1_2_CONTENT_TYPE),
            Self::Dynamic => None,
        }
    }

    /// Default actor (1.1) or role (1.2) of a header block.
    pub fn default_role(&self) -> Option<&'static str> {
        match self {
            Self::Soap11 => Some(URI_SOAP_ACTOR_NEXT),
            Self::Soap12 => Some(URI_SOAP_1_2_ROLE_NEXT),
            Self::Dynamic => None,
        }
    }

    /// Protocol whose envelope lives in `uri`.
    pub fn from_envelope_ns(uri: &str) -> Option<Self> {
        match uri {
            URI_NS_SOAP_1_1_ENVELOPE => Some(Self::Soap11),
            URI_NS_SOAP_1_2_ENVELOPE => Some(Self::Soap12),
            _ => None,
        }
    }

    /// Whether header blocks carry the SOAP 1.2 `role` and `relay` attributes.
    pub fn supports_role(&self) -> bool {
        matches!(self, Self::Soap12)
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = SoapError;

    /// Accepts the short forms ("1.1", "1.2", "dynamic") and the protocol names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1.1" | SOAP_1_1_PROTOCOL => Ok(Self::Soap11),
            "1.2" | SOAP_1_2_PROTOCOL => Ok(Self::Soap12),
            "dynamic" | DYNAMIC_SOAP_PROTOCOL => Ok(Self::Dynamic),
            other => Err(SoapError::InvalidArgument(format!(
                "unknown SOAP protocol '{}'",
                other
            ))),
        }
    }
}

/// True if `uri` is one of the SOAP envelope namespaces.
pub fn is_envelope_ns(uri: &str) -> bool {
    Protocol::from_envelope_ns(uri).is_some()
}

/// True if `name` is Envelope, Header or Body in a SOAP envelope namespace.
pub fn is_reserved_name(name: &QName) -> bool {
    is_envelope_ns(name.namespace_uri())
        && matches!(name.local_name(), ENVELOPE | HEADER | BODY)
}

fn soap12_fault(local: &str) -> QName {
    QName::new(URI_NS_SOAP_1_2_ENVELOPE, local, SOAP_ENV_PREFIX)
}

/// SOAP 1.2 `env:VersionMismatch` fault code.
pub fn soap_version_mismatch_fault() -> QName {
    soap12_fault("VersionMismatch")
}

/// SOAP 1.2 `env:MustUnderstand` fault code.
pub fn soap_must_understand_fault() -> QName {
    soap12_fault("MustUnderstand")
}

/// SOAP 1.2 `env:DataEncodingUnknown` fault code.
pub fn soap_data_encoding_unknown_fault() -> QName {
    soap12_fault("DataEncodingUnknown")
}

/// SOAP 1.2 `env:Sender` fault code.
pub fn soap_sender_fault() -> QName {
    soap12_fault("Sender")
}

/// SOAP 1.2 `env:Receiver` fault code.
pub fn soap_receiver_fault() -> QName {
    soap12_fault("Receiver")
}
