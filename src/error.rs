//! Error types for the SOAP object model.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SoapError>;

/// SOAP object model errors.
///
/// Every fallible operation reports its failure synchronously and leaves the
/// document exactly as it was before the call.
#[derive(Error, Debug)]
pub enum SoapError {
    #[error("Invalid SOAP structure: {0}")]
    InvalidStructure(String),

    #[error("Reserved SOAP element name: {0}")]
    ReservedName(String),

    #[error("Element cannot be renamed: {0}")]
    IllegalRename(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Operation not supported by {protocol}: {operation}")]
    UnsupportedForProtocol {
        protocol: &'static str,
        operation: &'static str,
    },

    #[error("SOAP protocol is not bound yet (dynamic document without envelope)")]
    ProtocolUnbound,

    #[error("Namespace prefix '{0}' is not declared in scope")]
    UnresolvedPrefix(String),

    #[error("Stale node reference (node was removed or replaced)")]
    StaleNode,

    #[error("Node is not an element")]
    NotAnElement,

    #[error("SOAP version mismatch: {0}")]
    VersionMismatch(String),

    #[error("XML parsing error: {0}")]
    XmlParse(String),

    #[error("XML writing error: {0}")]
    XmlWrite(String),

    #[error("XXE attack detected: {0}")]
    XxeDetected(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SoapError {
    /// Stable code for this error, suitable for logs and metrics labels.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidStructure(_) => ErrorCode::InvalidStructure,
            Self::ReservedName(_) => ErrorCode::ReservedName,
            Self::IllegalRename(_) => ErrorCode::IllegalRename,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::UnsupportedForProtocol { .. } => ErrorCode::UnsupportedForProtocol,
            Self::ProtocolUnbound => ErrorCode::ProtocolUnbound,
            Self::UnresolvedPrefix(_) => ErrorCode::UnresolvedPrefix,
            Self::StaleNode => ErrorCode::StaleNode,
            Self::NotAnElement => ErrorCode::NotAnElement,
            Self::VersionMismatch(_) => ErrorCode::VersionMismatch,
            Self::XmlParse(_) => ErrorCode::InvalidXml,
            Self::XmlWrite(_) => ErrorCode::WriteFailed,
            Self::XxeDetected(_) => ErrorCode::XxeDetected,
            Self::Config(_) => ErrorCode::InvalidConfig,
            Self::Io(_) => ErrorCode::Io,
        }
    }

    pub(crate) fn unsupported(protocol: &'static str, operation: &'static str) -> Self {
        Self::UnsupportedForProtocol {
            protocol,
            operation,
        }
    }
}

/// Error codes for SOAP object model failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    /// Mutation violates the envelope/header/body structure
    InvalidStructure,
    /// Reserved Envelope/Header/Body name used in a generic context
    ReservedName,
    /// Rename of a structurally fixed element
    IllegalRename,
    /// Malformed actor, role, encoding style or name
    InvalidArgument,
    /// Operation needs a different SOAP version
    UnsupportedForProtocol,
    /// Dynamic document has no envelope to bind its protocol
    ProtocolUnbound,
    /// Prefix not declared in scope
    UnresolvedPrefix,
    /// Handle refers to a removed or replaced node
    StaleNode,
    /// Handle refers to a text node where an element is needed
    NotAnElement,
    /// Envelope namespace does not match the document protocol
    VersionMismatch,
    /// Malformed XML input
    InvalidXml,
    /// Serialization failure
    WriteFailed,
    /// DOCTYPE, entity or processing instruction rejected
    XxeDetected,
    /// Bad configuration
    InvalidConfig,
    /// IO failure
    Io,
}

impl ErrorCode {
    /// Get the string code for this error.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidStructure => "INVALID_STRUCTURE",
            Self::ReservedName => "RESERVED_NAME",
            Self::IllegalRename => "ILLEGAL_RENAME",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::UnsupportedForProtocol => "UNSUPPORTED_FOR_PROTOCOL",
            Self::ProtocolUnbound => "PROTOCOL_UNBOUND",
            Self::UnresolvedPrefix => "UNRESOLVED_PREFIX",
            Self::StaleNode => "STALE_NODE",
            Self::NotAnElement => "NOT_AN_ELEMENT",
            Self::VersionMismatch => "VERSION_MISMATCH",
            Self::InvalidXml => "INVALID_XML",
            Self::WriteFailed => "WRITE_FAILED",
            Self::XxeDetected => "XXE_DETECTED",
            Self::InvalidConfig => "INVALID_CONFIG",
            Self::Io => "IO",
        }
    }
}
