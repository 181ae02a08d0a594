//! SOAP message object model for Zentinel
//!
//! An in-memory SOAP envelope tree with element and attribute manipulation,
//! lexically scoped namespaces, header-block semantics and SOAP 1.1 / 1.2
//! protocol handling.
//!
//! # Features
//!
//! - Arena-backed tree with generational node handles
//! - Transparent coercion of header blocks, body entries and faults
//! - Namespace resolution with nearest-ancestor scoping
//! - Header actor/role, mustUnderstand and relay handling per protocol
//! - SOAP Fault construction and inspection
//! - XXE-hardened reader and a namespace-fixing writer
//!
//! # Example
//!
//! ```
//! use zentinel_soap_model::{Protocol, QName, SoapDocument};
//!
//! let mut doc = SoapDocument::new(Protocol::Soap12);
//! let envelope = doc.create_envelope()?;
//! let header = doc.add_header(envelope)?;
//! doc.add_body(envelope)?;
//!
//! let block = doc.add_header_element(header, &QName::new("urn:x", "Foo", "x"))?;
//! doc.set_must_understand(block, true)?;
//! assert!(doc.must_understand(block)?);
//! assert_eq!(doc.role(block)?, "http://www.w3.org/2003/05/soap-envelope/role/next");
//! # Ok::<(), zentinel_soap_model::SoapError>(())
//! ```

mod coercion;
pub mod config;
pub mod constants;
mod element;
pub mod error;
pub mod fault;
pub mod fragment;
mod header;
pub mod name;
mod namespace;
pub mod parser;
pub mod tree;
pub mod writer;

pub use config::{ParsingConfig, ProtocolConfig, SoapModelConfig, WriterConfig};
pub use constants::Protocol;
pub use error::{ErrorCode, Result, SoapError};
pub use fault::{fault_envelope, FaultCode};
pub use fragment::{Fragment, FragmentNode};
pub use name::{Name, QName};
pub use parser::parse_document;
pub use tree::{NodeId, NodeKind, SoapDocument};
pub use writer::to_xml;
