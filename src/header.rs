//! Envelope structure and header-block semantics.
//!
//! Header block state (actor/role, mustUnderstand, relay) lives in
//! attributes in the envelope namespace. The protocol is looked up on every
//! call, so a dynamic document answers according to the envelope it holds
//! at that moment.

use crate::constants::{
    Protocol, ATTR_ACTOR, ATTR_MUST_UNDERSTAND, ATTR_RELAY, ATTR_ROLE, BODY, ENVELOPE, HEADER,
};
use crate::element::validate_uri;
use crate::error::{Result, SoapError};
use crate::fragment::Fragment;
use crate::name::QName;
use crate::tree::{ElementData, NodeId, NodeKind, SoapDocument};
use tracing::{debug, warn};

impl SoapDocument {
    /// Create the root Envelope for the document's protocol.
    pub fn create_envelope(&mut self) -> Result<NodeId> {
        let protocol = self.protocol();
        self.create_envelope_as(protocol)
    }

    /// Create the root Envelope for `protocol`.
    ///
    /// This is how a dynamic document gets bound; a document with a fixed
    /// protocol only accepts that protocol.
    pub fn create_envelope_as(&mut self, protocol: Protocol) -> Result<NodeId> {
        if self.root.is_some() {
            return Err(SoapError::InvalidStructure(
                "document already has an envelope".to_string(),
            ));
        }
        let ns = protocol.envelope_ns().ok_or(SoapError::ProtocolUnbound)?;
        if self.protocol() != Protocol::Dynamic && self.protocol() != protocol {
            return Err(SoapError::VersionMismatch(format!(
                "document is bound to {}, not {}",
                self.protocol(),
                protocol
            )));
        }
        let prefix = self.envelope_prefix.clone();
        let mut data = ElementData::new(QName::new(ns, ENVELOPE, prefix.as_str()));
        data.namespaces.insert(prefix, ns.to_string());
        let id = self.append_element(None, NodeKind::Envelope, data)?;
        debug!(%protocol, "envelope created");
        Ok(id)
    }

    /// The root Envelope.
    pub fn envelope(&self) -> Result<NodeId> {
        self.root
            .ok_or_else(|| SoapError::InvalidStructure("document has no envelope".to_string()))
    }

    /// The envelope's Header, if present.
    pub fn header(&self, envelope: NodeId) -> Result<Option<NodeId>> {
        self.structural_child(envelope, NodeKind::Header)
    }

    /// The envelope's Body, if present.
    pub fn body(&self, envelope: NodeId) -> Result<Option<NodeId>> {
        self.structural_child(envelope, NodeKind::Body)
    }

    /// Add the Header as the envelope's first child.
    pub fn add_header(&mut self, envelope: NodeId) -> Result<NodeId> {
        self.expect_kind(envelope, NodeKind::Envelope)?;
        if self.header(envelope)?.is_some() {
            return Err(SoapError::InvalidStructure(
                "envelope already has a header".to_string(),
            ));
        }
        let name = self.envelope_child_name(envelope, HEADER)?;
        let id = self.insert_element(envelope, 0, NodeKind::Header, ElementData::new(name))?;
        Ok(id)
    }

    /// Add the Body after the Header.
    pub fn add_body(&mut self, envelope: NodeId) -> Result<NodeId> {
        self.expect_kind(envelope, NodeKind::Envelope)?;
        if self.body(envelope)?.is_some() {
            return Err(SoapError::InvalidStructure(
                "envelope already has a body".to_string(),
            ));
        }
        let name = self.envelope_child_name(envelope, BODY)?;
        let index = match self.header(envelope)? {
            Some(header) => self
                .element(envelope)?
                .children
                .iter()
                .position(|c| *c == header)
                .map_or(0, |i| i + 1),
            None => 0,
        };
        self.insert_element(envelope, index, NodeKind::Body, ElementData::new(name))
    }

    /// Add a header block. Header blocks must be namespace qualified.
    pub fn add_header_element(&mut self, header: NodeId, name: &QName) -> Result<NodeId> {
        self.expect_kind(header, NodeKind::Header)?;
        self.add_child_element_qname(header, name)
    }

    /// Add a body entry.
    pub fn add_body_element(&mut self, body: NodeId, name: &QName) -> Result<NodeId> {
        self.expect_kind(body, NodeKind::Body)?;
        self.add_child_element_qname(body, name)
    }

    /// Set the actor of a header block. Under SOAP 1.2 this sets the role.
    pub fn set_actor(&mut self, id: NodeId, actor: &str) -> Result<()> {
        match self.bound_protocol()? {
            Protocol::Soap12 => self.set_role(id, actor),
            _ => {
                self.expect_header_block(id)?;
                validate_uri(actor)?;
                self.set_envelope_attribute(id, ATTR_ACTOR, actor)
            }
        }
    }

    /// Actor of a header block, defaulting to the next actor/role.
    pub fn actor(&self, id: NodeId) -> Result<String> {
        match self.bound_protocol()? {
            Protocol::Soap12 => self.role(id),
            protocol => self.header_attribute_or_default(id, ATTR_ACTOR, protocol),
        }
    }

    /// Set the SOAP 1.2 role of a header block.
    pub fn set_role(&mut self, id: NodeId, role: &str) -> Result<()> {
        self.require_role_support("set_role")?;
        self.expect_header_block(id)?;
        validate_uri(role)?;
        self.set_envelope_attribute(id, ATTR_ROLE, role)
    }

    /// SOAP 1.2 role of a header block, defaulting to the next role.
    pub fn role(&self, id: NodeId) -> Result<String> {
        let protocol = self.require_role_support("role")?;
        self.header_attribute_or_default(id, ATTR_ROLE, protocol)
    }

    /// Set or clear mustUnderstand. Clearing removes the attribute.
    pub fn set_must_understand(&mut self, id: NodeId, must_understand: bool) -> Result<()> {
        let protocol = self.bound_protocol()?;
        self.expect_header_block(id)?;
        if must_understand {
            let value = match protocol {
                Protocol::Soap12 => "true",
                _ => "1",
            };
            self.set_envelope_attribute(id, ATTR_MUST_UNDERSTAND, value)
        } else {
            self.remove_envelope_attribute(id, ATTR_MUST_UNDERSTAND)?;
            Ok(())
        }
    }

    pub fn must_understand(&self, id: NodeId) -> Result<bool> {
        self.expect_header_block(id)?;
        self.header_flag(id, ATTR_MUST_UNDERSTAND)
    }

    /// Set or clear the SOAP 1.2 relay flag.
    pub fn set_relay(&mut self, id: NodeId, relay: bool) -> Result<()> {
        self.require_role_support("set_relay")?;
        self.expect_header_block(id)?;
        if relay {
            self.set_envelope_attribute(id, ATTR_RELAY, "true")
        } else {
            self.remove_envelope_attribute(id, ATTR_RELAY)?;
            Ok(())
        }
    }

    pub fn relay(&self, id: NodeId) -> Result<bool> {
        self.require_role_support("relay")?;
        self.expect_header_block(id)?;
        self.header_flag(id, ATTR_RELAY)
    }

    /// Header blocks targeted at `actor`. Blocks without an explicit
    /// actor/role target the next actor/role.
    pub fn examine_header_elements(&mut self, header: NodeId, actor: &str) -> Result<Vec<NodeId>> {
        self.select_header_elements(header, Some(actor), false)
    }

    /// Header blocks targeted at `actor` with mustUnderstand set.
    pub fn examine_must_understand_header_elements(
        &mut self,
        header: NodeId,
        actor: &str,
    ) -> Result<Vec<NodeId>> {
        self.select_header_elements(header, Some(actor), true)
    }

    /// Every header block, in document order.
    pub fn examine_all_header_elements(&mut self, header: NodeId) -> Result<Vec<NodeId>> {
        self.select_header_elements(header, None, false)
    }

    /// Remove the header blocks targeted at `actor` and return them detached.
    pub fn extract_header_elements(&mut self, header: NodeId, actor: &str) -> Result<Vec<Fragment>> {
        let selected = self.select_header_elements(header, Some(actor), false)?;
        self.detach_all(selected)
    }

    /// Remove every header block and return them detached.
    pub fn extract_all_header_elements(&mut self, header: NodeId) -> Result<Vec<Fragment>> {
        let selected = self.select_header_elements(header, None, false)?;
        self.detach_all(selected)
    }

    // --- helpers ---

    fn select_header_elements(
        &mut self,
        header: NodeId,
        actor: Option<&str>,
        must_understand_only: bool,
    ) -> Result<Vec<NodeId>> {
        self.expect_kind(header, NodeKind::Header)?;
        let mut selected = Vec::new();
        for child in self.child_elements(header)? {
            if self.kind(child)? != NodeKind::HeaderElement {
                continue;
            }
            if let Some(actor) = actor {
                if self.actor(child)? != actor {
                    continue;
                }
            }
            if must_understand_only && !self.must_understand(child)? {
                continue;
            }
            selected.push(child);
        }
        Ok(selected)
    }

    fn detach_all(&mut self, ids: Vec<NodeId>) -> Result<Vec<Fragment>> {
        let fragments = ids
            .iter()
            .map(|id| self.export_fragment(*id))
            .collect::<Result<Vec<_>>>()?;
        for id in ids {
            self.remove_node(id)?;
        }
        debug!(count = fragments.len(), "header blocks extracted");
        Ok(fragments)
    }

    fn structural_child(&self, envelope: NodeId, kind: NodeKind) -> Result<Option<NodeId>> {
        self.expect_kind(envelope, NodeKind::Envelope)?;
        for child in &self.element(envelope)?.children {
            if self.kind(*child)? == kind {
                return Ok(Some(*child));
            }
        }
        Ok(None)
    }

    /// Name for Header/Body using the prefix the envelope already binds.
    fn envelope_child_name(&self, envelope: NodeId, local: &str) -> Result<QName> {
        let ns = self.envelope_ns()?;
        let prefix = match self.lookup_prefix(envelope, ns)? {
            Some(prefix) => prefix,
            None if self.namespace_uri(envelope, "")? == Some(ns) => String::new(),
            None => {
                return Err(SoapError::InvalidStructure(
                    "envelope namespace is not declared in scope".to_string(),
                ))
            }
        };
        Ok(QName::new(ns, local, prefix))
    }

    pub(crate) fn expect_kind(&self, id: NodeId, expected: NodeKind) -> Result<()> {
        let kind = self.kind(id)?;
        if kind != expected {
            return Err(SoapError::InvalidArgument(format!(
                "expected {:?}, found {:?}",
                expected, kind
            )));
        }
        Ok(())
    }

    /// A header block is any element directly under the Header, coerced or not.
    fn expect_header_block(&self, id: NodeId) -> Result<()> {
        let is_block = match self.parent(id)? {
            Some(parent) => self.kind(parent)? == NodeKind::Header && self.kind(id)?.is_element(),
            None => false,
        };
        if !is_block {
            return Err(SoapError::InvalidArgument(
                "node is not a header block".to_string(),
            ));
        }
        Ok(())
    }

    fn require_role_support(&self, operation: &'static str) -> Result<Protocol> {
        let protocol = self.bound_protocol()?;
        if !protocol.supports_role() {
            warn!(%protocol, operation, "operation not supported for protocol");
            return Err(SoapError::unsupported(protocol.as_str(), operation));
        }
        Ok(protocol)
    }

    fn header_attribute_or_default(
        &self,
        id: NodeId,
        local: &str,
        protocol: Protocol,
    ) -> Result<String> {
        self.expect_header_block(id)?;
        match self.envelope_attribute(id, local)? {
            Some(value) => Ok(value.to_string()),
            None => protocol
                .default_role()
                .map(str::to_string)
                .ok_or(SoapError::ProtocolUnbound),
        }
    }

    fn header_flag(&self, id: NodeId, local: &str) -> Result<bool> {
        Ok(matches!(
            self.envelope_attribute(id, local)?.map(str::trim),
            Some("1" | "true")
        ))
    }
}
