//! Element mutation contract: children, text, attributes, renaming and
//! encoding style.
//!
//! Every mutating call validates its input against the current tree before
//! touching it; on error the document is left unchanged.

use crate::constants::{
    is_envelope_ns, is_reserved_name, Protocol, ATTR_ENCODING_STYLE, FAULT,
};
use crate::error::{Result, SoapError};
use crate::fragment::Fragment;
use crate::name::{is_ncname, Name, QName};
use crate::namespace::validate_binding;
use crate::tree::{Attribute, ElementData, NodeId, NodeKind, SoapDocument};
use tracing::{debug, warn};

impl SoapDocument {
    /// Add a child element named by a legacy [`Name`].
    pub fn add_child_element(&mut self, parent: NodeId, name: &Name) -> Result<NodeId> {
        self.add_child_element_qname(parent, name.as_qname())
    }

    /// Add a child element; namespace, local name and prefix come from `qname`.
    ///
    /// A prefixed name without a namespace takes the namespace bound to the
    /// prefix in the parent's scope.
    pub fn add_child_element_qname(&mut self, parent: NodeId, qname: &QName) -> Result<NodeId> {
        let mut name = qname.clone();
        if name.namespace_uri().is_empty() && !name.prefix().is_empty() {
            let uri = self
                .namespace_uri(parent, name.prefix())?
                .ok_or_else(|| SoapError::UnresolvedPrefix(name.prefix().to_string()))?
                .to_string();
            name.set_namespace_uri(uri);
        }
        self.create_child(parent, name)
    }

    /// Add a child element that inherits the in-scope default namespace.
    pub fn add_child_element_local(&mut self, parent: NodeId, local_name: &str) -> Result<NodeId> {
        let uri = self.namespace_uri(parent, "")?.unwrap_or("").to_string();
        self.create_child(parent, QName::new(uri, local_name, ""))
    }

    /// Add a child element whose prefix must already be declared in scope.
    pub fn add_child_element_prefixed(
        &mut self,
        parent: NodeId,
        local_name: &str,
        prefix: &str,
    ) -> Result<NodeId> {
        let name = self.create_qname(parent, local_name, prefix)?;
        self.create_child(parent, name)
    }

    /// Add a child element, declaring `prefix` → `uri` on it when needed.
    pub fn add_child_element_ns(
        &mut self,
        parent: NodeId,
        local_name: &str,
        prefix: &str,
        uri: &str,
    ) -> Result<NodeId> {
        self.create_child(parent, QName::new(uri, local_name, prefix))
    }

    /// Copy an externally built element under `parent`.
    ///
    /// The fragment must not contain Envelope, Header or Body elements in a
    /// SOAP namespace. The returned handle is the node actually inserted,
    /// which may be a specialized kind (e.g. a header block under a Header).
    pub fn add_child_fragment(&mut self, parent: NodeId, fragment: &Fragment) -> Result<NodeId> {
        if let Err(e) = fragment.validate() {
            warn!(error = %e, "rejected fragment");
            return Err(e);
        }
        self.check_child_allowed(parent, fragment.name(), None)?;
        let kind = self.child_kind(parent, fragment.name())?;
        let id = self.import_fragment(parent, kind, fragment)?;
        debug!(name = %fragment.name(), ?kind, "fragment added");
        Ok(id)
    }

    /// Append a text node to `parent` and return it.
    pub fn add_text_node(&mut self, parent: NodeId, text: &str) -> Result<NodeId> {
        let kind = self.kind(parent)?;
        if !kind.is_element() {
            return Err(SoapError::NotAnElement);
        }
        if !kind.accepts_text() && !text.trim().is_empty() {
            return Err(SoapError::InvalidStructure(format!(
                "{:?} cannot contain character data",
                kind
            )));
        }
        validate_text(text)?;
        self.append_text(parent, text.to_string())
    }

    /// Detach and drop all children of `id`.
    pub fn remove_contents(&mut self, id: NodeId) -> Result<()> {
        let children = std::mem::take(&mut self.element_mut(id)?.children);
        for child in children {
            self.free_subtree(child);
        }
        Ok(())
    }

    /// Rename an element. Envelope, Header, Body and Fault keep their names.
    ///
    /// Returns the handle of the renamed node, which is fresh when the new
    /// name changes the node's specialized kind.
    pub fn set_element_qname(&mut self, id: NodeId, new_name: &QName) -> Result<NodeId> {
        let kind = self.kind(id)?;
        if kind.is_structural() || kind == NodeKind::Fault {
            return Err(SoapError::IllegalRename(format!("{:?} has a fixed name", kind)));
        }
        if !kind.is_element() {
            return Err(SoapError::NotAnElement);
        }
        if is_reserved_name(new_name) {
            return Err(SoapError::IllegalRename(format!(
                "{} is a reserved SOAP element name",
                new_name
            )));
        }
        validate_name(new_name)?;
        let data = self.element(id)?;
        if let Some(bound) = data.namespaces.get(new_name.prefix()) {
            if bound != new_name.namespace_uri() {
                return Err(SoapError::InvalidArgument(format!(
                    "prefix '{}' is declared on this element for another namespace",
                    new_name.prefix()
                )));
            }
        }
        if kind == NodeKind::HeaderElement && new_name.namespace_uri().is_empty() {
            return Err(SoapError::InvalidArgument(
                "header blocks must be namespace qualified".to_string(),
            ));
        }
        if let Some(parent) = self.parent(id)? {
            if self.kind(parent)? == NodeKind::Body
                && self.is_fault_name(new_name)?
                && self
                    .find_child(parent, new_name.namespace_uri(), FAULT)?
                    .is_some_and(|existing| existing != id)
            {
                return Err(SoapError::InvalidStructure(
                    "body already contains a fault".to_string(),
                ));
            }
        }

        self.element_mut(id)?.name = new_name.clone();
        self.ensure_namespace(id, new_name.prefix(), new_name.namespace_uri())?;
        match self.parent(id)? {
            Some(parent) => self.coerce_child(parent, id),
            None => Ok(id),
        }
    }

    /// Add an attribute named by a legacy [`Name`].
    pub fn add_attribute(&mut self, id: NodeId, name: &Name, value: &str) -> Result<NodeId> {
        self.add_attribute_qname(id, name.as_qname(), value)
    }

    /// Add or replace an attribute. Replacing keeps the attribute's position.
    pub fn add_attribute_qname(&mut self, id: NodeId, qname: &QName, value: &str) -> Result<NodeId> {
        let name = self.resolve_attribute_name(id, qname)?;
        validate_text(value)?;
        if !name.prefix().is_empty() {
            let data = self.element(id)?;
            let own_conflict =
                data.name.prefix() == name.prefix() && data.name.namespace_uri() != name.namespace_uri();
            let local_conflict = data
                .namespaces
                .get(name.prefix())
                .is_some_and(|uri| uri != name.namespace_uri());
            if own_conflict || local_conflict {
                return Err(SoapError::InvalidArgument(format!(
                    "prefix '{}' is bound to another namespace on this element",
                    name.prefix()
                )));
            }
        }

        let data = self.element_mut(id)?;
        data.attributes.insert(
            name.clone(),
            Attribute {
                name: name.clone(),
                value: value.to_string(),
            },
        );
        if !name.namespace_uri().is_empty() {
            self.ensure_namespace(id, name.prefix(), name.namespace_uri())?;
        }
        Ok(id)
    }

    /// Value of the attribute named by a legacy [`Name`].
    pub fn attribute_value(&self, id: NodeId, name: &Name) -> Result<Option<&str>> {
        self.attribute_value_qname(id, name.as_qname())
    }

    pub fn attribute_value_qname(&self, id: NodeId, qname: &QName) -> Result<Option<&str>> {
        let key = self.attribute_key(id, qname)?;
        Ok(self
            .element(id)?
            .attributes
            .get(&key)
            .map(|a| a.value.as_str()))
    }

    /// Attribute names in insertion order.
    pub fn all_attributes(&self, id: NodeId) -> Result<Vec<Name>> {
        Ok(self
            .all_attributes_as_qnames(id)?
            .into_iter()
            .map(Name::from)
            .collect())
    }

    /// Attribute names in insertion order.
    pub fn all_attributes_as_qnames(&self, id: NodeId) -> Result<Vec<QName>> {
        Ok(self
            .element(id)?
            .attributes
            .values()
            .map(|a| a.name.clone())
            .collect())
    }

    /// Remove the attribute named by a legacy [`Name`]; false if absent.
    pub fn remove_attribute(&mut self, id: NodeId, name: &Name) -> Result<bool> {
        self.remove_attribute_qname(id, name.as_qname())
    }

    pub fn remove_attribute_qname(&mut self, id: NodeId, qname: &QName) -> Result<bool> {
        let key = self.attribute_key(id, qname)?;
        Ok(self.element_mut(id)?.attributes.shift_remove(&key).is_some())
    }

    /// Set the `encodingStyle` attribute.
    ///
    /// SOAP 1.1 takes a whitespace separated list of URIs (empty means no
    /// claims); SOAP 1.2 takes a single URI and forbids the attribute on
    /// Envelope, Header and Body.
    pub fn set_encoding_style(&mut self, id: NodeId, encoding_style: &str) -> Result<()> {
        let kind = self.kind(id)?;
        if !kind.is_element() {
            return Err(SoapError::NotAnElement);
        }
        match self.bound_protocol()? {
            Protocol::Soap12 => {
                if kind.is_structural() {
                    return Err(SoapError::InvalidStructure(format!(
                        "encodingStyle is not allowed on {:?} in SOAP 1.2",
                        kind
                    )));
                }
                validate_uri(encoding_style)?;
            }
            _ => {
                for uri in encoding_style.split_whitespace() {
                    validate_uri(uri)?;
                }
            }
        }
        self.set_envelope_attribute(id, ATTR_ENCODING_STYLE, encoding_style)
    }

    /// Value of the `encodingStyle` attribute, if set.
    pub fn encoding_style(&self, id: NodeId) -> Result<Option<&str>> {
        Ok(self
            .element(id)?
            .attributes
            .values()
            .find(|a| {
                a.name.local_name() == ATTR_ENCODING_STYLE && is_envelope_ns(a.name.namespace_uri())
            })
            .map(|a| a.value.as_str()))
    }

    // --- shared helpers ---

    /// Create a validated element under `parent`.
    fn create_child(&mut self, parent: NodeId, name: QName) -> Result<NodeId> {
        validate_name(&name)?;
        if !name.prefix().is_empty() {
            validate_binding(name.prefix(), name.namespace_uri())?;
        }
        self.check_child_allowed(parent, &name, None)?;
        let kind = self.child_kind(parent, &name)?;
        let id = self.append_element(Some(parent), kind, ElementData::new(name.clone()))?;
        self.ensure_namespace(id, name.prefix(), name.namespace_uri())?;
        debug!(name = %name, ?kind, "child element added");
        Ok(id)
    }

    /// Reject element names that cannot appear under `parent`. `moving` is a
    /// node being re-parented, which does not count against itself.
    pub(crate) fn check_child_allowed(
        &self,
        parent: NodeId,
        name: &QName,
        moving: Option<NodeId>,
    ) -> Result<()> {
        let parent_kind = self.kind(parent)?;
        if !parent_kind.is_element() {
            return Err(SoapError::NotAnElement);
        }
        if is_reserved_name(name) {
            warn!(name = %name, "rejected reserved SOAP element name");
            return Err(SoapError::ReservedName(name.to_string()));
        }
        if parent_kind == NodeKind::Envelope && self.bound_protocol()? == Protocol::Soap12 {
            return Err(SoapError::InvalidStructure(
                "a SOAP 1.2 envelope contains only Header and Body".to_string(),
            ));
        }
        if parent_kind == NodeKind::Header && name.namespace_uri().is_empty() {
            return Err(SoapError::InvalidArgument(
                "header blocks must be namespace qualified".to_string(),
            ));
        }
        if parent_kind == NodeKind::Body
            && self.is_fault_name(name)?
            && self
                .find_child(parent, name.namespace_uri(), FAULT)?
                .is_some_and(|existing| Some(existing) != moving)
        {
            return Err(SoapError::InvalidStructure(
                "body already contains a fault".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether `name` is the Fault of the bound protocol.
    pub(crate) fn is_fault_name(&self, name: &QName) -> Result<bool> {
        Ok(name.local_name() == FAULT && name.namespace_uri() == self.envelope_ns()?)
    }

    /// Set an attribute in the envelope namespace, using an in-scope prefix.
    pub(crate) fn set_envelope_attribute(&mut self, id: NodeId, local: &str, value: &str) -> Result<()> {
        let ns = self.envelope_ns()?;
        let prefix = self.envelope_prefix_at(id)?;
        self.add_attribute_qname(id, &QName::new(ns, local, prefix), value)?;
        Ok(())
    }

    /// Attribute in the envelope namespace of the bound protocol.
    pub(crate) fn envelope_attribute(&self, id: NodeId, local: &str) -> Result<Option<&str>> {
        let ns = self.envelope_ns()?;
        self.attribute_value_qname(id, &QName::with_namespace(ns, local))
    }

    pub(crate) fn remove_envelope_attribute(&mut self, id: NodeId, local: &str) -> Result<bool> {
        let ns = self.envelope_ns()?;
        self.remove_attribute_qname(id, &QName::with_namespace(ns, local))
    }

    /// First element child of `id` named `{ns}local`, without coercion.
    pub(crate) fn find_child(&self, id: NodeId, ns: &str, local: &str) -> Result<Option<NodeId>> {
        for child in &self.element(id)?.children {
            if let Ok(data) = self.element(*child) {
                if data.name.namespace_uri() == ns && data.name.local_name() == local {
                    return Ok(Some(*child));
                }
            }
        }
        Ok(None)
    }

    /// Complete an attribute name: a bare prefix takes its in-scope
    /// namespace, a bare namespace takes an in-scope prefix.
    fn resolve_attribute_name(&self, id: NodeId, qname: &QName) -> Result<QName> {
        if qname.prefix() == "xmlns" || (qname.prefix().is_empty() && qname.local_name() == "xmlns") {
            return Err(SoapError::InvalidArgument(
                "namespace declarations are added with add_namespace_declaration".to_string(),
            ));
        }
        let uri = qname.namespace_uri();
        let prefix = qname.prefix();
        let resolved = match (uri.is_empty(), prefix.is_empty()) {
            (true, true) => qname.clone(),
            (true, false) => {
                let bound = self
                    .namespace_uri(id, prefix)?
                    .ok_or_else(|| SoapError::UnresolvedPrefix(prefix.to_string()))?;
                QName::new(bound, qname.local_name(), prefix)
            }
            (false, true) => match self.lookup_prefix(id, uri)? {
                Some(found) => qname.with_prefix(found),
                None => {
                    return Err(SoapError::InvalidArgument(format!(
                        "attribute {} needs a prefix for its namespace",
                        qname
                    )))
                }
            },
            (false, false) => {
                validate_binding(prefix, uri)?;
                qname.clone()
            }
        };
        validate_name(&resolved)?;
        Ok(resolved)
    }

    /// Canonical lookup key; never fails on unknown prefixes.
    fn attribute_key(&self, id: NodeId, qname: &QName) -> Result<QName> {
        if qname.namespace_uri().is_empty() && !qname.prefix().is_empty() {
            if let Some(uri) = self.namespace_uri(id, qname.prefix())? {
                return Ok(QName::new(uri, qname.local_name(), qname.prefix()));
            }
        }
        Ok(qname.clone())
    }
}

/// Check local name and prefix syntax.
pub(crate) fn validate_name(name: &QName) -> Result<()> {
    if !is_ncname(name.local_name()) {
        return Err(SoapError::InvalidArgument(format!(
            "'{}' is not a valid local name",
            name.local_name()
        )));
    }
    if !name.prefix().is_empty() && !is_ncname(name.prefix()) {
        return Err(SoapError::InvalidArgument(format!(
            "'{}' is not a valid prefix",
            name.prefix()
        )));
    }
    if !name.prefix().is_empty() && name.namespace_uri().is_empty() {
        return Err(SoapError::UnresolvedPrefix(name.prefix().to_string()));
    }
    Ok(())
}

/// Reject characters XML 1.0 cannot carry.
pub(crate) fn validate_text(text: &str) -> Result<()> {
    match text
        .chars()
        .find(|c| c.is_control() && !matches!(c, '\t' | '\n' | '\r'))
    {
        Some(c) => Err(SoapError::InvalidArgument(format!(
            "character U+{:04X} is not allowed in XML",
            u32::from(c)
        ))),
        None => Ok(()),
    }
}

/// Check that `value` reads as a single URI reference.
pub(crate) fn validate_uri(value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(SoapError::InvalidArgument("URI must not be empty".to_string()));
    }
    if let Some(c) = value
        .chars()
        .find(|c| c.is_whitespace() || c.is_control() || "<>\"{}|\\^`".contains(*c))
    {
        return Err(SoapError::InvalidArgument(format!(
            "'{}' is not a valid URI (contains {:?})",
            value, c
        )));
    }
    Ok(())
}
