//! Namespace resolution with lexical scoping.
//!
//! Declarations live on the element that declares them; lookups walk from an
//! element up through its ancestors and the nearest declaration wins.

use crate::constants::{XMLNS_NS, XML_NS};
use crate::error::{Result, SoapError};
use crate::name::{is_ncname, QName};
use crate::tree::{NodeId, SoapDocument};
use std::collections::HashSet;

impl SoapDocument {
    /// URI bound to `prefix` in the scope of `id` ("" asks for the default
    /// namespace). `None` when the prefix is not declared.
    pub fn namespace_uri(&self, id: NodeId, prefix: &str) -> Result<Option<&str>> {
        self.element(id)?;
        let mut current = Some(id);
        while let Some(node) = current {
            let data = self.element(node)?;
            if let Some(uri) = data.namespaces.get(prefix) {
                return Ok((!uri.is_empty()).then_some(uri.as_str()));
            }
            current = self.node(node)?.parent;
        }
        Ok((prefix == "xml").then_some(XML_NS))
    }

    /// Prefixes declared directly on `id`, in declaration order.
    pub fn namespace_prefixes(&self, id: NodeId) -> Result<Vec<String>> {
        Ok(self.element(id)?.namespaces.keys().cloned().collect())
    }

    /// Every prefix in scope at `id`, nearest declarations first.
    pub fn visible_namespace_prefixes(&self, id: NodeId) -> Result<Vec<String>> {
        self.element(id)?;
        let mut seen = HashSet::new();
        let mut visible = Vec::new();
        let mut current = Some(id);
        while let Some(node) = current {
            for (prefix, uri) in &self.element(node)?.namespaces {
                if seen.insert(prefix.as_str()) && !uri.is_empty() {
                    visible.push(prefix.clone());
                }
            }
            current = self.node(node)?.parent;
        }
        Ok(visible)
    }

    /// Build a name whose namespace is whatever `prefix` is bound to at `id`.
    pub fn create_qname(&self, id: NodeId, local_name: &str, prefix: &str) -> Result<QName> {
        if !is_ncname(local_name) {
            return Err(SoapError::InvalidArgument(format!(
                "'{}' is not a valid local name",
                local_name
            )));
        }
        let uri = match self.namespace_uri(id, prefix)? {
            Some(uri) => uri,
            None if prefix.is_empty() => "",
            None => return Err(SoapError::UnresolvedPrefix(prefix.to_string())),
        };
        Ok(QName::new(uri, local_name, prefix))
    }

    /// Nearest non-empty prefix bound to `uri` at `id`, skipping shadowed ones.
    pub fn lookup_prefix(&self, id: NodeId, uri: &str) -> Result<Option<String>> {
        if uri == XML_NS {
            return Ok(Some("xml".to_string()));
        }
        for prefix in self.visible_namespace_prefixes(id)? {
            if !prefix.is_empty() && self.namespace_uri(id, &prefix)? == Some(uri) {
                return Ok(Some(prefix));
            }
        }
        Ok(None)
    }

    /// Declare `prefix` → `uri` on `id`. An empty prefix sets the default
    /// namespace; an empty default URI un-declares it.
    pub fn add_namespace_declaration(&mut self, id: NodeId, prefix: &str, uri: &str) -> Result<NodeId> {
        validate_binding(prefix, uri)?;
        let data = self.element(id)?;
        let clashes_with_name =
            data.name.prefix() == prefix && data.name.namespace_uri() != uri;
        let clashes_with_attr = !prefix.is_empty()
            && data
                .attributes
                .values()
                .any(|a| a.name.prefix() == prefix && a.name.namespace_uri() != uri);
        if clashes_with_name || clashes_with_attr {
            return Err(SoapError::InvalidArgument(format!(
                "prefix '{}' is already used on this element for another namespace",
                prefix
            )));
        }
        self.element_mut(id)?
            .namespaces
            .insert(prefix.to_string(), uri.to_string());
        Ok(id)
    }

    /// Remove the declaration of `prefix` on `id`; false if there was none.
    pub fn remove_namespace_declaration(&mut self, id: NodeId, prefix: &str) -> Result<bool> {
        Ok(self.element_mut(id)?.namespaces.shift_remove(prefix).is_some())
    }

    /// Prefix for the envelope namespace at `id`: an in-scope one, else the
    /// configured prefix, numbered when that is bound to something else.
    pub(crate) fn envelope_prefix_at(&self, id: NodeId) -> Result<String> {
        let ns = self.envelope_ns()?;
        if let Some(prefix) = self.lookup_prefix(id, ns)? {
            return Ok(prefix);
        }
        let mut candidate = self.envelope_prefix.clone();
        let mut n = 0;
        while self.namespace_uri(id, &candidate)?.is_some() {
            n += 1;
            candidate = format!("{}{}", self.envelope_prefix, n);
        }
        Ok(candidate)
    }

    /// Declare `prefix` → `uri` on `id` unless that binding is already in scope.
    pub(crate) fn ensure_namespace(&mut self, id: NodeId, prefix: &str, uri: &str) -> Result<()> {
        if prefix == "xml" || self.namespace_uri(id, prefix)? == Some(uri) {
            return Ok(());
        }
        if prefix.is_empty() && uri.is_empty() && self.namespace_uri(id, "")?.is_none() {
            return Ok(());
        }
        self.element_mut(id)?
            .namespaces
            .insert(prefix.to_string(), uri.to_string());
        Ok(())
    }
}

/// Validate a prefix/URI pair before it enters the tree.
pub(crate) fn validate_binding(prefix: &str, uri: &str) -> Result<()> {
    if prefix == "xmlns" || uri == XMLNS_NS {
        return Err(SoapError::InvalidArgument(
            "the xmlns prefix and namespace cannot be declared".to_string(),
        ));
    }
    if (prefix == "xml") != (uri == XML_NS) {
        return Err(SoapError::InvalidArgument(
            "the xml prefix is bound to its own namespace only".to_string(),
        ));
    }
    if !prefix.is_empty() && !is_ncname(prefix) {
        return Err(SoapError::InvalidArgument(format!(
            "'{}' is not a valid prefix",
            prefix
        )));
    }
    if !prefix.is_empty() && uri.is_empty() {
        return Err(SoapError::InvalidArgument(format!(
            "prefix '{}' cannot be bound to an empty namespace",
            prefix
        )));
    }
    Ok(())
}
