//! Specialized-element coercion.
//!
//! Elements under a Header are header blocks, elements under a Body are body
//! entries (or the Fault). Nodes inserted generically, by the reader or by a
//! move, are re-tagged to the kind their parent mandates the first time they
//! are reached through a typed accessor. Re-tagging bumps the slot
//! generation, so handles obtained before the coercion go stale.

use crate::error::{Result, SoapError};
use crate::name::{Name, QName};
use crate::tree::{NodeId, NodeKind, SoapDocument};
use tracing::debug;

impl SoapDocument {
    /// Kind an element named `name` must have as a child of `parent`.
    pub(crate) fn child_kind(&self, parent: NodeId, name: &QName) -> Result<NodeKind> {
        Ok(match self.kind(parent)? {
            NodeKind::Header => NodeKind::HeaderElement,
            NodeKind::Body if self.is_fault_name(name)? => NodeKind::Fault,
            NodeKind::Body => NodeKind::BodyElement,
            NodeKind::Text => return Err(SoapError::NotAnElement),
            _ => NodeKind::Element,
        })
    }

    /// Re-tag `id` to the kind its position under `parent` mandates.
    ///
    /// Returns `id` unchanged when no coercion is needed, a fresh handle
    /// otherwise. Text and the structural elements are never re-tagged.
    pub(crate) fn coerce_child(&mut self, parent: NodeId, id: NodeId) -> Result<NodeId> {
        let kind = self.kind(id)?;
        if !kind.is_element() || kind.is_structural() {
            return Ok(id);
        }
        let target = self.child_kind(parent, self.element_qname(id)?)?;
        if target == kind {
            return Ok(id);
        }
        debug!(from = ?kind, to = ?target, name = %self.element_qname(id)?, "coercing element");
        self.retag(id, target)
    }

    /// Children of `id` in document order, text included, with every element
    /// coerced to its specialized kind.
    pub fn child_elements(&mut self, id: NodeId) -> Result<Vec<NodeId>> {
        let children = self.children(id)?;
        let mut out = Vec::with_capacity(children.len());
        for child in children {
            out.push(self.coerce_child(id, child)?);
        }
        Ok(out)
    }

    /// Element children of `id` named `name`, coerced.
    pub fn child_elements_named(&mut self, id: NodeId, name: &QName) -> Result<Vec<NodeId>> {
        let mut out = Vec::new();
        for child in self.child_elements(id)? {
            if self.element(child).is_ok_and(|data| data.name == *name) {
                out.push(child);
            }
        }
        Ok(out)
    }

    /// Element children of `id` named by a legacy [`Name`], coerced.
    pub fn child_elements_by_name(&mut self, id: NodeId, name: &Name) -> Result<Vec<NodeId>> {
        self.child_elements_named(id, name.as_qname())
    }

    /// Move `node` (with its subtree) to the end of `new_parent`'s children.
    ///
    /// In-scope namespace bindings the subtree relied on are re-declared on
    /// the moved node when the new context binds them differently. Returns
    /// the node's handle after coercion to its new position.
    pub fn move_child(&mut self, new_parent: NodeId, node: NodeId) -> Result<NodeId> {
        let kind = self.kind(node)?;
        if kind.is_structural() || self.root == Some(node) {
            return Err(SoapError::InvalidStructure(format!(
                "{:?} cannot be moved",
                kind
            )));
        }
        if self.is_ancestor_or_self(node, new_parent)? {
            return Err(SoapError::InvalidStructure(
                "a node cannot be moved into its own subtree".to_string(),
            ));
        }

        let bindings = if kind == NodeKind::Text {
            let parent_kind = self.kind(new_parent)?;
            if !parent_kind.is_element() {
                return Err(SoapError::NotAnElement);
            }
            let is_blank = self.node_value(node)?.is_some_and(|t| t.trim().is_empty());
            if !parent_kind.accepts_text() && !is_blank {
                return Err(SoapError::InvalidStructure(format!(
                    "{:?} cannot contain character data",
                    parent_kind
                )));
            }
            Vec::new()
        } else {
            let name = self.element_qname(node)?.clone();
            self.check_child_allowed(new_parent, &name, Some(node))?;
            self.bindings_to_pin(node, new_parent)?
        };

        if !bindings.is_empty() {
            let data = self.element_mut(node)?;
            for (prefix, uri) in bindings {
                data.namespaces.insert(prefix, uri);
            }
        }
        self.unlink(node)?;
        self.link(new_parent, node)?;
        self.coerce_child(new_parent, node)
    }

    /// Bindings visible at `node` through its ancestors that resolve
    /// differently under `new_parent`.
    fn bindings_to_pin(&self, node: NodeId, new_parent: NodeId) -> Result<Vec<(String, String)>> {
        let local = &self.element(node)?.namespaces;
        let mut prefixes = self.visible_namespace_prefixes(node)?;
        if !prefixes.iter().any(|p| p.is_empty()) {
            prefixes.push(String::new());
        }
        let mut pinned = Vec::new();
        for prefix in prefixes {
            if local.contains_key(&prefix) {
                continue;
            }
            let old = self.namespace_uri(node, &prefix)?;
            if old != self.namespace_uri(new_parent, &prefix)? {
                pinned.push((prefix, old.unwrap_or("").to_string()));
            }
        }
        Ok(pinned)
    }
}
