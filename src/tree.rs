//! Node/tree model.
//!
//! A [`SoapDocument`] owns every node in an arena. Callers hold [`NodeId`]
//! handles: a handle carries the generation of its slot, so once a node is
//! removed or replaced by a specialized variant, every old handle to it fails
//! with [`SoapError::StaleNode`] instead of silently pointing at something
//! that is no longer in the visible tree.

use crate::config::SoapModelConfig;
use crate::constants::Protocol;
use crate::error::{Result, SoapError};
use crate::name::{Name, QName};
use indexmap::IndexMap;
use tracing::trace;

/// Handle to a node in a [`SoapDocument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: usize,
    generation: u32,
}

/// Kind of a node. Elements under a Header or Body carry the specialized
/// header/body element kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Envelope,
    Header,
    Body,
    /// Header block: child of Header
    HeaderElement,
    /// Body entry: child of Body
    BodyElement,
    /// `Fault` child of Body
    Fault,
    /// Any other element
    Element,
    Text,
}

impl NodeKind {
    pub fn is_element(&self) -> bool {
        !matches!(self, Self::Text)
    }

    /// Envelope, Header and Body: fixed name, fixed position.
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::Envelope | Self::Header | Self::Body)
    }

    /// Whether non-whitespace text may be placed directly inside.
    pub fn accepts_text(&self) -> bool {
        !self.is_structural() && self.is_element()
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Attribute {
    pub(crate) name: QName,
    pub(crate) value: String,
}

#[derive(Debug, Clone)]
pub(crate) struct ElementData {
    pub(crate) name: QName,
    /// Keyed by (namespace, local name); insertion ordered.
    pub(crate) attributes: IndexMap<QName, Attribute>,
    /// Prefix ("" for the default namespace) to URI, declared on this element.
    pub(crate) namespaces: IndexMap<String, String>,
    pub(crate) children: Vec<NodeId>,
}

impl ElementData {
    pub(crate) fn new(name: QName) -> Self {
        Self {
            name,
            attributes: IndexMap::new(),
            namespaces: IndexMap::new(),
            children: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Payload {
    Element(ElementData),
    Text(String),
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) kind: NodeKind,
    pub(crate) parent: Option<NodeId>,
    pub(crate) payload: Payload,
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// A SOAP document: the envelope tree plus its protocol binding.
#[derive(Debug, Clone)]
pub struct SoapDocument {
    slots: Vec<Slot>,
    free: Vec<usize>,
    pub(crate) root: Option<NodeId>,
    protocol: Protocol,
    pub(crate) envelope_prefix: String,
}

impl SoapDocument {
    /// Create an empty document bound to `protocol`.
    pub fn new(protocol: Protocol) -> Self {
        let mut config = SoapModelConfig::default();
        config.protocol.version = protocol;
        Self::with_config(&config)
    }

    /// Create an empty document from configuration.
    pub fn with_config(config: &SoapModelConfig) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            root: None,
            protocol: config.protocol.version,
            envelope_prefix: config.protocol.envelope_prefix.clone(),
        }
    }

    /// Protocol the document was created with (possibly `Dynamic`).
    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// Concrete protocol in effect right now.
    ///
    /// A dynamic document is bound by the namespace of its envelope; without
    /// one it fails with [`SoapError::ProtocolUnbound`].
    pub fn bound_protocol(&self) -> Result<Protocol> {
        match self.protocol {
            Protocol::Dynamic => {
                let root = self.root.ok_or(SoapError::ProtocolUnbound)?;
                let name = &self.element(root)?.name;
                Protocol::from_envelope_ns(name.namespace_uri()).ok_or(SoapError::ProtocolUnbound)
            }
            fixed => Ok(fixed),
        }
    }

    /// Envelope namespace URI of the bound protocol.
    pub fn envelope_ns(&self) -> Result<&'static str> {
        self.bound_protocol()?
            .envelope_ns()
            .ok_or(SoapError::ProtocolUnbound)
    }

    /// Root node (the envelope), if any.
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Whether `id` still refers to a node of this document.
    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_ok()
    }

    /// Number of live nodes.
    pub fn node_count(&self) -> usize {
        self.slots.iter().filter(|s| s.node.is_some()).count()
    }

    pub fn kind(&self, id: NodeId) -> Result<NodeKind> {
        Ok(self.node(id)?.kind)
    }

    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>> {
        Ok(self.node(id)?.parent)
    }

    /// All children, text included, exactly as stored (no coercion).
    pub fn children(&self, id: NodeId) -> Result<Vec<NodeId>> {
        Ok(self.element(id)?.children.clone())
    }

    /// Value of a text node; `None` for elements.
    pub fn node_value(&self, id: NodeId) -> Result<Option<&str>> {
        match &self.node(id)?.payload {
            Payload::Text(text) => Ok(Some(text)),
            Payload::Element(_) => Ok(None),
        }
    }

    /// Concatenated text of the node and all its descendants.
    pub fn text_content(&self, id: NodeId) -> Result<String> {
        let mut out = String::new();
        self.collect_text(id, &mut out)?;
        Ok(out)
    }

    fn collect_text(&self, id: NodeId, out: &mut String) -> Result<()> {
        match &self.node(id)?.payload {
            Payload::Text(text) => out.push_str(text),
            Payload::Element(data) => {
                for child in &data.children {
                    self.collect_text(*child, out)?;
                }
            }
        }
        Ok(())
    }

    /// Qualified name of an element.
    pub fn element_qname(&self, id: NodeId) -> Result<&QName> {
        Ok(&self.element(id)?.name)
    }

    /// Name of an element as a legacy [`Name`].
    pub fn element_name(&self, id: NodeId) -> Result<Name> {
        Ok(Name::from(self.element(id)?.name.clone()))
    }

    /// Detach `id` from its parent and drop its whole subtree.
    ///
    /// Handles to the node and to any of its descendants become stale.
    pub fn remove_node(&mut self, id: NodeId) -> Result<()> {
        let parent = self.node(id)?.parent;
        match parent {
            Some(parent) => self.element_mut(parent)?.children.retain(|c| *c != id),
            None => {
                if self.root == Some(id) {
                    self.root = None;
                }
            }
        }
        self.free_subtree(id);
        Ok(())
    }

    // --- arena internals ---

    pub(crate) fn node(&self, id: NodeId) -> Result<&Node> {
        self.slots
            .get(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
            .ok_or(SoapError::StaleNode)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.slots
            .get_mut(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
            .ok_or(SoapError::StaleNode)
    }

    pub(crate) fn element(&self, id: NodeId) -> Result<&ElementData> {
        match &self.node(id)?.payload {
            Payload::Element(data) => Ok(data),
            Payload::Text(_) => Err(SoapError::NotAnElement),
        }
    }

    pub(crate) fn element_mut(&mut self, id: NodeId) -> Result<&mut ElementData> {
        match &mut self.node_mut(id)?.payload {
            Payload::Element(data) => Ok(data),
            Payload::Text(_) => Err(SoapError::NotAnElement),
        }
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index];
                slot.node = Some(node);
                NodeId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                NodeId {
                    index: self.slots.len() - 1,
                    generation: 0,
                }
            }
        }
    }

    /// Allocate an element and append it to `parent` (or make it the root).
    pub(crate) fn append_element(
        &mut self,
        parent: Option<NodeId>,
        kind: NodeKind,
        data: ElementData,
    ) -> Result<NodeId> {
        if let Some(parent) = parent {
            self.element(parent)?;
        }
        let id = self.alloc(Node {
            kind,
            parent,
            payload: Payload::Element(data),
        });
        match parent {
            Some(parent) => self.element_mut(parent)?.children.push(id),
            None => self.root = Some(id),
        }
        Ok(id)
    }

    /// Allocate an element and insert it at `index` among `parent`'s children.
    pub(crate) fn insert_element(
        &mut self,
        parent: NodeId,
        index: usize,
        kind: NodeKind,
        data: ElementData,
    ) -> Result<NodeId> {
        let len = self.element(parent)?.children.len();
        let id = self.alloc(Node {
            kind,
            parent: Some(parent),
            payload: Payload::Element(data),
        });
        self.element_mut(parent)?.children.insert(index.min(len), id);
        Ok(id)
    }

    pub(crate) fn append_text(&mut self, parent: NodeId, text: String) -> Result<NodeId> {
        self.element(parent)?;
        let id = self.alloc(Node {
            kind: NodeKind::Text,
            parent: Some(parent),
            payload: Payload::Text(text),
        });
        self.element_mut(parent)?.children.push(id);
        Ok(id)
    }

    /// Free `id` and every descendant, bumping slot generations.
    pub(crate) fn free_subtree(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(slot) = self
                .slots
                .get_mut(current.index)
                .filter(|slot| slot.generation == current.generation)
            else {
                continue;
            };
            let Some(node) = slot.node.take() else {
                continue;
            };
            if let Payload::Element(data) = node.payload {
                stack.extend(data.children);
            }
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(current.index);
        }
    }

    /// Replace the node's kind, handing out a fresh handle.
    ///
    /// Content stays in place; the parent's child list and the children's
    /// parent links are rewritten to the new handle.
    pub(crate) fn retag(&mut self, id: NodeId, kind: NodeKind) -> Result<NodeId> {
        let old_kind = self.node(id)?.kind;
        let slot = &mut self.slots[id.index];
        slot.generation = slot.generation.wrapping_add(1);
        let fresh = NodeId {
            index: id.index,
            generation: slot.generation,
        };
        let node = self.node_mut(fresh)?;
        node.kind = kind;
        let parent = node.parent;
        let children = match &node.payload {
            Payload::Element(data) => data.children.clone(),
            Payload::Text(_) => Vec::new(),
        };

        if let Some(parent) = parent {
            for child in self.element_mut(parent)?.children.iter_mut() {
                if *child == id {
                    *child = fresh;
                }
            }
        } else if self.root == Some(id) {
            self.root = Some(fresh);
        }
        for child in children {
            self.node_mut(child)?.parent = Some(fresh);
        }

        trace!(?old_kind, new_kind = ?kind, "node re-tagged");
        Ok(fresh)
    }

    /// Unlink `id` from its parent without freeing it.
    pub(crate) fn unlink(&mut self, id: NodeId) -> Result<()> {
        if let Some(parent) = self.node(id)?.parent {
            self.element_mut(parent)?.children.retain(|c| *c != id);
        }
        self.node_mut(id)?.parent = None;
        Ok(())
    }

    /// Attach an unlinked node as the last child of `parent`.
    pub(crate) fn link(&mut self, parent: NodeId, id: NodeId) -> Result<()> {
        self.element(parent)?;
        self.node_mut(id)?.parent = Some(parent);
        self.element_mut(parent)?.children.push(id);
        Ok(())
    }

    /// Whether `ancestor` is `id` or one of its ancestors.
    pub(crate) fn is_ancestor_or_self(&self, ancestor: NodeId, id: NodeId) -> Result<bool> {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == ancestor {
                return Ok(true);
            }
            current = self.node(node)?.parent;
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc_with_root() -> (SoapDocument, NodeId) {
        let mut doc = SoapDocument::new(Protocol::Soap11);
        let root = doc
            .append_element(None, NodeKind::Element, ElementData::new(QName::local("root")))
            .unwrap();
        (doc, root)
    }

    #[test]
    fn test_append_and_read() {
        let (mut doc, root) = doc_with_root();
        let child = doc
            .append_element(Some(root), NodeKind::Element, ElementData::new(QName::local("a")))
            .unwrap();
        let text = doc.append_text(child, "hello".to_string()).unwrap();

        assert_eq!(doc.root(), Some(root));
        assert_eq!(doc.children(root).unwrap(), vec![child]);
        assert_eq!(doc.parent(text).unwrap(), Some(child));
        assert_eq!(doc.node_value(text).unwrap(), Some("hello"));
        assert_eq!(doc.text_content(root).unwrap(), "hello");
        assert_eq!(doc.kind(text).unwrap(), NodeKind::Text);
        assert!(matches!(doc.children(text), Err(SoapError::NotAnElement)));
    }

    #[test]
    fn test_remove_cascades_and_stales_handles() {
        let (mut doc, root) = doc_with_root();
        let child = doc
            .append_element(Some(root), NodeKind::Element, ElementData::new(QName::local("a")))
            .unwrap();
        let grandchild = doc.append_text(child, "x".to_string()).unwrap();
        assert_eq!(doc.node_count(), 3);

        doc.remove_node(child).unwrap();
        assert_eq!(doc.node_count(), 1);
        assert!(!doc.contains(child));
        assert!(!doc.contains(grandchild));
        assert!(matches!(doc.kind(child), Err(SoapError::StaleNode)));
        assert!(doc.children(root).unwrap().is_empty());
    }

    #[test]
    fn test_slot_reuse_does_not_revive_old_handle() {
        let (mut doc, root) = doc_with_root();
        let first = doc.append_text(root, "one".to_string()).unwrap();
        doc.remove_node(first).unwrap();
        let second = doc.append_text(root, "two".to_string()).unwrap();

        assert_ne!(first, second);
        assert!(matches!(doc.node_value(first), Err(SoapError::StaleNode)));
        assert_eq!(doc.node_value(second).unwrap(), Some("two"));
    }

    #[test]
    fn test_retag_hands_out_fresh_handle() {
        let (mut doc, root) = doc_with_root();
        let child = doc
            .append_element(Some(root), NodeKind::Element, ElementData::new(QName::local("a")))
            .unwrap();
        let text = doc.append_text(child, "t".to_string()).unwrap();

        let fresh = doc.retag(child, NodeKind::HeaderElement).unwrap();
        assert_ne!(fresh, child);
        assert!(!doc.contains(child));
        assert_eq!(doc.kind(fresh).unwrap(), NodeKind::HeaderElement);
        assert_eq!(doc.children(root).unwrap(), vec![fresh]);
        assert_eq!(doc.parent(text).unwrap(), Some(fresh));
    }

    #[test]
    fn test_dynamic_protocol_unbound_without_envelope() {
        let doc = SoapDocument::new(Protocol::Dynamic);
        assert!(matches!(doc.bound_protocol(), Err(SoapError::ProtocolUnbound)));
        let doc = SoapDocument::new(Protocol::Soap12);
        assert_eq!(doc.bound_protocol().unwrap(), Protocol::Soap12);
    }

    #[test]
    fn test_kind_capabilities() {
        assert!(NodeKind::Header.is_structural());
        assert!(!NodeKind::Fault.is_structural());
        assert!(!NodeKind::Body.accepts_text());
        assert!(NodeKind::BodyElement.accepts_text());
        assert!(!NodeKind::Text.is_element());
    }
}
