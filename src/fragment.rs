//! Detached element subtrees.
//!
//! A [`Fragment`] is an element built outside any document. Adding one to a
//! document copies it in, after the whole fragment has been validated, so it
//! is either inserted completely or not at all.

use crate::constants::is_reserved_name;
use crate::element::{validate_name, validate_text};
use crate::error::{Result, SoapError};
use crate::name::QName;
use crate::namespace::validate_binding;
use crate::tree::{ElementData, NodeId, NodeKind, Payload, SoapDocument};

/// Owned element subtree, not attached to any document.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    name: QName,
    attributes: Vec<(QName, String)>,
    namespaces: Vec<(String, String)>,
    children: Vec<FragmentNode>,
}

/// Child of a [`Fragment`].
#[derive(Debug, Clone, PartialEq)]
pub enum FragmentNode {
    Element(Fragment),
    Text(String),
}

impl Fragment {
    pub fn new(name: QName) -> Self {
        Self {
            name,
            attributes: Vec::new(),
            namespaces: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Add or replace an attribute.
    pub fn with_attribute(mut self, name: QName, value: impl Into<String>) -> Self {
        let value = value.into();
        match self.attributes.iter_mut().find(|(n, _)| *n == name) {
            Some(existing) => *existing = (name, value),
            None => self.attributes.push((name, value)),
        }
        self
    }

    pub fn with_namespace(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        self.namespaces.push((prefix.into(), uri.into()));
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(FragmentNode::Text(text.into()));
        self
    }

    pub fn with_child(mut self, child: Fragment) -> Self {
        self.children.push(FragmentNode::Element(child));
        self
    }

    pub fn name(&self) -> &QName {
        &self.name
    }

    pub fn attributes(&self) -> &[(QName, String)] {
        &self.attributes
    }

    pub fn attribute(&self, name: &QName) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn namespaces(&self) -> &[(String, String)] {
        &self.namespaces
    }

    pub fn children(&self) -> &[FragmentNode] {
        &self.children
    }

    /// Concatenated text of the fragment.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for child in &self.children {
            match child {
                FragmentNode::Text(text) => out.push_str(text),
                FragmentNode::Element(el) => el.collect_text(out),
            }
        }
    }

    /// Check the whole fragment before it touches a document.
    pub(crate) fn validate(&self) -> Result<()> {
        if is_reserved_name(&self.name) {
            return Err(SoapError::ReservedName(self.name.to_string()));
        }
        validate_name(&self.name)?;
        for (prefix, uri) in &self.namespaces {
            validate_binding(prefix, uri)?;
        }
        for (name, value) in &self.attributes {
            validate_name(name)?;
            if !name.namespace_uri().is_empty() && name.prefix().is_empty() {
                return Err(SoapError::InvalidArgument(format!(
                    "namespaced attribute {} needs a prefix",
                    name
                )));
            }
            validate_text(value)?;
        }
        for child in &self.children {
            match child {
                FragmentNode::Element(el) => el.validate()?,
                FragmentNode::Text(text) => validate_text(text)?,
            }
        }
        Ok(())
    }
}

impl SoapDocument {
    /// Copy the subtree rooted at `id` out of the document.
    pub fn export_fragment(&self, id: NodeId) -> Result<Fragment> {
        let data = self.element(id)?;
        let mut fragment = Fragment::new(data.name.clone());
        fragment.namespaces = data
            .namespaces
            .iter()
            .map(|(p, u)| (p.clone(), u.clone()))
            .collect();
        fragment.attributes = data
            .attributes
            .values()
            .map(|a| (a.name.clone(), a.value.clone()))
            .collect();
        for child in &data.children {
            match &self.node(*child)?.payload {
                Payload::Text(text) => fragment.children.push(FragmentNode::Text(text.clone())),
                Payload::Element(_) => fragment
                    .children
                    .push(FragmentNode::Element(self.export_fragment(*child)?)),
            }
        }
        Ok(fragment)
    }

    /// Copy an already validated fragment under `parent` as a `kind` node.
    pub(crate) fn import_fragment(
        &mut self,
        parent: NodeId,
        kind: NodeKind,
        fragment: &Fragment,
    ) -> Result<NodeId> {
        let mut data = ElementData::new(fragment.name.clone());
        for (prefix, uri) in &fragment.namespaces {
            data.namespaces.insert(prefix.clone(), uri.clone());
        }
        for (name, value) in &fragment.attributes {
            data.attributes.insert(
                name.clone(),
                crate::tree::Attribute {
                    name: name.clone(),
                    value: value.clone(),
                },
            );
        }
        let id = self.append_element(Some(parent), kind, data)?;
        self.ensure_namespace(id, fragment.name.prefix(), fragment.name.namespace_uri())?;
        for (name, _) in &fragment.attributes {
            if !name.namespace_uri().is_empty() {
                self.ensure_namespace(id, name.prefix(), name.namespace_uri())?;
            }
        }
        for child in &fragment.children {
            match child {
                FragmentNode::Text(text) => {
                    self.append_text(id, text.clone())?;
                }
                FragmentNode::Element(el) => {
                    self.import_fragment(id, NodeKind::Element, el)?;
                }
            }
        }
        Ok(id)
    }
}
