//! Qualified names.
//!
//! [`QName`] is the canonical (namespace URI, local name, prefix) triple.
//! [`Name`] is the legacy name object; both address the same underlying
//! element and attribute names, and convert into each other without loss.

use std::fmt;
use std::hash::{Hash, Hasher};

/// Qualified XML name.
///
/// Two names are equal when their namespace URI and local name are equal;
/// the prefix only records how the name is written.
#[derive(Debug, Clone, Eq)]
pub struct QName {
    namespace_uri: String,
    local_name: String,
    prefix: String,
}

impl QName {
    /// Create a name from namespace URI, local name and prefix.
    pub fn new(
        namespace_uri: impl Into<String>,
        local_name: impl Into<String>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            namespace_uri: namespace_uri.into(),
            local_name: local_name.into(),
            prefix: prefix.into(),
        }
    }

    /// Name in no namespace.
    pub fn local(local_name: impl Into<String>) -> Self {
        Self::new("", local_name, "")
    }

    /// Namespaced name without a prefix.
    pub fn with_namespace(namespace_uri: impl Into<String>, local_name: impl Into<String>) -> Self {
        Self::new(namespace_uri, local_name, "")
    }

    pub fn namespace_uri(&self) -> &str {
        &self.namespace_uri
    }

    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// `prefix:local`, or just `local` without a prefix.
    pub fn qualified_name(&self) -> String {
        if self.prefix.is_empty() {
            self.local_name.clone()
        } else {
            format!("{}:{}", self.prefix, self.local_name)
        }
    }

    /// Same name written with another prefix.
    pub fn with_prefix(&self, prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..self.clone()
        }
    }

    pub(crate) fn set_namespace_uri(&mut self, uri: impl Into<String>) {
        self.namespace_uri = uri.into();
    }
}

impl PartialEq for QName {
    fn eq(&self, other: &Self) -> bool {
        self.namespace_uri == other.namespace_uri && self.local_name == other.local_name
    }
}

impl Hash for QName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.namespace_uri.hash(state);
        self.local_name.hash(state);
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace_uri.is_empty() {
            f.write_str(&self.local_name)
        } else {
            write!(f, "{{{}}}{}", self.namespace_uri, self.local_name)
        }
    }
}

/// Legacy name object: local name, prefix and URI.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Name {
    inner: QName,
}

impl Name {
    /// Create a name from local name, prefix and URI.
    pub fn new(local_name: impl Into<String>, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            inner: QName::new(uri, local_name, prefix),
        }
    }

    /// Unqualified name.
    pub fn local(local_name: impl Into<String>) -> Self {
        Self {
            inner: QName::local(local_name),
        }
    }

    pub fn local_name(&self) -> &str {
        self.inner.local_name()
    }

    pub fn prefix(&self) -> &str {
        self.inner.prefix()
    }

    pub fn uri(&self) -> &str {
        self.inner.namespace_uri()
    }

    /// `prefix:local`, or just `local` without a prefix.
    pub fn qualified_name(&self) -> String {
        self.inner.qualified_name()
    }

    pub fn as_qname(&self) -> &QName {
        &self.inner
    }
}

impl From<QName> for Name {
    fn from(inner: QName) -> Self {
        Self { inner }
    }
}

impl From<Name> for QName {
    fn from(name: Name) -> Self {
        name.inner
    }
}

impl From<&Name> for QName {
    fn from(name: &Name) -> Self {
        name.inner.clone()
    }
}

/// Split `prefix:local` into its parts; no colon means an empty prefix.
pub(crate) fn split_qualified(raw: &str) -> (&str, &str) {
    match raw.split_once(':') {
        Some((prefix, local)) => (prefix, local),
        None => ("", raw),
    }
}

/// Check an XML NCName closely enough to keep malformed names out of the tree.
pub(crate) fn is_ncname(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | '\u{B7}'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_equality_ignores_prefix() {
        let a = QName::new("urn:x", "Foo", "x");
        let b = QName::new("urn:x", "Foo", "other");
        let c = QName::new("urn:y", "Foo", "x");
        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<QName> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_name_and_qname_convert() {
        let name = Name::new("Trans", "t", "urn:trans");
        assert_eq!(name.qualified_name(), "t:Trans");
        assert_eq!(name.uri(), "urn:trans");

        let qname: QName = (&name).into();
        assert_eq!(qname.prefix(), "t");
        assert_eq!(Name::from(qname), name);
    }

    #[test]
    fn test_display_uses_clark_notation() {
        assert_eq!(QName::new("urn:x", "Foo", "x").to_string(), "{urn:x}Foo");
        assert_eq!(QName::local("Bar").to_string(), "Bar");
    }

    #[test]
    fn test_split_and_ncname() {
        assert_eq!(split_qualified("env:Sender"), ("env", "Sender"));
        assert_eq!(split_qualified("Client"), ("", "Client"));
        assert!(is_ncname("GetPrice"));
        assert!(is_ncname("_x-1.2"));
        assert!(!is_ncname("1abc"));
        assert!(!is_ncname("a:b"));
        assert!(!is_ncname(""));
    }
}
