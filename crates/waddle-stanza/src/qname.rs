//! Qualified names: the `(namespace, local name)` identity of an XML element.

use std::fmt;

/// The identity of an element type.
///
/// Two elements are of the same kind iff both the namespace and the local
/// name match exactly (case-sensitive). `QName` is the key of the extension
/// store and of the provider registry, so both lookups agree by construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QName {
    namespace: String,
    local_name: String,
}

impl QName {
    /// Create a qualified name.
    pub fn new(namespace: impl Into<String>, local_name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            local_name: local_name.into(),
        }
    }

    /// The namespace URI.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The element's local name.
    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    /// Check whether this name identifies `(local_name, namespace)`.
    pub fn matches(&self, local_name: &str, namespace: &str) -> bool {
        self.local_name == local_name && self.namespace == namespace
    }
}

/// Clark notation: `{namespace}local`.
impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}{}", self.namespace, self.local_name)
    }
}

impl From<(&str, &str)> for QName {
    /// Build from a `(namespace, local name)` pair.
    fn from((namespace, local_name): (&str, &str)) -> Self {
        Self::new(namespace, local_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_is_exact() {
        let a = QName::new("urn:xmpp:ping", "ping");
        assert_eq!(a, QName::new("urn:xmpp:ping", "ping"));
        assert_ne!(a, QName::new("urn:xmpp:ping", "Ping"));
        assert_ne!(a, QName::new("urn:xmpp:PING", "ping"));
    }

    #[test]
    fn test_display_clark_notation() {
        let q = QName::new("jabber:client", "body");
        assert_eq!(q.to_string(), "{jabber:client}body");
    }

    #[test]
    fn test_matches() {
        let q: QName = ("jabber:client", "subject").into();
        assert!(q.matches("subject", "jabber:client"));
        assert!(!q.matches("body", "jabber:client"));
    }
}
