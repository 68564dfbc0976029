//! XML serialization contract.
//!
//! Every stanza and extension element renders itself through an
//! [`XmlStringBuilder`], given the [`XmlEnvironment`] of its parent. The
//! environment is a cons-list of namespace/`xml:lang` overrides; a child only
//! emits `xmlns` (or `xml:lang`) when it differs from the effective value it
//! inherits, which keeps nested output free of redundant declarations.

use std::fmt;
use std::sync::Arc;

/// Namespace and language scope in effect at some point of the document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlEnvironment {
    namespace: Option<String>,
    language: Option<String>,
    next: Option<Arc<XmlEnvironment>>,
}

impl XmlEnvironment {
    /// The top of a document: nothing is declared yet.
    pub fn empty() -> Self {
        Self::default()
    }

    /// An environment declaring `namespace` and optionally a language.
    pub fn new(namespace: Option<&str>, language: Option<&str>) -> Self {
        Self {
            namespace: namespace.map(str::to_string),
            language: language.map(str::to_string),
            next: None,
        }
    }

    /// Derive the environment of a child element nested inside `self`.
    pub fn child(&self, namespace: Option<&str>, language: Option<&str>) -> Self {
        Self {
            namespace: namespace.map(str::to_string),
            language: language.map(str::to_string),
            next: Some(Arc::new(self.clone())),
        }
    }

    /// The innermost declared namespace, walking outwards.
    pub fn effective_namespace(&self) -> Option<&str> {
        match self.namespace.as_deref() {
            Some(ns) => Some(ns),
            None => self.next.as_deref().and_then(XmlEnvironment::effective_namespace),
        }
    }

    /// The innermost declared `xml:lang`, walking outwards.
    pub fn effective_language(&self) -> Option<&str> {
        match self.language.as_deref() {
            Some(lang) => Some(lang),
            None => self.next.as_deref().and_then(XmlEnvironment::effective_language),
        }
    }
}

/// Incremental XML text writer.
///
/// Attribute values are single-quoted, matching the rest of the Waddle wire
/// output.
#[derive(Debug, Clone, Default)]
pub struct XmlStringBuilder {
    buf: String,
    element: Option<String>,
    env: XmlEnvironment,
}

impl XmlStringBuilder {
    /// An empty fragment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start `<name` for an element in `namespace` nested in `enclosing`.
    ///
    /// `xmlns` is written only when it differs from the enclosing effective
    /// namespace, `xml:lang` only when it differs from the enclosing language.
    /// The builder remembers the element so [`close_element`](Self::close_element)
    /// and [`close_empty_element`](Self::close_empty_element) can finish it.
    pub fn open(
        name: &str,
        namespace: &str,
        language: Option<&str>,
        enclosing: &XmlEnvironment,
    ) -> Self {
        let mut xml = Self {
            buf: String::new(),
            element: Some(name.to_string()),
            env: enclosing.child(Some(namespace), language),
        };
        xml.half_open_element(name);
        if enclosing.effective_namespace() != Some(namespace) {
            xml.xmlns_attribute(namespace);
        }
        if let Some(lang) = language {
            if enclosing.effective_language() != Some(lang) {
                xml.xml_lang_attribute(Some(lang));
            }
        }
        xml
    }

    /// The environment children of the opened element should render in.
    pub fn environment(&self) -> &XmlEnvironment {
        &self.env
    }

    pub fn half_open_element(&mut self, name: &str) -> &mut Self {
        self.buf.push('<');
        self.buf.push_str(name);
        self
    }

    pub fn attribute(&mut self, name: &str, value: impl AsRef<str>) -> &mut Self {
        self.buf.push(' ');
        self.buf.push_str(name);
        self.buf.push_str("='");
        escape_into(&mut self.buf, value.as_ref());
        self.buf.push('\'');
        self
    }

    pub fn opt_attribute<V: AsRef<str>>(&mut self, name: &str, value: Option<V>) -> &mut Self {
        if let Some(value) = value {
            self.attribute(name, value);
        }
        self
    }

    pub fn xmlns_attribute(&mut self, namespace: &str) -> &mut Self {
        self.attribute("xmlns", namespace)
    }

    pub fn xml_lang_attribute(&mut self, language: Option<&str>) -> &mut Self {
        self.opt_attribute("xml:lang", language)
    }

    pub fn right_angle_bracket(&mut self) -> &mut Self {
        self.buf.push('>');
        self
    }

    /// Finish the current start tag as `/>`.
    ///
    /// If that start tag is the one [`open`](Self::open) wrote, the element
    /// counts as closed.
    pub fn close_empty_element(&mut self) -> &mut Self {
        // Attribute values are escaped, so a '>' only appears once some
        // start tag was finished.
        if !self.buf.contains('>') {
            self.element = None;
        }
        self.buf.push_str("/>");
        self
    }

    /// Write `</name>`.
    pub fn close_element(&mut self, name: &str) -> &mut Self {
        self.buf.push_str("</");
        self.buf.push_str(name);
        self.buf.push('>');
        if self.element.as_deref() == Some(name) {
            self.element = None;
        }
        self
    }

    /// Close whatever [`open`](Self::open) started.
    pub fn close(&mut self) -> &mut Self {
        if let Some(name) = self.element.take() {
            self.buf.push_str("</");
            self.buf.push_str(&name);
            self.buf.push('>');
        }
        self
    }

    /// Escaped character data.
    pub fn escape(&mut self, text: &str) -> &mut Self {
        escape_into(&mut self.buf, text);
        self
    }

    /// `<name>text</name>` in the current namespace.
    pub fn element(&mut self, name: &str, text: &str) -> &mut Self {
        self.half_open_element(name).right_angle_bracket();
        self.escape(text);
        self.close_element(name)
    }

    pub fn opt_element(&mut self, name: &str, text: Option<&str>) -> &mut Self {
        if let Some(text) = text {
            self.element(name, text);
        }
        self
    }

    /// Append an already rendered fragment.
    pub fn append(&mut self, other: &XmlStringBuilder) -> &mut Self {
        self.buf.push_str(&other.buf);
        self
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_string(self) -> String {
        self.buf
    }
}

impl fmt::Display for XmlStringBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.buf)
    }
}

fn escape_into(buf: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => buf.push_str("&amp;"),
            '<' => buf.push_str("&lt;"),
            '>' => buf.push_str("&gt;"),
            '\'' => buf.push_str("&apos;"),
            '"' => buf.push_str("&quot;"),
            _ => buf.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xmlns_omitted_when_inherited() {
        let root = XmlEnvironment::new(Some("jabber:client"), None);
        let mut xml = XmlStringBuilder::open("body", "jabber:client", None, &root);
        xml.right_angle_bracket().escape("hi").close();
        assert_eq!(xml.as_str(), "<body>hi</body>");
    }

    #[test]
    fn test_xmlns_written_when_different() {
        let root = XmlEnvironment::new(Some("jabber:client"), None);
        let mut xml = XmlStringBuilder::open("ping", "urn:xmpp:ping", None, &root);
        xml.close_empty_element();
        assert_eq!(xml.as_str(), "<ping xmlns='urn:xmpp:ping'/>");
    }

    #[test]
    fn test_effective_values_walk_outwards() {
        let root = XmlEnvironment::new(Some("jabber:client"), Some("en"));
        let child = root.child(Some("urn:a"), None);
        let grandchild = child.child(None, Some("de"));
        assert_eq!(grandchild.effective_namespace(), Some("urn:a"));
        assert_eq!(grandchild.effective_language(), Some("de"));
        assert_eq!(child.effective_language(), Some("en"));
    }

    #[test]
    fn test_lang_only_written_when_changed() {
        let root = XmlEnvironment::new(Some("jabber:client"), Some("en"));
        let mut same = XmlStringBuilder::open("body", "jabber:client", Some("en"), &root);
        same.close_empty_element();
        assert_eq!(same.as_str(), "<body/>");

        let mut other = XmlStringBuilder::open("body", "jabber:client", Some("de"), &root);
        other.close_empty_element();
        assert_eq!(other.as_str(), "<body xml:lang='de'/>");
    }

    #[test]
    fn test_nested_empty_child_keeps_parent_open() {
        let mut xml = XmlStringBuilder::open("query", "urn:q", None, &XmlEnvironment::empty());
        xml.right_angle_bracket();
        xml.half_open_element("item").attribute("a", "1").close_empty_element();
        xml.close();
        assert_eq!(xml.as_str(), "<query xmlns='urn:q'><item a='1'/></query>");
    }

    #[test]
    fn test_escaping() {
        let mut xml = XmlStringBuilder::new();
        xml.half_open_element("a")
            .attribute("v", "x'<y>&")
            .right_angle_bracket()
            .escape("1 < 2 & \"q\"")
            .close_element("a");
        assert_eq!(
            xml.as_str(),
            "<a v='x&apos;&lt;y&gt;&amp;'>1 &lt; 2 &amp; &quot;q&quot;</a>"
        );
    }
}
