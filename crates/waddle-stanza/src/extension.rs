//! Extension elements: XML sub-documents attached to stanzas.
//!
//! An extension element is anything that can name itself (`element_name`,
//! `namespace`) and render itself as XML. Once attached to a stanza it is
//! shared behind an `Arc` and never mutated; copying a stanza copies the
//! references, not the elements.
//!
//! Concrete types are recovered with [`downcast_ref`](trait.ExtensionElement.html#method.downcast_ref)
//! on `dyn ExtensionElement`, which is a checked `Any` downcast rather than a
//! cast that can fail at runtime.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use minidom::Element;

use crate::qname::QName;
use crate::xml::{XmlEnvironment, XmlStringBuilder};

/// Access to `Any` for trait objects.
///
/// Blanket-implemented for every `'static` type; implementors of
/// [`ExtensionElement`] never write it by hand.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// An XML element carried by a stanza.
pub trait ExtensionElement: AsAny + fmt::Debug + Send + Sync {
    /// Local name of the root element.
    fn element_name(&self) -> &str;

    /// Namespace of the root element.
    fn namespace(&self) -> &str;

    /// The qualified identity used as the store and provider key.
    fn qname(&self) -> QName {
        QName::new(self.namespace(), self.element_name())
    }

    /// `xml:lang` of the element, for language-qualified elements.
    fn language(&self) -> Option<&str> {
        None
    }

    /// Render the element nested inside `enclosing`.
    fn to_xml(&self, enclosing: &XmlEnvironment) -> XmlStringBuilder;
}

impl dyn ExtensionElement {
    /// Borrow the element as concrete type `T`, if that is what it is.
    pub fn downcast_ref<T: ExtensionElement>(&self) -> Option<&T> {
        AsAny::as_any(self).downcast_ref::<T>()
    }

    /// Whether the element is a `T`.
    pub fn is<T: ExtensionElement>(&self) -> bool {
        AsAny::as_any(self).is::<T>()
    }

    /// Render as a standalone fragment (with its own `xmlns`).
    pub fn to_xml_string(&self) -> String {
        self.to_xml(&XmlEnvironment::empty()).into_string()
    }
}

/// A shared, immutable extension element.
pub type SharedExtension = Arc<dyn ExtensionElement>;

/// Structured catch-all element: attributes, optional text and nested
/// children.
///
/// Used for any element without a dedicated type, including everything the
/// provider registry has no deserializer for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandardExtensionElement {
    name: String,
    namespace: String,
    attributes: BTreeMap<String, String>,
    text: Option<String>,
    children: Vec<StandardExtensionElement>,
}

impl StandardExtensionElement {
    /// Start building an element.
    pub fn builder(name: &str, namespace: &str) -> StandardExtensionElementBuilder {
        StandardExtensionElementBuilder {
            element: Self {
                name: name.to_string(),
                namespace: namespace.to_string(),
                attributes: BTreeMap::new(),
                text: None,
                children: Vec::new(),
            },
        }
    }

    /// An element with no attributes, text or children.
    pub fn empty(name: &str, namespace: &str) -> Self {
        Self::builder(name, namespace).build()
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn elements(&self) -> &[StandardExtensionElement] {
        &self.children
    }

    /// First child with the given local name, in any namespace.
    pub fn first_element(&self, name: &str) -> Option<&StandardExtensionElement> {
        self.children.iter().find(|c| c.name == name)
    }

    /// First child with the given qualified identity.
    pub fn first_element_ns(&self, name: &str, namespace: &str) -> Option<&StandardExtensionElement> {
        self.children
            .iter()
            .find(|c| c.name == name && c.namespace == namespace)
    }

    /// All children with the given local name.
    pub fn elements_named<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a StandardExtensionElement> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Convert a parsed element tree.
    ///
    /// Character data directly under the element is concatenated; an element
    /// with no (or only empty) text gets `None`.
    pub fn from_element(element: &Element) -> Self {
        let mut builder = Self::builder(element.name(), &element.ns());
        for (name, value) in element.attrs() {
            builder = builder.add_attribute(name, value);
        }
        let mut text = String::new();
        for node in element.nodes() {
            if let Some(child) = node.as_element() {
                builder = builder.add_element(Self::from_element(child));
            } else if let Some(t) = node.as_text() {
                text.push_str(t);
            }
        }
        if !text.trim().is_empty() {
            builder = builder.set_text(text);
        }
        builder.build()
    }
}

impl ExtensionElement for StandardExtensionElement {
    fn element_name(&self) -> &str {
        &self.name
    }

    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn to_xml(&self, enclosing: &XmlEnvironment) -> XmlStringBuilder {
        let mut xml = XmlStringBuilder::open(&self.name, &self.namespace, None, enclosing);
        for (name, value) in &self.attributes {
            xml.attribute(name, value);
        }
        if self.text.is_none() && self.children.is_empty() {
            xml.close_empty_element();
            return xml;
        }
        xml.right_angle_bracket();
        if let Some(ref text) = self.text {
            xml.escape(text);
        }
        let env = xml.environment().clone();
        for child in &self.children {
            xml.append(&child.to_xml(&env));
        }
        xml.close();
        xml
    }
}

/// Accumulates a [`StandardExtensionElement`].
#[derive(Debug, Clone)]
pub struct StandardExtensionElementBuilder {
    element: StandardExtensionElement,
}

impl StandardExtensionElementBuilder {
    pub fn add_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.element.attributes.insert(name.into(), value.into());
        self
    }

    pub fn set_text(mut self, text: impl Into<String>) -> Self {
        self.element.text = Some(text.into());
        self
    }

    pub fn add_element(mut self, child: StandardExtensionElement) -> Self {
        self.element.children.push(child);
        self
    }

    /// Add a `<name>text</name>` child in this element's namespace.
    pub fn add_text_element(self, name: &str, text: impl Into<String>) -> Self {
        let namespace = self.element.namespace.clone();
        self.add_element(
            StandardExtensionElement::builder(name, &namespace)
                .set_text(text)
                .build(),
        )
    }

    pub fn build(self) -> StandardExtensionElement {
        self.element
    }
}

/// Flat bag of `<name>value</name>` children under one root element.
///
/// The simplest carrier for custom payloads; values keep insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameValueElement {
    name: String,
    namespace: String,
    values: Vec<(String, String)>,
}

impl NameValueElement {
    pub fn new(name: &str, namespace: &str) -> Self {
        Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
            values: Vec::new(),
        }
    }

    /// Set `name` to `value`, replacing an earlier value of the same name.
    pub fn set_value(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        match self.values.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.values.push((name, value)),
        }
        self
    }

    pub fn value(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(n, _)| n.as_str())
    }

    /// Read back from a parsed element; nested structure below the first
    /// level is flattened to its text.
    pub fn from_element(element: &Element) -> Self {
        let mut bag = Self::new(element.name(), &element.ns());
        for child in element.children() {
            bag = bag.set_value(child.name(), child.text());
        }
        bag
    }
}

impl ExtensionElement for NameValueElement {
    fn element_name(&self) -> &str {
        &self.name
    }

    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn to_xml(&self, enclosing: &XmlEnvironment) -> XmlStringBuilder {
        let mut xml = XmlStringBuilder::open(&self.name, &self.namespace, None, enclosing);
        if self.values.is_empty() {
            xml.close_empty_element();
            return xml;
        }
        xml.right_angle_bracket();
        for (name, value) in &self.values {
            xml.element(name, value);
        }
        xml.close();
        xml
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(xml: &str) -> Element {
        xml.parse().expect("valid XML")
    }

    #[test]
    fn test_standard_element_round_trip() {
        let original = StandardExtensionElement::builder("geoloc", "http://jabber.org/protocol/geoloc")
            .add_attribute("xml-id", "g1")
            .add_text_element("lat", "45.44")
            .add_text_element("lon", "12.33")
            .add_element(
                StandardExtensionElement::builder("uri", "urn:example:nested")
                    .set_text("geo:45.44,12.33")
                    .build(),
            )
            .build();

        let xml = (&original as &dyn ExtensionElement).to_xml_string();
        let parsed = StandardExtensionElement::from_element(&parse(&xml));

        assert_eq!(parsed, original);
    }

    #[test]
    fn test_children_inherit_namespace_in_output() {
        let element = StandardExtensionElement::builder("x", "urn:x")
            .add_text_element("y", "1")
            .build();
        let xml = element.to_xml(&XmlEnvironment::empty()).into_string();
        assert_eq!(xml, "<x xmlns='urn:x'><y>1</y></x>");
    }

    #[test]
    fn test_empty_element_self_closes() {
        let element = StandardExtensionElement::empty("ping", "urn:xmpp:ping");
        assert_eq!(
            element.to_xml(&XmlEnvironment::empty()).into_string(),
            "<ping xmlns='urn:xmpp:ping'/>"
        );
    }

    #[test]
    fn test_downcast() {
        let shared: SharedExtension = Arc::new(StandardExtensionElement::empty("a", "urn:a"));
        assert!(shared.is::<StandardExtensionElement>());
        assert!(shared.downcast_ref::<NameValueElement>().is_none());
        assert_eq!(
            shared
                .downcast_ref::<StandardExtensionElement>()
                .map(|e| e.element_name()),
            Some("a")
        );
    }

    #[test]
    fn test_name_value_round_trip() {
        let bag = NameValueElement::new("props", "urn:example:props")
            .set_value("color", "blue")
            .set_value("size", "L")
            .set_value("color", "red");

        assert_eq!(bag.value("color"), Some("red"));
        assert_eq!(bag.names().collect::<Vec<_>>(), vec!["color", "size"]);

        let xml = bag.to_xml(&XmlEnvironment::empty()).into_string();
        assert_eq!(NameValueElement::from_element(&parse(&xml)), bag);
    }
}
