//! Shared shape of stanza and stream errors: language-tagged descriptive
//! texts plus application-specific extension elements.

use std::collections::BTreeMap;

use crate::extension::{ExtensionElement, SharedExtension};
use crate::xml::XmlStringBuilder;

/// Language tried first by [`ErrorDetails::descriptive_text`].
pub const DEFAULT_LANGUAGE: &str = "en";

/// Descriptive texts and extensions common to every error element.
///
/// Texts are keyed by `xml:lang`; the empty key holds the text sent without a
/// language. The map is never absent, only empty.
#[derive(Debug, Clone, Default)]
pub struct ErrorDetails {
    texts: BTreeMap<String, String>,
    text_namespace: Option<String>,
    extensions: Vec<SharedExtension>,
}

impl ErrorDetails {
    pub fn new(text_namespace: &str) -> Self {
        Self {
            text_namespace: Some(text_namespace.to_string()),
            ..Self::default()
        }
    }

    /// Text in exactly `language`.
    pub fn descriptive_text_in(&self, language: &str) -> Option<&str> {
        self.texts.get(language).map(String::as_str)
    }

    /// Text in the default language, else the language-less text.
    pub fn descriptive_text(&self) -> Option<&str> {
        self.descriptive_text_in(DEFAULT_LANGUAGE)
            .or_else(|| self.descriptive_text_in(""))
    }

    pub fn descriptive_texts(&self) -> &BTreeMap<String, String> {
        &self.texts
    }

    pub fn text_namespace(&self) -> Option<&str> {
        self.text_namespace.as_deref()
    }

    pub fn extensions(&self) -> &[SharedExtension] {
        &self.extensions
    }

    /// First extension with the given element name and namespace.
    pub fn extension(&self, name: &str, namespace: &str) -> Option<&SharedExtension> {
        self.extensions
            .iter()
            .find(|e| e.element_name() == name && e.namespace() == namespace)
    }

    pub(crate) fn set_text(&mut self, language: Option<&str>, text: impl Into<String>) {
        self.texts
            .insert(language.unwrap_or_default().to_string(), text.into());
    }

    pub(crate) fn set_texts(&mut self, texts: BTreeMap<String, String>) {
        self.texts = texts;
    }

    pub(crate) fn set_text_namespace(&mut self, namespace: Option<String>) {
        self.text_namespace = namespace;
    }

    pub(crate) fn add_extension(&mut self, extension: SharedExtension) {
        self.extensions.push(extension);
    }

    pub(crate) fn set_extensions(&mut self, extensions: Vec<SharedExtension>) {
        self.extensions = extensions;
    }

    /// Append `<text/>` children and extensions inside an open error element.
    pub(crate) fn write_texts_and_extensions(&self, xml: &mut XmlStringBuilder) {
        let env = xml.environment().clone();
        for (lang, text) in &self.texts {
            xml.half_open_element("text");
            if let Some(ref ns) = self.text_namespace {
                xml.xmlns_attribute(ns);
            }
            if !lang.is_empty() {
                xml.attribute("xml:lang", lang);
            }
            xml.right_angle_bracket().escape(text).close_element("text");
        }
        for extension in &self.extensions {
            xml.append(&extension.to_xml(&env));
        }
    }
}
