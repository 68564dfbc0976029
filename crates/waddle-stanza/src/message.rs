//! `<message/>` stanzas.
//!
//! Subjects and bodies are ordinary extension elements stored under
//! `(subject|body, namespace)`. A message carries at most one subject and one
//! body per language. An element without `xml:lang` is in the message's own
//! language, and without either it counts as a language of its own.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::builder::{BuilderEnvelope, IdSeed, StanzaBuilder};
use crate::chat_state::ChatState;
use crate::error::XmppError;
use crate::extension::ExtensionElement;
use crate::ns;
use crate::stanza::{StanzaCommon, StanzaView};
use crate::xml::{XmlEnvironment, XmlStringBuilder};

/// Message types (RFC 6121 Section 5.2.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MessageType {
    #[default]
    Normal,
    Chat,
    Groupchat,
    Headline,
    Error,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Chat => "chat",
            Self::Groupchat => "groupchat",
            Self::Headline => "headline",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = XmppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(Self::Normal),
            "chat" => Ok(Self::Chat),
            "groupchat" => Ok(Self::Groupchat),
            "headline" => Ok(Self::Headline),
            "error" => Ok(Self::Error),
            _ => Err(XmppError::unknown_type("message", s)),
        }
    }
}

/// Treat `Some("")` like `None`.
fn normalize_language(language: Option<&str>) -> Option<String> {
    language.filter(|l| !l.is_empty()).map(str::to_string)
}

/// The effective language of an element: its own, else the message's.
fn resolve_language<'a>(language: Option<&'a str>, message_language: Option<&'a str>) -> Option<&'a str> {
    language
        .filter(|l| !l.is_empty())
        .or_else(|| message_language.filter(|l| !l.is_empty()))
}

/// A `<subject/>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    language: Option<String>,
    text: String,
}

impl Subject {
    pub fn new(language: Option<&str>, text: impl Into<String>) -> Self {
        Self {
            language: normalize_language(language),
            text: text.into(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

impl ExtensionElement for Subject {
    fn element_name(&self) -> &str {
        "subject"
    }

    fn namespace(&self) -> &str {
        ns::JABBER_CLIENT
    }

    fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    fn to_xml(&self, enclosing: &XmlEnvironment) -> XmlStringBuilder {
        let mut xml =
            XmlStringBuilder::open("subject", ns::JABBER_CLIENT, self.language(), enclosing);
        xml.right_angle_bracket().escape(&self.text).close();
        xml
    }
}

/// A `<body/>`, in `jabber:client` unless relayed with another namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Body {
    language: Option<String>,
    text: String,
    namespace: String,
}

impl Body {
    pub fn new(language: Option<&str>, text: impl Into<String>) -> Self {
        Self::with_namespace(language, text, ns::JABBER_CLIENT)
    }

    pub fn with_namespace(language: Option<&str>, text: impl Into<String>, namespace: &str) -> Self {
        Self {
            language: normalize_language(language),
            text: text.into(),
            namespace: namespace.to_string(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

impl ExtensionElement for Body {
    fn element_name(&self) -> &str {
        "body"
    }

    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    fn to_xml(&self, enclosing: &XmlEnvironment) -> XmlStringBuilder {
        let mut xml = XmlStringBuilder::open("body", &self.namespace, self.language(), enclosing);
        xml.right_angle_bracket().escape(&self.text).close();
        xml
    }
}

/// A `<thread/>`, optionally naming its parent thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thread {
    thread: String,
    parent: Option<String>,
}

impl Thread {
    pub fn new(thread: impl Into<String>) -> Self {
        Self {
            thread: thread.into(),
            parent: None,
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn thread(&self) -> &str {
        &self.thread
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }
}

impl ExtensionElement for Thread {
    fn element_name(&self) -> &str {
        "thread"
    }

    fn namespace(&self) -> &str {
        ns::JABBER_CLIENT
    }

    fn to_xml(&self, enclosing: &XmlEnvironment) -> XmlStringBuilder {
        let mut xml = XmlStringBuilder::open("thread", ns::JABBER_CLIENT, None, enclosing);
        xml.opt_attribute("parent", self.parent.as_deref());
        xml.right_angle_bracket().escape(&self.thread).close();
        xml
    }
}

/// An immutable `<message/>`.
#[derive(Debug, Clone)]
pub struct Message {
    common: StanzaCommon,
    message_type: MessageType,
}

impl Message {
    pub fn builder(id: impl Into<IdSeed>) -> MessageBuilder {
        MessageBuilder {
            envelope: BuilderEnvelope::new(id.into()),
            message_type: MessageType::Normal,
        }
    }

    /// A builder holding every field of `self`, with a new id seed.
    pub fn to_builder(&self, id: impl Into<IdSeed>) -> MessageBuilder {
        MessageBuilder {
            envelope: BuilderEnvelope::from_common(&self.common, id.into()),
            message_type: self.message_type,
        }
    }

    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    /// Resolve a lookup language: no language means the message's own.
    fn lookup_language<'a>(&'a self, language: Option<&'a str>) -> Option<&'a str> {
        match language.filter(|l| !l.is_empty()) {
            Some(lang) => Some(lang),
            None => self.language(),
        }
    }

    /// Whether an element with `element_language` answers a lookup for
    /// `wanted`. A language-less element also stands for the message's own
    /// language.
    fn language_matches(&self, wanted: Option<&str>, element_language: Option<&str>) -> bool {
        wanted == element_language
            || (wanted.is_some() && wanted == self.language() && element_language.is_none())
    }

    /// The body in the message's own language.
    pub fn body(&self) -> Option<&str> {
        self.body_in(None)
    }

    /// The body for `language`; `None` means the message's language.
    pub fn body_in(&self, language: Option<&str>) -> Option<&str> {
        let wanted = self.lookup_language(language);
        self.bodies()
            .into_iter()
            .find(|b| self.language_matches(wanted, b.language()))
            .map(Body::text)
    }

    pub fn bodies(&self) -> Vec<&Body> {
        self.extensions_of::<Body>()
    }

    /// Languages of the bodies other than the default one.
    pub fn body_languages(&self) -> Vec<Option<&str>> {
        let wanted = self.lookup_language(None);
        let bodies = self.bodies();
        let default = bodies
            .iter()
            .position(|b| self.language_matches(wanted, b.language()));
        bodies
            .into_iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != default)
            .map(|(_, b)| b.language())
            .collect()
    }

    pub fn subject(&self) -> Option<&str> {
        self.subject_in(None)
    }

    pub fn subject_in(&self, language: Option<&str>) -> Option<&str> {
        let wanted = self.lookup_language(language);
        self.subjects()
            .into_iter()
            .find(|s| self.language_matches(wanted, s.language()))
            .map(Subject::text)
    }

    pub fn subjects(&self) -> Vec<&Subject> {
        self.extensions_of::<Subject>()
    }

    pub fn thread(&self) -> Option<&Thread> {
        self.extension_of::<Thread>()
    }

    /// The XEP-0085 chat state, if the message carries one.
    pub fn chat_state(&self) -> Option<ChatState> {
        self.extension_of::<ChatState>().copied()
    }

    pub fn to_xml(&self, enclosing: &XmlEnvironment) -> XmlStringBuilder {
        let mut xml =
            XmlStringBuilder::open("message", ns::JABBER_CLIENT, self.language(), enclosing);
        self.common.write_attributes(&mut xml);
        if self.message_type != MessageType::Normal {
            xml.attribute("type", self.message_type.as_str());
        }
        if self.common.extensions.is_empty() && self.common.error.is_none() {
            xml.close_empty_element();
            return xml;
        }
        xml.right_angle_bracket();
        self.common.write_extensions_and_error(&mut xml);
        xml.close();
        xml
    }
}

impl StanzaView for Message {
    fn common(&self) -> &StanzaCommon {
        &self.common
    }
}

/// Accumulates a [`Message`].
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    envelope: BuilderEnvelope,
    message_type: MessageType,
}

impl MessageBuilder {
    pub fn of_type(mut self, message_type: MessageType) -> Self {
        self.message_type = message_type;
        self
    }

    /// Add a body; fails if one already exists for the same language.
    pub fn add_body(self, language: Option<&str>, text: impl Into<String>) -> Result<Self, XmppError> {
        self.add_body_element(Body::new(language, text))
    }

    /// Add a prepared body (e.g. one in `jabber:server`), with the same
    /// per-language check as [`add_body`](Self::add_body).
    pub fn add_body_element(mut self, body: Body) -> Result<Self, XmppError> {
        self.check_unique::<Body>("body", body.language())?;
        self.envelope.extensions_mut().put(Arc::new(body));
        Ok(self)
    }

    /// Set the language-less body, replacing an existing one.
    pub fn set_body(self, text: impl Into<String>) -> Self {
        let mut builder = self.remove_body(None);
        builder
            .envelope
            .extensions_mut()
            .put(Arc::new(Body::new(None, text)));
        builder
    }

    /// Remove the body for `language`.
    pub fn remove_body(mut self, language: Option<&str>) -> Self {
        let message_language = self.envelope.language().map(str::to_string);
        let target = resolve_language(language, message_language.as_deref()).map(str::to_string);
        self.envelope.extensions_mut().retain(|e| {
            e.downcast_ref::<Body>().map_or(true, |b| {
                resolve_language(b.language(), message_language.as_deref()) != target.as_deref()
            })
        });
        self
    }

    /// Add a subject; fails if one already exists for the same language.
    pub fn add_subject(self, language: Option<&str>, text: impl Into<String>) -> Result<Self, XmppError> {
        self.add_subject_element(Subject::new(language, text))
    }

    pub fn add_subject_element(mut self, subject: Subject) -> Result<Self, XmppError> {
        self.check_unique::<Subject>("subject", subject.language())?;
        self.envelope.extensions_mut().put(Arc::new(subject));
        Ok(self)
    }

    /// Set the language-less subject, replacing an existing one.
    pub fn set_subject(self, text: impl Into<String>) -> Self {
        let mut builder = self.remove_subject(None);
        builder
            .envelope
            .extensions_mut()
            .put(Arc::new(Subject::new(None, text)));
        builder
    }

    pub fn remove_subject(mut self, language: Option<&str>) -> Self {
        let message_language = self.envelope.language().map(str::to_string);
        let target = resolve_language(language, message_language.as_deref()).map(str::to_string);
        self.envelope.extensions_mut().retain(|e| {
            e.downcast_ref::<Subject>().map_or(true, |s| {
                resolve_language(s.language(), message_language.as_deref()) != target.as_deref()
            })
        });
        self
    }

    pub fn set_thread(self, thread: Thread) -> Self {
        self.override_extension(thread)
    }

    fn check_unique<T: ExtensionElement>(
        &self,
        element: &'static str,
        language: Option<&str>,
    ) -> Result<(), XmppError> {
        let message_language = self.envelope.language();
        let wanted = resolve_language(language, message_language);
        let duplicate = self
            .envelope
            .extensions()
            .get_all_of::<T>()
            .into_iter()
            .any(|existing| resolve_language(existing.language(), message_language) == wanted);
        if duplicate {
            return Err(XmppError::DuplicateLanguage {
                element,
                language: wanted.map(str::to_string),
            });
        }
        Ok(())
    }

    /// Elements added through the generic extension setters, or a language
    /// set after them, bypass [`check_unique`](Self::check_unique).
    fn check_languages<T: ExtensionElement>(&self, element: &'static str) -> Result<(), XmppError> {
        let message_language = self.envelope.language();
        let mut seen = HashSet::new();
        for existing in self.envelope.extensions().get_all_of::<T>() {
            let language = resolve_language(existing.language(), message_language);
            if !seen.insert(language) {
                return Err(XmppError::DuplicateLanguage {
                    element,
                    language: language.map(str::to_string),
                });
            }
        }
        Ok(())
    }
}

impl StanzaBuilder for MessageBuilder {
    type Stanza = Message;

    fn envelope(&self) -> &BuilderEnvelope {
        &self.envelope
    }

    fn envelope_mut(&mut self) -> &mut BuilderEnvelope {
        &mut self.envelope
    }

    fn build(self) -> Result<Message, XmppError> {
        self.check_languages::<Subject>("subject")?;
        self.check_languages::<Body>("body")?;
        Ok(Message {
            common: self.envelope.into_common()?,
            message_type: self.message_type,
        })
    }
}
