//! Turning parsed XML into stanzas.
//!
//! - [`ProviderRegistry`] maps the qualified name of an extension element to
//!   the function that deserializes it. Elements without a provider become
//!   [`StandardExtensionElement`]s, so nothing is lost.
//! - [`ProviderRegistry::parse_stanza`] walks a `minidom` tree in document
//!   order, feeds the matching builder and builds the stanza.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use minidom::Element;
use tracing::debug;

use crate::builder::{IdSeed, StanzaBuilder};
use crate::chat_state::ChatState;
use crate::error::XmppError;
use crate::extension::{SharedExtension, StandardExtensionElement};
use crate::iq::{Iq, IqType};
use crate::message::{Body, Message, Subject, Thread};
use crate::ns;
use crate::presence::Presence;
use crate::qname::QName;
use crate::stanza::Stanza;
use crate::stanza_error::StanzaError;

/// Deserializer for one kind of extension element.
pub type ExtensionProvider =
    Arc<dyn Fn(&Element) -> Result<SharedExtension, XmppError> + Send + Sync>;

/// Registered extension element deserializers, keyed by [`QName`].
#[derive(Clone)]
pub struct ProviderRegistry {
    providers: HashMap<QName, ExtensionProvider>,
}

impl ProviderRegistry {
    /// A registry with no providers.
    pub fn empty() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }

    /// Register `provider` for `qname`, replacing an earlier one.
    pub fn register<F>(&mut self, qname: QName, provider: F)
    where
        F: Fn(&Element) -> Result<SharedExtension, XmppError> + Send + Sync + 'static,
    {
        debug!(qname = %qname, "Registering extension provider");
        self.providers.insert(qname, Arc::new(provider));
    }

    /// Remove the provider for `qname`; returns whether there was one.
    pub fn unregister(&mut self, qname: &QName) -> bool {
        self.providers.remove(qname).is_some()
    }

    pub fn has_provider(&self, qname: &QName) -> bool {
        self.providers.contains_key(qname)
    }

    /// Deserialize one extension element.
    pub fn parse_extension(&self, element: &Element) -> Result<SharedExtension, XmppError> {
        let qname = QName::new(element.ns(), element.name());
        match self.providers.get(&qname) {
            Some(provider) => provider(element),
            None => {
                let extension: SharedExtension =
                    Arc::new(StandardExtensionElement::from_element(element));
                Ok(extension)
            }
        }
    }

    /// Deserialize a `<message/>`, `<presence/>` or `<iq/>`.
    pub fn parse_stanza(&self, element: &Element) -> Result<Stanza, XmppError> {
        let stanza_ns = element.ns();
        if stanza_ns != ns::JABBER_CLIENT && stanza_ns != ns::JABBER_SERVER {
            return Err(XmppError::parse(format!(
                "stanza in unexpected namespace '{}'",
                stanza_ns
            )));
        }

        match element.name() {
            "message" => self.parse_message(element, &stanza_ns).map(Stanza::Message),
            "presence" => self.parse_presence(element, &stanza_ns).map(Stanza::Presence),
            "iq" => self.parse_iq(element, &stanza_ns).map(Stanza::Iq),
            other => Err(XmppError::parse(format!("<{}/> is not a stanza", other))),
        }
    }

    fn parse_error(&self, element: &Element) -> Result<StanzaError, XmppError> {
        StanzaError::from_element_with(element, |child| self.parse_extension(child))
    }

    fn parse_message(&self, element: &Element, stanza_ns: &str) -> Result<Message, XmppError> {
        let mut builder = envelope(Message::builder(id_seed(element)), element)?;
        if let Some(message_type) = element.attr("type") {
            builder = builder.of_type(message_type.parse()?);
        }

        for child in element.children() {
            let language = child.attr("xml:lang");
            if child.ns() != stanza_ns {
                builder = builder.add_shared_extension(self.parse_extension(child)?);
                continue;
            }
            builder = match child.name() {
                "subject" => builder.add_subject_element(Subject::new(language, child.text()))?,
                "body" => {
                    builder.add_body_element(Body::with_namespace(language, child.text(), stanza_ns))?
                }
                "thread" => {
                    let mut thread = Thread::new(child.text());
                    if let Some(parent) = child.attr("parent") {
                        thread = thread.with_parent(parent);
                    }
                    builder.set_thread(thread)
                }
                "error" => builder.set_error(self.parse_error(child)?),
                _ => builder.add_shared_extension(self.parse_extension(child)?),
            };
        }
        builder.build()
    }

    fn parse_presence(&self, element: &Element, stanza_ns: &str) -> Result<Presence, XmppError> {
        let mut builder = envelope(Presence::builder(id_seed(element)), element)?;
        if let Some(presence_type) = element.attr("type") {
            builder = builder.of_type(presence_type.parse()?);
        }

        for child in element.children() {
            if child.ns() != stanza_ns {
                builder = builder.add_shared_extension(self.parse_extension(child)?);
                continue;
            }
            builder = match child.name() {
                "status" => builder.set_status(child.text()),
                "priority" => {
                    let text = child.text();
                    let priority = text.trim().parse::<i32>().map_err(|_| {
                        XmppError::parse(format!("invalid presence priority '{}'", text))
                    })?;
                    builder.set_priority(priority)?
                }
                "show" => builder.set_mode(child.text().trim().parse()?),
                "error" => builder.set_error(self.parse_error(child)?),
                _ => builder.add_shared_extension(self.parse_extension(child)?),
            };
        }
        builder.build()
    }

    fn parse_iq(&self, element: &Element, stanza_ns: &str) -> Result<Iq, XmppError> {
        let iq_type: IqType = element
            .attr("type")
            .ok_or_else(|| XmppError::parse("<iq/> without a type"))?
            .parse()?;
        let mut builder = envelope(Iq::builder(iq_type, id_seed(element)), element)?;

        let mut has_payload = false;
        for child in element.children() {
            if child.name() == "error" && child.ns() == stanza_ns {
                builder = builder.set_error(self.parse_error(child)?);
            } else if !has_payload {
                builder = builder.set_shared_payload(self.parse_extension(child)?);
                has_payload = true;
            } else {
                builder = builder.add_shared_extension(self.parse_extension(child)?);
            }
        }

        if iq_type == IqType::Error && builder.envelope().error().is_none() {
            return Err(XmppError::MissingStanzaError);
        }
        builder.build()
    }
}

impl Default for ProviderRegistry {
    /// A registry knowing the chat state markers.
    fn default() -> Self {
        let mut registry = Self::empty();
        for state in ChatState::ALL {
            registry.register(QName::new(ns::CHAT_STATES, state.as_str()), move |_| {
                let extension: SharedExtension = Arc::new(state);
                Ok(extension)
            });
        }
        registry
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.providers.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Parse a stanza with the default providers.
pub fn parse_stanza(element: &Element) -> Result<Stanza, XmppError> {
    ProviderRegistry::default().parse_stanza(element)
}

fn id_seed(element: &Element) -> IdSeed {
    element.attr("id").map(IdSeed::from).unwrap_or_default()
}

/// Copy `to`, `from` and `xml:lang` onto a builder.
fn envelope<B: StanzaBuilder>(mut builder: B, element: &Element) -> Result<B, XmppError> {
    if let Some(to) = element.attr("to") {
        builder = builder.parse_to(to)?;
    }
    if let Some(from) = element.attr("from") {
        builder = builder.parse_from(from)?;
    }
    if let Some(language) = element.attr("xml:lang") {
        builder = builder.set_language(language);
    }
    Ok(builder)
}
