//! The common stanza envelope and the read-side API shared by Message,
//! Presence and IQ.
//!
//! A stanza is immutable once built. All mutation happens on its builder
//! (see [`crate::builder`]); a built stanza can be shared across tasks
//! without locking.

use jid::Jid;

use crate::extension::{ExtensionElement, SharedExtension};
use crate::iq::Iq;
use crate::message::Message;
use crate::presence::Presence;
use crate::qname::QName;
use crate::stanza_error::StanzaError;
use crate::store::ExtensionElementStore;
use crate::xml::{XmlEnvironment, XmlStringBuilder};

/// Fields every stanza carries.
#[derive(Debug, Clone, Default)]
pub struct StanzaCommon {
    pub(crate) id: Option<String>,
    pub(crate) to: Option<Jid>,
    pub(crate) from: Option<Jid>,
    pub(crate) language: Option<String>,
    pub(crate) error: Option<StanzaError>,
    pub(crate) extensions: ExtensionElementStore,
}

impl StanzaCommon {
    /// Write `id`, `to` and `from` on an open start tag.
    pub(crate) fn write_attributes(&self, xml: &mut XmlStringBuilder) {
        xml.opt_attribute("id", self.id.as_deref());
        xml.opt_attribute("to", self.to.as_ref().map(|j| j.to_string()));
        xml.opt_attribute("from", self.from.as_ref().map(|j| j.to_string()));
    }

    /// Append every extension, then the error, inside an open element.
    pub(crate) fn write_extensions_and_error(&self, xml: &mut XmlStringBuilder) {
        let env = xml.environment().clone();
        for extension in self.extensions.iter() {
            xml.append(&extension.to_xml(&env));
        }
        if let Some(ref error) = self.error {
            xml.append(&error.to_xml(&env));
        }
    }
}

/// Read access to the envelope of a built stanza.
pub trait StanzaView {
    /// The envelope.
    fn common(&self) -> &StanzaCommon;

    fn stanza_id(&self) -> Option<&str> {
        self.common().id.as_deref()
    }

    fn to(&self) -> Option<&Jid> {
        self.common().to.as_ref()
    }

    fn from(&self) -> Option<&Jid> {
        self.common().from.as_ref()
    }

    /// The stanza's `xml:lang`.
    fn language(&self) -> Option<&str> {
        self.common().language.as_deref()
    }

    fn error(&self) -> Option<&StanzaError> {
        self.common().error.as_ref()
    }

    /// The extension store, for lookups not covered below.
    fn extension_store(&self) -> &ExtensionElementStore {
        &self.common().extensions
    }

    /// First extension with the given qualified name.
    fn extension(&self, qname: &QName) -> Option<&SharedExtension> {
        self.common().extensions.get_first(qname)
    }

    /// First extension with the given element name and namespace.
    fn extension_ns(&self, element_name: &str, namespace: &str) -> Option<&SharedExtension> {
        self.extension(&QName::new(namespace, element_name))
    }

    /// All extensions in store order.
    fn extensions(&self) -> Vec<SharedExtension> {
        self.common().extensions.values()
    }

    /// All extensions with the given qualified name.
    fn extensions_by(&self, qname: &QName) -> Vec<SharedExtension> {
        self.common().extensions.get_all(qname)
    }

    /// First extension of concrete type `T`.
    fn extension_of<T: ExtensionElement>(&self) -> Option<&T>
    where
        Self: Sized,
    {
        self.common().extensions.get_first_of::<T>()
    }

    /// All extensions of concrete type `T`.
    fn extensions_of<T: ExtensionElement>(&self) -> Vec<&T>
    where
        Self: Sized,
    {
        self.common().extensions.get_all_of::<T>()
    }

    fn has_extension(&self, qname: &QName) -> bool {
        self.common().extensions.contains_key(qname)
    }

    fn has_extension_ns(&self, element_name: &str, namespace: &str) -> bool {
        self.has_extension(&QName::new(namespace, element_name))
    }

    /// Whether any extension lives in `namespace`.
    fn has_extension_namespace(&self, namespace: &str) -> bool {
        self.common().extensions.contains_namespace(namespace)
    }

    /// Whether the stanza carries an error.
    fn is_error(&self) -> bool {
        self.common().error.is_some()
    }
}

/// Any of the three stanza kinds.
#[derive(Debug, Clone)]
pub enum Stanza {
    Message(Message),
    Presence(Presence),
    Iq(Iq),
}

impl Stanza {
    /// Top-level element name.
    pub fn element_name(&self) -> &'static str {
        match self {
            Self::Message(_) => "message",
            Self::Presence(_) => "presence",
            Self::Iq(_) => "iq",
        }
    }

    pub fn as_message(&self) -> Option<&Message> {
        match self {
            Self::Message(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_presence(&self) -> Option<&Presence> {
        match self {
            Self::Presence(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_iq(&self) -> Option<&Iq> {
        match self {
            Self::Iq(iq) => Some(iq),
            _ => None,
        }
    }

    pub fn to_xml(&self, enclosing: &XmlEnvironment) -> XmlStringBuilder {
        match self {
            Self::Message(m) => m.to_xml(enclosing),
            Self::Presence(p) => p.to_xml(enclosing),
            Self::Iq(iq) => iq.to_xml(enclosing),
        }
    }

    /// Serialize as a standalone element.
    pub fn to_xml_string(&self) -> String {
        self.to_xml(&XmlEnvironment::empty()).into_string()
    }
}

impl StanzaView for Stanza {
    fn common(&self) -> &StanzaCommon {
        match self {
            Self::Message(m) => m.common(),
            Self::Presence(p) => p.common(),
            Self::Iq(iq) => iq.common(),
        }
    }
}

impl From<Message> for Stanza {
    fn from(message: Message) -> Self {
        Self::Message(message)
    }
}

impl From<Presence> for Stanza {
    fn from(presence: Presence) -> Self {
        Self::Presence(presence)
    }
}

impl From<Iq> for Stanza {
    fn from(iq: Iq) -> Self {
        Self::Iq(iq)
    }
}
