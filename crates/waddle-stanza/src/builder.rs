//! Stanza builders.
//!
//! Each stanza kind has one builder type that embeds a [`BuilderEnvelope`]
//! (the common fields) next to its own fields. The shared fluent setters live
//! on the [`StanzaBuilder`] trait as provided methods, so every builder gets
//! them while still returning its own concrete type.
//!
//! Builders are single-owner values: methods take `self` and give it back.

use std::fmt;
use std::sync::Arc;

use jid::Jid;

use crate::error::XmppError;
use crate::extension::{ExtensionElement, SharedExtension};
use crate::id::StanzaIdSource;
use crate::qname::QName;
use crate::stanza::StanzaCommon;
use crate::stanza_error::StanzaError;
use crate::store::ExtensionElementStore;

/// Where a builder's stanza id comes from.
#[derive(Clone, Default)]
pub enum IdSeed {
    /// The stanza is built without an id.
    #[default]
    None,
    /// Exactly this id.
    Explicit(String),
    /// A fresh id from the source, drawn at build time.
    Source(Arc<dyn StanzaIdSource>),
}

impl fmt::Debug for IdSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Explicit(id) => f.debug_tuple("Explicit").field(id).finish(),
            Self::Source(_) => f.write_str("Source(..)"),
        }
    }
}

impl From<&str> for IdSeed {
    fn from(id: &str) -> Self {
        Self::Explicit(id.to_string())
    }
}

impl From<String> for IdSeed {
    fn from(id: String) -> Self {
        Self::Explicit(id)
    }
}

impl From<Arc<dyn StanzaIdSource>> for IdSeed {
    fn from(source: Arc<dyn StanzaIdSource>) -> Self {
        Self::Source(source)
    }
}

/// The common fields under construction.
#[derive(Debug, Clone, Default)]
pub struct BuilderEnvelope {
    id: IdSeed,
    to: Option<Jid>,
    from: Option<Jid>,
    language: Option<String>,
    error: Option<StanzaError>,
    extensions: ExtensionElementStore,
}

impl BuilderEnvelope {
    pub fn new(id: IdSeed) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// Seed from a built stanza: addressing, language and error are copied,
    /// the extension store is cloned shallowly (same elements, new store).
    pub fn from_common(common: &StanzaCommon, id: IdSeed) -> Self {
        Self {
            id,
            to: common.to.clone(),
            from: common.from.clone(),
            language: common.language.clone(),
            error: common.error.clone(),
            extensions: common.extensions.clone(),
        }
    }

    pub fn id_seed(&self) -> &IdSeed {
        &self.id
    }

    /// The explicit id, if one was set.
    pub fn stanza_id(&self) -> Option<&str> {
        match self.id {
            IdSeed::Explicit(ref id) => Some(id),
            _ => None,
        }
    }

    pub fn to(&self) -> Option<&Jid> {
        self.to.as_ref()
    }

    pub fn from(&self) -> Option<&Jid> {
        self.from.as_ref()
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    pub fn error(&self) -> Option<&StanzaError> {
        self.error.as_ref()
    }

    pub fn extensions(&self) -> &ExtensionElementStore {
        &self.extensions
    }

    pub(crate) fn extensions_mut(&mut self) -> &mut ExtensionElementStore {
        &mut self.extensions
    }

    /// Whether the built stanza will carry an id.
    pub fn will_build_with_id(&self) -> bool {
        !matches!(self.id, IdSeed::None)
    }

    /// Resolve the id and move the fields into a stanza envelope.
    pub(crate) fn into_common(self) -> Result<StanzaCommon, XmppError> {
        let id = match self.id {
            IdSeed::None => None,
            IdSeed::Explicit(id) if id.is_empty() => return Err(XmppError::EmptyStanzaId),
            IdSeed::Explicit(id) => Some(id),
            IdSeed::Source(source) => Some(source.next_id()),
        };
        Ok(StanzaCommon {
            id,
            to: self.to,
            from: self.from,
            language: self.language,
            error: self.error,
            extensions: self.extensions,
        })
    }
}

/// Fluent setters shared by every stanza builder.
pub trait StanzaBuilder: Sized {
    /// The stanza this builder produces.
    type Stanza;

    fn envelope(&self) -> &BuilderEnvelope;

    fn envelope_mut(&mut self) -> &mut BuilderEnvelope;

    /// Validate and produce the immutable stanza.
    fn build(self) -> Result<Self::Stanza, XmppError>;

    fn set_stanza_id(mut self, id: impl Into<String>) -> Self {
        self.envelope_mut().id = IdSeed::Explicit(id.into());
        self
    }

    fn set_id_source(mut self, source: Arc<dyn StanzaIdSource>) -> Self {
        self.envelope_mut().id = IdSeed::Source(source);
        self
    }

    fn to(mut self, to: impl Into<Jid>) -> Self {
        self.envelope_mut().to = Some(to.into());
        self
    }

    fn set_to(mut self, to: Option<Jid>) -> Self {
        self.envelope_mut().to = to;
        self
    }

    /// Parse and set the recipient.
    fn parse_to(self, to: &str) -> Result<Self, XmppError> {
        let jid: Jid = to.parse()?;
        Ok(self.to(jid))
    }

    fn from(mut self, from: impl Into<Jid>) -> Self {
        self.envelope_mut().from = Some(from.into());
        self
    }

    fn set_from(mut self, from: Option<Jid>) -> Self {
        self.envelope_mut().from = from;
        self
    }

    /// Parse and set the sender.
    fn parse_from(self, from: &str) -> Result<Self, XmppError> {
        let jid: Jid = from.parse()?;
        Ok(self.from(jid))
    }

    fn set_error(mut self, error: StanzaError) -> Self {
        self.envelope_mut().error = Some(error);
        self
    }

    fn set_language(mut self, language: impl Into<String>) -> Self {
        self.envelope_mut().language = Some(language.into());
        self
    }

    fn add_extension(self, extension: impl ExtensionElement) -> Self {
        self.add_shared_extension(Arc::new(extension))
    }

    /// Attach an already shared element.
    fn add_shared_extension(mut self, extension: SharedExtension) -> Self {
        self.envelope_mut().extensions.put(extension);
        self
    }

    fn add_extensions<I>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = SharedExtension>,
    {
        for extension in extensions {
            self.envelope_mut().extensions.put(extension);
        }
        self
    }

    /// Replace every element of the same qualified name with `extension`.
    fn override_extension(self, extension: impl ExtensionElement) -> Self {
        self.override_shared_extension(Arc::new(extension))
    }

    fn override_shared_extension(mut self, extension: SharedExtension) -> Self {
        let store = &mut self.envelope_mut().extensions;
        store.remove(&extension.qname());
        store.put(extension);
        self
    }

    /// Drop every element with the given qualified name.
    fn remove_extension(mut self, qname: &QName) -> Self {
        self.envelope_mut().extensions.remove(qname);
        self
    }

    /// Fail unless the stanza will be built with an id.
    fn require_stanza_id(self) -> Result<Self, XmppError> {
        if self.envelope().will_build_with_id() {
            Ok(self)
        } else {
            Err(XmppError::MissingStanzaId)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extension::StandardExtensionElement;
    use crate::id::StandardStanzaIdSource;

    #[test]
    fn test_id_resolution() {
        let explicit = BuilderEnvelope::new("abc".into()).into_common().unwrap();
        assert_eq!(explicit.id.as_deref(), Some("abc"));

        let none = BuilderEnvelope::new(IdSeed::None).into_common().unwrap();
        assert_eq!(none.id, None);

        let source: Arc<dyn StanzaIdSource> = Arc::new(StandardStanzaIdSource::with_prefix("p"));
        let drawn = BuilderEnvelope::new(source.into()).into_common().unwrap();
        assert_eq!(drawn.id.as_deref(), Some("p-0"));
    }

    #[test]
    fn test_empty_id_rejected() {
        assert!(matches!(
            BuilderEnvelope::new("".into()).into_common(),
            Err(XmppError::EmptyStanzaId)
        ));
    }

    #[test]
    fn test_seeding_clones_store_shallowly() {
        let mut envelope = BuilderEnvelope::new(IdSeed::None);
        let element: SharedExtension = Arc::new(StandardExtensionElement::empty("a", "urn:a"));
        envelope.extensions_mut().put(element.clone());
        let common = envelope.into_common().unwrap();

        let mut seeded = BuilderEnvelope::from_common(&common, IdSeed::None);
        seeded
            .extensions_mut()
            .put(Arc::new(StandardExtensionElement::empty("a", "urn:a")));

        let q = QName::new("urn:a", "a");
        assert_eq!(common.extensions.get_all(&q).len(), 1);
        assert_eq!(seeded.extensions().get_all(&q).len(), 2);
        assert!(Arc::ptr_eq(seeded.extensions().get_first(&q).unwrap(), &element));
    }
}
