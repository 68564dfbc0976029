//! Waddle XMPP stanza model.
//!
//! Typed, immutable Message, Presence and IQ stanzas for the Waddle client
//! stack:
//! - extension elements addressed by qualified name ([`QName`]) and kept in
//!   an ordered multi-map ([`ExtensionElementStore`])
//! - stanza and stream errors with the RFC 6120 condition/type model
//! - builders that validate at build time and derive IQ responses from
//!   requests
//! - a provider registry that turns `minidom` trees into stanzas
//!
//! Serialization goes through [`XmlStringBuilder`], which omits `xmlns` and
//! `xml:lang` declarations a child inherits from its parent.

pub mod builder;
pub mod chat_state;
pub mod descriptive;
pub mod error;
pub mod extension;
pub mod id;
pub mod iq;
pub mod message;
pub mod ns;
pub mod parse;
pub mod presence;
pub mod qname;
pub mod stanza;
pub mod stanza_error;
pub mod store;
pub mod stream_error;
pub mod xml;

pub use builder::{BuilderEnvelope, IdSeed, StanzaBuilder};
pub use chat_state::ChatState;
pub use descriptive::ErrorDetails;
pub use error::XmppError;
pub use extension::{
    ExtensionElement, NameValueElement, SharedExtension, StandardExtensionElement,
    StandardExtensionElementBuilder,
};
pub use id::{StandardStanzaIdSource, StanzaIdSource, UuidStanzaIdSource};
pub use iq::{Iq, IqBuilder, IqResponseBuilder, IqType, ResponseType};
pub use message::{Body, Message, MessageBuilder, MessageType, Subject, Thread};
pub use parse::{parse_stanza, ExtensionProvider, ProviderRegistry};
pub use presence::{Presence, PresenceBuilder, PresenceMode, PresenceType};
pub use qname::QName;
pub use stanza::{Stanza, StanzaCommon, StanzaView};
pub use stanza_error::{
    ConditionTypeTable, StanzaError, StanzaErrorBuilder, StanzaErrorCondition, StanzaErrorType,
};
pub use store::ExtensionElementStore;
pub use stream_error::{StreamError, StreamErrorCondition};
pub use xml::{XmlEnvironment, XmlStringBuilder};
