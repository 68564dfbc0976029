//! Namespace URIs used by the stanza model.

/// XMPP client namespace; the default namespace of every stanza we emit.
pub const JABBER_CLIENT: &str = "jabber:client";
/// XMPP server namespace (bodies relayed over s2s may carry it).
pub const JABBER_SERVER: &str = "jabber:server";
/// XMPP streams namespace
pub const STREAM: &str = "http://etherx.jabber.org/streams";
/// Stanza error condition and text namespace (RFC 6120 Section 8.3).
pub const STANZAS: &str = "urn:ietf:params:xml:ns:xmpp-stanzas";
/// Stream error condition and text namespace (RFC 6120 Section 4.9).
pub const STREAMS: &str = "urn:ietf:params:xml:ns:xmpp-streams";
/// XEP-0085 Chat State Notifications
pub const CHAT_STATES: &str = "http://jabber.org/protocol/chatstates";
/// The reserved `xml` prefix namespace.
pub const XML: &str = "http://www.w3.org/XML/1998/namespace";
