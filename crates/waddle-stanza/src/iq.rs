//! `<iq/>` stanzas and the request/response protocol.
//!
//! `get` and `set` are requests, `result` and `error` are responses. A
//! response is derived from its request: addressing is swapped and the id is
//! echoed, so the requester can correlate the two.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::builder::{BuilderEnvelope, IdSeed, StanzaBuilder};
use crate::error::XmppError;
use crate::extension::{ExtensionElement, SharedExtension};
use crate::ns;
use crate::qname::QName;
use crate::stanza::{StanzaCommon, StanzaView};
use crate::stanza_error::StanzaError;
use crate::xml::{XmlEnvironment, XmlStringBuilder};

/// IQ types (RFC 6120 Section 8.2.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IqType {
    Get,
    Set,
    Result,
    Error,
}

impl IqType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Set => "set",
            Self::Result => "result",
            Self::Error => "error",
        }
    }

    pub fn is_request(&self) -> bool {
        matches!(self, Self::Get | Self::Set)
    }

    pub fn is_response(&self) -> bool {
        !self.is_request()
    }
}

impl fmt::Display for IqType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IqType {
    type Err = XmppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "get" => Ok(Self::Get),
            "set" => Ok(Self::Set),
            "result" => Ok(Self::Result),
            "error" => Ok(Self::Error),
            _ => Err(XmppError::unknown_type("iq", s)),
        }
    }
}

/// The two types a response may have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseType {
    Result,
    Error,
}

impl From<ResponseType> for IqType {
    fn from(response_type: ResponseType) -> Self {
        match response_type {
            ResponseType::Result => IqType::Result,
            ResponseType::Error => IqType::Error,
        }
    }
}

/// An immutable `<iq/>`.
///
/// The payload is the IQ's child element (the query); further extensions
/// live in the envelope's store as for other stanzas.
#[derive(Debug, Clone)]
pub struct Iq {
    common: StanzaCommon,
    iq_type: IqType,
    payload: Option<SharedExtension>,
}

impl Iq {
    pub fn builder(iq_type: IqType, id: impl Into<IdSeed>) -> IqBuilder {
        IqBuilder {
            envelope: BuilderEnvelope::new(id.into()),
            iq_type,
            payload: None,
        }
    }

    /// A `get` request carrying `payload`.
    pub fn get(payload: impl ExtensionElement, id: impl Into<IdSeed>) -> IqBuilder {
        Self::builder(IqType::Get, id).set_payload(payload)
    }

    /// A `set` request carrying `payload`.
    pub fn set(payload: impl ExtensionElement, id: impl Into<IdSeed>) -> IqBuilder {
        Self::builder(IqType::Set, id).set_payload(payload)
    }

    /// A builder holding every field of `self`, with a new id seed.
    pub fn to_builder(&self, id: impl Into<IdSeed>) -> IqBuilder {
        IqBuilder {
            envelope: BuilderEnvelope::from_common(&self.common, id.into()),
            iq_type: self.iq_type,
            payload: self.payload.clone(),
        }
    }

    pub fn iq_type(&self) -> IqType {
        self.iq_type
    }

    pub fn is_request(&self) -> bool {
        self.iq_type.is_request()
    }

    pub fn is_response(&self) -> bool {
        self.iq_type.is_response()
    }

    pub fn payload(&self) -> Option<&SharedExtension> {
        self.payload.as_ref()
    }

    /// The payload as concrete type `T`.
    pub fn payload_as<T: ExtensionElement>(&self) -> Option<&T> {
        self.payload.as_ref().and_then(|p| p.downcast_ref::<T>())
    }

    /// Qualified name of the payload; IQ handlers are keyed by it.
    pub fn child_qname(&self) -> Option<QName> {
        self.payload.as_ref().map(|p| p.qname())
    }

    /// Start a `result` response to `request`.
    ///
    /// Fails unless `request` is a `get` or `set`.
    pub fn create_response(request: &Iq) -> Result<IqResponseBuilder, XmppError> {
        Self::response_builder(request, ResponseType::Result)
    }

    /// Start an `error` response to `request`; the caller attaches the
    /// stanza error with [`StanzaBuilder::set_error`].
    pub fn create_error_response(request: &Iq) -> Result<IqResponseBuilder, XmppError> {
        Self::response_builder(request, ResponseType::Error)
    }

    /// An empty `result` for `request`.
    pub fn create_result(request: &Iq) -> Result<Iq, XmppError> {
        Self::create_response(request)?.build()
    }

    /// A complete `error` response for `request`.
    pub fn error_response(request: &Iq, error: StanzaError) -> Result<Iq, XmppError> {
        Self::create_error_response(request)?
            .set_error(error)
            .build()
    }

    fn response_builder(
        request: &Iq,
        response_type: ResponseType,
    ) -> Result<IqResponseBuilder, XmppError> {
        if !request.is_request() {
            return Err(XmppError::NotARequest {
                iq_type: request.iq_type.as_str().to_string(),
            });
        }
        let id = match request.stanza_id() {
            Some(id) => IdSeed::Explicit(id.to_string()),
            None => IdSeed::None,
        };
        let envelope = BuilderEnvelope::new(id);
        let builder = IqResponseBuilder {
            envelope,
            response_type,
            payload: None,
        };
        Ok(builder
            .set_to(request.from().cloned())
            .set_from(request.to().cloned()))
    }

    pub fn to_xml(&self, enclosing: &XmlEnvironment) -> XmlStringBuilder {
        let mut xml = XmlStringBuilder::open("iq", ns::JABBER_CLIENT, self.language(), enclosing);
        self.common.write_attributes(&mut xml);
        xml.attribute("type", self.iq_type.as_str());

        if self.payload.is_none()
            && self.common.extensions.is_empty()
            && self.common.error.is_none()
        {
            xml.close_empty_element();
            return xml;
        }

        xml.right_angle_bracket();
        if let Some(ref payload) = self.payload {
            let env = xml.environment().clone();
            xml.append(&payload.to_xml(&env));
        }
        self.common.write_extensions_and_error(&mut xml);
        xml.close();
        xml
    }

    /// Serialize as a standalone element.
    pub fn to_xml_string(&self) -> String {
        self.to_xml(&XmlEnvironment::empty()).into_string()
    }

    pub(crate) fn assemble(
        envelope: BuilderEnvelope,
        iq_type: IqType,
        payload: Option<SharedExtension>,
    ) -> Result<Iq, XmppError> {
        let common = envelope.into_common()?;
        Ok(Iq {
            common,
            iq_type,
            payload,
        })
    }
}

impl StanzaView for Iq {
    fn common(&self) -> &StanzaCommon {
        &self.common
    }
}

/// Accumulates an [`Iq`] of any type.
#[derive(Debug, Clone)]
pub struct IqBuilder {
    envelope: BuilderEnvelope,
    iq_type: IqType,
    payload: Option<SharedExtension>,
}

impl IqBuilder {
    pub fn of_type(mut self, iq_type: IqType) -> Self {
        self.iq_type = iq_type;
        self
    }

    pub fn set_payload(self, payload: impl ExtensionElement) -> Self {
        self.set_shared_payload(Arc::new(payload))
    }

    pub fn set_shared_payload(mut self, payload: SharedExtension) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn iq_type(&self) -> IqType {
        self.iq_type
    }
}

impl StanzaBuilder for IqBuilder {
    type Stanza = Iq;

    fn envelope(&self) -> &BuilderEnvelope {
        &self.envelope
    }

    fn envelope_mut(&mut self) -> &mut BuilderEnvelope {
        &mut self.envelope
    }

    fn build(self) -> Result<Iq, XmppError> {
        Iq::assemble(self.envelope, self.iq_type, self.payload)
    }
}

/// Accumulates a response [`Iq`]; its type can only be `result` or `error`.
#[derive(Debug, Clone)]
pub struct IqResponseBuilder {
    envelope: BuilderEnvelope,
    response_type: ResponseType,
    payload: Option<SharedExtension>,
}

impl IqResponseBuilder {
    pub fn of_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = response_type;
        self
    }

    pub fn response_type(&self) -> ResponseType {
        self.response_type
    }

    pub fn set_payload(self, payload: impl ExtensionElement) -> Self {
        self.set_shared_payload(Arc::new(payload))
    }

    pub fn set_shared_payload(mut self, payload: SharedExtension) -> Self {
        self.payload = Some(payload);
        self
    }
}

impl StanzaBuilder for IqResponseBuilder {
    type Stanza = Iq;

    fn envelope(&self) -> &BuilderEnvelope {
        &self.envelope
    }

    fn envelope_mut(&mut self) -> &mut BuilderEnvelope {
        &mut self.envelope
    }

    fn build(self) -> Result<Iq, XmppError> {
        Iq::assemble(self.envelope, self.response_type.into(), self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extension::StandardExtensionElement;
    use crate::stanza_error::StanzaErrorCondition;
    use jid::Jid;

    fn ping_request() -> Iq {
        Iq::get(StandardExtensionElement::empty("ping", "urn:xmpp:ping"), "ping-1")
            .parse_to("example.com")
            .unwrap()
            .parse_from("romeo@example.net/orchard")
            .unwrap()
            .build()
            .unwrap()
    }

    #[test]
    fn test_request_response_classification() {
        assert!(IqType::Get.is_request());
        assert!(IqType::Set.is_request());
        assert!(IqType::Result.is_response());
        assert!(IqType::Error.is_response());
    }

    #[test]
    fn test_create_response_swaps_addresses() {
        let request = ping_request();
        let response = Iq::create_result(&request).unwrap();

        assert_eq!(response.iq_type(), IqType::Result);
        assert_eq!(response.stanza_id(), Some("ping-1"));
        assert_eq!(response.to(), request.from());
        assert_eq!(response.from(), request.to());
        assert!(response.payload().is_none());
    }

    #[test]
    fn test_response_to_response_fails() {
        let response = Iq::create_result(&ping_request()).unwrap();
        assert!(matches!(
            Iq::create_response(&response),
            Err(XmppError::NotARequest { ref iq_type }) if iq_type == "result"
        ));
        assert!(Iq::create_error_response(&response).is_err());
    }

    #[test]
    fn test_error_response() {
        let request = ping_request();
        let error = StanzaError::builder(StanzaErrorCondition::FeatureNotImplemented)
            .build()
            .unwrap();
        let response = Iq::error_response(&request, error).unwrap();

        assert_eq!(response.iq_type(), IqType::Error);
        assert_eq!(
            response.error().map(|e| e.condition()),
            Some(StanzaErrorCondition::FeatureNotImplemented)
        );
        assert_eq!(
            response.to_xml_string(),
            "<iq xmlns='jabber:client' id='ping-1' to='romeo@example.net/orchard' from='example.com' type='error'>\
             <error type='cancel'><feature-not-implemented xmlns='urn:ietf:params:xml:ns:xmpp-stanzas'/></error>\
             </iq>"
        );
    }

    #[test]
    fn test_request_serialization_and_child_qname() {
        let request = ping_request();
        assert_eq!(request.child_qname(), Some(QName::new("urn:xmpp:ping", "ping")));
        assert_eq!(
            request.to_xml_string(),
            "<iq xmlns='jabber:client' id='ping-1' to='example.com' from='romeo@example.net/orchard' type='get'>\
             <ping xmlns='urn:xmpp:ping'/></iq>"
        );
    }

    #[test]
    fn test_response_without_request_id_has_no_id() {
        let request = Iq::get(StandardExtensionElement::empty("q", "urn:q"), IdSeed::None)
            .to("example.com".parse::<Jid>().unwrap())
            .build()
            .unwrap();
        let builder = Iq::create_response(&request).unwrap();
        assert!(!builder.envelope().will_build_with_id());
        assert!(builder.require_stanza_id().is_err());
    }
}
