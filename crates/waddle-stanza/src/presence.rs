//! `<presence/>` stanzas.

use std::fmt;
use std::str::FromStr;

use crate::builder::{BuilderEnvelope, IdSeed, StanzaBuilder};
use crate::error::XmppError;
use crate::ns;
use crate::stanza::{StanzaCommon, StanzaView};
use crate::xml::{XmlEnvironment, XmlStringBuilder};

/// Presence types (RFC 6121 Section 4.7.1). `Available` has no `type`
/// attribute on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PresenceType {
    #[default]
    Available,
    Unavailable,
    Subscribe,
    Subscribed,
    Unsubscribe,
    Unsubscribed,
    Error,
    Probe,
}

impl PresenceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Unavailable => "unavailable",
            Self::Subscribe => "subscribe",
            Self::Subscribed => "subscribed",
            Self::Unsubscribe => "unsubscribe",
            Self::Unsubscribed => "unsubscribed",
            Self::Error => "error",
            Self::Probe => "probe",
        }
    }
}

impl fmt::Display for PresenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PresenceType {
    type Err = XmppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(Self::Available),
            "unavailable" => Ok(Self::Unavailable),
            "subscribe" => Ok(Self::Subscribe),
            "subscribed" => Ok(Self::Subscribed),
            "unsubscribe" => Ok(Self::Unsubscribe),
            "unsubscribed" => Ok(Self::Unsubscribed),
            "error" => Ok(Self::Error),
            "probe" => Ok(Self::Probe),
            _ => Err(XmppError::unknown_type("presence", s)),
        }
    }
}

/// Availability sub-state carried in `<show/>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PresenceMode {
    Chat,
    #[default]
    Available,
    Away,
    /// Extended away
    Xa,
    /// Do not disturb
    Dnd,
}

impl PresenceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Available => "available",
            Self::Away => "away",
            Self::Xa => "xa",
            Self::Dnd => "dnd",
        }
    }
}

impl fmt::Display for PresenceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PresenceMode {
    type Err = XmppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chat" => Ok(Self::Chat),
            "available" => Ok(Self::Available),
            "away" => Ok(Self::Away),
            "xa" => Ok(Self::Xa),
            "dnd" => Ok(Self::Dnd),
            _ => Err(XmppError::unknown_type("show", s)),
        }
    }
}

/// An immutable `<presence/>`.
#[derive(Debug, Clone)]
pub struct Presence {
    common: StanzaCommon,
    presence_type: PresenceType,
    status: Option<String>,
    priority: Option<i8>,
    mode: Option<PresenceMode>,
}

impl Presence {
    pub fn builder(id: impl Into<IdSeed>) -> PresenceBuilder {
        PresenceBuilder {
            envelope: BuilderEnvelope::new(id.into()),
            presence_type: PresenceType::Available,
            status: None,
            priority: None,
            mode: None,
        }
    }

    pub fn to_builder(&self, id: impl Into<IdSeed>) -> PresenceBuilder {
        PresenceBuilder {
            envelope: BuilderEnvelope::from_common(&self.common, id.into()),
            presence_type: self.presence_type,
            status: self.status.clone(),
            priority: self.priority,
            mode: self.mode,
        }
    }

    pub fn presence_type(&self) -> PresenceType {
        self.presence_type
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    /// Priority, 0 when unset.
    pub fn priority(&self) -> i8 {
        self.priority.unwrap_or(0)
    }

    /// Priority as sent, `None` when the stanza has no `<priority/>`.
    pub fn priority_value(&self) -> Option<i8> {
        self.priority
    }

    /// Mode, `Available` when unset.
    pub fn mode(&self) -> PresenceMode {
        self.mode.unwrap_or_default()
    }

    pub fn is_available(&self) -> bool {
        self.presence_type == PresenceType::Available
    }

    /// Available, but away, extended away or do-not-disturb.
    pub fn is_away(&self) -> bool {
        self.is_available()
            && matches!(
                self.mode(),
                PresenceMode::Away | PresenceMode::Xa | PresenceMode::Dnd
            )
    }

    pub fn to_xml(&self, enclosing: &XmlEnvironment) -> XmlStringBuilder {
        let mut xml =
            XmlStringBuilder::open("presence", ns::JABBER_CLIENT, self.language(), enclosing);
        self.common.write_attributes(&mut xml);
        if self.presence_type != PresenceType::Available {
            xml.attribute("type", self.presence_type.as_str());
        }

        let show = self.mode.filter(|m| *m != PresenceMode::Available);
        let has_children = self.status.is_some()
            || self.priority.is_some()
            || show.is_some()
            || !self.common.extensions.is_empty()
            || self.common.error.is_some();
        if !has_children {
            xml.close_empty_element();
            return xml;
        }

        xml.right_angle_bracket();
        xml.opt_element("status", self.status.as_deref());
        if let Some(priority) = self.priority {
            xml.element("priority", &priority.to_string());
        }
        if let Some(show) = show {
            xml.element("show", show.as_str());
        }
        self.common.write_extensions_and_error(&mut xml);
        xml.close();
        xml
    }
}

impl StanzaView for Presence {
    fn common(&self) -> &StanzaCommon {
        &self.common
    }
}

/// Accumulates a [`Presence`].
#[derive(Debug, Clone)]
pub struct PresenceBuilder {
    envelope: BuilderEnvelope,
    presence_type: PresenceType,
    status: Option<String>,
    priority: Option<i8>,
    mode: Option<PresenceMode>,
}

impl PresenceBuilder {
    pub fn of_type(mut self, presence_type: PresenceType) -> Self {
        self.presence_type = presence_type;
        self
    }

    pub fn set_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Set the priority; must lie in -128..=127.
    pub fn set_priority(mut self, priority: i32) -> Result<Self, XmppError> {
        let priority =
            i8::try_from(priority).map_err(|_| XmppError::PriorityOutOfRange(priority))?;
        self.priority = Some(priority);
        Ok(self)
    }

    pub fn set_mode(mut self, mode: PresenceMode) -> Self {
        self.mode = Some(mode);
        self
    }
}

impl StanzaBuilder for PresenceBuilder {
    type Stanza = Presence;

    fn envelope(&self) -> &BuilderEnvelope {
        &self.envelope
    }

    fn envelope_mut(&mut self) -> &mut BuilderEnvelope {
        &mut self.envelope
    }

    fn build(self) -> Result<Presence, XmppError> {
        Ok(Presence {
            common: self.envelope.into_common()?,
            presence_type: self.presence_type,
            status: self.status,
            priority: self.priority,
            mode: self.mode,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_bounds() {
        assert!(matches!(
            Presence::builder("p").set_priority(-129),
            Err(XmppError::PriorityOutOfRange(-129))
        ));
        assert!(Presence::builder("p").set_priority(128).is_err());

        let low = Presence::builder("p").set_priority(-128).unwrap().build().unwrap();
        let high = Presence::builder("p").set_priority(127).unwrap().build().unwrap();
        assert_eq!(low.priority(), -128);
        assert_eq!(high.priority(), 127);
    }

    #[test]
    fn test_defaults() {
        let presence = Presence::builder(IdSeed::None).build().unwrap();
        assert!(presence.is_available());
        assert!(!presence.is_away());
        assert_eq!(presence.priority(), 0);
        assert_eq!(presence.priority_value(), None);
        assert_eq!(presence.mode(), PresenceMode::Available);
        assert_eq!(
            presence.to_xml(&XmlEnvironment::empty()).into_string(),
            "<presence xmlns='jabber:client'/>"
        );
    }

    #[test]
    fn test_away_serialization() {
        let presence = Presence::builder("p1")
            .set_mode(PresenceMode::Dnd)
            .set_status("in a meeting")
            .set_priority(5)
            .unwrap()
            .build()
            .unwrap();
        assert!(presence.is_away());
        assert_eq!(
            presence.to_xml(&XmlEnvironment::empty()).into_string(),
            "<presence xmlns='jabber:client' id='p1'>\
             <status>in a meeting</status><priority>5</priority><show>dnd</show>\
             </presence>"
        );
    }

    #[test]
    fn test_unavailable_is_not_away() {
        let presence = Presence::builder("p1")
            .of_type(PresenceType::Unavailable)
            .set_mode(PresenceMode::Away)
            .build()
            .unwrap();
        assert!(!presence.is_available());
        assert!(!presence.is_away());
        assert_eq!("unsubscribed".parse::<PresenceType>().unwrap(), PresenceType::Unsubscribed);
    }
}
