//! Stream-level errors (RFC 6120 Section 4.9).
//!
//! Stream errors are nonzas: they are not stanzas and never travel inside
//! one, but they share the error shape of [`StanzaError`](crate::StanzaError)
//! (defined condition, descriptive texts, extensions).

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use minidom::Element;

use crate::descriptive::ErrorDetails;
use crate::error::XmppError;
use crate::extension::{ExtensionElement, SharedExtension, StandardExtensionElement};
use crate::ns;
use crate::xml::{XmlEnvironment, XmlStringBuilder};

/// Defined stream error conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamErrorCondition {
    BadFormat,
    BadNamespacePrefix,
    Conflict,
    ConnectionTimeout,
    HostGone,
    HostUnknown,
    ImproperAddressing,
    InternalServerError,
    InvalidFrom,
    /// Legacy RFC 3920 condition, still sent by some servers
    InvalidId,
    InvalidNamespace,
    InvalidXml,
    NotAuthorized,
    NotWellFormed,
    PolicyViolation,
    RemoteConnectionFailed,
    Reset,
    ResourceConstraint,
    RestrictedXml,
    /// Carries the host to reconnect to as condition text
    SeeOtherHost,
    SystemShutdown,
    UndefinedCondition,
    UnsupportedEncoding,
    UnsupportedFeature,
    UnsupportedStanzaType,
    UnsupportedVersion,
}

impl StreamErrorCondition {
    pub const ALL: [StreamErrorCondition; 26] = [
        Self::BadFormat,
        Self::BadNamespacePrefix,
        Self::Conflict,
        Self::ConnectionTimeout,
        Self::HostGone,
        Self::HostUnknown,
        Self::ImproperAddressing,
        Self::InternalServerError,
        Self::InvalidFrom,
        Self::InvalidId,
        Self::InvalidNamespace,
        Self::InvalidXml,
        Self::NotAuthorized,
        Self::NotWellFormed,
        Self::PolicyViolation,
        Self::RemoteConnectionFailed,
        Self::Reset,
        Self::ResourceConstraint,
        Self::RestrictedXml,
        Self::SeeOtherHost,
        Self::SystemShutdown,
        Self::UndefinedCondition,
        Self::UnsupportedEncoding,
        Self::UnsupportedFeature,
        Self::UnsupportedStanzaType,
        Self::UnsupportedVersion,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BadFormat => "bad-format",
            Self::BadNamespacePrefix => "bad-namespace-prefix",
            Self::Conflict => "conflict",
            Self::ConnectionTimeout => "connection-timeout",
            Self::HostGone => "host-gone",
            Self::HostUnknown => "host-unknown",
            Self::ImproperAddressing => "improper-addressing",
            Self::InternalServerError => "internal-server-error",
            Self::InvalidFrom => "invalid-from",
            Self::InvalidId => "invalid-id",
            Self::InvalidNamespace => "invalid-namespace",
            Self::InvalidXml => "invalid-xml",
            Self::NotAuthorized => "not-authorized",
            Self::NotWellFormed => "not-well-formed",
            Self::PolicyViolation => "policy-violation",
            Self::RemoteConnectionFailed => "remote-connection-failed",
            Self::Reset => "reset",
            Self::ResourceConstraint => "resource-constraint",
            Self::RestrictedXml => "restricted-xml",
            Self::SeeOtherHost => "see-other-host",
            Self::SystemShutdown => "system-shutdown",
            Self::UndefinedCondition => "undefined-condition",
            Self::UnsupportedEncoding => "unsupported-encoding",
            Self::UnsupportedFeature => "unsupported-feature",
            Self::UnsupportedStanzaType => "unsupported-stanza-type",
            Self::UnsupportedVersion => "unsupported-version",
        }
    }

    pub fn allows_condition_text(&self) -> bool {
        matches!(self, Self::SeeOtherHost)
    }
}

impl fmt::Display for StreamErrorCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for StreamErrorCondition {
    type Err = XmppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.replace('_', "-");
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == name)
            .ok_or_else(|| XmppError::UnknownCondition(s.to_string()))
    }
}

/// A `<stream:error/>` nonza.
#[derive(Debug, Clone)]
pub struct StreamError {
    condition: StreamErrorCondition,
    condition_text: Option<String>,
    details: ErrorDetails,
}

impl StreamError {
    /// Create a stream error; fails if `condition_text` is given for a
    /// condition other than `see-other-host`.
    pub fn new(
        condition: StreamErrorCondition,
        condition_text: Option<String>,
    ) -> Result<Self, XmppError> {
        let condition_text = condition_text.filter(|t| !t.is_empty());
        if condition_text.is_some() && !condition.allows_condition_text() {
            return Err(XmppError::ConditionTextNotAllowed {
                condition: condition.as_str().to_string(),
            });
        }
        Ok(Self {
            condition,
            condition_text,
            details: ErrorDetails::new(ns::STREAMS),
        })
    }

    /// Add a descriptive text; `None` means no language.
    pub fn with_text(mut self, language: Option<&str>, text: impl Into<String>) -> Self {
        self.details.set_text(language, text);
        self
    }

    pub fn with_extension(mut self, extension: SharedExtension) -> Self {
        self.details.add_extension(extension);
        self
    }

    pub fn condition(&self) -> StreamErrorCondition {
        self.condition
    }

    pub fn condition_text(&self) -> Option<&str> {
        self.condition_text.as_deref()
    }

    pub fn descriptive_text(&self) -> Option<&str> {
        self.details.descriptive_text()
    }

    pub fn descriptive_text_in(&self, language: &str) -> Option<&str> {
        self.details.descriptive_text_in(language)
    }

    pub fn descriptive_texts(&self) -> &BTreeMap<String, String> {
        self.details.descriptive_texts()
    }

    pub fn extensions(&self) -> &[SharedExtension] {
        self.details.extensions()
    }

    /// Parse a `<stream:error/>` element.
    pub fn from_element(element: &Element) -> Result<Self, XmppError> {
        if element.name() != "error" || element.ns() != ns::STREAM {
            return Err(XmppError::parse("expected <stream:error/>"));
        }

        let mut parsed: Option<(StreamErrorCondition, String)> = None;
        let mut details = ErrorDetails::new(ns::STREAMS);
        for child in element.children() {
            if child.ns() == ns::STREAMS {
                if child.name() == "text" {
                    details.set_text(child.attr("xml:lang"), child.text());
                } else {
                    parsed = Some((child.name().parse()?, child.text()));
                }
            } else {
                details.add_extension(Arc::new(StandardExtensionElement::from_element(child)));
            }
        }

        let (condition, text) =
            parsed.ok_or_else(|| XmppError::parse("<stream:error/> without a defined condition"))?;
        let mut error = Self::new(condition, Some(text))?;
        error.details = details;
        Ok(error)
    }

    /// Render with the `stream:` prefix, as it appears inside an open stream.
    pub fn to_xml(&self) -> String {
        let stream = XmlEnvironment::new(Some(ns::STREAM), None);
        let mut xml = XmlStringBuilder::open("stream:error", ns::STREAM, None, &stream);
        xml.right_angle_bracket();

        let condition = self.condition.as_str();
        xml.half_open_element(condition).xmlns_attribute(ns::STREAMS);
        match self.condition_text {
            Some(ref text) => {
                xml.right_angle_bracket().escape(text).close_element(condition);
            }
            None => {
                xml.close_empty_element();
            }
        }

        self.details.write_texts_and_extensions(&mut xml);
        xml.close();
        xml.into_string()
    }
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.condition)?;
        if let Some(ref text) = self.condition_text {
            write!(f, " ({})", text)?;
        }
        if let Some(text) = self.descriptive_text() {
            write!(f, " [{}]", text)?;
        }
        Ok(())
    }
}

impl std::error::Error for StreamError {}
