//! Stanza-level errors (RFC 6120 Section 8.3).
//!
//! A [`StanzaError`] is the `<error/>` child of an error stanza:
//! - a defined condition from the `urn:ietf:params:xml:ns:xmpp-stanzas`
//!   namespace, optionally carrying a condition text (`gone`, `redirect`)
//! - an error type, inferred from the condition when not given
//! - optional descriptive texts and application-specific extensions

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use minidom::Element;
use tracing::warn;

use crate::descriptive::ErrorDetails;
use crate::error::XmppError;
use crate::extension::{ExtensionElement, SharedExtension, StandardExtensionElement};
use crate::ns;
use crate::xml::{XmlEnvironment, XmlStringBuilder};

/// XMPP stanza error conditions (RFC 6120 Section 8.3.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StanzaErrorCondition {
    /// Bad request (malformed XML, etc.)
    BadRequest,
    /// Conflict (e.g., resource already bound)
    Conflict,
    /// Feature not implemented
    FeatureNotImplemented,
    /// Forbidden (permission denied)
    Forbidden,
    /// Gone (entity no longer available); may carry the new address
    Gone,
    /// Internal server error
    InternalServerError,
    /// Item not found
    ItemNotFound,
    /// JID malformed
    JidMalformed,
    /// Not acceptable
    NotAcceptable,
    /// Not allowed
    NotAllowed,
    /// Not authorized
    NotAuthorized,
    /// Policy violation
    PolicyViolation,
    /// Recipient unavailable
    RecipientUnavailable,
    /// Redirect; may carry the alternate address
    Redirect,
    /// Registration required
    RegistrationRequired,
    /// Remote server not found
    RemoteServerNotFound,
    /// Remote server timeout
    RemoteServerTimeout,
    /// Resource constraint
    ResourceConstraint,
    /// Service unavailable
    ServiceUnavailable,
    /// Subscription required
    SubscriptionRequired,
    /// Undefined condition
    UndefinedCondition,
    /// Unexpected request
    UnexpectedRequest,
}

impl StanzaErrorCondition {
    /// Every defined condition, in RFC order.
    pub const ALL: [StanzaErrorCondition; 22] = [
        Self::BadRequest,
        Self::Conflict,
        Self::FeatureNotImplemented,
        Self::Forbidden,
        Self::Gone,
        Self::InternalServerError,
        Self::ItemNotFound,
        Self::JidMalformed,
        Self::NotAcceptable,
        Self::NotAllowed,
        Self::NotAuthorized,
        Self::PolicyViolation,
        Self::RecipientUnavailable,
        Self::Redirect,
        Self::RegistrationRequired,
        Self::RemoteServerNotFound,
        Self::RemoteServerTimeout,
        Self::ResourceConstraint,
        Self::ServiceUnavailable,
        Self::SubscriptionRequired,
        Self::UndefinedCondition,
        Self::UnexpectedRequest,
    ];

    /// Get the element name for this condition.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BadRequest => "bad-request",
            Self::Conflict => "conflict",
            Self::FeatureNotImplemented => "feature-not-implemented",
            Self::Forbidden => "forbidden",
            Self::Gone => "gone",
            Self::InternalServerError => "internal-server-error",
            Self::ItemNotFound => "item-not-found",
            Self::JidMalformed => "jid-malformed",
            Self::NotAcceptable => "not-acceptable",
            Self::NotAllowed => "not-allowed",
            Self::NotAuthorized => "not-authorized",
            Self::PolicyViolation => "policy-violation",
            Self::RecipientUnavailable => "recipient-unavailable",
            Self::Redirect => "redirect",
            Self::RegistrationRequired => "registration-required",
            Self::RemoteServerNotFound => "remote-server-not-found",
            Self::RemoteServerTimeout => "remote-server-timeout",
            Self::ResourceConstraint => "resource-constraint",
            Self::ServiceUnavailable => "service-unavailable",
            Self::SubscriptionRequired => "subscription-required",
            Self::UndefinedCondition => "undefined-condition",
            Self::UnexpectedRequest => "unexpected-request",
        }
    }

    /// Only `gone` and `redirect` carry character data (an address).
    pub fn allows_condition_text(&self) -> bool {
        matches!(self, Self::Gone | Self::Redirect)
    }
}

impl fmt::Display for StanzaErrorCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for StanzaErrorCondition {
    type Err = XmppError;

    /// Accepts the element name; underscores are read as hyphens.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.replace('_', "-");
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == name)
            .ok_or_else(|| XmppError::UnknownCondition(s.to_string()))
    }
}

/// XMPP stanza error types (RFC 6120 Section 8.3.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StanzaErrorType {
    /// Retry after waiting (temporary error)
    Wait,
    /// Do not retry (unrecoverable error)
    Cancel,
    /// Retry after changing the data sent
    Modify,
    /// Retry after providing credentials
    Auth,
    /// Proceed (the condition was only a warning)
    Continue,
}

impl StanzaErrorType {
    /// Get the type attribute value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Wait => "wait",
            Self::Cancel => "cancel",
            Self::Modify => "modify",
            Self::Auth => "auth",
            Self::Continue => "continue",
        }
    }
}

impl fmt::Display for StanzaErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for StanzaErrorType {
    type Err = XmppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "wait" => Ok(Self::Wait),
            "cancel" => Ok(Self::Cancel),
            "modify" => Ok(Self::Modify),
            "auth" => Ok(Self::Auth),
            "continue" => Ok(Self::Continue),
            _ => Err(XmppError::unknown_type("error", s)),
        }
    }
}

/// Default error type per condition.
///
/// [`Default`] gives the full RFC 6120 table. A table may be incomplete:
/// conditions it lacks resolve to [`StanzaErrorType::Cancel`] with a warning.
#[derive(Debug, Clone)]
pub struct ConditionTypeTable {
    types: HashMap<StanzaErrorCondition, StanzaErrorType>,
}

impl ConditionTypeTable {
    /// A table with no entries.
    pub fn empty() -> Self {
        Self {
            types: HashMap::new(),
        }
    }

    /// Add or replace the type for `condition`.
    pub fn with(mut self, condition: StanzaErrorCondition, error_type: StanzaErrorType) -> Self {
        self.types.insert(condition, error_type);
        self
    }

    pub fn get(&self, condition: StanzaErrorCondition) -> Option<StanzaErrorType> {
        self.types.get(&condition).copied()
    }

    /// The table's type for `condition`, or `Cancel` if it has none.
    pub fn resolve(&self, condition: StanzaErrorCondition) -> StanzaErrorType {
        match self.get(condition) {
            Some(error_type) => error_type,
            None => {
                warn!(condition = %condition, "Could not determine type for condition, using cancel");
                StanzaErrorType::Cancel
            }
        }
    }
}

impl Default for ConditionTypeTable {
    fn default() -> Self {
        use StanzaErrorCondition as C;
        use StanzaErrorType as T;

        Self::empty()
            .with(C::BadRequest, T::Modify)
            .with(C::Conflict, T::Cancel)
            .with(C::FeatureNotImplemented, T::Cancel)
            .with(C::Forbidden, T::Auth)
            .with(C::Gone, T::Cancel)
            .with(C::InternalServerError, T::Cancel)
            .with(C::ItemNotFound, T::Cancel)
            .with(C::JidMalformed, T::Modify)
            .with(C::NotAcceptable, T::Modify)
            .with(C::NotAllowed, T::Cancel)
            .with(C::NotAuthorized, T::Auth)
            .with(C::PolicyViolation, T::Modify)
            .with(C::RecipientUnavailable, T::Wait)
            .with(C::Redirect, T::Modify)
            .with(C::RegistrationRequired, T::Auth)
            .with(C::RemoteServerNotFound, T::Cancel)
            .with(C::RemoteServerTimeout, T::Wait)
            .with(C::ResourceConstraint, T::Wait)
            .with(C::ServiceUnavailable, T::Cancel)
            .with(C::SubscriptionRequired, T::Auth)
            .with(C::UndefinedCondition, T::Modify)
            .with(C::UnexpectedRequest, T::Wait)
    }
}

/// The `<error/>` element of an error stanza.
#[derive(Debug, Clone)]
pub struct StanzaError {
    condition: StanzaErrorCondition,
    condition_text: Option<String>,
    error_generator: Option<String>,
    error_type: StanzaErrorType,
    details: ErrorDetails,
}

impl StanzaError {
    /// Start building an error with `condition`.
    pub fn builder(condition: StanzaErrorCondition) -> StanzaErrorBuilder {
        StanzaErrorBuilder {
            condition,
            condition_text: None,
            error_generator: None,
            error_type: None,
            details: ErrorDetails::new(ns::STANZAS),
        }
    }

    /// Builder for `condition` with an optional English descriptive text.
    pub fn from(condition: StanzaErrorCondition, text: Option<&str>) -> StanzaErrorBuilder {
        let builder = Self::builder(condition);
        match text {
            Some(text) => builder.set_descriptive_text(Some("en"), text),
            None => builder,
        }
    }

    /// Builder seeded with every field of `self`.
    pub fn to_builder(&self) -> StanzaErrorBuilder {
        StanzaErrorBuilder {
            condition: self.condition,
            condition_text: self.condition_text.clone(),
            error_generator: self.error_generator.clone(),
            error_type: Some(self.error_type),
            details: self.details.clone(),
        }
    }

    pub fn condition(&self) -> StanzaErrorCondition {
        self.condition
    }

    pub fn condition_text(&self) -> Option<&str> {
        self.condition_text.as_deref()
    }

    /// The entity that generated the error (`by` attribute).
    pub fn error_generator(&self) -> Option<&str> {
        self.error_generator.as_deref()
    }

    pub fn error_type(&self) -> StanzaErrorType {
        self.error_type
    }

    /// Descriptive text in the default language, else the language-less one.
    pub fn descriptive_text(&self) -> Option<&str> {
        self.details.descriptive_text()
    }

    pub fn descriptive_text_in(&self, language: &str) -> Option<&str> {
        self.details.descriptive_text_in(language)
    }

    pub fn descriptive_texts(&self) -> &BTreeMap<String, String> {
        self.details.descriptive_texts()
    }

    pub fn text_namespace(&self) -> Option<&str> {
        self.details.text_namespace()
    }

    /// Application-specific conditions and other extensions.
    pub fn extensions(&self) -> &[SharedExtension] {
        self.details.extensions()
    }

    pub fn extension(&self, name: &str, namespace: &str) -> Option<&SharedExtension> {
        self.details.extension(name, namespace)
    }

    /// Parse an `<error/>` element; unknown children become
    /// [`StandardExtensionElement`]s.
    pub fn from_element(element: &Element) -> Result<Self, XmppError> {
        Self::from_element_with(element, |child| {
            let extension: SharedExtension =
                Arc::new(StandardExtensionElement::from_element(child));
            Ok(extension)
        })
    }

    /// Parse an `<error/>` element, turning non-condition children into
    /// extensions with `parse_extension`.
    pub fn from_element_with<F>(element: &Element, parse_extension: F) -> Result<Self, XmppError>
    where
        F: Fn(&Element) -> Result<SharedExtension, XmppError>,
    {
        if element.name() != "error" {
            return Err(XmppError::parse(format!(
                "expected <error/>, found <{}/>",
                element.name()
            )));
        }

        let mut condition = None;
        let mut condition_text = None;
        let mut details = ErrorDetails::new(ns::STANZAS);

        for child in element.children() {
            if child.ns() == ns::STANZAS {
                if child.name() == "text" {
                    details.set_text(child.attr("xml:lang"), child.text());
                } else {
                    condition = Some(child.name().parse::<StanzaErrorCondition>()?);
                    condition_text = Some(child.text());
                }
            } else {
                details.add_extension(parse_extension(child)?);
            }
        }

        let condition =
            condition.ok_or_else(|| XmppError::parse("<error/> without a defined condition"))?;

        let mut builder = StanzaErrorBuilder {
            condition,
            condition_text,
            error_generator: element.attr("by").map(str::to_string),
            error_type: None,
            details,
        };
        if let Some(error_type) = element.attr("type") {
            builder = builder.set_type(error_type.parse()?);
        }
        builder.build()
    }
}

impl ExtensionElement for StanzaError {
    fn element_name(&self) -> &str {
        "error"
    }

    fn namespace(&self) -> &str {
        ns::JABBER_CLIENT
    }

    fn to_xml(&self, enclosing: &XmlEnvironment) -> XmlStringBuilder {
        let mut xml = XmlStringBuilder::open("error", ns::JABBER_CLIENT, None, enclosing);
        xml.attribute("type", self.error_type.as_str());
        xml.opt_attribute("by", self.error_generator.as_deref());
        xml.right_angle_bracket();

        let condition = self.condition.as_str();
        xml.half_open_element(condition).xmlns_attribute(ns::STANZAS);
        match self.condition_text {
            Some(ref text) => {
                xml.right_angle_bracket().escape(text).close_element(condition);
            }
            None => {
                xml.close_empty_element();
            }
        }

        self.details.write_texts_and_extensions(&mut xml);
        xml.close_element("error");
        xml
    }
}

/// `condition - type [text]. Generated by by`
impl fmt::Display for StanzaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.condition, self.error_type)?;
        if let Some(text) = self.descriptive_text() {
            write!(f, " [{}]", text)?;
        }
        if let Some(ref by) = self.error_generator {
            write!(f, ". Generated by {}", by)?;
        }
        Ok(())
    }
}

/// Accumulates a [`StanzaError`]; validation happens in [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct StanzaErrorBuilder {
    condition: StanzaErrorCondition,
    condition_text: Option<String>,
    error_generator: Option<String>,
    error_type: Option<StanzaErrorType>,
    details: ErrorDetails,
}

impl StanzaErrorBuilder {
    pub fn set_condition(mut self, condition: StanzaErrorCondition) -> Self {
        self.condition = condition;
        self
    }

    /// Explicit type; without it the type is looked up from the condition.
    pub fn set_type(mut self, error_type: StanzaErrorType) -> Self {
        self.error_type = Some(error_type);
        self
    }

    pub fn set_condition_text(mut self, text: impl Into<String>) -> Self {
        self.condition_text = Some(text.into());
        self
    }

    pub fn set_error_generator(mut self, by: impl Into<String>) -> Self {
        self.error_generator = Some(by.into());
        self
    }

    pub fn set_descriptive_text(mut self, language: Option<&str>, text: impl Into<String>) -> Self {
        self.details.set_text(language, text);
        self
    }

    /// Replace all descriptive texts; the empty key means no language.
    pub fn set_descriptive_texts(mut self, texts: BTreeMap<String, String>) -> Self {
        self.details.set_texts(texts);
        self
    }

    pub fn set_text_namespace(mut self, namespace: Option<String>) -> Self {
        self.details.set_text_namespace(namespace);
        self
    }

    pub fn add_extension(mut self, extension: SharedExtension) -> Self {
        self.details.add_extension(extension);
        self
    }

    pub fn set_extensions(mut self, extensions: Vec<SharedExtension>) -> Self {
        self.details.set_extensions(extensions);
        self
    }

    /// Build, resolving a missing type through the default table.
    pub fn build(self) -> Result<StanzaError, XmppError> {
        self.build_with(&ConditionTypeTable::default())
    }

    /// Build, resolving a missing type through `table`.
    ///
    /// An empty condition text counts as none. A non-empty one is rejected
    /// unless the condition allows it.
    pub fn build_with(self, table: &ConditionTypeTable) -> Result<StanzaError, XmppError> {
        let condition_text = self.condition_text.filter(|t| !t.is_empty());
        if condition_text.is_some() && !self.condition.allows_condition_text() {
            return Err(XmppError::ConditionTextNotAllowed {
                condition: self.condition.as_str().to_string(),
            });
        }

        let error_type = match self.error_type {
            Some(error_type) => error_type,
            None => table.resolve(self.condition),
        };

        Ok(StanzaError {
            condition: self.condition,
            condition_text,
            error_generator: self.error_generator,
            error_type,
            details: self.details,
        })
    }
}
