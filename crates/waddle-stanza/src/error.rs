//! Error types for the stanza model.

use thiserror::Error;

/// Failures raised while building or deriving stanzas.
///
/// Every variant is a local, immediate failure: either an invariant of the
/// value being constructed was violated or a protocol precondition did not
/// hold at the call site.
#[derive(Debug, Error)]
pub enum XmppError {
    /// A condition text was supplied for a condition that does not carry one
    #[error("condition '{condition}' does not allow a condition text")]
    ConditionTextNotAllowed {
        /// The offending condition
        condition: String,
    },

    /// Second subject/body for the same language
    #[error("message already has a {element} for language {}", display_lang(.language))]
    DuplicateLanguage {
        /// `subject` or `body`
        element: &'static str,
        /// Language of the duplicate, `None` for no language
        language: Option<String>,
    },

    /// Presence priority outside -128..=127
    #[error("presence priority {0} is outside the range -128..=127")]
    PriorityOutOfRange(i32),

    /// A stanza id was set to the empty string
    #[error("stanza id must not be empty")]
    EmptyStanzaId,

    /// The stanza needs an id but neither an id nor an id source is set
    #[error("stanza has neither an id nor an id source")]
    MissingStanzaId,

    /// A response was requested for an IQ that is not a request
    #[error("IQ of type '{iq_type}' is not a request")]
    NotARequest {
        /// The actual IQ type
        iq_type: String,
    },

    /// An error stanza was built without its stanza error
    #[error("error stanza requires a stanza error")]
    MissingStanzaError,

    /// Malformed XMPP address
    #[error("invalid address: {0}")]
    InvalidAddress(#[from] jid::Error),

    /// Unknown error condition name
    #[error("unknown error condition: {0}")]
    UnknownCondition(String),

    /// Unknown value for a `type` attribute
    #[error("unknown {kind} type: {value}")]
    UnknownType {
        /// What was being parsed (`iq`, `message`, `error`, ...)
        kind: &'static str,
        /// The rejected value
        value: String,
    },

    /// Structural problem in inbound XML
    #[error("XML parse error: {0}")]
    Parse(String),
}

impl XmppError {
    /// Create a new XML parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub(crate) fn unknown_type(kind: &'static str, value: impl Into<String>) -> Self {
        Self::UnknownType {
            kind,
            value: value.into(),
        }
    }
}

fn display_lang(language: &Option<String>) -> String {
    match language {
        Some(lang) => format!("'{}'", lang),
        None => "(none)".to_string(),
    }
}
