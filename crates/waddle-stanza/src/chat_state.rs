//! XEP-0085: Chat State Notifications.

use std::fmt;
use std::str::FromStr;

use crate::error::XmppError;
use crate::extension::ExtensionElement;
use crate::ns;
use crate::xml::{XmlEnvironment, XmlStringBuilder};

/// A chat state marker; the state is the element name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChatState {
    Active,
    Composing,
    Paused,
    Inactive,
    Gone,
}

impl ChatState {
    pub const ALL: [ChatState; 5] = [
        Self::Active,
        Self::Composing,
        Self::Paused,
        Self::Inactive,
        Self::Gone,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Composing => "composing",
            Self::Paused => "paused",
            Self::Inactive => "inactive",
            Self::Gone => "gone",
        }
    }
}

impl fmt::Display for ChatState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChatState {
    type Err = XmppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| XmppError::parse(format!("unknown chat state: {}", s)))
    }
}

impl ExtensionElement for ChatState {
    fn element_name(&self) -> &str {
        self.as_str()
    }

    fn namespace(&self) -> &str {
        ns::CHAT_STATES
    }

    fn to_xml(&self, enclosing: &XmlEnvironment) -> XmlStringBuilder {
        let mut xml = XmlStringBuilder::open(self.as_str(), ns::CHAT_STATES, None, enclosing);
        xml.close_empty_element();
        xml
    }
}
