//! Session configuration.
//!
//! Loaded from the `[session]` table of a TOML file or built in code;
//! every field has a default, so an empty table is a valid configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::info::Identity;

/// Identity this entity advertises in disco#info responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Category (e.g., "client", "server")
    pub category: String,
    /// Type within the category (e.g., "pc", "bot")
    #[serde(rename = "type")]
    pub type_: String,
    /// Human-readable name
    pub name: Option<String>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            category: "client".into(),
            type_: "pc".into(),
            name: Some("Waddle".into()),
        }
    }
}

impl IdentityConfig {
    pub fn to_identity(&self) -> Identity {
        Identity::new(&self.category, &self.type_, self.name.as_deref())
    }
}

/// Per-session settings for the discovery stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// How long a discovery round-trip waits for the reply (milliseconds)
    pub reply_timeout_ms: u64,
    /// Domain of the server this session is connected to
    pub service_domain: String,
    /// Default identity of the local entity
    pub identity: IdentityConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reply_timeout_ms: 5000,
            service_domain: "localhost".into(),
            identity: IdentityConfig::default(),
        }
    }
}

impl SessionConfig {
    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }
}
