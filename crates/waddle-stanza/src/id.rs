//! Stanza id generation.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

/// Produces fresh stanza ids.
pub trait StanzaIdSource: Debug + Send + Sync {
    fn next_id(&self) -> String;
}

/// Random per-source prefix followed by a counter: `a1b2c-0`, `a1b2c-1`, ...
///
/// Cheap to call and unique within the process as long as prefixes don't
/// collide.
#[derive(Debug)]
pub struct StandardStanzaIdSource {
    prefix: String,
    counter: AtomicU64,
}

impl StandardStanzaIdSource {
    pub fn new() -> Self {
        let mut prefix = Uuid::new_v4().simple().to_string();
        prefix.truncate(5);
        Self::with_prefix(prefix)
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: AtomicU64::new(0),
        }
    }
}

impl Default for StandardStanzaIdSource {
    fn default() -> Self {
        Self::new()
    }
}

impl StanzaIdSource for StandardStanzaIdSource {
    fn next_id(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("{}-{}", self.prefix, n)
    }
}

/// Random v4 UUIDs.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidStanzaIdSource;

impl StanzaIdSource for UuidStanzaIdSource {
    fn next_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}
