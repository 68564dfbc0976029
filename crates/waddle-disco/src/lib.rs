//! Waddle Service Discovery.
//!
//! XEP-0030 Service Discovery for the Waddle client stack, built on the
//! `waddle-stanza` model:
//! - disco#info and disco#items payloads, with XEP-0128 extended
//!   information forms
//! - the per-session [`ServiceDiscoveryManager`], which answers inbound
//!   queries and performs outbound ones
//! - XEP-0115 entity capabilities versions
//! - the [`Connection`] surface that correlates IQ requests with their
//!   responses
//!
//! A [`Session`] owns the connection and its discovery manager.

pub mod caps;
pub mod config;
pub mod connection;
pub mod data_form;
pub mod error;
pub mod info;
pub mod items;
pub mod manager;
pub mod session;

pub use caps::{compute_caps_hash, Caps, EntityCapabilitiesChangedListener, NS_CAPS};
pub use config::{IdentityConfig, SessionConfig};
pub use connection::{Connection, IqRequestHandler, StanzaTransport};
pub use data_form::{DataForm, FormField, FormKind, DATA_FORMS_NS};
pub use error::DiscoError;
pub use info::{DiscoverInfo, Feature, Identity, DISCO_INFO_NS};
pub use items::{DiscoverItems, Item, ItemAction, DISCO_ITEMS_NS};
pub use manager::{NodeInformationProvider, ServiceDiscoveryManager, ServiceInfo};
pub use session::Session;

use std::sync::Arc;

use waddle_stanza::{ProviderRegistry, QName, SharedExtension};

/// Register the deserializers of this crate's extension elements.
pub fn register_providers(registry: &mut ProviderRegistry) {
    registry.register(QName::new(DISCO_INFO_NS, "query"), DiscoverInfo::provide);
    registry.register(QName::new(DISCO_ITEMS_NS, "query"), DiscoverItems::provide);
    registry.register(QName::new(NS_CAPS, "c"), Caps::provide);
    registry.register(QName::new(DATA_FORMS_NS, "x"), |element| {
        let form: SharedExtension = Arc::new(DataForm::from_element(element)?);
        Ok(form)
    });
}
