//! The client session: owns the connection surface and the managers built
//! on top of it.

use std::sync::Arc;

use minidom::Element;
use tracing::info;
use waddle_stanza::Stanza;

use crate::config::SessionConfig;
use crate::connection::{Connection, StanzaTransport};
use crate::error::DiscoError;
use crate::manager::ServiceDiscoveryManager;

/// One XMPP session.
///
/// The discovery manager lives exactly as long as the session; there is no
/// process-wide registry to look it up from.
#[derive(Debug)]
pub struct Session {
    config: SessionConfig,
    connection: Arc<Connection>,
    service_discovery: Arc<ServiceDiscoveryManager>,
}

impl Session {
    pub fn new(transport: Arc<dyn StanzaTransport>, config: SessionConfig) -> Result<Self, DiscoError> {
        let connection = Arc::new(Connection::new(transport, config.reply_timeout()));
        let service_discovery = ServiceDiscoveryManager::new(connection.clone(), &config)?;
        info!(
            service_domain = %config.service_domain,
            identity = ?service_discovery.identity(),
            "Session started"
        );
        Ok(Self {
            config,
            connection,
            service_discovery,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    /// The session's Service Discovery manager.
    pub fn service_discovery(&self) -> &Arc<ServiceDiscoveryManager> {
        &self.service_discovery
    }

    /// Feed an inbound element from the stream.
    pub async fn receive(&self, element: &Element) -> Result<(), DiscoError> {
        self.connection.receive(element).await
    }

    /// Feed an already parsed inbound stanza.
    pub async fn handle_inbound(&self, stanza: Stanza) -> Result<(), DiscoError> {
        self.connection.handle_inbound(stanza).await
    }

    /// Close the session; waiting discovery calls fail with
    /// [`DiscoError::NotConnected`].
    pub fn close(&self) {
        self.connection.close();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.connection.close();
    }
}
