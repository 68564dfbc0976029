//! Test utilities for service discovery.
//!
//! Provides an in-memory transport that records outbound stanzas and can
//! answer IQ requests on behalf of a simulated peer.

use std::sync::{Arc, OnceLock, Weak};

use async_trait::async_trait;
use tokio::sync::mpsc;
use waddle_disco::{Connection, DiscoError, Session, SessionConfig, StanzaTransport};
use waddle_stanza::{Iq, Stanza};

type Responder = Box<dyn Fn(&Iq) -> Iq + Send + Sync>;

/// Transport that hands every outbound stanza to the test.
///
/// With a responder, IQ requests are also answered right away by feeding
/// the responder's reply back into the connection.
pub struct MockTransport {
    sent: mpsc::UnboundedSender<Stanza>,
    responder: Option<Responder>,
    connection: OnceLock<Weak<Connection>>,
}

impl MockTransport {
    /// A transport that only records.
    pub fn recording() -> (Arc<Self>, mpsc::UnboundedReceiver<Stanza>) {
        Self::build(None)
    }

    /// A transport whose peer answers every request with `responder`.
    pub fn echoing<F>(responder: F) -> (Arc<Self>, mpsc::UnboundedReceiver<Stanza>)
    where
        F: Fn(&Iq) -> Iq + Send + Sync + 'static,
    {
        Self::build(Some(Box::new(responder)))
    }

    fn build(responder: Option<Responder>) -> (Arc<Self>, mpsc::UnboundedReceiver<Stanza>) {
        let (sent, rx) = mpsc::unbounded_channel();
        let transport = Self {
            sent,
            responder,
            connection: OnceLock::new(),
        };
        (Arc::new(transport), rx)
    }

    /// Route replies into `session`'s connection.
    pub fn attach(&self, session: &Session) {
        let _ = self.connection.set(Arc::downgrade(session.connection()));
    }
}

#[async_trait]
impl StanzaTransport for MockTransport {
    async fn send(&self, stanza: Stanza) -> Result<(), DiscoError> {
        let reply = match (&stanza, &self.responder) {
            (Stanza::Iq(iq), Some(responder)) if iq.is_request() => Some(responder(iq)),
            _ => None,
        };
        let _ = self.sent.send(stanza);

        if let Some(reply) = reply {
            let connection = self
                .connection
                .get()
                .and_then(Weak::upgrade)
                .ok_or(DiscoError::NotConnected)?;
            connection.handle_inbound(reply.into()).await?;
        }
        Ok(())
    }
}

/// Test session configuration for `example.com`.
pub fn test_config() -> SessionConfig {
    SessionConfig {
        reply_timeout_ms: 2000,
        service_domain: "example.com".into(),
        ..SessionConfig::default()
    }
}

/// A session over `transport`, with replies routed back into it.
pub fn session(transport: Arc<MockTransport>) -> Session {
    let session = Session::new(transport.clone(), test_config()).expect("valid test config");
    transport.attach(&session);
    session
}
