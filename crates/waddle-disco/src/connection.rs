//! Per-session connection surface.
//!
//! Wire I/O belongs to a [`StanzaTransport`]; the [`Connection`] sits on top
//! of it and provides what discovery needs:
//! - request/response correlation by stanza id, bounded by a reply timeout
//! - dispatch of inbound `get`/`set` IQs to handlers registered per
//!   (payload QName, IQ type)
//! - `service-unavailable` answers for requests nobody handles

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use minidom::Element;
use tokio::sync::oneshot;
use tracing::{debug, warn};
use waddle_stanza::{
    IdSeed, Iq, IqType, ProviderRegistry, QName, Stanza, StanzaError, StanzaErrorCondition,
    StanzaIdSource, StanzaView, StandardStanzaIdSource, XmppError,
};

use crate::error::DiscoError;

/// Sends stanzas to the server.
///
/// Implemented by the stream layer; inbound stanzas travel the other way
/// through [`Connection::handle_inbound`].
#[async_trait]
pub trait StanzaTransport: Send + Sync {
    async fn send(&self, stanza: Stanza) -> Result<(), DiscoError>;
}

/// Answers inbound IQ requests of one (QName, type) pair.
///
/// Called on the task that delivers the inbound stanza; the returned IQ is
/// sent back as the response.
pub trait IqRequestHandler: Send + Sync {
    fn handle_iq_request(&self, request: &Iq) -> Result<Iq, XmppError>;
}

type HandlerKey = (QName, IqType);

/// Connection state shared by the session and its managers.
pub struct Connection {
    transport: Arc<dyn StanzaTransport>,
    connected: AtomicBool,
    reply_timeout: Duration,
    id_source: Arc<dyn StanzaIdSource>,
    providers: ProviderRegistry,
    /// Outstanding requests by stanza id
    pending: DashMap<String, oneshot::Sender<Iq>>,
    handlers: DashMap<HandlerKey, Arc<dyn IqRequestHandler>>,
}

impl Connection {
    pub fn new(transport: Arc<dyn StanzaTransport>, reply_timeout: Duration) -> Self {
        let mut providers = ProviderRegistry::default();
        crate::register_providers(&mut providers);
        Self {
            transport,
            connected: AtomicBool::new(true),
            reply_timeout,
            id_source: Arc::new(StandardStanzaIdSource::new()),
            providers,
            pending: DashMap::new(),
            handlers: DashMap::new(),
        }
    }

    /// Replace the source outbound request ids are drawn from.
    pub fn with_id_source(mut self, id_source: Arc<dyn StanzaIdSource>) -> Self {
        self.id_source = id_source;
        self
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn reply_timeout(&self) -> Duration {
        self.reply_timeout
    }

    /// Id seed for a new outbound stanza.
    pub fn next_id(&self) -> IdSeed {
        IdSeed::Source(self.id_source.clone())
    }

    /// Registry inbound elements are parsed with.
    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    /// Route inbound `iq_type` requests whose payload is `qname` to
    /// `handler`. Returns the handler previously registered for the pair.
    pub fn register_iq_request_handler(
        &self,
        qname: QName,
        iq_type: IqType,
        handler: Arc<dyn IqRequestHandler>,
    ) -> Option<Arc<dyn IqRequestHandler>> {
        debug!(qname = %qname, iq_type = %iq_type, "Registered IQ request handler");
        self.handlers.insert((qname, iq_type), handler)
    }

    pub fn unregister_iq_request_handler(
        &self,
        qname: &QName,
        iq_type: IqType,
    ) -> Option<Arc<dyn IqRequestHandler>> {
        self.handlers
            .remove(&(qname.clone(), iq_type))
            .map(|(_, handler)| handler)
    }

    /// Unregister `handler` only while it is still the one registered for
    /// `(qname, iq_type)`.
    pub fn unregister_iq_request_handler_if(
        &self,
        qname: &QName,
        iq_type: IqType,
        handler: &Arc<dyn IqRequestHandler>,
    ) -> bool {
        self.handlers
            .remove_if(&(qname.clone(), iq_type), |_, registered| {
                Arc::ptr_eq(registered, handler)
            })
            .is_some()
    }

    /// Send a stanza that expects no reply.
    pub async fn send(&self, stanza: Stanza) -> Result<(), DiscoError> {
        if !self.is_connected() {
            return Err(DiscoError::NotConnected);
        }
        self.transport.send(stanza).await
    }

    /// Send an IQ request and wait for the response with the same id.
    ///
    /// A `result` is returned as-is; an `error` response becomes
    /// [`DiscoError::ErrorResponse`]. Fails with [`DiscoError::NoResponse`]
    /// once the reply timeout elapses and with [`DiscoError::NotConnected`]
    /// if the connection closes while waiting.
    pub async fn send_iq_request(&self, request: Iq) -> Result<Iq, DiscoError> {
        if !request.is_request() {
            return Err(DiscoError::InvalidArgument(format!(
                "'{}' IQ is not a request",
                request.iq_type()
            )));
        }
        let id = request
            .stanza_id()
            .ok_or(XmppError::MissingStanzaId)?
            .to_string();

        let (tx, rx) = oneshot::channel();
        self.pending.insert(id.clone(), tx);
        debug!(id = %id, to = ?request.to(), "Sending IQ request");

        if let Err(e) = self.send(Stanza::Iq(request)).await {
            self.pending.remove(&id);
            return Err(e);
        }

        let response = match tokio::time::timeout(self.reply_timeout, rx).await {
            Ok(Ok(response)) => response,
            // Sender dropped: the connection closed underneath us.
            Ok(Err(_)) => return Err(DiscoError::NotConnected),
            Err(_) => {
                self.pending.remove(&id);
                debug!(id = %id, "IQ request timed out");
                return Err(DiscoError::NoResponse {
                    timeout: self.reply_timeout,
                });
            }
        };

        match response.iq_type() {
            IqType::Result => Ok(response),
            IqType::Error => match response.error() {
                Some(error) => Err(DiscoError::ErrorResponse(error.clone())),
                None => Err(DiscoError::unexpected("error IQ without stanza error")),
            },
            other => Err(DiscoError::unexpected(format!(
                "'{}' IQ in response to request {}",
                other, id
            ))),
        }
    }

    /// Parse an inbound element and process it.
    pub async fn receive(&self, element: &Element) -> Result<(), DiscoError> {
        let stanza = self.providers.parse_stanza(element)?;
        self.handle_inbound(stanza).await
    }

    /// Process an inbound stanza: complete a waiting request or answer an
    /// IQ request. Other stanzas are ignored here.
    pub async fn handle_inbound(&self, stanza: Stanza) -> Result<(), DiscoError> {
        let iq = match stanza {
            Stanza::Iq(iq) => iq,
            other => {
                debug!(kind = other.element_name(), "Ignoring inbound stanza");
                return Ok(());
            }
        };

        if iq.is_response() {
            self.complete_request(iq);
            return Ok(());
        }

        let response = self.answer_request(&iq)?;
        self.send(Stanza::Iq(response)).await
    }

    fn complete_request(&self, response: Iq) {
        let Some(id) = response.stanza_id().map(str::to_string) else {
            debug!("Dropping response without id");
            return;
        };
        match self.pending.remove(&id) {
            Some((_, tx)) => {
                debug!(id = %id, iq_type = %response.iq_type(), "Correlated IQ response");
                // The waiter may have timed out in the meantime.
                let _ = tx.send(response);
            }
            None => debug!(id = %id, "No pending request for IQ response"),
        }
    }

    fn answer_request(&self, request: &Iq) -> Result<Iq, XmppError> {
        let handler = request.child_qname().and_then(|qname| {
            self.handlers
                .get(&(qname, request.iq_type()))
                .map(|entry| entry.value().clone())
        });

        let Some(handler) = handler else {
            debug!(
                id = ?request.stanza_id(),
                payload = ?request.child_qname().map(|q| q.to_string()),
                "No handler for IQ request"
            );
            return error_reply(request, StanzaErrorCondition::ServiceUnavailable);
        };

        match handler.handle_iq_request(request) {
            Ok(response) => Ok(response),
            Err(e) => {
                warn!(error = %e, id = ?request.stanza_id(), "IQ request handler failed");
                error_reply(request, StanzaErrorCondition::InternalServerError)
            }
        }
    }

    /// Close the connection. Requests still waiting fail with
    /// [`DiscoError::NotConnected`].
    pub fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);
        let pending = self.pending.len();
        self.pending.clear();
        debug!(pending, "Connection closed");
    }

    /// Number of requests waiting for a response.
    pub fn pending_requests(&self) -> usize {
        self.pending.len()
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("connected", &self.is_connected())
            .field("reply_timeout", &self.reply_timeout)
            .field("pending", &self.pending.len())
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

/// An `error` response to `request` carrying `condition`.
pub(crate) fn error_reply(request: &Iq, condition: StanzaErrorCondition) -> Result<Iq, XmppError> {
    let error = StanzaError::builder(condition).build()?;
    Iq::error_response(request, error)
}
