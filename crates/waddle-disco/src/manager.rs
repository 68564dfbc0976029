//! Service Discovery manager (XEP-0030).
//!
//! Answers inbound disco#info and disco#items queries from the registered
//! identities, features and node providers, and issues outbound discovery
//! queries.
//!
//! All registration state sits behind one mutex. Every mutation of the
//! identities, features or extended information renews the entity
//! capabilities version and notifies the registered
//! [`EntityCapabilitiesChangedListener`]s while that mutex is still held.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use jid::Jid;
use tracing::{debug, warn};
use waddle_stanza::{
    Iq, IqType, QName, StanzaBuilder, StanzaErrorCondition, StanzaView, XmppError,
};

use crate::caps::{compute_caps_hash, Caps, EntityCapabilitiesChangedListener};
use crate::config::SessionConfig;
use crate::connection::{error_reply, Connection, IqRequestHandler};
use crate::data_form::DataForm;
use crate::error::DiscoError;
use crate::info::{DiscoverInfo, Feature, Identity, DISCO_INFO_NS};
use crate::items::{DiscoverItems, Item, DISCO_ITEMS_NS};

/// Supplies disco information for a node that is not addressable by JID.
///
/// Every method defaults to "nothing", so providers implement only what
/// their node has.
pub trait NodeInformationProvider: Send + Sync {
    fn node_items(&self) -> Vec<Item> {
        Vec::new()
    }

    fn node_features(&self) -> Vec<Feature> {
        Vec::new()
    }

    fn node_identities(&self) -> Vec<Identity> {
        Vec::new()
    }

    /// Extended information forms of the node.
    fn node_forms(&self) -> Vec<DataForm> {
        Vec::new()
    }
}

/// An entity found by a service search, with the info it answered.
#[derive(Debug, Clone)]
pub struct ServiceInfo {
    pub jid: Jid,
    pub info: DiscoverInfo,
}

struct DiscoState {
    default_identity: Identity,
    /// Identities besides the default identity
    identities: BTreeSet<Identity>,
    features: BTreeSet<String>,
    extended_info: Option<DataForm>,
    node_providers: HashMap<String, Arc<dyn NodeInformationProvider>>,
    caps_listeners: Vec<Arc<dyn EntityCapabilitiesChangedListener>>,
}

/// Per-session Service Discovery manager.
///
/// Owned by the [`Session`](crate::Session); get it with
/// [`Session::service_discovery`](crate::Session::service_discovery).
pub struct ServiceDiscoveryManager {
    connection: Arc<Connection>,
    service_domain: Jid,
    state: Mutex<DiscoState>,
    info_handler: Arc<dyn IqRequestHandler>,
    items_handler: Arc<dyn IqRequestHandler>,
}

impl ServiceDiscoveryManager {
    /// Create the manager and install its disco#info and disco#items
    /// request handlers on `connection`.
    pub fn new(connection: Arc<Connection>, config: &SessionConfig) -> Result<Arc<Self>, DiscoError> {
        let service_domain: Jid = config.service_domain.parse()?;
        let features = [DISCO_INFO_NS, DISCO_ITEMS_NS]
            .into_iter()
            .map(str::to_string)
            .collect();

        let manager = Arc::new_cyclic(|weak: &Weak<Self>| Self {
            connection,
            service_domain,
            state: Mutex::new(DiscoState {
                default_identity: config.identity.to_identity(),
                identities: BTreeSet::new(),
                features,
                extended_info: None,
                node_providers: HashMap::new(),
                caps_listeners: Vec::new(),
            }),
            info_handler: Arc::new(InfoRequestHandler(weak.clone())),
            items_handler: Arc::new(ItemsRequestHandler(weak.clone())),
        });

        manager.connection.register_iq_request_handler(
            QName::new(DISCO_INFO_NS, "query"),
            IqType::Get,
            manager.info_handler.clone(),
        );
        manager.connection.register_iq_request_handler(
            QName::new(DISCO_ITEMS_NS, "query"),
            IqType::Get,
            manager.items_handler.clone(),
        );
        Ok(manager)
    }

    fn state(&self) -> MutexGuard<'_, DiscoState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    /// The domain of the server this session is connected to.
    pub fn service_domain(&self) -> &Jid {
        &self.service_domain
    }

    // Identities

    /// The default identity; always advertised and never removable.
    pub fn identity(&self) -> Identity {
        self.state().default_identity.clone()
    }

    /// Replace the default identity.
    pub fn set_identity(&self, identity: Identity) {
        let mut state = self.state();
        debug!(category = %identity.category, type_ = %identity.type_, "Setting default identity");
        state.identities.remove(&identity);
        state.default_identity = identity;
        self.renew_entity_caps(&state);
    }

    /// All advertised identities, the default identity first.
    pub fn identities(&self) -> Vec<Identity> {
        let state = self.state();
        std::iter::once(state.default_identity.clone())
            .chain(state.identities.iter().cloned())
            .collect()
    }

    pub fn add_identity(&self, identity: Identity) {
        let mut state = self.state();
        debug!(category = %identity.category, type_ = %identity.type_, "Adding identity");
        state.identities.insert(identity);
        self.renew_entity_caps(&state);
    }

    /// Remove an identity. The default identity cannot be removed; returns
    /// whether an identity was removed.
    pub fn remove_identity(&self, identity: &Identity) -> bool {
        let mut state = self.state();
        if *identity == state.default_identity {
            return false;
        }
        let removed = state.identities.remove(identity);
        if removed {
            self.renew_entity_caps(&state);
        }
        removed
    }

    pub fn has_identity(&self, category: &str, type_: &str) -> bool {
        let state = self.state();
        state.default_identity.is_of(category, type_)
            || state.identities.iter().any(|i| i.is_of(category, type_))
    }

    // Features

    pub fn add_feature(&self, feature: impl Into<String>) {
        let feature = feature.into();
        let mut state = self.state();
        debug!(feature = %feature, "Adding feature");
        state.features.insert(feature);
        self.renew_entity_caps(&state);
    }

    pub fn remove_feature(&self, feature: &str) -> bool {
        let mut state = self.state();
        let removed = state.features.remove(feature);
        if removed {
            debug!(feature = %feature, "Removed feature");
            self.renew_entity_caps(&state);
        }
        removed
    }

    /// Advertised features, sorted.
    pub fn features(&self) -> Vec<String> {
        self.state().features.iter().cloned().collect()
    }

    pub fn includes_feature(&self, feature: &str) -> bool {
        self.state().features.contains(feature)
    }

    // Extended information (XEP-0128)

    pub fn set_extended_info(&self, form: DataForm) {
        let mut state = self.state();
        state.extended_info = Some(form);
        self.renew_entity_caps(&state);
    }

    pub fn remove_extended_info(&self) {
        let mut state = self.state();
        if state.extended_info.take().is_some() {
            self.renew_entity_caps(&state);
        }
    }

    pub fn extended_info(&self) -> Option<DataForm> {
        self.state().extended_info.clone()
    }

    // Nodes

    /// Answer queries for `node` from `provider`, replacing an earlier
    /// provider of the same node.
    pub fn set_node_information_provider(
        &self,
        node: impl Into<String>,
        provider: Arc<dyn NodeInformationProvider>,
    ) {
        let node = node.into();
        debug!(node = %node, "Registered node information provider");
        self.state().node_providers.insert(node, provider);
    }

    pub fn remove_node_information_provider(&self, node: &str) -> bool {
        self.state().node_providers.remove(node).is_some()
    }

    fn node_provider(&self, node: &str) -> Option<Arc<dyn NodeInformationProvider>> {
        self.state().node_providers.get(node).cloned()
    }

    // Entity capabilities

    pub fn add_entity_capabilities_listener(
        &self,
        listener: Arc<dyn EntityCapabilitiesChangedListener>,
    ) {
        self.state().caps_listeners.push(listener);
    }

    /// The info this entity answers a node-less disco#info query with.
    pub fn own_discover_info(&self) -> DiscoverInfo {
        self.info_from_state(&self.state())
    }

    /// Current entity capabilities version.
    pub fn entity_caps_ver(&self) -> String {
        compute_caps_hash(&self.own_discover_info())
    }

    /// The `<c/>` element advertising the current capabilities under
    /// `node`, for outbound presence.
    pub fn caps(&self, node: &str) -> Caps {
        Caps::for_info(node, &self.own_discover_info())
    }

    fn info_from_state(&self, state: &DiscoState) -> DiscoverInfo {
        let mut info = DiscoverInfo::new()
            .add_identity(state.default_identity.clone())
            .add_identities(state.identities.iter().cloned())
            .add_features(state.features.iter().map(String::as_str));
        if let Some(ref form) = state.extended_info {
            info = info.add_form(form.clone());
        }
        info
    }

    fn renew_entity_caps(&self, state: &DiscoState) {
        if state.caps_listeners.is_empty() {
            return;
        }
        let ver = compute_caps_hash(&self.info_from_state(state));
        debug!(ver = %ver, "Entity capabilities changed");
        for listener in &state.caps_listeners {
            listener.on_entity_capabilities_changed(&ver);
        }
    }

    // Inbound queries

    /// Info for a local node; `None` means the entity itself. `None` is
    /// returned for a node nobody provides.
    pub fn local_info(&self, node: Option<&str>) -> Option<DiscoverInfo> {
        let Some(node) = node else {
            return Some(self.own_discover_info());
        };
        let provider = self.node_provider(node)?;
        let mut info = DiscoverInfo::query(Some(node))
            .add_identities(provider.node_identities())
            .add_features(provider.node_features());
        for form in provider.node_forms() {
            info = info.add_form(form);
        }
        Some(info)
    }

    /// Items of a local node; the entity itself has none.
    pub fn local_items(&self, node: Option<&str>) -> Option<DiscoverItems> {
        let Some(node) = node else {
            return Some(DiscoverItems::new());
        };
        let provider = self.node_provider(node)?;
        Some(DiscoverItems::query(Some(node)).add_items(provider.node_items()))
    }

    fn handle_info_request(&self, request: &Iq) -> Result<Iq, XmppError> {
        let Some(query) = request.payload().and_then(|p| DiscoverInfo::from_payload(p).ok()) else {
            return error_reply(request, StanzaErrorCondition::BadRequest);
        };
        debug!(from = ?request.from(), node = ?query.node(), "Received disco#info query");

        match self.local_info(query.node()) {
            Some(info) => Iq::create_response(request)?
                .set_payload(info.with_node(query.node()))
                .build(),
            None => {
                debug!(node = ?query.node(), "disco#info query for unknown node");
                error_reply(request, StanzaErrorCondition::ItemNotFound)
            }
        }
    }

    fn handle_items_request(&self, request: &Iq) -> Result<Iq, XmppError> {
        let Some(query) = request.payload().and_then(|p| DiscoverItems::from_payload(p).ok()) else {
            return error_reply(request, StanzaErrorCondition::BadRequest);
        };
        debug!(from = ?request.from(), node = ?query.node(), "Received disco#items query");

        match self.local_items(query.node()) {
            Some(items) => Iq::create_response(request)?
                .set_payload(items.with_node(query.node()))
                .build(),
            None => {
                debug!(node = ?query.node(), "disco#items query for unknown node");
                error_reply(request, StanzaErrorCondition::ItemNotFound)
            }
        }
    }

    // Outbound queries

    /// Query `entity` (optionally one of its nodes) for disco#info and wait
    /// for the answer.
    pub async fn discover_info(
        &self,
        entity: &Jid,
        node: Option<&str>,
    ) -> Result<DiscoverInfo, DiscoError> {
        let request = Iq::get(DiscoverInfo::query(node), self.connection.next_id())
            .to(entity.clone())
            .require_stanza_id()?
            .build()?;
        let response = self.connection.send_iq_request(request).await?;
        let payload = response
            .payload()
            .ok_or_else(|| DiscoError::unexpected("disco#info result without query"))?;
        DiscoverInfo::from_payload(payload)
    }

    /// Query `entity` (optionally one of its nodes) for disco#items and wait
    /// for the answer.
    pub async fn discover_items(
        &self,
        entity: &Jid,
        node: Option<&str>,
    ) -> Result<DiscoverItems, DiscoError> {
        let request = Iq::get(DiscoverItems::query(node), self.connection.next_id())
            .to(entity.clone())
            .require_stanza_id()?
            .build()?;
        let response = self.connection.send_iq_request(request).await?;
        let payload = response
            .payload()
            .ok_or_else(|| DiscoError::unexpected("disco#items result without query"))?;
        DiscoverItems::from_payload(payload)
    }

    /// Publish `items` to `node` of `entity` and wait for the result.
    pub async fn publish_items(
        &self,
        entity: &Jid,
        node: Option<&str>,
        items: DiscoverItems,
    ) -> Result<(), DiscoError> {
        let request = Iq::set(items.with_node(node), self.connection.next_id())
            .to(entity.clone())
            .require_stanza_id()?
            .build()?;
        self.connection.send_iq_request(request).await?;
        Ok(())
    }

    /// Whether `entity` advertises `feature`.
    pub async fn supports_feature(&self, entity: &Jid, feature: &str) -> Result<bool, DiscoError> {
        Ok(self.discover_info(entity, None).await?.contains_feature(feature))
    }

    /// Whether the server this session is connected to advertises `feature`.
    pub async fn server_supports_feature(&self, feature: &str) -> Result<bool, DiscoError> {
        self.supports_feature(&self.service_domain, feature).await
    }

    /// Find the services of the server that support `feature`.
    ///
    /// The server itself is checked first, then every item it lists, each
    /// queried without its node. If the server answers either query with
    /// an error, that error is recorded in `failures` and the services
    /// found so far are returned. An item that answers with an error or
    /// not at all is logged, recorded and skipped. Any other failure ends
    /// the search.
    pub async fn find_services_discover_info(
        &self,
        feature: &str,
        stop_on_first: bool,
        mut failures: Option<&mut HashMap<Jid, DiscoError>>,
    ) -> Result<Vec<ServiceInfo>, DiscoError> {
        let mut found = Vec::new();
        let domain = self.service_domain.clone();

        let info = match self.discover_info(&domain, None).await {
            Ok(info) => info,
            Err(e @ DiscoError::ErrorResponse(_)) => {
                skip_peer(&mut failures, &domain, e);
                return Ok(found);
            }
            Err(e) => return Err(e),
        };
        if info.contains_feature(feature) {
            found.push(ServiceInfo {
                jid: domain.clone(),
                info,
            });
            if stop_on_first {
                return Ok(found);
            }
        }

        let items = match self.discover_items(&domain, None).await {
            Ok(items) => items,
            Err(e @ DiscoError::ErrorResponse(_)) => {
                skip_peer(&mut failures, &domain, e);
                return Ok(found);
            }
            Err(e) => return Err(e),
        };

        for item in items.into_items() {
            match self.discover_info(&item.jid, None).await {
                Ok(info) if info.contains_feature(feature) => {
                    found.push(ServiceInfo {
                        jid: item.jid,
                        info,
                    });
                    if stop_on_first {
                        break;
                    }
                }
                Ok(_) => {}
                Err(e) if e.is_peer_failure() => skip_peer(&mut failures, &item.jid, e),
                Err(e) => return Err(e),
            }
        }

        Ok(found)
    }

    /// Addresses of the services supporting `feature`.
    pub async fn find_services(
        &self,
        feature: &str,
        stop_on_first: bool,
    ) -> Result<Vec<Jid>, DiscoError> {
        Ok(self
            .find_services_discover_info(feature, stop_on_first, None)
            .await?
            .into_iter()
            .map(|service| service.jid)
            .collect())
    }

    /// The first service supporting `feature` whose identities include one
    /// of `category` (and `type_`, when given).
    pub async fn find_service(
        &self,
        feature: &str,
        category: Option<&str>,
        type_: Option<&str>,
    ) -> Result<Option<ServiceInfo>, DiscoError> {
        let services = self
            .find_services_discover_info(feature, category.is_none(), None)
            .await?;
        Ok(services.into_iter().find(|service| {
            let Some(category) = category else {
                return true;
            };
            service.info.identities().iter().any(|i| {
                i.category == category && type_.map_or(true, |t| i.type_ == t)
            })
        }))
    }
}

fn skip_peer(failures: &mut Option<&mut HashMap<Jid, DiscoError>>, jid: &Jid, error: DiscoError) {
    warn!(jid = %jid, error = %error, "Skipping service that failed to answer discovery");
    if let Some(failures) = failures.as_deref_mut() {
        failures.insert(jid.clone(), error);
    }
}

impl Drop for ServiceDiscoveryManager {
    fn drop(&mut self) {
        // Handlers installed by a later manager on the same connection stay.
        self.connection.unregister_iq_request_handler_if(
            &QName::new(DISCO_INFO_NS, "query"),
            IqType::Get,
            &self.info_handler,
        );
        self.connection.unregister_iq_request_handler_if(
            &QName::new(DISCO_ITEMS_NS, "query"),
            IqType::Get,
            &self.items_handler,
        );
    }
}

impl fmt::Debug for ServiceDiscoveryManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("ServiceDiscoveryManager")
            .field("default_identity", &state.default_identity)
            .field("identities", &state.identities)
            .field("features", &state.features)
            .field("nodes", &state.node_providers.keys().collect::<Vec<_>>())
            .finish()
    }
}

struct InfoRequestHandler(Weak<ServiceDiscoveryManager>);

impl IqRequestHandler for InfoRequestHandler {
    fn handle_iq_request(&self, request: &Iq) -> Result<Iq, XmppError> {
        match self.0.upgrade() {
            Some(manager) => manager.handle_info_request(request),
            None => error_reply(request, StanzaErrorCondition::ServiceUnavailable),
        }
    }
}

struct ItemsRequestHandler(Weak<ServiceDiscoveryManager>);

impl IqRequestHandler for ItemsRequestHandler {
    fn handle_iq_request(&self, request: &Iq) -> Result<Iq, XmppError> {
        match self.0.upgrade() {
            Some(manager) => manager.handle_items_request(request),
            None => error_reply(request, StanzaErrorCondition::ServiceUnavailable),
        }
    }
}
