//! Service Discovery Tests
//!
//! End-to-end checks of a session's discovery manager over a mock transport:
//! - outbound disco#info/disco#items queries and their correlated answers
//! - inbound queries answered from the registered features, identities and
//!   node providers
//! - remote errors and closed sessions surfacing as typed errors
//!
//! Run with: `cargo test -p waddle-disco --test service_discovery`

mod common;

use std::sync::Arc;

use jid::Jid;
use minidom::Element;

use waddle_disco::{
    DiscoError, DiscoverInfo, DiscoverItems, Feature, Identity, Item, NodeInformationProvider,
    Session, SessionConfig, DISCO_INFO_NS, DISCO_ITEMS_NS,
};
use waddle_stanza::{
    Iq, IqType, Stanza, StanzaBuilder, StanzaError, StanzaErrorCondition, StanzaView,
};

use common::MockTransport;

/// Initialize test environment.
fn init_test() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("debug")
            .with_test_writer()
            .try_init();
    });
}

fn jid(s: &str) -> Jid {
    s.parse().unwrap()
}

fn element(xml: &str) -> Element {
    xml.parse().expect("well-formed XML")
}

fn result_with(request: &Iq, payload: impl waddle_stanza::ExtensionElement) -> Iq {
    Iq::create_response(request)
        .unwrap()
        .set_payload(payload)
        .build()
        .unwrap()
}

async fn next_iq(rx: &mut tokio::sync::mpsc::UnboundedReceiver<Stanza>) -> Iq {
    match rx.recv().await {
        Some(Stanza::Iq(iq)) => iq,
        other => panic!("expected an IQ, got {:?}", other),
    }
}

#[tokio::test]
async fn test_discover_info_from_echoing_peer() {
    init_test();
    let (transport, mut rx) = MockTransport::echoing(|request| {
        result_with(request, DiscoverInfo::new().add_feature(DISCO_INFO_NS))
    });
    let session = common::session(transport);

    let info = session
        .service_discovery()
        .discover_info(&jid("disco.example.com"), None)
        .await
        .unwrap();
    assert!(info.contains_feature("http://jabber.org/protocol/disco#info"));

    let request = next_iq(&mut rx).await;
    assert_eq!(request.iq_type(), IqType::Get);
    assert_eq!(request.to(), Some(&jid("disco.example.com")));
    assert!(request.stanza_id().is_some());
    let query = request.payload_as::<DiscoverInfo>().unwrap();
    assert_eq!(query.node(), None);
    assert_eq!(
        request.to_xml_string(),
        format!(
            "<iq xmlns='jabber:client' id='{}' to='disco.example.com' type='get'>\
             <query xmlns='http://jabber.org/protocol/disco#info'/></iq>",
            request.stanza_id().unwrap()
        )
    );
}

#[tokio::test]
async fn test_inbound_info_query_lists_registered_feature() {
    init_test();
    let (transport, mut rx) = MockTransport::recording();
    let session = common::session(transport);
    session.service_discovery().add_feature("urn:xmpp:ping");

    session
        .receive(&element(
            "<iq xmlns='jabber:client' type='get' id='disco-1' \
             from='peer@example.org/laptop' to='me@example.com/waddle'>\
             <query xmlns='http://jabber.org/protocol/disco#info'/></iq>",
        ))
        .await
        .unwrap();

    let response = next_iq(&mut rx).await;
    assert_eq!(response.iq_type(), IqType::Result);
    assert_eq!(response.stanza_id(), Some("disco-1"));
    assert_eq!(response.to(), Some(&jid("peer@example.org/laptop")));
    assert_eq!(response.from(), Some(&jid("me@example.com/waddle")));

    let info = response.payload_as::<DiscoverInfo>().unwrap();
    assert!(info.contains_feature("urn:xmpp:ping"));
    assert!(info.contains_feature(DISCO_INFO_NS));
    assert!(info
        .identities()
        .contains(&Identity::new("client", "pc", Some("Waddle"))));

    // The peer sees the same answer on the wire.
    let wire = DiscoverInfo::from_element(
        element(&response.to_xml_string())
            .get_child("query", DISCO_INFO_NS)
            .unwrap(),
    )
    .unwrap();
    assert_eq!(&wire, info);
}

#[tokio::test]
async fn test_inbound_queries_for_nodes() {
    init_test();

    struct Bookmarks;

    impl NodeInformationProvider for Bookmarks {
        fn node_items(&self) -> Vec<Item> {
            vec![Item::new(jid("room@muc.example.com"), Some("Room"), None)]
        }

        fn node_identities(&self) -> Vec<Identity> {
            vec![Identity::new("automation", "command-node", Some("Bookmarks"))]
        }
    }

    let (transport, mut rx) = MockTransport::recording();
    let session = common::session(transport);
    session
        .service_discovery()
        .set_node_information_provider("bookmarks", Arc::new(Bookmarks));

    let query = |id: &str, payload: DiscoverItems| {
        Iq::get(payload, id)
            .from(jid("peer@example.org/laptop"))
            .build()
            .unwrap()
    };

    session
        .handle_inbound(query("i1", DiscoverItems::query(Some("bookmarks"))).into())
        .await
        .unwrap();
    let response = next_iq(&mut rx).await;
    let items = response.payload_as::<DiscoverItems>().unwrap();
    assert_eq!(items.node(), Some("bookmarks"));
    assert_eq!(items.items()[0].jid, jid("room@muc.example.com"));

    session
        .handle_inbound(query("i2", DiscoverItems::query(Some("unknown"))).into())
        .await
        .unwrap();
    let response = next_iq(&mut rx).await;
    assert_eq!(response.iq_type(), IqType::Error);
    assert_eq!(
        response.error().map(|e| e.condition()),
        Some(StanzaErrorCondition::ItemNotFound)
    );

    let info_query = Iq::get(DiscoverInfo::query(Some("bookmarks")), "i3")
        .from(jid("peer@example.org/laptop"))
        .build()
        .unwrap();
    session.handle_inbound(info_query.into()).await.unwrap();
    let response = next_iq(&mut rx).await;
    let info = response.payload_as::<DiscoverInfo>().unwrap();
    assert!(info.has_identity("automation", "command-node"));
}

#[tokio::test]
async fn test_discover_items_and_server_features() {
    init_test();
    let (transport, _rx) = MockTransport::echoing(|request| {
        if request.child_qname().is_some_and(|q| q.namespace() == DISCO_ITEMS_NS) {
            result_with(
                request,
                DiscoverItems::new().add_item(Item::new(jid("muc.example.com"), Some("Rooms"), None)),
            )
        } else {
            result_with(
                request,
                DiscoverInfo::new()
                    .add_identity(Identity::server(Some("Example")))
                    .add_feature(Feature::ping()),
            )
        }
    });
    let session = common::session(transport);
    let disco = session.service_discovery();

    let items = disco.discover_items(&jid("example.com"), None).await.unwrap();
    assert_eq!(items.items().len(), 1);
    assert_eq!(items.items()[0].name.as_deref(), Some("Rooms"));

    assert!(disco.server_supports_feature("urn:xmpp:ping").await.unwrap());
    assert!(!disco.server_supports_feature("urn:xmpp:mam:2").await.unwrap());
}

#[tokio::test]
async fn test_remote_error_is_typed() {
    init_test();
    let (transport, _rx) = MockTransport::echoing(|request| {
        let error = StanzaError::builder(StanzaErrorCondition::ServiceUnavailable)
            .build()
            .unwrap();
        Iq::error_response(request, error).unwrap()
    });
    let session = common::session(transport);

    let err = session
        .service_discovery()
        .discover_info(&jid("offline.example.com"), None)
        .await
        .unwrap_err();
    assert_eq!(
        err.stanza_error().map(|e| e.condition()),
        Some(StanzaErrorCondition::ServiceUnavailable)
    );
}

#[tokio::test]
async fn test_closed_session_is_not_connected() {
    init_test();
    let (transport, _rx) = MockTransport::recording();
    let session = common::session(transport);
    session.close();

    let err = session
        .service_discovery()
        .discover_items(&jid("example.com"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, DiscoError::NotConnected));
}

#[tokio::test]
async fn test_identity_comes_from_config() {
    init_test();
    let config: SessionConfig = toml::from_str(
        r#"
        service_domain = "example.com"

        [identity]
        category = "client"
        type = "bot"
        name = "Waddle Bot"
        "#,
    )
    .unwrap();
    let (transport, mut rx) = MockTransport::recording();
    let session = Session::new(transport, config).unwrap();

    let query = Iq::get(DiscoverInfo::query(None), "c1")
        .from(jid("peer@example.org/laptop"))
        .build()
        .unwrap();
    session.handle_inbound(query.into()).await.unwrap();

    let info = next_iq(&mut rx).await.payload_as::<DiscoverInfo>().unwrap().clone();
    assert_eq!(
        info.identities(),
        &[Identity::new("client", "bot", Some("Waddle Bot"))]
    );
}
