//! Stanza Model Tests
//!
//! End-to-end checks of the stanza model through its public API:
//! - extension elements survive serialize/parse
//! - the extension store keeps duplicates in order and clones shallowly
//! - IQ responses are addressed from their requests
//! - construction invariants of errors, messages and presences
//! - our wire output is accepted by xmpp-parsers
//!
//! Run with: `cargo test -p waddle-stanza --test stanza_model`

use std::sync::Arc;

use jid::Jid;
use minidom::Element;

use waddle_stanza::{
    parse_stanza, ChatState, ExtensionElement, ExtensionElementStore, IdSeed,
    Iq, IqType, Message, NameValueElement, Presence, QName, SharedExtension, Thread,
    StandardExtensionElement, StanzaBuilder, StanzaError, StanzaErrorCondition, StanzaErrorType,
    StanzaView, XmlEnvironment, XmppError,
};

fn jid(s: &str) -> Jid {
    s.parse().unwrap()
}

fn element(xml: &str) -> Element {
    xml.parse().expect("well-formed XML")
}

fn disco_query() -> StandardExtensionElement {
    StandardExtensionElement::empty("query", "http://jabber.org/protocol/disco#info")
}

fn request(iq_type: IqType) -> Iq {
    Iq::builder(iq_type, "req-1")
        .set_payload(disco_query())
        .to(jid("A@example.com/a"))
        .from(jid("B@example.org/b"))
        .build()
        .unwrap()
}

// Extension elements round-trip through XML.

#[test]
fn test_extension_kinds_round_trip() {
    let standard = StandardExtensionElement::builder("geoloc", "http://jabber.org/protocol/geoloc")
        .add_attribute("accuracy", "20")
        .add_text_element("country", "Italia")
        .build();
    let xml = standard.to_xml(&XmlEnvironment::empty()).into_string();
    assert_eq!(StandardExtensionElement::from_element(&element(&xml)), standard);

    let bag = NameValueElement::new("props", "urn:example:props").set_value("k", "v");
    let xml = bag.to_xml(&XmlEnvironment::empty()).into_string();
    assert_eq!(NameValueElement::from_element(&element(&xml)), bag);

    let error = StanzaError::builder(StanzaErrorCondition::Redirect)
        .set_condition_text("xmpp:elsewhere@example.com")
        .set_descriptive_text(Some("en"), "moved")
        .build()
        .unwrap();
    let xml = error.to_xml(&XmlEnvironment::empty()).into_string();
    let parsed = StanzaError::from_element(&element(&xml)).unwrap();
    assert_eq!(parsed.condition(), error.condition());
    assert_eq!(parsed.condition_text(), error.condition_text());
    assert_eq!(parsed.error_type(), error.error_type());
    assert_eq!(parsed.descriptive_texts(), error.descriptive_texts());
}

#[test]
fn test_message_round_trip_through_parser() {
    let message = Message::builder("m-1")
        .to(jid("juliet@example.com"))
        .set_language("en")
        .add_subject(None, "greeting")
        .unwrap()
        .add_subject(Some("de"), "Gruß")
        .unwrap()
        .add_body(None, "hello & <welcome>")
        .unwrap()
        .add_body(Some("de"), "hallo")
        .unwrap()
        .set_thread(Thread::new("t-2").with_parent("t-1"))
        .add_extension(ChatState::Active)
        .build()
        .unwrap();

    let xml = message.to_xml(&XmlEnvironment::empty()).into_string();
    let parsed = parse_stanza(&element(&xml)).unwrap();
    let parsed = parsed.as_message().unwrap();

    assert_eq!(parsed.stanza_id(), Some("m-1"));
    assert_eq!(parsed.to(), message.to());
    assert_eq!(parsed.language(), Some("en"));
    assert_eq!(parsed.body(), Some("hello & <welcome>"));
    assert_eq!(parsed.body_in(Some("de")), Some("hallo"));
    assert_eq!(parsed.subject(), Some("greeting"));
    assert_eq!(parsed.subject_in(Some("de")), Some("Gruß"));
    assert_eq!(parsed.subjects().len(), 2);
    let thread = parsed.thread().unwrap();
    assert_eq!(thread.thread(), "t-2");
    assert_eq!(thread.parent(), Some("t-1"));
    assert_eq!(parsed.chat_state(), Some(ChatState::Active));
}

#[test]
fn test_body_without_language_takes_message_language() {
    // Both bodies would serialize without xml:lang.
    let result = Message::builder("m")
        .set_language("en")
        .add_body(None, "a")
        .unwrap()
        .add_body(Some("en"), "b");
    assert!(matches!(result, Err(XmppError::DuplicateLanguage { element: "body", .. })));

    let message = Message::builder("m")
        .set_language("en")
        .add_body(None, "a")
        .unwrap()
        .add_body(Some("fr"), "b")
        .unwrap()
        .build()
        .unwrap();
    let xml = message.to_xml(&XmlEnvironment::empty()).into_string();
    let parsed = parse_stanza(&element(&xml)).unwrap();
    let parsed = parsed.as_message().unwrap();
    assert_eq!(parsed.body_in(Some("en")), Some("a"));
    assert_eq!(parsed.body_in(Some("fr")), Some("b"));

    // The parser applies the same rule to inbound XML.
    let ambiguous = element(
        "<message xmlns='jabber:client' xml:lang='en' id='m'>\
         <body>a</body><body xml:lang='en'>b</body></message>",
    );
    assert!(matches!(
        parse_stanza(&ambiguous),
        Err(XmppError::DuplicateLanguage { element: "body", .. })
    ));
}

// Extension store.

#[test]
fn test_same_qname_keeps_both_in_insertion_order() {
    let e1: SharedExtension = Arc::new(StandardExtensionElement::empty("x", "urn:x"));
    let e2: SharedExtension = Arc::new(StandardExtensionElement::empty("x", "urn:x"));
    let mut store = ExtensionElementStore::new();
    store.put(e1.clone());
    store.put(e2.clone());

    let all = store.get_all(&QName::new("urn:x", "x"));
    assert_eq!(all.len(), 2);
    assert!(Arc::ptr_eq(&all[0], &e1));
    assert!(Arc::ptr_eq(&all[1], &e2));
}

#[test]
fn test_store_clone_independence() {
    let mut original = ExtensionElementStore::new();
    original.put(Arc::new(StandardExtensionElement::empty("x", "urn:x")));
    let mut copy = original.clone();
    copy.put(Arc::new(StandardExtensionElement::empty("x", "urn:x")));

    assert_eq!(original.get_all(&QName::new("urn:x", "x")).len(), 1);
    assert_eq!(copy.get_all(&QName::new("urn:x", "x")).len(), 2);
}

#[test]
fn test_remove_removes_every_duplicate() {
    let mut store = ExtensionElementStore::new();
    for _ in 0..3 {
        store.put(Arc::new(StandardExtensionElement::empty("x", "urn:x")));
    }
    store.put(Arc::new(StandardExtensionElement::empty("y", "urn:x")));

    assert_eq!(store.remove(&QName::new("urn:x", "x")).len(), 3);
    assert!(store.get_all(&QName::new("urn:x", "x")).is_empty());
    assert_eq!(store.get_all_by_namespace("urn:x").len(), 1);
}

#[test]
fn test_override_extension_leaves_no_stale_duplicate() {
    let message = Message::builder("m")
        .add_extension(NameValueElement::new("p", "urn:p").set_value("v", "1"))
        .add_extension(NameValueElement::new("p", "urn:p").set_value("v", "2"))
        .override_extension(NameValueElement::new("p", "urn:p").set_value("v", "3"))
        .build()
        .unwrap();

    let values: Vec<_> = message
        .extensions_of::<NameValueElement>()
        .into_iter()
        .filter_map(|p| p.value("v"))
        .collect();
    assert_eq!(values, vec!["3"]);
}

#[test]
fn test_builder_from_stanza_does_not_touch_original() {
    let original = Message::builder("m").add_extension(ChatState::Paused).build().unwrap();
    let derived = original
        .to_builder("m2")
        .add_extension(StandardExtensionElement::empty("x", "urn:x"))
        .build()
        .unwrap();

    assert_eq!(original.extensions().len(), 1);
    assert_eq!(derived.extensions().len(), 2);
    assert!(Arc::ptr_eq(&original.extensions()[0], &derived.extensions()[0]));
}

// IQ protocol.

#[test]
fn test_response_addressing() {
    for iq_type in [IqType::Get, IqType::Set] {
        let request = request(iq_type);

        let result = Iq::create_response(&request).unwrap().build().unwrap();
        assert_eq!(result.to(), Some(&jid("B@example.org/b")));
        assert_eq!(result.from(), Some(&jid("A@example.com/a")));
        assert_eq!(result.stanza_id(), Some("req-1"));
        assert_eq!(result.iq_type(), IqType::Result);

        let error = Iq::create_error_response(&request).unwrap().build().unwrap();
        assert_eq!(error.to(), Some(&jid("B@example.org/b")));
        assert_eq!(error.from(), Some(&jid("A@example.com/a")));
        assert_eq!(error.stanza_id(), Some("req-1"));
        assert_eq!(error.iq_type(), IqType::Error);
    }
}

#[test]
fn test_response_precondition() {
    for iq_type in [IqType::Result, IqType::Error] {
        let not_a_request = Iq::builder(iq_type, "x").build().unwrap();
        assert!(matches!(
            Iq::create_response(&not_a_request),
            Err(XmppError::NotARequest { .. })
        ));
        assert!(matches!(
            Iq::create_error_response(&not_a_request),
            Err(XmppError::NotARequest { .. })
        ));
    }
}

#[test]
fn test_require_stanza_id() {
    assert!(matches!(
        Iq::builder(IqType::Get, IdSeed::None).require_stanza_id(),
        Err(XmppError::MissingStanzaId)
    ));
    assert!(Iq::builder(IqType::Get, "id").require_stanza_id().is_ok());
    assert!(matches!(
        Iq::builder(IqType::Get, "").build(),
        Err(XmppError::EmptyStanzaId)
    ));
}

// Errors.

#[test]
fn test_condition_text_invariant() {
    assert!(matches!(
        StanzaError::builder(StanzaErrorCondition::Conflict)
            .set_condition_text("x")
            .build(),
        Err(XmppError::ConditionTextNotAllowed { .. })
    ));

    let gone = StanzaError::builder(StanzaErrorCondition::Gone)
        .set_condition_text("moved")
        .build()
        .unwrap();
    let xml = gone.to_xml(&XmlEnvironment::empty()).into_string();
    assert!(xml.contains("<gone xmlns='urn:ietf:params:xml:ns:xmpp-stanzas'>moved</gone>"));
}

#[test]
fn test_type_from_default_table() {
    let error = StanzaError::from(StanzaErrorCondition::ItemNotFound, None)
        .build()
        .unwrap();
    assert_eq!(error.error_type(), StanzaErrorType::Cancel);
}

// Message and presence invariants.

#[test]
fn test_body_uniqueness_per_language() {
    let builder = Message::builder("m").add_body(None, "a").unwrap();
    assert!(matches!(
        builder.clone().add_body(None, "b"),
        Err(XmppError::DuplicateLanguage { .. })
    ));

    let message = builder.add_body(Some("en"), "b").unwrap().build().unwrap();
    let no_lang = message.bodies().into_iter().find(|b| b.language().is_none()).unwrap();
    assert_eq!(no_lang.text(), "a");
    assert_eq!(message.body_in(Some("en")), Some("b"));

    let subject = Message::builder("m").add_subject(Some("en"), "s").unwrap();
    assert!(subject.add_subject(Some("en"), "t").is_err());
}

#[test]
fn test_presence_priority_bounds() {
    for bad in [-129, 128] {
        assert!(matches!(
            Presence::builder("p").set_priority(bad),
            Err(XmppError::PriorityOutOfRange(_))
        ));
    }
    for good in [-128, 127] {
        let presence = Presence::builder("p").set_priority(good).unwrap().build().unwrap();
        assert_eq!(i32::from(presence.priority()), good);
    }
}

// Wire compatibility.

#[test]
fn test_iq_accepted_by_xmpp_parsers() {
    let request = request(IqType::Get);
    let parsed = xmpp_parsers::iq::Iq::try_from(element(&request.to_xml_string())).unwrap();

    assert_eq!(parsed.id, "req-1");
    assert_eq!(parsed.to, Some(jid("A@example.com/a")));
    match parsed.payload {
        xmpp_parsers::iq::IqType::Get(payload) => {
            assert_eq!(payload.name(), "query");
            assert_eq!(payload.ns(), "http://jabber.org/protocol/disco#info");
        }
        other => panic!("unexpected payload {:?}", other),
    }

    let error = Iq::error_response(
        &request,
        StanzaError::builder(StanzaErrorCondition::ServiceUnavailable)
            .build()
            .unwrap(),
    )
    .unwrap();
    let parsed = xmpp_parsers::iq::Iq::try_from(element(&error.to_xml_string())).unwrap();
    assert!(matches!(parsed.payload, xmpp_parsers::iq::IqType::Error(_)));
}

#[test]
fn test_message_accepted_by_xmpp_parsers() {
    let message = Message::builder("m-1")
        .to(jid("juliet@example.com"))
        .set_body("hi")
        .build()
        .unwrap();
    let parsed =
        xmpp_parsers::message::Message::try_from(element(&message.to_xml(&XmlEnvironment::empty()).into_string()))
            .unwrap();
    assert_eq!(parsed.bodies.get("").map(|b| b.0.as_str()), Some("hi"));
}
