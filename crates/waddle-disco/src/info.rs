//! Service Discovery: disco#info payloads.
//!
//! Implements the XEP-0030 `<query xmlns='http://jabber.org/protocol/disco#info'/>`
//! element: identities, features and XEP-0128 extended information forms.

use std::collections::HashSet;
use std::sync::Arc;

use minidom::Element;
use waddle_stanza::{
    ExtensionElement, SharedExtension, XmlEnvironment, XmlStringBuilder, XmppError,
};

use crate::data_form::{DataForm, DATA_FORMS_NS};
use crate::error::DiscoError;

/// Service Discovery info namespace (XEP-0030).
pub const DISCO_INFO_NS: &str = "http://jabber.org/protocol/disco#info";

/// Identity element of a disco#info result.
///
/// Ordered by category, type, language and name, the order XEP-0115 sorts
/// identities in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity {
    /// Category (e.g., "client", "server", "conference")
    pub category: String,
    /// Type (e.g., "pc", "im", "text")
    pub type_: String,
    /// Optional `xml:lang` of the name
    pub lang: Option<String>,
    /// Optional name (human-readable)
    pub name: Option<String>,
}

impl Identity {
    /// Create a new identity.
    pub fn new(category: &str, type_: &str, name: Option<&str>) -> Self {
        Self {
            category: category.to_string(),
            type_: type_.to_string(),
            lang: None,
            name: name.map(|s| s.to_string()),
        }
    }

    /// Same identity with a language-tagged name.
    pub fn with_lang(mut self, lang: &str) -> Self {
        self.lang = Some(lang.to_string());
        self
    }

    /// Client identity (category="client", type="pc").
    pub fn client(name: Option<&str>) -> Self {
        Self::new("client", "pc", name)
    }

    /// Server identity (category="server", type="im").
    pub fn server(name: Option<&str>) -> Self {
        Self::new("server", "im", name)
    }

    /// MUC service identity (category="conference", type="text").
    pub fn muc_service(name: Option<&str>) -> Self {
        Self::new("conference", "text", name)
    }

    /// PubSub service identity (category="pubsub", type="service").
    pub fn pubsub_service(name: Option<&str>) -> Self {
        Self::new("pubsub", "service", name)
    }

    /// Whether this identity is of the given category and type.
    pub fn is_of(&self, category: &str, type_: &str) -> bool {
        self.category == category && self.type_ == type_
    }

    fn from_element(element: &Element) -> Result<Self, XmppError> {
        let category = element
            .attr("category")
            .ok_or_else(|| XmppError::parse("identity without category"))?;
        let type_ = element
            .attr("type")
            .ok_or_else(|| XmppError::parse("identity without type"))?;
        let mut identity = Self::new(category, type_, element.attr("name"));
        identity.lang = element.attr("xml:lang").map(str::to_string);
        Ok(identity)
    }

    fn write(&self, xml: &mut XmlStringBuilder) {
        xml.half_open_element("identity")
            .attribute("category", &self.category)
            .attribute("type", &self.type_)
            .opt_attribute("name", self.name.as_deref())
            .xml_lang_attribute(self.lang.as_deref())
            .close_empty_element();
    }
}

/// Feature element of a disco#info result.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Feature(pub String);

impl Feature {
    /// Create a new feature.
    pub fn new(var: &str) -> Self {
        Self(var.to_string())
    }

    pub fn var(&self) -> &str {
        &self.0
    }

    /// disco#info feature.
    pub fn disco_info() -> Self {
        Self::new(DISCO_INFO_NS)
    }

    /// disco#items feature.
    pub fn disco_items() -> Self {
        Self::new(crate::items::DISCO_ITEMS_NS)
    }

    /// XEP-0115 Entity Capabilities.
    pub fn caps() -> Self {
        Self::new(crate::caps::NS_CAPS)
    }

    /// XEP-0199 XMPP Ping.
    pub fn ping() -> Self {
        Self::new("urn:xmpp:ping")
    }

    /// XEP-0085 Chat State Notifications.
    pub fn chat_states() -> Self {
        Self::new(waddle_stanza::ns::CHAT_STATES)
    }

    /// XEP-0004 Data Forms.
    pub fn data_forms() -> Self {
        Self::new(DATA_FORMS_NS)
    }
}

impl From<&str> for Feature {
    fn from(var: &str) -> Self {
        Self::new(var)
    }
}

impl From<String> for Feature {
    fn from(var: String) -> Self {
        Self(var)
    }
}

/// A disco#info query or result.
///
/// The same element serves as the empty `get` payload and as the populated
/// `result` payload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DiscoverInfo {
    node: Option<String>,
    identities: Vec<Identity>,
    features: Vec<Feature>,
    forms: Vec<DataForm>,
}

impl DiscoverInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty query, optionally addressed to `node`.
    pub fn query(node: Option<&str>) -> Self {
        Self {
            node: node.map(str::to_string),
            ..Self::default()
        }
    }

    pub fn with_node(mut self, node: Option<&str>) -> Self {
        self.node = node.map(str::to_string);
        self
    }

    pub fn add_identity(mut self, identity: Identity) -> Self {
        self.identities.push(identity);
        self
    }

    pub fn add_identities(mut self, identities: impl IntoIterator<Item = Identity>) -> Self {
        self.identities.extend(identities);
        self
    }

    pub fn add_feature(mut self, feature: impl Into<Feature>) -> Self {
        self.features.push(feature.into());
        self
    }

    pub fn add_features<F: Into<Feature>>(mut self, features: impl IntoIterator<Item = F>) -> Self {
        self.features.extend(features.into_iter().map(Into::into));
        self
    }

    /// Attach an extended information form (XEP-0128).
    pub fn add_form(mut self, form: DataForm) -> Self {
        self.forms.push(form);
        self
    }

    pub fn node(&self) -> Option<&str> {
        self.node.as_deref()
    }

    pub fn identities(&self) -> &[Identity] {
        &self.identities
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn forms(&self) -> &[DataForm] {
        &self.forms
    }

    /// The extended information form with the given `FORM_TYPE`.
    pub fn form(&self, form_type: &str) -> Option<&DataForm> {
        self.forms.iter().find(|f| f.form_type() == Some(form_type))
    }

    pub fn contains_feature(&self, var: &str) -> bool {
        self.features.iter().any(|f| f.0 == var)
    }

    /// Whether some identity has this category and type.
    pub fn has_identity(&self, category: &str, type_: &str) -> bool {
        self.identities.iter().any(|i| i.is_of(category, type_))
    }

    /// Identities with this category and type.
    pub fn identities_of<'a>(
        &'a self,
        category: &'a str,
        type_: &'a str,
    ) -> impl Iterator<Item = &'a Identity> + 'a {
        self.identities.iter().filter(move |i| i.is_of(category, type_))
    }

    /// XEP-0030 forbids listing a feature twice; peers sometimes do anyway.
    pub fn contains_duplicate_features(&self) -> bool {
        let mut seen = HashSet::new();
        !self.features.iter().all(|f| seen.insert(f))
    }

    pub fn contains_duplicate_identities(&self) -> bool {
        let mut seen = HashSet::new();
        !self.identities.iter().all(|i| seen.insert(i))
    }

    /// Recover a `DiscoverInfo` from an IQ payload.
    ///
    /// Works whether the payload was parsed with the disco providers
    /// registered or kept as a generic element.
    pub fn from_payload(payload: &SharedExtension) -> Result<Self, DiscoError> {
        if let Some(info) = payload.downcast_ref::<DiscoverInfo>() {
            return Ok(info.clone());
        }
        let element: Element = payload
            .to_xml_string()
            .parse()
            .map_err(|e| DiscoError::unexpected(format!("unparsable payload: {}", e)))?;
        Ok(Self::from_element(&element)?)
    }

    pub fn from_element(element: &Element) -> Result<Self, XmppError> {
        if element.name() != "query" || element.ns() != DISCO_INFO_NS {
            return Err(XmppError::parse(format!(
                "expected disco#info query, found <{}/> in '{}'",
                element.name(),
                element.ns()
            )));
        }

        let mut info = Self::query(element.attr("node"));
        for child in element.children() {
            match (child.name(), child.ns().as_str()) {
                ("identity", DISCO_INFO_NS) => info.identities.push(Identity::from_element(child)?),
                ("feature", DISCO_INFO_NS) => {
                    let var = child
                        .attr("var")
                        .ok_or_else(|| XmppError::parse("feature without var"))?;
                    info.features.push(Feature::new(var));
                }
                ("x", DATA_FORMS_NS) => info.forms.push(DataForm::from_element(child)?),
                _ => {}
            }
        }
        Ok(info)
    }

    /// Provider for [`ProviderRegistry::register`](waddle_stanza::ProviderRegistry::register).
    pub fn provide(element: &Element) -> Result<SharedExtension, XmppError> {
        let extension: SharedExtension = Arc::new(Self::from_element(element)?);
        Ok(extension)
    }
}

impl ExtensionElement for DiscoverInfo {
    fn element_name(&self) -> &str {
        "query"
    }

    fn namespace(&self) -> &str {
        DISCO_INFO_NS
    }

    fn to_xml(&self, enclosing: &XmlEnvironment) -> XmlStringBuilder {
        let mut xml = XmlStringBuilder::open("query", DISCO_INFO_NS, None, enclosing);
        xml.opt_attribute("node", self.node.as_deref());
        if self.identities.is_empty() && self.features.is_empty() && self.forms.is_empty() {
            xml.close_empty_element();
            return xml;
        }
        xml.right_angle_bracket();
        for identity in &self.identities {
            identity.write(&mut xml);
        }
        for feature in &self.features {
            xml.half_open_element("feature")
                .attribute("var", &feature.0)
                .close_empty_element();
        }
        let env = xml.environment().clone();
        for form in &self.forms {
            xml.append(&form.to_xml(&env));
        }
        xml.close();
        xml
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_form::FormField;

    fn parse(xml: &str) -> Element {
        xml.parse().expect("valid XML")
    }

    #[test]
    fn test_empty_query() {
        let xml = DiscoverInfo::query(None)
            .to_xml(&XmlEnvironment::empty())
            .into_string();
        assert_eq!(xml, "<query xmlns='http://jabber.org/protocol/disco#info'/>");

        let xml = DiscoverInfo::query(Some("n1"))
            .to_xml(&XmlEnvironment::empty())
            .into_string();
        assert_eq!(
            xml,
            "<query xmlns='http://jabber.org/protocol/disco#info' node='n1'/>"
        );
    }

    #[test]
    fn test_result_serialization() {
        let info = DiscoverInfo::new()
            .add_identity(Identity::server(Some("Waddle")))
            .add_feature(Feature::disco_info())
            .add_feature("urn:xmpp:ping");

        let xml = info.to_xml(&XmlEnvironment::empty()).into_string();
        assert_eq!(
            xml,
            "<query xmlns='http://jabber.org/protocol/disco#info'>\
             <identity category='server' type='im' name='Waddle'/>\
             <feature var='http://jabber.org/protocol/disco#info'/>\
             <feature var='urn:xmpp:ping'/>\
             </query>"
        );
    }

    #[test]
    fn test_round_trip_with_form_and_lang() {
        let info = DiscoverInfo::query(Some("http://waddle.social/caps#abc"))
            .add_identity(Identity::client(Some("Waddle")).with_lang("en"))
            .add_identity(Identity::client(Some("Watschel")).with_lang("de"))
            .add_feature(Feature::caps())
            .add_form(
                DataForm::extended_info("urn:xmpp:dataforms:softwareinfo")
                    .with_field(FormField::new("software").with_value("Waddle")),
            );

        let xml = info.to_xml(&XmlEnvironment::empty()).into_string();
        let parsed = DiscoverInfo::from_element(&parse(&xml)).unwrap();

        assert_eq!(parsed, info);
        assert!(parsed.form("urn:xmpp:dataforms:softwareinfo").is_some());
        assert_eq!(parsed.identities()[1].lang.as_deref(), Some("de"));
    }

    #[test]
    fn test_parse_requires_identity_attributes() {
        let element = parse(
            "<query xmlns='http://jabber.org/protocol/disco#info'>\
             <identity type='pc'/></query>",
        );
        assert!(matches!(
            DiscoverInfo::from_element(&element),
            Err(XmppError::Parse(_))
        ));
    }

    #[test]
    fn test_lookups() {
        let info = DiscoverInfo::new()
            .add_identity(Identity::muc_service(Some("Rooms")))
            .add_features([DISCO_INFO_NS, "http://jabber.org/protocol/muc"]);

        assert!(info.contains_feature("http://jabber.org/protocol/muc"));
        assert!(!info.contains_feature("urn:xmpp:ping"));
        assert!(info.has_identity("conference", "text"));
        assert!(!info.has_identity("conference", "irc"));
        assert_eq!(info.identities_of("conference", "text").count(), 1);
    }

    #[test]
    fn test_duplicate_detection() {
        let info = DiscoverInfo::new()
            .add_identity(Identity::client(None))
            .add_feature("a")
            .add_feature("b");
        assert!(!info.contains_duplicate_features());
        assert!(!info.contains_duplicate_identities());

        let info = info.add_feature("a").add_identity(Identity::client(None));
        assert!(info.contains_duplicate_features());
        assert!(info.contains_duplicate_identities());
    }

    #[test]
    fn test_identity_order() {
        let mut identities = vec![
            Identity::new("client", "pc", Some("b")),
            Identity::new("client", "pc", Some("a")).with_lang("en"),
            Identity::new("client", "bot", None),
            Identity::new("automation", "command-node", None),
        ];
        identities.sort();
        let keys: Vec<_> = identities
            .iter()
            .map(|i| (i.category.as_str(), i.type_.as_str(), i.name.as_deref()))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("automation", "command-node", None),
                ("client", "bot", None),
                ("client", "pc", Some("b")),
                ("client", "pc", Some("a")),
            ]
        );
    }

    #[test]
    fn test_from_payload_accepts_generic_element() {
        let generic = waddle_stanza::StandardExtensionElement::from_element(&parse(
            "<query xmlns='http://jabber.org/protocol/disco#info'>\
             <feature var='urn:xmpp:ping'/></query>",
        ));
        let payload: SharedExtension = Arc::new(generic);
        let info = DiscoverInfo::from_payload(&payload).unwrap();
        assert!(info.contains_feature("urn:xmpp:ping"));
    }
}
