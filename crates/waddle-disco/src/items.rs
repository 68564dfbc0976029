//! Service Discovery: disco#items payloads.

use std::sync::Arc;

use jid::Jid;
use minidom::Element;
use waddle_stanza::{
    ExtensionElement, SharedExtension, XmlEnvironment, XmlStringBuilder, XmppError,
};

use crate::error::DiscoError;

/// Service Discovery items namespace (XEP-0030).
pub const DISCO_ITEMS_NS: &str = "http://jabber.org/protocol/disco#items";

/// The `action` attribute used when publishing items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemAction {
    Update,
    Remove,
}

impl ItemAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Update => "update",
            Self::Remove => "remove",
        }
    }
}

impl std::str::FromStr for ItemAction {
    type Err = XmppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "update" => Ok(Self::Update),
            "remove" => Ok(Self::Remove),
            other => Err(XmppError::UnknownType {
                kind: "item action",
                value: other.to_string(),
            }),
        }
    }
}

/// Item element of a disco#items result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    /// JID of the item
    pub jid: Jid,
    /// Optional name (human-readable)
    pub name: Option<String>,
    /// Optional node identifier
    pub node: Option<String>,
    /// Publish action, absent in query results
    pub action: Option<ItemAction>,
}

impl Item {
    /// Create a new disco item.
    pub fn new(jid: Jid, name: Option<&str>, node: Option<&str>) -> Self {
        Self {
            jid,
            name: name.map(|s| s.to_string()),
            node: node.map(|s| s.to_string()),
            action: None,
        }
    }

    pub fn with_action(mut self, action: ItemAction) -> Self {
        self.action = Some(action);
        self
    }

    fn from_element(element: &Element) -> Result<Self, XmppError> {
        let jid: Jid = element
            .attr("jid")
            .ok_or_else(|| XmppError::parse("item without jid"))?
            .parse()?;
        let mut item = Self::new(jid, element.attr("name"), element.attr("node"));
        item.action = element.attr("action").map(str::parse::<ItemAction>).transpose()?;
        Ok(item)
    }

    fn write(&self, xml: &mut XmlStringBuilder) {
        xml.half_open_element("item")
            .attribute("jid", self.jid.to_string())
            .opt_attribute("name", self.name.as_deref())
            .opt_attribute("node", self.node.as_deref())
            .opt_attribute("action", self.action.map(|a| a.as_str()))
            .close_empty_element();
    }
}

/// A disco#items query or result.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DiscoverItems {
    node: Option<String>,
    items: Vec<Item>,
}

impl DiscoverItems {
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty query, optionally addressed to `node`.
    pub fn query(node: Option<&str>) -> Self {
        Self {
            node: node.map(str::to_string),
            items: Vec::new(),
        }
    }

    pub fn with_node(mut self, node: Option<&str>) -> Self {
        self.node = node.map(str::to_string);
        self
    }

    pub fn add_item(mut self, item: Item) -> Self {
        self.items.push(item);
        self
    }

    pub fn add_items(mut self, items: impl IntoIterator<Item = Item>) -> Self {
        self.items.extend(items);
        self
    }

    pub fn node(&self) -> Option<&str> {
        self.node.as_deref()
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn into_items(self) -> Vec<Item> {
        self.items
    }

    /// Recover a `DiscoverItems` from an IQ payload.
    pub fn from_payload(payload: &SharedExtension) -> Result<Self, DiscoError> {
        if let Some(items) = payload.downcast_ref::<DiscoverItems>() {
            return Ok(items.clone());
        }
        let element: Element = payload
            .to_xml_string()
            .parse()
            .map_err(|e| DiscoError::unexpected(format!("unparsable payload: {}", e)))?;
        Ok(Self::from_element(&element)?)
    }

    pub fn from_element(element: &Element) -> Result<Self, XmppError> {
        if element.name() != "query" || element.ns() != DISCO_ITEMS_NS {
            return Err(XmppError::parse(format!(
                "expected disco#items query, found <{}/> in '{}'",
                element.name(),
                element.ns()
            )));
        }

        let mut items = Self::query(element.attr("node"));
        for child in element.children() {
            if child.name() == "item" && child.ns() == DISCO_ITEMS_NS {
                items.items.push(Item::from_element(child)?);
            }
        }
        Ok(items)
    }

    /// Provider for [`ProviderRegistry::register`](waddle_stanza::ProviderRegistry::register).
    pub fn provide(element: &Element) -> Result<SharedExtension, XmppError> {
        let extension: SharedExtension = Arc::new(Self::from_element(element)?);
        Ok(extension)
    }
}

impl ExtensionElement for DiscoverItems {
    fn element_name(&self) -> &str {
        "query"
    }

    fn namespace(&self) -> &str {
        DISCO_ITEMS_NS
    }

    fn to_xml(&self, enclosing: &XmlEnvironment) -> XmlStringBuilder {
        let mut xml = XmlStringBuilder::open("query", DISCO_ITEMS_NS, None, enclosing);
        xml.opt_attribute("node", self.node.as_deref());
        if self.items.is_empty() {
            xml.close_empty_element();
            return xml;
        }
        xml.right_angle_bracket();
        for item in &self.items {
            item.write(&mut xml);
        }
        xml.close();
        xml
    }
}
