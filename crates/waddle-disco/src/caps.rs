//! XEP-0115: Entity Capabilities
//!
//! Computes the capabilities verification string (`ver`) of a disco#info
//! result and carries it in the `<c/>` element of outbound presence.
//!
//! ## References
//!
//! - <https://xmpp.org/extensions/xep-0115.html>

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use minidom::Element;
use sha1::{Digest, Sha1};
use waddle_stanza::{
    ExtensionElement, SharedExtension, XmlEnvironment, XmlStringBuilder, XmppError,
};

use crate::data_form::{DataForm, FORM_TYPE};
use crate::info::{DiscoverInfo, Identity};

/// XEP-0115 Entity Capabilities namespace.
pub const NS_CAPS: &str = "http://jabber.org/protocol/caps";

/// Default node for Waddle's capabilities.
pub const WADDLE_CAPS_NODE: &str = "https://waddle.social/caps";

/// Notified whenever the local entity's capabilities change.
///
/// Listeners are called with the discovery manager's lock held, so they must
/// not call back into the manager.
pub trait EntityCapabilitiesChangedListener: Send + Sync {
    fn on_entity_capabilities_changed(&self, ver: &str);
}

/// Entity Capabilities element (`<c xmlns='http://jabber.org/protocol/caps'>`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caps {
    /// Hash algorithm used (always "sha-1" here)
    pub hash: String,
    /// Node identifying the software (e.g., "https://waddle.social/caps")
    pub node: String,
    /// Verification string
    pub ver: String,
}

impl Caps {
    /// Create a new Caps element with SHA-1 hash.
    pub fn new(node: &str, ver: &str) -> Self {
        Self {
            hash: "sha-1".to_string(),
            node: node.to_string(),
            ver: ver.to_string(),
        }
    }

    /// Caps advertising `info` under `node`.
    pub fn for_info(node: &str, info: &DiscoverInfo) -> Self {
        Self::new(node, &compute_caps_hash(info))
    }

    /// The `node#ver` string used to query the capabilities with disco#info.
    pub fn node_ver(&self) -> String {
        format!("{}#{}", self.node, self.ver)
    }

    pub fn from_element(element: &Element) -> Result<Self, XmppError> {
        if element.name() != "c" || element.ns() != NS_CAPS {
            return Err(XmppError::parse("expected caps element"));
        }
        let attr = |name: &str| {
            element
                .attr(name)
                .ok_or_else(|| XmppError::parse(format!("caps element without {}", name)))
        };
        Ok(Self {
            hash: attr("hash")?.to_string(),
            node: attr("node")?.to_string(),
            ver: attr("ver")?.to_string(),
        })
    }

    /// Provider for [`ProviderRegistry::register`](waddle_stanza::ProviderRegistry::register).
    pub fn provide(element: &Element) -> Result<SharedExtension, XmppError> {
        let extension: SharedExtension = Arc::new(Self::from_element(element)?);
        Ok(extension)
    }
}

impl ExtensionElement for Caps {
    fn element_name(&self) -> &str {
        "c"
    }

    fn namespace(&self) -> &str {
        NS_CAPS
    }

    fn to_xml(&self, enclosing: &XmlEnvironment) -> XmlStringBuilder {
        let mut xml = XmlStringBuilder::open("c", NS_CAPS, None, enclosing);
        xml.attribute("hash", &self.hash)
            .attribute("node", &self.node)
            .attribute("ver", &self.ver)
            .close_empty_element();
        xml
    }
}

/// Compute the capabilities verification string of `info`.
///
/// Base64-encoded SHA-1 of the string [`build_verification_string`] builds.
pub fn compute_caps_hash(info: &DiscoverInfo) -> String {
    hash_verification_string(&build_verification_string(info))
}

/// Build the verification string from identities, features and extended
/// information forms:
/// 1. each identity, sorted, as "category/type/lang/name<"
/// 2. each feature, sorted, as "feature<"
/// 3. each form with a hidden FORM_TYPE, sorted by FORM_TYPE: the FORM_TYPE
///    value, then every other field sorted by var as "var<" followed by its
///    sorted values, each as "value<"
pub fn build_verification_string(info: &DiscoverInfo) -> String {
    let mut s = String::new();

    let mut identities: Vec<&Identity> = info.identities().iter().collect();
    identities.sort();
    for id in identities {
        s.push_str(&id.category);
        s.push('/');
        s.push_str(&id.type_);
        s.push('/');
        if let Some(ref lang) = id.lang {
            s.push_str(lang);
        }
        s.push('/');
        if let Some(ref name) = id.name {
            s.push_str(name);
        }
        s.push('<');
    }

    let mut features: Vec<&str> = info.features().iter().map(|f| f.var()).collect();
    features.sort_unstable();
    for feature in features {
        s.push_str(feature);
        s.push('<');
    }

    let mut forms: Vec<&DataForm> = info
        .forms()
        .iter()
        .filter(|f| f.has_hidden_form_type())
        .collect();
    forms.sort_by_key(|f| f.form_type());
    for form in forms {
        if let Some(form_type) = form.form_type() {
            s.push_str(form_type);
            s.push('<');
        }
        let mut fields: Vec<_> = form
            .fields()
            .iter()
            .filter(|f| f.var.as_deref() != Some(FORM_TYPE))
            .collect();
        fields.sort_by(|a, b| a.var.cmp(&b.var));
        for field in fields {
            if let Some(ref var) = field.var {
                s.push_str(var);
                s.push('<');
            }
            let mut values: Vec<&str> = field.values.iter().map(String::as_str).collect();
            values.sort_unstable();
            for value in values {
                s.push_str(value);
                s.push('<');
            }
        }
    }

    s
}

/// Hash the verification string with SHA-1 and base64 encode.
fn hash_verification_string(verification_string: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(verification_string.as_bytes());
    BASE64.encode(hasher.finalize())
}

/// Whether a disco#info node is a caps `node#ver` query.
pub fn is_caps_node_query(node: Option<&str>) -> bool {
    node.is_some_and(|n| n.contains('#'))
}
