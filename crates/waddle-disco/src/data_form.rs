//! XEP-0004 data forms, as far as disco#info extended information
//! (XEP-0128) and the caps hash need them.

use minidom::Element;
use waddle_stanza::{ExtensionElement, XmlEnvironment, XmlStringBuilder, XmppError};

/// Data forms namespace (XEP-0004).
pub const DATA_FORMS_NS: &str = "jabber:x:data";

/// Name of the hidden field that identifies a form's schema.
pub const FORM_TYPE: &str = "FORM_TYPE";

/// The `type` attribute of `<x/>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormKind {
    Form,
    Submit,
    Cancel,
    #[default]
    Result,
}

impl FormKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Form => "form",
            Self::Submit => "submit",
            Self::Cancel => "cancel",
            Self::Result => "result",
        }
    }
}

impl std::str::FromStr for FormKind {
    type Err = XmppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "form" => Ok(Self::Form),
            "submit" => Ok(Self::Submit),
            "cancel" => Ok(Self::Cancel),
            "result" => Ok(Self::Result),
            other => Err(XmppError::UnknownType {
                kind: "data form",
                value: other.to_string(),
            }),
        }
    }
}

/// One `<field/>` of a form.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FormField {
    pub var: Option<String>,
    pub field_type: Option<String>,
    pub label: Option<String>,
    pub values: Vec<String>,
}

impl FormField {
    pub fn new(var: &str) -> Self {
        Self {
            var: Some(var.to_string()),
            ..Default::default()
        }
    }

    /// The hidden `FORM_TYPE` field.
    pub fn form_type(value: &str) -> Self {
        Self::new(FORM_TYPE).with_type("hidden").with_value(value)
    }

    pub fn with_type(mut self, field_type: &str) -> Self {
        self.field_type = Some(field_type.to_string());
        self
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.values.push(value.into());
        self
    }

    pub fn first_value(&self) -> Option<&str> {
        self.values.first().map(String::as_str)
    }

    fn from_element(element: &Element) -> Self {
        Self {
            var: element.attr("var").map(str::to_string),
            field_type: element.attr("type").map(str::to_string),
            label: element.attr("label").map(str::to_string),
            values: element
                .children()
                .filter(|c| c.name() == "value")
                .map(|c| c.text())
                .collect(),
        }
    }

    fn write(&self, xml: &mut XmlStringBuilder) {
        xml.half_open_element("field")
            .opt_attribute("var", self.var.as_deref())
            .opt_attribute("type", self.field_type.as_deref())
            .opt_attribute("label", self.label.as_deref());
        if self.values.is_empty() {
            xml.close_empty_element();
            return;
        }
        xml.right_angle_bracket();
        for value in &self.values {
            xml.element("value", value);
        }
        xml.close_element("field");
    }
}

/// A data form (`<x xmlns='jabber:x:data'/>`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DataForm {
    kind: FormKind,
    title: Option<String>,
    instructions: Vec<String>,
    fields: Vec<FormField>,
}

impl DataForm {
    pub fn new(kind: FormKind) -> Self {
        Self {
            kind,
            ..Default::default()
        }
    }

    /// A `result` form whose hidden `FORM_TYPE` is `form_type`; the shape
    /// disco#info extensions take.
    pub fn extended_info(form_type: &str) -> Self {
        Self::new(FormKind::Result).with_field(FormField::form_type(form_type))
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    pub fn with_instructions(mut self, instructions: &str) -> Self {
        self.instructions.push(instructions.to_string());
        self
    }

    pub fn with_field(mut self, field: FormField) -> Self {
        self.fields.push(field);
        self
    }

    pub fn kind(&self) -> FormKind {
        self.kind
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn instructions(&self) -> &[String] {
        &self.instructions
    }

    pub fn fields(&self) -> &[FormField] {
        &self.fields
    }

    pub fn field(&self, var: &str) -> Option<&FormField> {
        self.fields.iter().find(|f| f.var.as_deref() == Some(var))
    }

    /// Value of the `FORM_TYPE` field, if the form has one.
    pub fn form_type(&self) -> Option<&str> {
        self.field(FORM_TYPE).and_then(FormField::first_value)
    }

    /// Whether `FORM_TYPE` is present and hidden, as XEP-0115 requires of
    /// forms that take part in the caps hash.
    pub fn has_hidden_form_type(&self) -> bool {
        self.field(FORM_TYPE)
            .is_some_and(|f| f.field_type.as_deref() == Some("hidden"))
    }

    pub fn from_element(element: &Element) -> Result<Self, XmppError> {
        if element.name() != "x" || element.ns() != DATA_FORMS_NS {
            return Err(XmppError::parse(format!(
                "expected data form, found <{}/> in '{}'",
                element.name(),
                element.ns()
            )));
        }

        let kind = match element.attr("type") {
            Some(kind) => kind.parse()?,
            None => FormKind::default(),
        };
        let mut form = Self::new(kind);
        for child in element.children() {
            match child.name() {
                "title" => form.title = Some(child.text()),
                "instructions" => form.instructions.push(child.text()),
                "field" => form.fields.push(FormField::from_element(child)),
                _ => {}
            }
        }
        Ok(form)
    }
}

impl ExtensionElement for DataForm {
    fn element_name(&self) -> &str {
        "x"
    }

    fn namespace(&self) -> &str {
        DATA_FORMS_NS
    }

    fn to_xml(&self, enclosing: &XmlEnvironment) -> XmlStringBuilder {
        let mut xml = XmlStringBuilder::open("x", DATA_FORMS_NS, None, enclosing);
        xml.attribute("type", self.kind.as_str());
        if self.title.is_none() && self.instructions.is_empty() && self.fields.is_empty() {
            xml.close_empty_element();
            return xml;
        }
        xml.right_angle_bracket();
        xml.opt_element("title", self.title.as_deref());
        for instructions in &self.instructions {
            xml.element("instructions", instructions);
        }
        for field in &self.fields {
            field.write(&mut xml);
        }
        xml.close();
        xml
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extended_info_form_round_trip() {
        let form = DataForm::extended_info("urn:xmpp:dataforms:softwareinfo")
            .with_field(FormField::new("os").with_value("Linux"))
            .with_field(FormField::new("software").with_label("Software").with_value("Waddle"));

        let xml = form.to_xml(&XmlEnvironment::empty()).into_string();
        let element: Element = xml.parse().unwrap();
        let parsed = DataForm::from_element(&element).unwrap();

        assert_eq!(parsed, form);
        assert_eq!(parsed.form_type(), Some("urn:xmpp:dataforms:softwareinfo"));
        assert!(parsed.has_hidden_form_type());
    }

    #[test]
    fn test_field_without_values_is_self_closing() {
        let form = DataForm::new(FormKind::Form).with_field(FormField::new("x"));
        let xml = form.to_xml(&XmlEnvironment::empty()).into_string();
        assert_eq!(
            xml,
            "<x xmlns='jabber:x:data' type='form'><field var='x'/></x>"
        );
    }

    #[test]
    fn test_rejects_foreign_element() {
        let element: Element = "<query xmlns='jabber:iq:roster'/>".parse().unwrap();
        assert!(DataForm::from_element(&element).is_err());
    }

    #[test]
    fn test_unknown_form_kind() {
        let element: Element = "<x xmlns='jabber:x:data' type='bogus'/>".parse().unwrap();
        assert!(matches!(
            DataForm::from_element(&element),
            Err(XmppError::UnknownType { .. })
        ));
    }
}
