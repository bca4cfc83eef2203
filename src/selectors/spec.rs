use crate::dom::remote::{ElementInfo, RemoteRef};
use crate::errors::{PilotError, Result};
use crate::selectors::proximity::{Proximity, Relation};
use crate::selectors::text::TextPattern;
use std::collections::BTreeMap;

/// What sort of element a selector looks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Text,
    Button,
    Link,
    TextBox,
    CheckBox,
    RadioButton,
    DropDown,
    FileField,
    Image,
    ListItem,
}

/// Which element queries make sense for a kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub has_value: bool,
    pub has_options: bool,
    pub has_checked_state: bool,
}

impl Capabilities {
    /// Plain text selectors can land on anything, so the page decides.
    pub const ANY: Capabilities = Capabilities {
        has_value: true,
        has_options: true,
        has_checked_state: true,
    };
}

impl ElementKind {
    pub fn name(&self) -> &'static str {
        match self {
            ElementKind::Text => "element",
            ElementKind::Button => "button",
            ElementKind::Link => "link",
            ElementKind::TextBox => "text field",
            ElementKind::CheckBox => "checkbox",
            ElementKind::RadioButton => "radio button",
            ElementKind::DropDown => "dropdown",
            ElementKind::FileField => "file field",
            ElementKind::Image => "image",
            ElementKind::ListItem => "list item",
        }
    }

    /// CSS alternatives that make up the kind. Attribute searches run once per
    /// alternative and union the results.
    pub fn tag_alternatives(&self) -> &'static [&'static str] {
        match self {
            ElementKind::Text => &["*"],
            ElementKind::Button => &[
                "button",
                "input[type=\"button\"]",
                "input[type=\"submit\"]",
                "input[type=\"reset\"]",
                "input[type=\"image\"]",
            ],
            ElementKind::Link => &["a"],
            ElementKind::TextBox => &[
                "input:not([type])",
                "input[type=\"text\"]",
                "input[type=\"password\"]",
                "input[type=\"email\"]",
                "input[type=\"search\"]",
                "input[type=\"number\"]",
                "input[type=\"tel\"]",
                "input[type=\"url\"]",
                "textarea",
                "[contenteditable]",
            ],
            ElementKind::CheckBox => &["input[type=\"checkbox\"]"],
            ElementKind::RadioButton => &["input[type=\"radio\"]"],
            ElementKind::DropDown => &["select"],
            ElementKind::FileField => &["input[type=\"file\"]"],
            ElementKind::Image => &["img"],
            ElementKind::ListItem => &["li"],
        }
    }

    /// The fallback query matching every element of the kind.
    pub fn fallback_css(&self) -> String {
        match self {
            ElementKind::Text => "body *".to_string(),
            _ => self.tag_alternatives().join(","),
        }
    }

    /// Form controls are named by a `<label>`, not by their own text.
    pub fn labelled_by_label_element(&self) -> bool {
        matches!(
            self,
            ElementKind::TextBox
                | ElementKind::CheckBox
                | ElementKind::RadioButton
                | ElementKind::DropDown
                | ElementKind::FileField
        )
    }

    pub fn capabilities(&self) -> Capabilities {
        match self {
            ElementKind::TextBox | ElementKind::FileField => Capabilities {
                has_value: true,
                ..Capabilities::default()
            },
            ElementKind::DropDown => Capabilities {
                has_value: true,
                has_options: true,
                ..Capabilities::default()
            },
            ElementKind::CheckBox | ElementKind::RadioButton => Capabilities {
                has_value: true,
                has_checked_state: true,
                ..Capabilities::default()
            },
            ElementKind::Text => Capabilities::ANY,
            _ => Capabilities::default(),
        }
    }

    /// Best guess at the kind of an element the page described.
    pub fn from_info(info: &ElementInfo) -> ElementKind {
        let input_type = info.input_type.as_deref().unwrap_or("text");
        match (info.tag.as_str(), input_type) {
            ("button", _) => ElementKind::Button,
            ("input", "button" | "submit" | "reset" | "image") => ElementKind::Button,
            ("input", "checkbox") => ElementKind::CheckBox,
            ("input", "radio") => ElementKind::RadioButton,
            ("input", "file") => ElementKind::FileField,
            ("input", _) | ("textarea", _) => ElementKind::TextBox,
            ("a", _) => ElementKind::Link,
            ("select", _) => ElementKind::DropDown,
            ("img", _) => ElementKind::Image,
            ("li", _) => ElementKind::ListItem,
            _ => ElementKind::Text,
        }
    }
}

/// How a selector names its element. Decided once, at construction.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectorSpec {
    Label(TextPattern),
    Attributes(BTreeMap<String, String>),
    /// No label at all: every element of the kind, narrowed by these constraints.
    Composite(Vec<Proximity>),
    Handle(RemoteRef),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    pub kind: ElementKind,
    pub spec: SelectorSpec,
    pub constraints: Vec<Proximity>,
}

impl Selector {
    pub fn new(kind: ElementKind, spec: SelectorSpec) -> Self {
        Self {
            kind,
            spec,
            constraints: Vec::new(),
        }
    }

    pub fn labelled(kind: ElementKind, label: impl Into<TextPattern>) -> Self {
        Self::new(kind, SelectorSpec::Label(label.into()))
    }

    pub fn text(label: impl Into<TextPattern>) -> Self {
        Self::labelled(ElementKind::Text, label)
    }

    pub fn button(label: impl Into<TextPattern>) -> Self {
        Self::labelled(ElementKind::Button, label)
    }

    pub fn link(label: impl Into<TextPattern>) -> Self {
        Self::labelled(ElementKind::Link, label)
    }

    pub fn text_box(label: impl Into<TextPattern>) -> Self {
        Self::labelled(ElementKind::TextBox, label)
    }

    pub fn check_box(label: impl Into<TextPattern>) -> Self {
        Self::labelled(ElementKind::CheckBox, label)
    }

    pub fn radio_button(label: impl Into<TextPattern>) -> Self {
        Self::labelled(ElementKind::RadioButton, label)
    }

    pub fn drop_down(label: impl Into<TextPattern>) -> Self {
        Self::labelled(ElementKind::DropDown, label)
    }

    pub fn file_field(label: impl Into<TextPattern>) -> Self {
        Self::labelled(ElementKind::FileField, label)
    }

    pub fn image(alt: impl Into<TextPattern>) -> Self {
        Self::labelled(ElementKind::Image, alt)
    }

    pub fn list_item(label: impl Into<TextPattern>) -> Self {
        Self::labelled(ElementKind::ListItem, label)
    }

    /// Every element of `kind`; pair with proximity constraints.
    pub fn any(kind: ElementKind) -> Self {
        Self::new(kind, SelectorSpec::Composite(Vec::new()))
    }

    pub fn with_attributes<K, V>(kind: ElementKind, attributes: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let map = attributes
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        Self::new(kind, SelectorSpec::Attributes(map))
    }

    pub fn handle(kind: ElementKind, reference: RemoteRef) -> Self {
        Self::new(kind, SelectorSpec::Handle(reference))
    }

    pub fn constrained(mut self, proximity: Proximity) -> Self {
        match &mut self.spec {
            SelectorSpec::Composite(constraints) => constraints.push(proximity),
            _ => self.constraints.push(proximity),
        }
        self
    }

    pub fn above(self, reference: Selector) -> Self {
        self.constrained(Proximity::new(Relation::Above, reference))
    }

    pub fn below(self, reference: Selector) -> Self {
        self.constrained(Proximity::new(Relation::Below, reference))
    }

    pub fn to_left_of(self, reference: Selector) -> Self {
        self.constrained(Proximity::new(Relation::ToLeftOf, reference))
    }

    pub fn to_right_of(self, reference: Selector) -> Self {
        self.constrained(Proximity::new(Relation::ToRightOf, reference))
    }

    pub fn near(self, reference: Selector) -> Self {
        self.constrained(Proximity::new(Relation::near(), reference))
    }

    pub fn within(self, reference: Selector) -> Self {
        self.constrained(Proximity::new(Relation::Within, reference))
    }

    /// Composite arguments first, then constraints added afterwards.
    pub fn all_constraints(&self) -> Vec<&Proximity> {
        let composite: &[Proximity] = match &self.spec {
            SelectorSpec::Composite(constraints) => constraints,
            _ => &[],
        };
        composite.iter().chain(self.constraints.iter()).collect()
    }

    pub fn description(&self) -> String {
        self.describe_as(self.kind.name())
    }

    /// Rejects queries the selector's kind cannot answer, before any lookup.
    pub fn require(&self, supported: fn(&Capabilities) -> bool, what: &str) -> Result<()> {
        if supported(&self.kind.capabilities()) {
            Ok(())
        } else {
            Err(PilotError::UnsupportedOperation(format!(
                "{} has no {}",
                self.description(),
                what
            )))
        }
    }

    /// Description naming the kind the matched element turned out to be.
    pub fn description_for(&self, info: &ElementInfo) -> String {
        if self.kind == ElementKind::Text {
            self.describe_as(ElementKind::from_info(info).name())
        } else {
            self.description()
        }
    }

    fn describe_as(&self, kind_name: &str) -> String {
        let mut description = match &self.spec {
            SelectorSpec::Label(pattern) => format!("{} with label {}", kind_name, pattern),
            SelectorSpec::Attributes(map) => {
                let pairs: Vec<String> = map.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
                format!("{} with attributes {{{}}}", kind_name, pairs.join(", "))
            }
            SelectorSpec::Composite(_) => kind_name.to_string(),
            SelectorSpec::Handle(reference) => format!("{} {}", kind_name, reference),
        };
        for constraint in self.all_constraints() {
            description.push(' ');
            description.push_str(&constraint.description());
        }
        description
    }
}

impl From<&str> for Selector {
    fn from(label: &str) -> Self {
        Selector::text(label)
    }
}

impl From<String> for Selector {
    fn from(label: String) -> Self {
        Selector::text(label)
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

fn escape_css_string(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// One CSS query conjoining every attribute pair, repeated for each tag
/// alternative. `class` matches a token; everything else matches exactly.
pub fn attribute_css(kind: ElementKind, attributes: &BTreeMap<String, String>) -> String {
    let mut conditions = String::new();
    for (key, value) in attributes {
        if key == "class" {
            for token in value.split_whitespace() {
                conditions.push_str(&format!("[class~=\"{}\"]", escape_css_string(token)));
            }
        } else {
            conditions.push_str(&format!("[{}=\"{}\"]", key, escape_css_string(value)));
        }
    }
    kind.tag_alternatives()
        .iter()
        .map(|tag| {
            if *tag == "*" && !conditions.is_empty() {
                conditions.clone()
            } else {
                format!("{}{}", tag, conditions)
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}
