//! Structured remote calls.
//!
//! Every DOM inspection or mutation is one [`PageCall`]: a named page-context
//! function plus its captured arguments. Gateways marshal the arguments as
//! JSON and run the matching function with `this` bound to the target node
//! (or to `document` for document-level calls).

use crate::errors::{PilotError, Result};
use crate::selectors::text::TextQuery;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lookup key for a node living in the browser. The browser owns the node;
/// the key dangles once its execution context is destroyed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteRef {
    pub object_id: String,
}

impl RemoteRef {
    pub fn new(object_id: impl Into<String>) -> Self {
        Self {
            object_id: object_id.into(),
        }
    }
}

impl std::fmt::Display for RemoteRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.object_id)
    }
}

/// How a label element is tied to the control it names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LabelStrategy {
    /// `<label for="id">` pointing at the control.
    For,
    /// The control is a direct child of the label.
    Nested,
    /// A text node right after the control.
    InlineAdjacent,
}

/// Which `<option>` of a dropdown to pick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "by", rename_all = "camelCase")]
pub enum OptionQuery {
    Index { index: usize },
    Text { text: String },
    Value { value: String },
    Pattern { source: String, flags: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "call", rename_all = "camelCase")]
pub enum PageCall {
    // document-level, return nodes
    FindByText {
        query: TextQuery,
        scope: Option<String>,
    },
    QueryCss {
        selector: String,
    },
    LabelledControls {
        label: TextQuery,
        control: String,
        strategy: LabelStrategy,
    },
    ActiveElement,
    // element-level, return values
    Describe,
    IsVisible,
    IsDisabled,
    IsWritable,
    IsChecked,
    Text,
    Value,
    ScrollIntoView,
    HitTest,
    Focus,
    ClearValue,
    SetChecked {
        checked: bool,
    },
    SelectOption {
        option: OptionQuery,
    },
    Highlight,
    ScrollBy {
        x: f64,
        y: f64,
    },
}

impl PageCall {
    pub fn name(&self) -> &'static str {
        match self {
            PageCall::FindByText { .. } => "findByText",
            PageCall::QueryCss { .. } => "queryCss",
            PageCall::LabelledControls { .. } => "labelledControls",
            PageCall::ActiveElement => "activeElement",
            PageCall::Describe => "describe",
            PageCall::IsVisible => "isVisible",
            PageCall::IsDisabled => "isDisabled",
            PageCall::IsWritable => "isWritable",
            PageCall::IsChecked => "isChecked",
            PageCall::Text => "text",
            PageCall::Value => "value",
            PageCall::ScrollIntoView => "scrollIntoView",
            PageCall::HitTest => "hitTest",
            PageCall::Focus => "focus",
            PageCall::ClearValue => "clearValue",
            PageCall::SetChecked { .. } => "setChecked",
            PageCall::SelectOption { .. } => "selectOption",
            PageCall::Highlight => "highlight",
            PageCall::ScrollBy { .. } => "scrollBy",
        }
    }

    /// Calls whose result is a list of node references rather than a plain value.
    pub fn returns_nodes(&self) -> bool {
        matches!(
            self,
            PageCall::FindByText { .. }
                | PageCall::QueryCss { .. }
                | PageCall::LabelledControls { .. }
                | PageCall::ActiveElement
        )
    }

    /// The single JSON argument handed to the page function.
    pub fn arguments(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// What a gateway call produced.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteValue {
    Value(Value),
    Nodes(Vec<RemoteRef>),
}

impl RemoteValue {
    pub fn into_value(self) -> Result<Value> {
        match self {
            RemoteValue::Value(value) => ensure_no_page_error(value),
            RemoteValue::Nodes(nodes) => Err(PilotError::Gateway(format!(
                "expected a plain value, got {} node references",
                nodes.len()
            ))),
        }
    }

    pub fn into_nodes(self) -> Result<Vec<RemoteRef>> {
        match self {
            RemoteValue::Nodes(nodes) => Ok(nodes),
            RemoteValue::Value(Value::Null) => Ok(Vec::new()),
            RemoteValue::Value(value) => {
                ensure_no_page_error(value.clone())?;
                Err(PilotError::Gateway(format!(
                    "expected node references, got {}",
                    value
                )))
            }
        }
    }
}

/// Page functions report their own exceptions as `{error, stack}` payloads.
pub fn ensure_no_page_error(value: Value) -> Result<Value> {
    if let Some(object) = value.as_object() {
        if let (Some(error), Some(stack)) = (object.get("error"), object.get("stack")) {
            return Err(PilotError::PageScript {
                message: error.as_str().unwrap_or_default().to_string(),
                stack: stack.as_str().unwrap_or_default().to_string(),
            });
        }
    }
    Ok(value)
}

/// Shape returned by [`PageCall::Describe`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementInfo {
    pub tag: String,
    #[serde(rename = "type", default)]
    pub input_type: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl ElementInfo {
    pub fn is_file_input(&self) -> bool {
        self.tag == "input" && self.input_type.as_deref() == Some("file")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selectors::text::{MatchMode, TextPattern};
    use serde_json::json;

    #[test]
    fn page_errors_are_raised() {
        let err = ensure_no_page_error(json!({"error": "boom", "stack": "at x"})).unwrap_err();
        match err {
            PilotError::PageScript { message, stack } => {
                assert_eq!(message, "boom");
                assert_eq!(stack, "at x");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(
            ensure_no_page_error(json!({"error": "only"})).unwrap(),
            json!({"error": "only"})
        );
    }

    #[test]
    fn arguments_carry_the_call_tag() {
        let call = PageCall::FindByText {
            query: TextQuery::new(TextPattern::literal("Save"), MatchMode::Exact),
            scope: Some("button".into()),
        };
        let args = call.arguments().unwrap();
        assert_eq!(args["call"], json!("findByText"));
        assert_eq!(args["query"]["mode"], json!("exact"));
        assert_eq!(args["query"]["pattern"]["text"], json!("Save"));
        assert_eq!(args["scope"], json!("button"));
        assert!(call.returns_nodes());
        assert!(!PageCall::IsVisible.returns_nodes());
    }

    #[test]
    fn null_is_an_empty_node_list() {
        assert!(RemoteValue::Value(Value::Null).into_nodes().unwrap().is_empty());
        assert!(RemoteValue::Nodes(vec![]).into_value().is_err());
    }

    #[test]
    fn describe_payload_deserializes() {
        let info: ElementInfo =
            serde_json::from_value(json!({"tag": "input", "type": "file", "id": null})).unwrap();
        assert!(info.is_file_input());
    }
}
