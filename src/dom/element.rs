use crate::core::gateway::Gateway;
use crate::dom::remote::{ElementInfo, OptionQuery, PageCall, RemoteRef};
use crate::errors::{PilotError, Result};
use crate::types::{Point, Rect};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

/// The option a dropdown ended up on.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SelectedOption {
    pub text: String,
    pub value: String,
}

/// One node found by a search, with the description it was found under.
/// Never cached across searches: the node may be gone by the next one.
#[derive(Clone)]
pub struct Element {
    reference: RemoteRef,
    description: String,
    gateway: Arc<dyn Gateway>,
}

impl Element {
    pub fn new(reference: RemoteRef, description: impl Into<String>, gateway: Arc<dyn Gateway>) -> Self {
        Self {
            reference,
            description: description.into(),
            gateway,
        }
    }

    pub fn reference(&self) -> &RemoteRef {
        &self.reference
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    async fn call(&self, call: PageCall) -> Result<Value> {
        self.gateway
            .call_function(Some(&self.reference), &call)
            .await?
            .into_value()
    }

    async fn flag(&self, call: PageCall) -> Result<bool> {
        let name = call.name();
        match self.call(call).await? {
            Value::Bool(flag) => Ok(flag),
            other => Err(PilotError::Gateway(format!(
                "{} returned {} instead of a boolean",
                name, other
            ))),
        }
    }

    async fn string(&self, call: PageCall) -> Result<String> {
        Ok(match self.call(call).await? {
            Value::String(text) => text,
            Value::Null => String::new(),
            other => other.to_string(),
        })
    }

    pub async fn describe(&self) -> Result<ElementInfo> {
        Ok(serde_json::from_value(self.call(PageCall::Describe).await?)?)
    }

    pub async fn is_visible(&self) -> Result<bool> {
        self.flag(PageCall::IsVisible).await
    }

    pub async fn is_disabled(&self) -> Result<bool> {
        self.flag(PageCall::IsDisabled).await
    }

    pub async fn is_writable(&self) -> Result<bool> {
        self.flag(PageCall::IsWritable).await
    }

    pub async fn is_checked(&self) -> Result<bool> {
        self.flag(PageCall::IsChecked).await
    }

    pub async fn text(&self) -> Result<String> {
        self.string(PageCall::Text).await
    }

    pub async fn value(&self) -> Result<String> {
        self.string(PageCall::Value).await
    }

    pub async fn scroll_into_view(&self) -> Result<()> {
        self.call(PageCall::ScrollIntoView).await?;
        Ok(())
    }

    pub async fn scroll_by(&self, x: f64, y: f64) -> Result<()> {
        self.call(PageCall::ScrollBy { x, y }).await?;
        Ok(())
    }

    /// True when a hit test at the element's center lands on the element
    /// itself or one of its descendants.
    pub async fn is_at_point(&self) -> Result<bool> {
        self.flag(PageCall::HitTest).await
    }

    pub async fn focus(&self) -> Result<bool> {
        self.flag(PageCall::Focus).await
    }

    pub async fn clear(&self) -> Result<()> {
        self.call(PageCall::ClearValue).await?;
        Ok(())
    }

    pub async fn set_checked(&self, checked: bool) -> Result<bool> {
        self.flag(PageCall::SetChecked { checked }).await
    }

    pub async fn select_option(&self, option: OptionQuery) -> Result<Option<SelectedOption>> {
        match self.call(PageCall::SelectOption { option }).await? {
            Value::Null => Ok(None),
            value => Ok(Some(serde_json::from_value(value)?)),
        }
    }

    pub async fn highlight(&self) -> Result<()> {
        self.call(PageCall::Highlight).await?;
        Ok(())
    }

    pub async fn bounding_rect(&self) -> Result<Option<Rect>> {
        Ok(self
            .gateway
            .box_model(&self.reference)
            .await?
            .and_then(|model| model.bounding_rect()))
    }

    pub async fn center(&self) -> Result<Point> {
        self.bounding_rect()
            .await?
            .map(|rect| rect.center())
            .ok_or_else(|| PilotError::NotActionable {
                description: self.description.clone(),
                checks: "rendered".to_string(),
            })
    }
}

impl std::fmt::Debug for Element {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Element")
            .field("reference", &self.reference)
            .field("description", &self.description)
            .finish()
    }
}
