use crate::actions::actionability::{Check, DEFAULT_CHECKS, WRITE_CHECKS};
use crate::actions::base::ActionOptions;
use crate::browser::session::PageSession;
use crate::core::gateway::KeyEvent;
use crate::dom::element::Element;
use crate::dom::remote::PageCall;
use crate::errors::{PilotError, Result};
use crate::selectors::spec::Selector;
use crate::wait::poll;
use std::time::Instant;

const MASK: &str = "*****";
const FOCUSED: &str = "focused element";

/// The key name and the text a character produces when typed.
fn key_for(ch: char) -> (String, Option<String>) {
    match ch {
        '\n' | '\r' => ("Enter".to_string(), Some("\r".to_string())),
        '\t' => ("Tab".to_string(), None),
        other => (other.to_string(), Some(other.to_string())),
    }
}

/// Text a named key produces on its own: single characters and Enter.
fn key_text(key: &str) -> Option<String> {
    let mut chars = key.chars();
    match (chars.next(), chars.next()) {
        (Some(ch), None) => Some(ch.to_string()),
        _ if key == "Enter" => Some("\r".to_string()),
        _ => None,
    }
}

impl PageSession {
    /// Types `text` into the field `into`, or into whatever holds focus.
    pub async fn write(&self, text: &str, into: Option<Selector>, options: ActionOptions) -> Result<String> {
        let started = Instant::now();
        let element = match &into {
            Some(selector) => self.find_actionable(selector, WRITE_CHECKS, &options).await?,
            None => self.focused_element(&options).await?,
        };
        self.highlight(&element).await;
        element.focus().await?;
        self.navigating(&options, || self.type_text(text)).await?;

        let shown = if options.hide_text { MASK } else { text };
        let description = match into {
            Some(_) => format!("Wrote {} into the {}", shown, element.description()),
            None => format!("Wrote {} into the {}", shown, FOCUSED),
        };
        self.completed(description, started).await
    }

    pub async fn clear(&self, selector: impl Into<Selector>, options: ActionOptions) -> Result<String> {
        let started = Instant::now();
        let element = self
            .find_actionable(&selector.into(), WRITE_CHECKS, &options)
            .await?;
        self.highlight(&element).await;
        element.focus().await?;
        self.navigating(&options, || element.clear()).await?;
        self.completed(format!("Cleared the {}", element.description()), started)
            .await
    }

    /// Presses `keys` as a chord: downs in order, ups in reverse.
    pub async fn press(&self, keys: &[&str], options: ActionOptions) -> Result<String> {
        let started = Instant::now();
        if keys.is_empty() {
            return Err(PilotError::UnsupportedOperation(
                "press needs at least one key".to_string(),
            ));
        }
        self.navigating(&options, || async {
            for key in keys {
                self.gateway()
                    .dispatch_key(KeyEvent::down(*key, key_text(key)))
                    .await?;
            }
            for key in keys.iter().rev() {
                self.gateway().dispatch_key(KeyEvent::up(*key)).await?;
            }
            Ok(())
        })
        .await?;
        self.completed(format!("Pressed the {} key", keys.join(" + ")), started)
            .await
    }

    pub async fn focus(&self, selector: impl Into<Selector>, options: ActionOptions) -> Result<String> {
        let started = Instant::now();
        let element = self
            .find_actionable(&selector.into(), DEFAULT_CHECKS, &options)
            .await?;
        self.highlight(&element).await;
        self.navigating(&options, || element.focus()).await?;
        self.completed(format!("Focussed on the {}", element.description()), started)
            .await
    }

    async fn type_text(&self, text: &str) -> Result<()> {
        for ch in text.chars() {
            let (key, produced) = key_for(ch);
            self.gateway()
                .dispatch_key(KeyEvent::down(key.clone(), produced))
                .await?;
            self.gateway().dispatch_key(KeyEvent::up(key)).await?;
        }
        Ok(())
    }

    /// The element holding focus, once there is one and it accepts text.
    async fn focused_element(&self, options: &ActionOptions) -> Result<Element> {
        let config = self.config().await;
        let gateway = self.gateway();
        poll(options.retry_policy(&config), FOCUSED, move || async move {
            let focused = gateway
                .call_function(None, &PageCall::ActiveElement)
                .await?
                .into_nodes()?
                .into_iter()
                .next();
            let Some(reference) = focused else {
                return Err(PilotError::NotFound {
                    description: FOCUSED.to_string(),
                });
            };
            let element = Element::new(reference, FOCUSED, gateway.clone());
            if !Check::Writable.passes(&element).await? {
                return Err(PilotError::NotActionable {
                    description: FOCUSED.to_string(),
                    checks: Check::Writable.name().to_string(),
                });
            }
            Ok(Some(element))
        })
        .await
    }
}
