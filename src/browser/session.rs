use crate::actions::actionability::{wait_for_actionable, Check};
use crate::actions::base::ActionOptions;
use crate::browser::navigation::awaiting_navigation;
use crate::core::config::Config;
use crate::core::gateway::Gateway;
use crate::dom::element::Element;
use crate::dom::scripts::CURRENT_URL;
use crate::errors::{PilotError, Result};
use crate::events::{ActionEvent, EventBus};
use crate::selectors::resolve::{Resolver, Search};
use crate::selectors::spec::Selector;
use crate::wait::{poll, RetryPolicy};
use chrono::Utc;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{info, warn};
use url::Url;
use uuid::Uuid;

/// Everything one page connection needs: the gateway, the session settings
/// and the event bus. Actions are methods on this type.
pub struct PageSession {
    id: Uuid,
    gateway: Arc<dyn Gateway>,
    resolver: Resolver,
    config: RwLock<Config>,
    events: EventBus,
}

impl PageSession {
    pub fn new(gateway: Arc<dyn Gateway>, config: Config) -> Self {
        let id = Uuid::new_v4();
        info!("page session {} started", id);
        Self {
            id,
            resolver: Resolver::new(gateway.clone()),
            gateway,
            config: RwLock::new(config),
            events: EventBus::default(),
        }
    }

    /// Launches Chrome and opens a session on a fresh tab.
    #[cfg(feature = "chrome")]
    pub async fn launch(config: Config) -> Result<Self> {
        let gateway = crate::browser::chrome::ChromeGateway::launch(&config).await?;
        Ok(Self::new(Arc::new(gateway), config))
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn gateway(&self) -> &Arc<dyn Gateway> {
        &self.gateway
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub async fn config(&self) -> Config {
        self.config.read().await.clone()
    }

    /// Changes one option; unknown keys and mistyped values are rejected.
    pub async fn set_config(&self, key: &str, value: Value) -> Result<()> {
        self.config.write().await.set(key, value)
    }

    pub fn resolve(&self, selector: impl Into<Selector>) -> Search {
        self.resolver.resolve(selector.into())
    }

    pub async fn goto(&self, url: &str, options: ActionOptions) -> Result<String> {
        let started = Instant::now();
        let url = normalize_url(url)?;
        let config = self.config().await;
        let mut navigation = options.navigation(&config);
        // loading a page is a navigation whether or not the caller asked to wait
        navigation.wait_for_navigation = true;
        awaiting_navigation(self.gateway.as_ref(), &navigation, || {
            self.gateway.navigate(url.as_str())
        })
        .await?;
        self.completed(format!("Navigated to URL {}", url), started).await
    }

    pub async fn current_url(&self) -> Result<String> {
        match self.gateway.evaluate_expression(CURRENT_URL).await?.into_value()? {
            Value::String(url) => Ok(url),
            other => Err(PilotError::Gateway(format!("unexpected location {}", other))),
        }
    }

    /// Whether anything matches. A single check unless `policy` says otherwise.
    pub async fn exists(&self, selector: impl Into<Selector>, policy: Option<RetryPolicy>) -> Result<bool> {
        let search = self.resolve(selector);
        let description = search.description();
        let search = &search;
        let found = poll(policy.unwrap_or_else(RetryPolicy::once), &description, move || async move {
            Ok(if search.run().await?.is_empty() { None } else { Some(()) })
        })
        .await;
        match found {
            Ok(()) => Ok(true),
            Err(err) if err.aborts_retry() => Err(err),
            Err(_) => Ok(false),
        }
    }

    /// Waits until the selector matches a visible element.
    pub async fn wait_for(&self, selector: impl Into<Selector>, options: ActionOptions) -> Result<()> {
        self.find_actionable(&selector.into(), &[Check::Visible], &options)
            .await
            .map(|_| ())
    }

    pub async fn text(&self, selector: impl Into<Selector>) -> Result<String> {
        self.first_match(&selector.into(), &ActionOptions::default())
            .await?
            .text()
            .await
    }

    pub async fn value(&self, selector: impl Into<Selector>) -> Result<String> {
        let selector = selector.into();
        selector.require(|c| c.has_value, "value")?;
        self.first_match(&selector, &ActionOptions::default())
            .await?
            .value()
            .await
    }

    pub async fn is_checked(&self, selector: impl Into<Selector>) -> Result<bool> {
        let selector = selector.into();
        selector.require(|c| c.has_checked_state, "checked state")?;
        self.first_match(&selector, &ActionOptions::default())
            .await?
            .is_checked()
            .await
    }

    /// First element the selector resolves to, retried until one exists.
    pub(crate) async fn first_match(&self, selector: &Selector, options: &ActionOptions) -> Result<Element> {
        self.find_actionable(selector, &[], options).await
    }

    pub(crate) async fn find_actionable(
        &self,
        selector: &Selector,
        checks: &[Check],
        options: &ActionOptions,
    ) -> Result<Element> {
        let config = self.config().await;
        let search = self.resolver.resolve(selector.clone());
        wait_for_actionable(
            &search,
            checks,
            options.retry_policy(&config),
            config.elements_to_match(),
        )
        .await
    }

    /// Runs a page mutation inside navigation synchronization.
    pub(crate) async fn navigating<T, F, Fut>(&self, options: &ActionOptions, action: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let config = self.config().await;
        awaiting_navigation(self.gateway.as_ref(), &options.navigation(&config), action).await
    }

    pub(crate) async fn highlight(&self, element: &Element) {
        if !self.config.read().await.highlight_on_action() {
            return;
        }
        if let Err(err) = element.highlight().await {
            warn!("could not highlight {}: {}", element.description(), err);
        }
    }

    /// Publishes the description of a finished action and returns it.
    pub(crate) async fn completed(&self, description: String, started: Instant) -> Result<String> {
        let duration_ms = started.elapsed().as_millis() as u64;
        info!(session = %self.id, duration_ms, "{}", description);
        self.events.publish(ActionEvent {
            session_id: self.id,
            description: description.clone(),
            timestamp: Utc::now(),
            duration_ms,
        });
        let config = self.config().await;
        if config.observe() {
            tokio::time::sleep(config.observe_time()).await;
        }
        Ok(description)
    }
}

impl std::fmt::Debug for PageSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageSession").field("id", &self.id).finish_non_exhaustive()
    }
}

const SCHEMES: [&str; 6] = ["http", "https", "file", "about", "data", "chrome"];

/// Accepts bare hosts like `example.com` or `localhost:8080` by assuming http.
fn normalize_url(url: &str) -> Result<Url> {
    let invalid = |e: url::ParseError| PilotError::NavigationFailed(format!("invalid URL '{}': {}", url, e));
    match Url::parse(url) {
        Ok(parsed) if SCHEMES.contains(&parsed.scheme()) => Ok(parsed),
        Ok(_) | Err(url::ParseError::RelativeUrlWithoutBase) => {
            Url::parse(&format!("http://{}", url)).map_err(invalid)
        }
        Err(e) => Err(invalid(e)),
    }
}
