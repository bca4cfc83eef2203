use crate::core::gateway::{Gateway, PageSignal, SignalKind, SignalSubscription};
use crate::dom::scripts::READY_STATE;
use crate::errors::{PilotError, Result};
use serde_json::Value;
use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct NavigationOptions {
    pub wait_for_navigation: bool,
    pub navigation_timeout: Duration,
    /// Grace window for the first signal after the action.
    pub wait_for_start: Duration,
    /// When non-empty, await exactly these events instead of the default set.
    pub wait_for_events: Vec<SignalKind>,
    pub ready_state_interval: Duration,
}

impl Default for NavigationOptions {
    fn default() -> Self {
        Self {
            wait_for_navigation: true,
            navigation_timeout: Duration::from_millis(30000),
            wait_for_start: Duration::from_millis(100),
            wait_for_events: Vec::new(),
            ready_state_interval: Duration::from_millis(25),
        }
    }
}

/// What the page still owes after an action started a navigation.
#[derive(Debug, Default)]
struct Pending {
    requests: HashSet<String>,
    /// The top-level document is loading.
    loading: bool,
    main_frame: Option<String>,
    /// Child frames that navigated and have not stopped loading yet.
    frames: HashSet<String>,
    targets: HashSet<String>,
    reconnecting: bool,
}

impl Pending {
    /// Records `signal`; false for signals that say nothing about navigation.
    fn observe(&mut self, signal: &PageSignal) -> bool {
        match signal {
            PageSignal::RequestStarted { request_id } => {
                self.requests.insert(request_id.clone());
            }
            PageSignal::RequestFinished { request_id } | PageSignal::RequestFailed { request_id } => {
                self.requests.remove(request_id);
            }
            PageSignal::FrameNavigated {
                frame_id,
                parent_id: None,
                ..
            } => {
                self.main_frame = Some(frame_id.clone());
                self.loading = true;
            }
            PageSignal::FrameNavigated { frame_id, .. } => {
                self.frames.insert(frame_id.clone());
            }
            PageSignal::FrameStoppedLoading { frame_id } => {
                if self.main_frame.as_ref() == Some(frame_id) {
                    self.loading = false;
                }
                self.frames.remove(frame_id);
            }
            // the window load event waits for every child frame
            PageSignal::LoadEventFired => {
                self.loading = false;
                self.frames.clear();
            }
            PageSignal::TargetCreated { target_id } => {
                self.targets.insert(target_id.clone());
            }
            PageSignal::TargetLoaded { target_id } | PageSignal::TargetDestroyed { target_id } => {
                self.targets.remove(target_id);
            }
            PageSignal::TargetReconnecting => {
                // the old target's requests will never finish
                self.requests.clear();
                self.targets.clear();
                self.frames.clear();
                self.loading = false;
                self.reconnecting = true;
            }
            PageSignal::TargetReconnected => self.reconnecting = false,
            PageSignal::ResponseReceived { .. } | PageSignal::DomContentLoaded => return false,
        }
        true
    }

    fn is_settled(&self) -> bool {
        self.requests.is_empty()
            && !self.loading
            && self.frames.is_empty()
            && self.targets.is_empty()
            && !self.reconnecting
    }
}

/// Runs `action` and, if it set off a navigation, only returns once the page
/// settled. The signal listener is released on every exit path.
pub async fn awaiting_navigation<T, F, Fut>(
    gateway: &dyn Gateway,
    options: &NavigationOptions,
    action: F,
) -> Result<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    if !options.wait_for_navigation {
        return action().await;
    }

    let mut subscription = gateway.subscribe().await?;
    let outcome = match action().await {
        Ok(value) => {
            let settled = tokio::time::timeout(
                options.navigation_timeout,
                settle(gateway, &mut subscription, options),
            )
            .await;
            match settled {
                Ok(Ok(())) => Ok(value),
                Ok(Err(err)) => Err(err),
                Err(_) => Err(PilotError::NavigationTimeout {
                    timeout_ms: options.navigation_timeout.as_millis() as u64,
                }),
            }
        }
        Err(err) => Err(err),
    };
    subscription.close();
    outcome
}

async fn settle(
    gateway: &dyn Gateway,
    subscription: &mut SignalSubscription,
    options: &NavigationOptions,
) -> Result<()> {
    if !options.wait_for_events.is_empty() {
        let mut remaining: HashSet<SignalKind> = options.wait_for_events.iter().copied().collect();
        while !remaining.is_empty() {
            match subscription.recv().await {
                Some(signal) => {
                    remaining.remove(&signal.kind());
                }
                None => break,
            }
        }
        return wait_for_ready_state(gateway, options.ready_state_interval).await;
    }

    let mut pending = Pending::default();
    let grace_ends = Instant::now() + options.wait_for_start;
    loop {
        match tokio::time::timeout_at(grace_ends, subscription.recv()).await {
            Ok(Some(signal)) => {
                debug!("navigation signal {:?}", signal);
                if pending.observe(&signal) {
                    break;
                }
            }
            Ok(None) | Err(_) => {
                debug!("no navigation started within {:?}", options.wait_for_start);
                return Ok(());
            }
        }
    }

    while !pending.is_settled() {
        match subscription.recv().await {
            Some(signal) => {
                debug!("navigation signal {:?}", signal);
                pending.observe(&signal);
            }
            None => break,
        }
    }
    wait_for_ready_state(gateway, options.ready_state_interval).await
}

/// Polls `document.readyState` until it reads "complete".
pub async fn wait_for_ready_state(gateway: &dyn Gateway, interval: Duration) -> Result<()> {
    loop {
        match gateway
            .evaluate_expression(READY_STATE)
            .await
            .and_then(|value| value.into_value())
        {
            Ok(Value::String(state)) if state == "complete" => return Ok(()),
            Ok(state) => debug!("ready state is {}", state),
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => debug!("ready state check failed: {}", err),
        }
        tokio::time::sleep(interval).await;
    }
}
