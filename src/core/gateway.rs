use crate::dom::remote::{PageCall, RemoteRef, RemoteValue};
use crate::errors::{PilotError, Result};
use crate::types::{BoxModel, Point};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use tokio::sync::mpsc;

/// The protocol client the core drives: script evaluation, input dispatch,
/// geometry and navigation signals for one page.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Evaluate an expression in the page's current execution context
    async fn evaluate_expression(&self, source: &str) -> Result<RemoteValue>;

    /// Run a page function with `this` bound to `target`, or to `document`
    async fn call_function(&self, target: Option<&RemoteRef>, call: &PageCall)
        -> Result<RemoteValue>;

    /// Border box of a node; `None` when the node is not rendered
    async fn box_model(&self, node: &RemoteRef) -> Result<Option<BoxModel>>;

    async fn dispatch_mouse(&self, event: MouseEvent) -> Result<()>;

    async fn dispatch_key(&self, event: KeyEvent) -> Result<()>;

    async fn dispatch_touch(&self, event: TouchEvent) -> Result<()>;

    async fn set_file_input_files(&self, node: &RemoteRef, files: &[PathBuf]) -> Result<()>;

    /// Start listening to navigation and network signals
    async fn subscribe(&self) -> Result<SignalSubscription>;

    /// Load a URL and wait for the browser to report it navigated
    async fn navigate(&self, url: &str) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MouseEventKind {
    Moved,
    Pressed,
    Released,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum MouseButton {
    #[default]
    Left,
    Right,
    Middle,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MouseEvent {
    pub kind: MouseEventKind,
    pub point: Point,
    pub button: MouseButton,
    pub click_count: u32,
}

impl MouseEvent {
    pub fn moved(point: Point) -> Self {
        Self {
            kind: MouseEventKind::Moved,
            point,
            button: MouseButton::Left,
            click_count: 0,
        }
    }

    pub fn pressed(point: Point, button: MouseButton, click_count: u32) -> Self {
        Self {
            kind: MouseEventKind::Pressed,
            point,
            button,
            click_count,
        }
    }

    pub fn released(point: Point, button: MouseButton, click_count: u32) -> Self {
        Self {
            kind: MouseEventKind::Released,
            point,
            button,
            click_count,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyEventKind {
    Down,
    Up,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    pub kind: KeyEventKind,
    pub key: String,
    /// Text the key produces, if it produces any
    pub text: Option<String>,
}

impl KeyEvent {
    pub fn down(key: impl Into<String>, text: Option<String>) -> Self {
        Self {
            kind: KeyEventKind::Down,
            key: key.into(),
            text,
        }
    }

    pub fn up(key: impl Into<String>) -> Self {
        Self {
            kind: KeyEventKind::Up,
            key: key.into(),
            text: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TouchEventKind {
    Start,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TouchEvent {
    pub kind: TouchEventKind,
    pub point: Point,
}

/// Lifecycle notifications emitted by the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageSignal {
    RequestStarted { request_id: String },
    RequestFinished { request_id: String },
    RequestFailed { request_id: String },
    ResponseReceived { request_id: String },
    /// `parent_id` is `None` for the top-level frame.
    FrameNavigated {
        frame_id: String,
        parent_id: Option<String>,
        url: String,
    },
    FrameStoppedLoading { frame_id: String },
    DomContentLoaded,
    LoadEventFired,
    /// Another page target (a tab or popup) appeared.
    TargetCreated { target_id: String },
    /// A target from [`PageSignal::TargetCreated`] finished its first load.
    TargetLoaded { target_id: String },
    TargetDestroyed { target_id: String },
    TargetReconnecting,
    TargetReconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SignalKind {
    RequestStarted,
    RequestFinished,
    RequestFailed,
    ResponseReceived,
    FrameNavigated,
    FrameStoppedLoading,
    DomContentLoaded,
    LoadEventFired,
    TargetCreated,
    TargetLoaded,
    TargetDestroyed,
    TargetReconnecting,
    TargetReconnected,
}

impl SignalKind {
    pub const ALL: [SignalKind; 13] = [
        SignalKind::RequestStarted,
        SignalKind::RequestFinished,
        SignalKind::RequestFailed,
        SignalKind::ResponseReceived,
        SignalKind::FrameNavigated,
        SignalKind::FrameStoppedLoading,
        SignalKind::DomContentLoaded,
        SignalKind::LoadEventFired,
        SignalKind::TargetCreated,
        SignalKind::TargetLoaded,
        SignalKind::TargetDestroyed,
        SignalKind::TargetReconnecting,
        SignalKind::TargetReconnected,
    ];

    pub const fn name(&self) -> &'static str {
        match self {
            SignalKind::RequestStarted => "requestStarted",
            SignalKind::RequestFinished => "requestFinished",
            SignalKind::RequestFailed => "requestFailed",
            SignalKind::ResponseReceived => "responseReceived",
            SignalKind::FrameNavigated => "frameNavigated",
            SignalKind::FrameStoppedLoading => "frameStoppedLoading",
            SignalKind::DomContentLoaded => "domContentLoaded",
            SignalKind::LoadEventFired => "loadEventFired",
            SignalKind::TargetCreated => "targetCreated",
            SignalKind::TargetLoaded => "targetLoaded",
            SignalKind::TargetDestroyed => "targetDestroyed",
            SignalKind::TargetReconnecting => "targetReconnecting",
            SignalKind::TargetReconnected => "targetReconnected",
        }
    }
}

impl FromStr for SignalKind {
    type Err = PilotError;

    fn from_str(name: &str) -> Result<Self> {
        SignalKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.name() == name)
            .ok_or_else(|| PilotError::InvalidConfig(format!("unknown page event '{}'", name)))
    }
}

impl PageSignal {
    pub fn kind(&self) -> SignalKind {
        match self {
            PageSignal::RequestStarted { .. } => SignalKind::RequestStarted,
            PageSignal::RequestFinished { .. } => SignalKind::RequestFinished,
            PageSignal::RequestFailed { .. } => SignalKind::RequestFailed,
            PageSignal::ResponseReceived { .. } => SignalKind::ResponseReceived,
            PageSignal::FrameNavigated { .. } => SignalKind::FrameNavigated,
            PageSignal::FrameStoppedLoading { .. } => SignalKind::FrameStoppedLoading,
            PageSignal::DomContentLoaded => SignalKind::DomContentLoaded,
            PageSignal::LoadEventFired => SignalKind::LoadEventFired,
            PageSignal::TargetCreated { .. } => SignalKind::TargetCreated,
            PageSignal::TargetLoaded { .. } => SignalKind::TargetLoaded,
            PageSignal::TargetDestroyed { .. } => SignalKind::TargetDestroyed,
            PageSignal::TargetReconnecting => SignalKind::TargetReconnecting,
            PageSignal::TargetReconnected => SignalKind::TargetReconnected,
        }
    }
}

/// A live listener on the page's signals. The listener is removed exactly
/// once, by [`SignalSubscription::close`] or on drop, whichever comes first.
pub struct SignalSubscription {
    receiver: mpsc::UnboundedReceiver<PageSignal>,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl SignalSubscription {
    pub fn new(
        receiver: mpsc::UnboundedReceiver<PageSignal>,
        release: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            receiver,
            release: Some(Box::new(release)),
        }
    }

    pub async fn recv(&mut self) -> Option<PageSignal> {
        self.receiver.recv().await
    }

    pub fn is_closed(&self) -> bool {
        self.release.is_none()
    }

    pub fn close(&mut self) {
        if let Some(release) = self.release.take() {
            release();
            self.receiver.close();
        }
    }
}

impl Drop for SignalSubscription {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for SignalSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalSubscription")
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn signal_kinds_parse_by_name() {
        for kind in SignalKind::ALL {
            assert_eq!(kind.name().parse::<SignalKind>().unwrap(), kind);
        }
        assert!("pageLoaded".parse::<SignalKind>().is_err());
    }

    #[tokio::test]
    async fn subscription_releases_exactly_once() {
        let released = Arc::new(AtomicUsize::new(0));
        let (sender, receiver) = mpsc::unbounded_channel();
        let counter = released.clone();
        let mut subscription = SignalSubscription::new(receiver, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        sender.send(PageSignal::LoadEventFired).unwrap();
        assert_eq!(subscription.recv().await, Some(PageSignal::LoadEventFired));

        subscription.close();
        subscription.close();
        drop(subscription);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }
}
