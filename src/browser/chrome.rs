use crate::core::config::Config;
use crate::core::gateway::{
    Gateway, KeyEvent, KeyEventKind, MouseButton, MouseEvent, MouseEventKind, PageSignal,
    SignalSubscription, TouchEvent, TouchEventKind,
};
use crate::dom::remote::{PageCall, RemoteRef, RemoteValue};
use crate::dom::scripts::{box_expression, call_expression, tag_expression, STALE_MARKER};
use crate::errors::{PilotError, Result};
use crate::types::{BoxModel, Rect};
use async_trait::async_trait;
use headless_chrome::protocol::cdp::types::Event;
use headless_chrome::protocol::cdp::{Input, Network, DOM};
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde_json::Value;
use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

const TAG_ATTRIBUTE: &str = "data-page-pilot-ref";
const TARGET_POLL: Duration = Duration::from_millis(50);

/// [`Gateway`] over one Chrome tab driven through `headless_chrome`.
/// Its calls block, so each one runs on the blocking pool.
pub struct ChromeGateway {
    browser: Arc<Browser>,
    tab: Arc<Tab>,
}

impl ChromeGateway {
    pub async fn launch(config: &Config) -> Result<Self> {
        let headless = config.headless();
        let window_size_arg = format!(
            "--window-size={},{}",
            config.viewport().width,
            config.viewport().height
        );

        let (browser, tab) = tokio::task::spawn_blocking(move || -> Result<(Browser, Arc<Tab>)> {
            let args = vec![
                OsStr::new("--no-sandbox"),
                OsStr::new("--disable-dev-shm-usage"),
                OsStr::new(&window_size_arg),
            ];
            let launch_options = LaunchOptions::default_builder()
                .headless(headless)
                .args(args)
                .build()
                .map_err(|e| PilotError::LaunchFailed(e.to_string()))?;
            let browser =
                Browser::new(launch_options).map_err(|e| PilotError::LaunchFailed(e.to_string()))?;
            let tab = browser
                .new_tab()
                .map_err(|e| PilotError::LaunchFailed(e.to_string()))?;
            tab.call_method(Network::Enable {
                max_total_buffer_size: None,
                max_resource_buffer_size: None,
                max_post_data_size: None,
                report_direct_socket_traffic: None,
                enable_durable_messages: None,
            })
            .map_err(|e| PilotError::LaunchFailed(e.to_string()))?;
            Ok((browser, tab))
        })
        .await
        .map_err(|e| PilotError::LaunchFailed(e.to_string()))??;

        info!("chrome launched (headless: {})", headless);
        Ok(Self {
            browser: Arc::new(browser),
            tab,
        })
    }

    async fn blocking<T, F>(&self, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Tab) -> anyhow::Result<T> + Send + 'static,
    {
        let tab = Arc::clone(&self.tab);
        tokio::task::spawn_blocking(move || work(&tab))
            .await
            .map_err(|e| PilotError::Gateway(e.to_string()))?
            .map_err(PilotError::from)
    }

    /// Evaluates `expression` and returns its result as JSON.
    async fn evaluate_json(&self, expression: String) -> Result<Value> {
        let wrapped = format!("JSON.stringify({})", expression);
        let result = self.blocking(move |tab| tab.evaluate(&wrapped, false)).await?;
        let value = match result.value {
            Some(Value::String(json)) => serde_json::from_str(&json)?,
            Some(other) => other,
            None => Value::Null,
        };
        if value.get(STALE_MARKER).is_some() {
            return Err(PilotError::StaleContext(
                "Could not find object with given id".to_string(),
            ));
        }
        Ok(value)
    }
}

fn cdp_button(button: MouseButton) -> Input::MouseButton {
    match button {
        MouseButton::Left => Input::MouseButton::Left,
        MouseButton::Right => Input::MouseButton::Right,
        MouseButton::Middle => Input::MouseButton::Middle,
    }
}

fn to_signal(event: &Event) -> Option<PageSignal> {
    Some(match event {
        Event::NetworkRequestWillBeSent(e) => PageSignal::RequestStarted {
            request_id: e.params.request_id.clone(),
        },
        Event::NetworkLoadingFinished(e) => PageSignal::RequestFinished {
            request_id: e.params.request_id.clone(),
        },
        Event::NetworkLoadingFailed(e) => PageSignal::RequestFailed {
            request_id: e.params.request_id.clone(),
        },
        Event::NetworkResponseReceived(e) => PageSignal::ResponseReceived {
            request_id: e.params.request_id.clone(),
        },
        Event::PageFrameNavigated(e) => PageSignal::FrameNavigated {
            frame_id: e.params.frame.id.clone(),
            parent_id: e.params.frame.parent_id.clone(),
            url: e.params.frame.url.clone(),
        },
        Event::PageFrameStoppedLoading(e) => PageSignal::FrameStoppedLoading {
            frame_id: e.params.frame_id.clone(),
        },
        // a detached frame will not report that it stopped loading
        Event::PageFrameDetached(e) => PageSignal::FrameStoppedLoading {
            frame_id: e.params.frame_id.clone(),
        },
        Event::PageDomContentEventFired(_) => PageSignal::DomContentLoaded,
        Event::PageLoadEventFired(_) => PageSignal::LoadEventFired,
        _ => return None,
    })
}

fn open_tabs(browser: &Browser) -> Vec<Arc<Tab>> {
    let tabs = browser.get_tabs().lock().unwrap_or_else(PoisonError::into_inner);
    tabs.clone()
}

/// Reports page targets opened or closed while a subscription is live.
/// `headless_chrome` attaches new targets on its own, so this diffs its tab list.
async fn watch_targets(browser: Arc<Browser>, sender: mpsc::UnboundedSender<PageSignal>) {
    let mut known: HashSet<String> = open_tabs(&browser)
        .iter()
        .map(|tab| tab.get_target_id().clone())
        .collect();
    let mut ticker = tokio::time::interval(TARGET_POLL);
    while !sender.is_closed() {
        ticker.tick().await;
        let tabs = open_tabs(&browser);
        let current: HashSet<String> = tabs.iter().map(|tab| tab.get_target_id().clone()).collect();

        for tab in tabs.into_iter().filter(|tab| !known.contains(tab.get_target_id())) {
            let target_id = tab.get_target_id().clone();
            debug!("page target {} opened", target_id);
            let _ = sender.send(PageSignal::TargetCreated {
                target_id: target_id.clone(),
            });
            let loaded = sender.clone();
            tokio::task::spawn_blocking(move || {
                if let Err(err) = tab.wait_until_navigated() {
                    debug!("page target {} did not finish loading: {}", target_id, err);
                }
                let _ = loaded.send(PageSignal::TargetLoaded { target_id });
            });
        }
        for target_id in known.difference(&current) {
            debug!("page target {} closed", target_id);
            let _ = sender.send(PageSignal::TargetDestroyed {
                target_id: target_id.clone(),
            });
        }
        known = current;
    }
}

#[async_trait]
impl Gateway for ChromeGateway {
    async fn evaluate_expression(&self, source: &str) -> Result<RemoteValue> {
        Ok(RemoteValue::Value(self.evaluate_json(source.to_string()).await?))
    }

    async fn call_function(&self, target: Option<&RemoteRef>, call: &PageCall) -> Result<RemoteValue> {
        let value = self.evaluate_json(call_expression(target, call)?).await?;
        if call.returns_nodes() {
            if let Some(keys) = value.get("nodes").and_then(Value::as_array) {
                return Ok(RemoteValue::Nodes(
                    keys.iter()
                        .filter_map(Value::as_str)
                        .map(RemoteRef::new)
                        .collect(),
                ));
            }
        }
        Ok(RemoteValue::Value(value))
    }

    async fn box_model(&self, node: &RemoteRef) -> Result<Option<BoxModel>> {
        let quad: Option<Vec<f64>> = serde_json::from_value(self.evaluate_json(box_expression(node)?).await?)?;
        Ok(quad.and_then(|border| {
            let rect = Rect::from_quad(&border)?;
            Some(BoxModel {
                border,
                width: rect.width(),
                height: rect.height(),
            })
        }))
    }

    async fn dispatch_mouse(&self, event: MouseEvent) -> Result<()> {
        let kind = match event.kind {
            MouseEventKind::Moved => Input::DispatchMouseEventTypeOption::MouseMoved,
            MouseEventKind::Pressed => Input::DispatchMouseEventTypeOption::MousePressed,
            MouseEventKind::Released => Input::DispatchMouseEventTypeOption::MouseReleased,
        };
        let pressing = event.kind != MouseEventKind::Moved;
        self.blocking(move |tab| {
            tab.call_method(Input::DispatchMouseEvent {
                Type: kind,
                x: event.point.x,
                y: event.point.y,
                modifiers: None,
                timestamp: None,
                button: pressing.then(|| cdp_button(event.button)),
                buttons: None,
                click_count: pressing.then_some(event.click_count),
                force: None,
                tangential_pressure: None,
                tilt_x: None,
                tilt_y: None,
                twist: None,
                delta_x: None,
                delta_y: None,
                pointer_Type: None,
            })
            .map(|_| ())
        })
        .await
    }

    async fn dispatch_key(&self, event: KeyEvent) -> Result<()> {
        self.blocking(move |tab| {
            let kind = match (event.kind, event.text.is_some()) {
                (KeyEventKind::Down, true) => Input::DispatchKeyEventTypeOption::KeyDown,
                (KeyEventKind::Down, false) => Input::DispatchKeyEventTypeOption::RawKeyDown,
                (KeyEventKind::Up, _) => Input::DispatchKeyEventTypeOption::KeyUp,
            };
            tab.call_method(Input::DispatchKeyEvent {
                Type: kind,
                modifiers: None,
                timestamp: None,
                text: event.text.clone(),
                unmodified_text: event.text,
                key_identifier: None,
                code: None,
                key: Some(event.key),
                windows_virtual_key_code: None,
                native_virtual_key_code: None,
                auto_repeat: None,
                is_keypad: None,
                is_system_key: None,
                location: None,
                commands: None,
            })
            .map(|_| ())
        })
        .await
    }

    async fn dispatch_touch(&self, event: TouchEvent) -> Result<()> {
        self.blocking(move |tab| {
            let (kind, touch_points) = match event.kind {
                TouchEventKind::Start => (
                    Input::DispatchTouchEventTypeOption::TouchStart,
                    vec![Input::TouchPoint {
                        x: event.point.x,
                        y: event.point.y,
                        radius_x: None,
                        radius_y: None,
                        rotation_angle: None,
                        force: None,
                        tangential_pressure: None,
                        tilt_x: None,
                        tilt_y: None,
                        twist: None,
                        id: None,
                    }],
                ),
                TouchEventKind::End => (Input::DispatchTouchEventTypeOption::TouchEnd, Vec::new()),
            };
            tab.call_method(Input::DispatchTouchEvent {
                Type: kind,
                touch_points,
                modifiers: None,
                timestamp: None,
            })
            .map(|_| ())
        })
        .await
    }

    async fn set_file_input_files(&self, node: &RemoteRef, files: &[PathBuf]) -> Result<()> {
        self.evaluate_json(tag_expression(node, TAG_ATTRIBUTE)?).await?;
        let css = format!("[{}=\"{}\"]", TAG_ATTRIBUTE, node.object_id);
        let files: Vec<String> = files.iter().map(|path| path.display().to_string()).collect();
        self.blocking(move |tab| {
            let element = tab.find_element(&css)?;
            tab.call_method(DOM::SetFileInputFiles {
                files,
                node_id: None,
                backend_node_id: None,
                object_id: Some(element.remote_object_id.clone()),
            })
            .map(|_| ())
        })
        .await
    }

    async fn subscribe(&self) -> Result<SignalSubscription> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let page_events = sender.clone();
        let listener = self
            .blocking(move |tab| {
                tab.add_event_listener(Arc::new(move |event: &Event| {
                    if let Some(signal) = to_signal(event) {
                        let _ = page_events.send(signal);
                    }
                }))
            })
            .await?;
        let watcher = tokio::spawn(watch_targets(Arc::clone(&self.browser), sender));

        let tab = Arc::clone(&self.tab);
        Ok(SignalSubscription::new(receiver, move || {
            watcher.abort();
            if let Err(err) = tab.remove_event_listener(&listener) {
                debug!("could not remove page listener: {}", err);
            }
        }))
    }

    async fn navigate(&self, url: &str) -> Result<()> {
        let url = url.to_string();
        self.blocking(move |tab| {
            tab.navigate_to(&url)?.wait_until_navigated()?;
            Ok(())
        })
        .await
        .map_err(|e| match e {
            PilotError::ProcessExited(_) => e,
            other => PilotError::NavigationFailed(other.to_string()),
        })
    }
}
