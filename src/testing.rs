//! An in-memory [`Gateway`] over a static HTML document, for tests and demos.
//!
//! Layout is declared instead of computed:
//!
//! - `data-rect="top,left,bottom,right"` gives an element its border box.
//!   Without it the element is not rendered.
//! - `data-covered` makes hit tests at the element land on something else.
//! - `data-navigates="url"` starts a navigation when the element, or anything
//!   inside it, is clicked or tapped, or when Enter is pressed inside it.
//! - `data-ready-delay="ms"` keeps `document.readyState` at "loading" for
//!   that long after such a navigation.

use crate::core::gateway::{
    Gateway, KeyEvent, KeyEventKind, MouseEvent, MouseEventKind, PageSignal, SignalSubscription,
    TouchEvent, TouchEventKind,
};
use crate::dom::remote::{LabelStrategy, OptionQuery, PageCall, RemoteRef, RemoteValue};
use crate::dom::scripts::{CURRENT_URL, READY_STATE};
use crate::errors::{PilotError, Result};
use crate::selectors::text::{compile_portable, normalize, TextQuery};
use crate::types::{BoxModel, Point, Rect};
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector as Css};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Frame id the in-memory page reports for its top-level document.
pub const MAIN_FRAME: &str = "main";

const SKIPPED: [&str; 6] = ["head", "script", "style", "html", "body", "noscript"];

#[derive(Default)]
struct FakeState {
    html: String,
    url: String,
    generation: u64,
    values: HashMap<usize, String>,
    checked: HashMap<usize, bool>,
    selected: HashMap<usize, usize>,
    files: HashMap<usize, Vec<PathBuf>>,
    focused: Option<usize>,
    ready_at: Option<Instant>,
    mouse: Vec<MouseEvent>,
    keys: Vec<KeyEvent>,
    touches: Vec<TouchEvent>,
    clicked: Vec<usize>,
    highlighted: Vec<usize>,
    scrolled: Vec<usize>,
    listeners: HashMap<u64, mpsc::UnboundedSender<PageSignal>>,
    next_listener: u64,
    subscriptions_opened: usize,
    navigations: u64,
    crashed: bool,
}

/// A navigation an interaction set off: target URL and loading time.
type Navigation = (String, Duration);

impl FakeState {
    fn broadcast(&self, signal: PageSignal) {
        for sender in self.listeners.values() {
            let _ = sender.send(signal.clone());
        }
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.crashed {
            return Err(PilotError::ProcessExited(
                "Browser process exited unexpectedly".to_string(),
            ));
        }
        Ok(())
    }

    fn replace_document(&mut self, html: String) {
        self.html = html;
        self.generation += 1;
        self.values.clear();
        self.checked.clear();
        self.selected.clear();
        self.files.clear();
        self.focused = None;
    }

    fn reference(&self, index: usize) -> RemoteRef {
        RemoteRef::new(format!("{}-{}", self.generation, index))
    }

    fn index_of(&self, reference: &RemoteRef, count: usize) -> Result<usize> {
        let stale = || PilotError::StaleContext(format!("No node with given id {}", reference));
        let (generation, index) = reference.object_id.split_once('-').ok_or_else(stale)?;
        let index: usize = index.parse().map_err(|_| stale())?;
        if generation != self.generation.to_string() || index >= count {
            return Err(stale());
        }
        Ok(index)
    }

    fn value_of(&self, elements: &[ElementRef<'_>], index: usize) -> Option<String> {
        if let Some(value) = self.values.get(&index) {
            return Some(value.clone());
        }
        let element = elements[index];
        match tag(&element) {
            "input" | "button" | "option" => Some(attr(&element, "value").unwrap_or_default().to_string()),
            "textarea" => Some(text_content(&element)),
            "select" => {
                let options = options_of(&element);
                self.selected_index(&element, index)
                    .and_then(|at| options.get(at).map(option_value))
            }
            _ if attr(&element, "contenteditable").is_some() => Some(collapsed_text(&element)),
            _ => None,
        }
    }

    fn selected_index(&self, select: &ElementRef<'_>, index: usize) -> Option<usize> {
        let options = options_of(select);
        if options.is_empty() {
            return None;
        }
        Some(self.selected.get(&index).copied().unwrap_or_else(|| {
            options
                .iter()
                .position(|option| attr(option, "selected").is_some())
                .unwrap_or(0)
        }))
    }

    fn is_checked(&self, elements: &[ElementRef<'_>], index: usize) -> bool {
        self.checked
            .get(&index)
            .copied()
            .unwrap_or_else(|| attr(&elements[index], "checked").is_some())
    }

    fn set_checked(&mut self, elements: &[ElementRef<'_>], index: usize, checked: bool) {
        let element = elements[index];
        if checked && input_type(&element) == "radio" {
            let group = attr(&element, "name");
            for (other, candidate) in elements.iter().enumerate() {
                if other != index && input_type(candidate) == "radio" && attr(candidate, "name") == group {
                    self.checked.insert(other, false);
                }
            }
        }
        self.checked.insert(index, checked);
    }

    fn candidate_texts(&self, elements: &[ElementRef<'_>], index: usize) -> Vec<String> {
        let element = elements[index];
        let mut texts = vec![text_content(&element)];
        match tag(&element) {
            "input" => {
                texts.push(self.value_of(elements, index).unwrap_or_default());
                texts.push(input_type(&element));
            }
            "img" => texts.push(attr(&element, "alt").unwrap_or_default().to_string()),
            _ => {}
        }
        texts
    }

    fn find_by_text(&self, elements: &[ElementRef<'_>], query: &TextQuery, scope: Option<&Css>) -> Vec<usize> {
        let matched: Vec<usize> = (0..elements.len())
            .filter(|&index| {
                let element = &elements[index];
                is_content(element)
                    && scope.map(|css| css.matches(element)).unwrap_or(true)
                    && self
                        .candidate_texts(elements, index)
                        .iter()
                        .any(|text| query.matches(text))
            })
            .collect();
        innermost(elements, matched)
    }

    fn labelled_controls(
        &self,
        elements: &[ElementRef<'_>],
        label: &TextQuery,
        control: &Css,
        strategy: LabelStrategy,
    ) -> Vec<usize> {
        if strategy == LabelStrategy::InlineAdjacent {
            return (0..elements.len())
                .filter(|&index| {
                    let element = &elements[index];
                    control.matches(element)
                        && following_text(element)
                            .map(|text| !text.trim().is_empty() && label.matches(&text))
                            .unwrap_or(false)
                })
                .collect();
        }

        let mut controls = Vec::new();
        let labels = elements
            .iter()
            .filter(|element| tag(element) == "label" && label.matches(&text_content(element)));
        for found in labels {
            if strategy == LabelStrategy::For {
                let target = attr(found, "for").and_then(|id| index_by_id(elements, id));
                if let Some(index) = target.filter(|&index| control.matches(&elements[index])) {
                    controls.push(index);
                }
            } else {
                for child in found.children().filter_map(ElementRef::wrap) {
                    if control.matches(&child) {
                        if let Some(index) = elements.iter().position(|element| *element == child) {
                            controls.push(index);
                        }
                    }
                }
            }
        }
        controls
    }

    /// Runs an element-level call against `elements[index]`.
    fn run_on_element(&mut self, elements: &[ElementRef<'_>], index: usize, call: &PageCall) -> Result<Value> {
        let element = elements[index];
        Ok(match call {
            PageCall::Describe => json!({
                "tag": tag(&element),
                "type": attr(&element, "type"),
                "id": element.value().id(),
                "name": attr(&element, "name"),
            }),
            PageCall::IsVisible => json!(is_rendered(&element)),
            PageCall::IsDisabled => json!(is_disabled(&element)),
            PageCall::IsWritable => json!(is_writable(&element)),
            PageCall::IsChecked => json!(self.is_checked(elements, index)),
            PageCall::Text => match tag(&element) {
                "input" | "textarea" | "select" => json!(self.value_of(elements, index).unwrap_or_default()),
                _ => json!(collapsed_text(&element)),
            },
            PageCall::Value => match self.value_of(elements, index) {
                Some(value) => json!(value),
                None => Value::Null,
            },
            PageCall::ScrollIntoView => {
                self.scrolled.push(index);
                json!(true)
            }
            PageCall::ScrollBy { .. } => json!(true),
            PageCall::HitTest => json!(is_rendered(&element) && attr(&element, "data-covered").is_none()),
            PageCall::Focus => {
                if is_focusable(&element) {
                    self.focused = Some(index);
                }
                json!(self.focused == Some(index))
            }
            PageCall::ClearValue => {
                self.values.insert(index, String::new());
                json!(true)
            }
            PageCall::SetChecked { checked } => {
                self.set_checked(elements, index, *checked);
                json!(self.is_checked(elements, index))
            }
            PageCall::SelectOption { option } => {
                let options = options_of(&element);
                match pick_option(&options, option)? {
                    Some(at) => {
                        self.selected.insert(index, at);
                        json!({"text": option_text(&options[at]), "value": option_value(&options[at])})
                    }
                    None => Value::Null,
                }
            }
            PageCall::Highlight => {
                self.highlighted.push(index);
                json!(true)
            }
            other => {
                return Err(PilotError::PageScript {
                    message: format!("TypeError: {} needs the document", other.name()),
                    stack: String::new(),
                })
            }
        })
    }

    /// What a pointer release or tap at `point` does to the page.
    fn activate_at(&mut self, point: Point) -> Option<Navigation> {
        let html = self.html.clone();
        let document = Html::parse_document(&html);
        let elements = elements_of(&document);
        let index = (0..elements.len())
            .filter(|&index| {
                rect_of(&elements[index])
                    .map(|rect| !rect.is_empty() && rect.contains_point(&point))
                    .unwrap_or(false)
            })
            .last()?;

        let element = elements[index];
        self.clicked.push(index);
        match input_type(&element).as_str() {
            "checkbox" if tag(&element) == "input" => {
                let checked = self.is_checked(&elements, index);
                self.set_checked(&elements, index, !checked);
            }
            "radio" if tag(&element) == "input" => self.set_checked(&elements, index, true),
            _ => {}
        }
        if is_focusable(&element) {
            self.focused = Some(index);
        }
        navigation_from(&element)
    }

    /// What a key press does to the focused element.
    fn type_key(&mut self, event: &KeyEvent) -> Option<Navigation> {
        let focused = self.focused?;
        let html = self.html.clone();
        let document = Html::parse_document(&html);
        let elements = elements_of(&document);
        let element = *elements.get(focused)?;
        if event.key == "Enter" {
            return navigation_from(&element);
        }
        if let Some(text) = &event.text {
            if is_writable(&element) {
                let mut value = self.value_of(&elements, focused).unwrap_or_default();
                value.push_str(text);
                self.values.insert(focused, value);
            }
        }
        None
    }

    fn ids(&self, indices: &[usize]) -> Vec<String> {
        let document = Html::parse_document(&self.html);
        let elements = elements_of(&document);
        indices
            .iter()
            .filter_map(|&index| elements.get(index))
            .map(|element| element.value().id().unwrap_or_default().to_string())
            .collect()
    }
}

fn lock(state: &Mutex<FakeState>) -> MutexGuard<'_, FakeState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn css(selector: &str) -> Result<Css> {
    Css::parse(selector).map_err(|e| PilotError::InvalidSelector(format!("{}: {:?}", selector, e)))
}

fn elements_of(document: &Html) -> Vec<ElementRef<'_>> {
    document
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .collect()
}

fn index_by_id(elements: &[ElementRef<'_>], id: &str) -> Option<usize> {
    elements.iter().position(|element| element.value().id() == Some(id))
}

fn tag<'a>(element: &ElementRef<'a>) -> &'a str {
    element.value().name()
}

fn attr<'a>(element: &ElementRef<'a>, name: &str) -> Option<&'a str> {
    element.value().attr(name)
}

fn input_type(element: &ElementRef<'_>) -> String {
    attr(element, "type").unwrap_or("text").to_lowercase()
}

fn text_content(element: &ElementRef<'_>) -> String {
    element.text().collect()
}

fn collapsed_text(element: &ElementRef<'_>) -> String {
    text_content(element).split_whitespace().collect::<Vec<_>>().join(" ")
}

fn ancestors<'a>(element: &ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    element.ancestors().filter_map(ElementRef::wrap)
}

fn is_content(element: &ElementRef<'_>) -> bool {
    !SKIPPED.contains(&tag(element)) && !ancestors(element).any(|parent| tag(&parent) == "head")
}

fn rect_of(element: &ElementRef<'_>) -> Option<Rect> {
    let edges: Vec<f64> = attr(element, "data-rect")?
        .split(',')
        .map(|edge| edge.trim().parse::<f64>())
        .collect::<std::result::Result<_, _>>()
        .ok()?;
    match edges.as_slice() {
        [top, left, bottom, right] => Some(Rect::new(*top, *left, *bottom, *right)),
        _ => None,
    }
}

fn is_rendered(element: &ElementRef<'_>) -> bool {
    let hidden = attr(element, "hidden").is_some()
        || ancestors(element).any(|parent| attr(&parent, "hidden").is_some());
    !hidden && rect_of(element).map(|rect| !rect.is_empty()).unwrap_or(false)
}

fn is_disabled(element: &ElementRef<'_>) -> bool {
    attr(element, "disabled").is_some()
        || attr(element, "aria-disabled") == Some("true")
        || ancestors(element).any(|parent| tag(&parent) == "fieldset" && attr(&parent, "disabled").is_some())
}

fn is_writable(element: &ElementRef<'_>) -> bool {
    if is_disabled(element) || attr(element, "readonly").is_some() {
        return false;
    }
    matches!(tag(element), "input" | "textarea" | "select") || attr(element, "contenteditable").is_some()
}

fn is_focusable(element: &ElementRef<'_>) -> bool {
    matches!(tag(element), "input" | "textarea" | "select" | "button" | "a")
        || attr(element, "contenteditable").is_some()
        || attr(element, "tabindex").is_some()
}

/// The text node right after `element`, if that is what follows it.
fn following_text(element: &ElementRef<'_>) -> Option<String> {
    let next = element.next_sibling()?;
    let text: &str = next.value().as_text()?;
    Some(text.to_string())
}

/// Drops every match that contains another match.
fn innermost(elements: &[ElementRef<'_>], matched: Vec<usize>) -> Vec<usize> {
    matched
        .iter()
        .copied()
        .filter(|&outer| {
            !matched.iter().any(|&inner| {
                inner != outer && ancestors(&elements[inner]).any(|parent| parent == elements[outer])
            })
        })
        .collect()
}

fn options_of<'a>(select: &ElementRef<'a>) -> Vec<ElementRef<'a>> {
    select
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|element| tag(element) == "option")
        .collect()
}

fn option_text(option: &ElementRef<'_>) -> String {
    collapsed_text(option)
}

fn option_value(option: &ElementRef<'_>) -> String {
    attr(option, "value")
        .map(str::to_string)
        .unwrap_or_else(|| option_text(option))
}

fn pick_option(options: &[ElementRef<'_>], query: &OptionQuery) -> Result<Option<usize>> {
    Ok(match query {
        OptionQuery::Index { index } => (*index < options.len()).then_some(*index),
        OptionQuery::Text { text } => options
            .iter()
            .position(|option| normalize(&option_text(option)) == normalize(text))
            .or_else(|| options.iter().position(|option| option_value(option) == *text)),
        OptionQuery::Value { value } => options.iter().position(|option| option_value(option) == *value),
        OptionQuery::Pattern { source, flags } => {
            let regex = compile_portable(source, flags.contains('i'))?;
            options.iter().position(|option| regex.is_match(&option_text(option)))
        }
    })
}

fn navigation_from(element: &ElementRef<'_>) -> Option<Navigation> {
    std::iter::once(*element)
        .chain(ancestors(element))
        .find_map(|candidate| {
            let url = attr(&candidate, "data-navigates")?;
            let delay = attr(&candidate, "data-ready-delay")
                .and_then(|ms| ms.parse().ok())
                .unwrap_or(0);
            Some((url.to_string(), Duration::from_millis(delay)))
        })
}

/// Static page whose behavior is driven by `data-*` attributes.
#[derive(Clone)]
pub struct FakePage {
    state: Arc<Mutex<FakeState>>,
}

impl FakePage {
    pub fn new(html: &str) -> Self {
        let page = Self {
            state: Arc::new(Mutex::new(FakeState {
                url: "about:blank".to_string(),
                ..FakeState::default()
            })),
        };
        page.set_html(html);
        page
    }

    /// Swaps the document. References into the old one go stale.
    pub fn set_html(&self, html: &str) {
        lock(&self.state).replace_document(html.to_string());
    }

    /// Delivers `signal` to every open subscription.
    pub fn emit(&self, signal: PageSignal) {
        lock(&self.state).broadcast(signal);
    }

    /// Starts a navigation to `url` whose load event fires after `ready_after`.
    pub fn simulate_navigation(&self, url: &str, ready_after: Duration) {
        let request_id = {
            let mut state = lock(&self.state);
            state.navigations += 1;
            state.url = url.to_string();
            state.ready_at = Some(Instant::now() + ready_after);
            let request_id = format!("navigation-{}", state.navigations);
            state.broadcast(PageSignal::RequestStarted {
                request_id: request_id.clone(),
            });
            state.broadcast(PageSignal::FrameNavigated {
                frame_id: MAIN_FRAME.to_string(),
                parent_id: None,
                url: url.to_string(),
            });
            request_id
        };

        let shared = Arc::clone(&self.state);
        tokio::spawn(async move {
            tokio::time::sleep(ready_after).await;
            let state = lock(&shared);
            state.broadcast(PageSignal::RequestFinished { request_id });
            state.broadcast(PageSignal::LoadEventFired);
        });
    }

    /// Keeps `document.readyState` at "loading" for `delay` without
    /// emitting any signal.
    pub fn delay_ready(&self, delay: Duration) {
        lock(&self.state).ready_at = Some(Instant::now() + delay);
    }

    /// Every later call fails the way a dead browser does.
    pub fn crash(&self) {
        lock(&self.state).crashed = true;
    }

    pub fn live_listeners(&self) -> usize {
        lock(&self.state).listeners.len()
    }

    pub fn subscriptions_opened(&self) -> usize {
        lock(&self.state).subscriptions_opened
    }

    pub fn url(&self) -> String {
        lock(&self.state).url.clone()
    }

    pub fn mouse_events(&self) -> Vec<MouseEvent> {
        lock(&self.state).mouse.clone()
    }

    pub fn key_events(&self) -> Vec<KeyEvent> {
        lock(&self.state).keys.clone()
    }

    pub fn touch_events(&self) -> Vec<TouchEvent> {
        lock(&self.state).touches.clone()
    }

    /// Ids of the elements that received a click or tap, in order.
    pub fn clicked_ids(&self) -> Vec<String> {
        let state = lock(&self.state);
        state.ids(&state.clicked)
    }

    /// Ids of the elements scrolled into view, in order.
    pub fn scrolled_ids(&self) -> Vec<String> {
        let state = lock(&self.state);
        state.ids(&state.scrolled)
    }

    pub fn highlighted_ids(&self) -> Vec<String> {
        let state = lock(&self.state);
        state.ids(&state.highlighted)
    }

    pub fn focused_id(&self) -> Option<String> {
        let state = lock(&self.state);
        let focused = state.focused?;
        state.ids(&[focused]).into_iter().next()
    }

    /// Current value of the element with the given id.
    pub fn value_of(&self, id: &str) -> Option<String> {
        let state = lock(&self.state);
        let document = Html::parse_document(&state.html);
        let elements = elements_of(&document);
        let index = index_by_id(&elements, id)?;
        state.value_of(&elements, index)
    }

    pub fn is_checked(&self, id: &str) -> bool {
        let state = lock(&self.state);
        let document = Html::parse_document(&state.html);
        let elements = elements_of(&document);
        index_by_id(&elements, id)
            .map(|index| state.is_checked(&elements, index))
            .unwrap_or(false)
    }

    pub fn files_of(&self, id: &str) -> Vec<PathBuf> {
        let state = lock(&self.state);
        let document = Html::parse_document(&state.html);
        let elements = elements_of(&document);
        index_by_id(&elements, id)
            .and_then(|index| state.files.get(&index).cloned())
            .unwrap_or_default()
    }

    fn call(&self, target: Option<&RemoteRef>, call: &PageCall) -> Result<RemoteValue> {
        let mut state = lock(&self.state);
        state.ensure_alive()?;
        let html = state.html.clone();
        let document = Html::parse_document(&html);
        let elements = elements_of(&document);
        let target = target
            .map(|reference| state.index_of(reference, elements.len()))
            .transpose()?;

        let found = match call {
            PageCall::FindByText { query, scope } => {
                let scope = scope.as_deref().map(css).transpose()?;
                state.find_by_text(&elements, query, scope.as_ref())
            }
            PageCall::QueryCss { selector } => {
                let css = css(selector)?;
                (0..elements.len())
                    .filter(|&index| css.matches(&elements[index]))
                    .collect()
            }
            PageCall::LabelledControls {
                label,
                control,
                strategy,
            } => state.labelled_controls(&elements, label, &css(control)?, *strategy),
            PageCall::ActiveElement => state.focused.into_iter().collect(),
            element_call => {
                return match target {
                    Some(index) => state
                        .run_on_element(&elements, index, element_call)
                        .map(RemoteValue::Value),
                    None if matches!(element_call, PageCall::ScrollBy { .. }) => {
                        Ok(RemoteValue::Value(json!(true)))
                    }
                    None => Err(PilotError::PageScript {
                        message: format!("TypeError: {} needs an element", element_call.name()),
                        stack: String::new(),
                    }),
                };
            }
        };
        Ok(RemoteValue::Nodes(
            found.into_iter().map(|index| state.reference(index)).collect(),
        ))
    }

    fn follow(&self, navigation: Option<Navigation>) {
        if let Some((url, delay)) = navigation {
            self.simulate_navigation(&url, delay);
        }
    }
}

impl std::fmt::Debug for FakePage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakePage").field("url", &self.url()).finish_non_exhaustive()
    }
}

#[async_trait]
impl Gateway for FakePage {
    async fn evaluate_expression(&self, source: &str) -> Result<RemoteValue> {
        let state = lock(&self.state);
        state.ensure_alive()?;
        match source {
            READY_STATE => {
                let loading = state.ready_at.map(|at| Instant::now() < at).unwrap_or(false);
                Ok(RemoteValue::Value(json!(if loading { "loading" } else { "complete" })))
            }
            CURRENT_URL => Ok(RemoteValue::Value(json!(state.url))),
            other => Err(PilotError::UnsupportedOperation(format!(
                "the in-memory page cannot evaluate '{}'",
                other
            ))),
        }
    }

    async fn call_function(&self, target: Option<&RemoteRef>, call: &PageCall) -> Result<RemoteValue> {
        self.call(target, call)
    }

    async fn box_model(&self, node: &RemoteRef) -> Result<Option<BoxModel>> {
        let state = lock(&self.state);
        state.ensure_alive()?;
        let document = Html::parse_document(&state.html);
        let elements = elements_of(&document);
        let index = state.index_of(node, elements.len())?;
        Ok(rect_of(&elements[index]).map(|rect| BoxModel::from_rect(&rect)))
    }

    async fn dispatch_mouse(&self, event: MouseEvent) -> Result<()> {
        let navigation = {
            let mut state = lock(&self.state);
            state.ensure_alive()?;
            state.mouse.push(event);
            match event.kind {
                MouseEventKind::Released => state.activate_at(event.point),
                _ => None,
            }
        };
        self.follow(navigation);
        Ok(())
    }

    async fn dispatch_key(&self, event: KeyEvent) -> Result<()> {
        let navigation = {
            let mut state = lock(&self.state);
            state.ensure_alive()?;
            state.keys.push(event.clone());
            match event.kind {
                KeyEventKind::Down => state.type_key(&event),
                KeyEventKind::Up => None,
            }
        };
        self.follow(navigation);
        Ok(())
    }

    async fn dispatch_touch(&self, event: TouchEvent) -> Result<()> {
        let navigation = {
            let mut state = lock(&self.state);
            state.ensure_alive()?;
            state.touches.push(event);
            match event.kind {
                TouchEventKind::End => state.activate_at(event.point),
                TouchEventKind::Start => None,
            }
        };
        self.follow(navigation);
        Ok(())
    }

    async fn set_file_input_files(&self, node: &RemoteRef, files: &[PathBuf]) -> Result<()> {
        let mut state = lock(&self.state);
        state.ensure_alive()?;
        let html = state.html.clone();
        let document = Html::parse_document(&html);
        let elements = elements_of(&document);
        let index = state.index_of(node, elements.len())?;
        let element = elements[index];
        if tag(&element) != "input" || input_type(&element) != "file" {
            return Err(PilotError::Gateway(
                "Node is not a file input element".to_string(),
            ));
        }
        state.files.insert(index, files.to_vec());
        Ok(())
    }

    async fn subscribe(&self) -> Result<SignalSubscription> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = {
            let mut state = lock(&self.state);
            state.ensure_alive()?;
            let id = state.next_listener;
            state.next_listener += 1;
            state.subscriptions_opened += 1;
            state.listeners.insert(id, sender);
            id
        };
        let shared = Arc::clone(&self.state);
        Ok(SignalSubscription::new(receiver, move || {
            lock(&shared).listeners.remove(&id);
        }))
    }

    async fn navigate(&self, url: &str) -> Result<()> {
        let mut state = lock(&self.state);
        state.ensure_alive()?;
        let html = state.html.clone();
        state.replace_document(html);
        state.url = url.to_string();
        state.ready_at = None;
        state.broadcast(PageSignal::FrameNavigated {
            frame_id: MAIN_FRAME.to_string(),
            parent_id: None,
            url: url.to_string(),
        });
        state.broadcast(PageSignal::LoadEventFired);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selectors::text::{MatchMode, TextPattern};

    async fn nodes(page: &FakePage, call: PageCall) -> Vec<RemoteRef> {
        page.call_function(None, &call).await.unwrap().into_nodes().unwrap()
    }

    #[tokio::test]
    async fn references_go_stale_with_the_document() {
        let page = FakePage::new(r#"<p id="a">one</p>"#);
        let found = nodes(&page, PageCall::QueryCss { selector: "#a".into() }).await;
        assert_eq!(found.len(), 1);
        page.set_html(r#"<p id="a">two</p>"#);
        let err = page.call_function(Some(&found[0]), &PageCall::Text).await.unwrap_err();
        assert!(matches!(err, PilotError::StaleContext(_)));
    }

    #[tokio::test]
    async fn invalid_css_is_a_selector_error() {
        let page = FakePage::new("<p></p>");
        let err = page
            .call_function(None, &PageCall::QueryCss { selector: "p[".into() })
            .await
            .unwrap_err();
        assert!(matches!(err, PilotError::InvalidSelector(_)));
    }

    #[tokio::test]
    async fn input_values_and_types_count_as_text() {
        let page = FakePage::new(r#"<input type="submit" value="Send"><img alt="Logo">"#);
        let query = |text: &str| PageCall::FindByText {
            query: TextQuery::new(TextPattern::literal(text), MatchMode::Exact),
            scope: None,
        };
        assert_eq!(nodes(&page, query("Send")).await.len(), 1);
        assert_eq!(nodes(&page, query("submit")).await.len(), 1);
        assert_eq!(nodes(&page, query("logo")).await.len(), 1);
    }

    #[tokio::test]
    async fn crashed_pages_report_a_dead_process() {
        let page = FakePage::new("<p></p>");
        page.crash();
        let err = page.evaluate_expression(READY_STATE).await.unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn releasing_the_mouse_toggles_checkboxes() {
        let page = FakePage::new(r#"<input type="checkbox" id="c" data-rect="0,0,10,10">"#);
        let point = Point::new(5.0, 5.0);
        page.dispatch_mouse(MouseEvent::released(point, Default::default(), 1))
            .await
            .unwrap();
        assert!(page.is_checked("c"));
        assert_eq!(page.clicked_ids(), vec!["c"]);
    }
}
