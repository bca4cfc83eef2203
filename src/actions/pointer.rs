use crate::actions::actionability::{Check, DEFAULT_CHECKS};
use crate::actions::base::{ActionOptions, DropTarget, Target};
use crate::browser::session::PageSession;
use crate::core::gateway::{MouseButton, MouseEvent, TouchEvent, TouchEventKind};
use crate::dom::remote::PageCall;
use crate::errors::Result;
use crate::selectors::spec::Selector;
use crate::types::Point;
use std::time::Instant;

pub const DRAG_STEPS: u32 = 10;

/// Intermediate pointer positions from `from` to `to`, ending on `to`.
pub fn drag_path(from: Point, to: Point, steps: u32) -> Vec<Point> {
    let steps = steps.max(1);
    (1..=steps)
        .map(|step| from.lerp(&to, f64::from(step) / f64::from(steps)))
        .collect()
}

impl PageSession {
    pub async fn drag_and_drop(
        &self,
        source: impl Into<Selector>,
        destination: impl Into<DropTarget>,
        options: ActionOptions,
    ) -> Result<String> {
        let started = Instant::now();
        let source = self
            .find_actionable(&source.into(), DEFAULT_CHECKS, &options)
            .await?;
        source.scroll_into_view().await?;
        let from = source.center().await?;
        let (to, destination) = match destination.into() {
            DropTarget::Selector(selector) => {
                let target = self
                    .find_actionable(&selector, DEFAULT_CHECKS, &options)
                    .await?;
                target.scroll_into_view().await?;
                (target.center().await?, format!("to {}", target.description()))
            }
            DropTarget::Offset { dx, dy } => (from.offset(dx, dy), format!("at {}, {}", dx, dy)),
        };
        self.highlight(&source).await;

        let gateway = self.gateway();
        self.navigating(&options, || async {
            gateway.dispatch_mouse(MouseEvent::moved(from)).await?;
            gateway
                .dispatch_mouse(MouseEvent::pressed(from, MouseButton::Left, 1))
                .await?;
            for point in drag_path(from, to, DRAG_STEPS) {
                gateway.dispatch_mouse(MouseEvent::moved(point)).await?;
            }
            gateway
                .dispatch_mouse(MouseEvent::released(to, MouseButton::Left, 1))
                .await
        })
        .await?;
        self.completed(
            format!("Dragged and dropped {} {}", source.description(), destination),
            started,
        )
        .await
    }

    pub async fn hover(&self, selector: impl Into<Selector>, options: ActionOptions) -> Result<String> {
        let started = Instant::now();
        let element = self
            .find_actionable(&selector.into(), &[Check::Visible], &options)
            .await?;
        self.highlight(&element).await;
        element.scroll_into_view().await?;
        let point = element.center().await?;
        self.navigating(&options, || {
            self.gateway().dispatch_mouse(MouseEvent::moved(point))
        })
        .await?;
        self.completed(format!("Hovered over the {}", element.description()), started)
            .await
    }

    pub async fn tap(&self, target: impl Into<Target>, options: ActionOptions) -> Result<String> {
        let started = Instant::now();
        let (point, description) = match target.into() {
            Target::Point(point) => (point, format!("coordinates {}", point)),
            Target::Selector(selector) => {
                let element = self
                    .find_actionable(&selector, DEFAULT_CHECKS, &options)
                    .await?;
                self.highlight(&element).await;
                element.scroll_into_view().await?;
                (element.center().await?, element.description().to_string())
            }
        };
        let gateway = self.gateway();
        self.navigating(&options, || async {
            gateway
                .dispatch_touch(TouchEvent {
                    kind: TouchEventKind::Start,
                    point,
                })
                .await?;
            gateway
                .dispatch_touch(TouchEvent {
                    kind: TouchEventKind::End,
                    point,
                })
                .await
        })
        .await?;
        self.completed(format!("Tapped on the {}", description), started)
            .await
    }

    pub async fn scroll_to(&self, selector: impl Into<Selector>, options: ActionOptions) -> Result<String> {
        let started = Instant::now();
        let element = self.first_match(&selector.into(), &options).await?;
        self.navigating(&options, || element.scroll_into_view()).await?;
        self.completed(format!("Scrolled to the {}", element.description()), started)
            .await
    }

    /// Scrolls an element, or the page when `target` is `None`, by `x`/`y` pixels.
    pub async fn scroll_by(
        &self,
        target: Option<Selector>,
        x: f64,
        y: f64,
        options: ActionOptions,
    ) -> Result<String> {
        let started = Instant::now();
        let description = match target {
            Some(selector) => {
                let element = self.first_match(&selector, &options).await?;
                self.navigating(&options, || element.scroll_by(x, y)).await?;
                format!("Scrolled the {} by {}, {}", element.description(), x, y)
            }
            None => {
                let gateway = self.gateway();
                self.navigating(&options, || async {
                    gateway
                        .call_function(None, &PageCall::ScrollBy { x, y })
                        .await?
                        .into_value()
                })
                .await?;
                format!("Scrolled the page by {}, {}", x, y)
            }
        };
        self.completed(description, started).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Config;
    use crate::core::gateway::MouseEventKind;
    use crate::testing::FakePage;
    use std::sync::Arc;

    fn session(html: &str) -> (Arc<FakePage>, PageSession) {
        let page = Arc::new(FakePage::new(html));
        let config = Config::from_json_str(r#"{"retryTimeout": 50, "retryInterval": 10, "waitForStart": 10}"#)
            .unwrap();
        (page.clone(), PageSession::new(page, config))
    }

    #[test]
    fn drag_path_is_linear_and_ends_on_target() {
        let path = drag_path(Point::new(0.0, 0.0), Point::new(100.0, 50.0), DRAG_STEPS);
        assert_eq!(path.len(), 10);
        assert_eq!(path[0], Point::new(10.0, 5.0));
        assert_eq!(path[4], Point::new(50.0, 25.0));
        assert_eq!(path[9], Point::new(100.0, 50.0));
    }

    #[tokio::test]
    async fn drags_between_element_centers() {
        let (page, session) = session(
            r#"<div id="card" data-rect="0,0,20,20">Card</div>
               <div id="bin" data-rect="0,200,20,220">Trash</div>"#,
        );
        let description = session
            .drag_and_drop("Card", Selector::text("Trash"), ActionOptions::default())
            .await
            .unwrap();
        assert_eq!(
            description,
            "Dragged and dropped element with label Card to element with label Trash"
        );

        let events = page.mouse_events();
        let pressed: Vec<_> = events.iter().filter(|e| e.kind == MouseEventKind::Pressed).collect();
        let moves = events.iter().filter(|e| e.kind == MouseEventKind::Moved).count();
        assert_eq!(pressed.len(), 1);
        assert_eq!(pressed[0].point, Point::new(10.0, 10.0));
        assert_eq!(moves, 1 + DRAG_STEPS as usize);
        let released = events.last().unwrap();
        assert_eq!(released.kind, MouseEventKind::Released);
        assert_eq!(released.point, Point::new(210.0, 10.0));
        assert_eq!(page.scrolled_ids(), vec!["card", "bin"]);
    }

    #[tokio::test]
    async fn drags_by_an_offset() {
        let (page, session) = session(r#"<div data-rect="0,0,20,20">Slider</div>"#);
        let description = session
            .drag_and_drop("Slider", DropTarget::Offset { dx: 40.0, dy: 0.0 }, ActionOptions::default())
            .await
            .unwrap();
        assert_eq!(description, "Dragged and dropped element with label Slider at 40, 0");
        let released = page.mouse_events().pop().unwrap();
        assert_eq!(released.point, Point::new(50.0, 10.0));
    }

    #[tokio::test]
    async fn hover_moves_to_the_center() {
        let (page, session) = session(r#"<a id="menu" data-rect="0,0,10,40">Menu</a>"#);
        let description = session
            .hover(Selector::link("Menu"), ActionOptions::default())
            .await
            .unwrap();
        assert_eq!(description, "Hovered over the link with label Menu");
        assert_eq!(page.mouse_events(), vec![MouseEvent::moved(Point::new(20.0, 5.0))]);
        assert_eq!(page.scrolled_ids(), vec!["menu"]);
    }

    #[tokio::test]
    async fn tap_touches_start_and_end() {
        let (page, session) = session(r#"<button id="b" data-rect="0,0,10,10">Like</button>"#);
        let description = session
            .tap(Selector::button("Like"), ActionOptions::default())
            .await
            .unwrap();
        assert_eq!(description, "Tapped on the button with label Like");
        let kinds: Vec<_> = page.touch_events().into_iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![TouchEventKind::Start, TouchEventKind::End]);
        assert_eq!(page.clicked_ids(), vec!["b"]);
        assert_eq!(page.scrolled_ids(), vec!["b"]);
    }

    #[tokio::test]
    async fn scrolls_elements_and_the_page() {
        let (_, session) = session(r#"<footer id="f">Contact</footer>"#);
        assert_eq!(
            session.scroll_to("Contact", ActionOptions::default()).await.unwrap(),
            "Scrolled to the element with label Contact"
        );
        assert_eq!(
            session.scroll_by(None, 0.0, 300.0, ActionOptions::default()).await.unwrap(),
            "Scrolled the page by 0, 300"
        );
        assert_eq!(
            session
                .scroll_by(Some(Selector::text("Contact")), 10.0, 0.0, ActionOptions::default())
                .await
                .unwrap(),
            "Scrolled the element with label Contact by 10, 0"
        );
    }
}
