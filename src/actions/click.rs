use crate::actions::actionability::{first_failing, DEFAULT_CHECKS};
use crate::actions::base::{ActionOptions, Target};
use crate::browser::session::PageSession;
use crate::core::gateway::{MouseButton, MouseEvent};
use crate::dom::element::Element;
use crate::errors::{PilotError, Result};
use crate::selectors::spec::Selector;
use crate::types::Point;
use crate::wait::poll;
use std::time::Instant;
use tracing::warn;

/// `Some(true)` when the candidate can take the click, `Some(false)` when
/// something covers it, `None` when it is hidden or disabled.
async fn unobstructed(candidate: &Element) -> Result<Option<bool>> {
    if candidate.describe().await?.is_file_input() {
        return Err(PilotError::UnsupportedOperation(format!(
            "{} is a file input and cannot be clicked, attach files to it instead",
            candidate.description()
        )));
    }
    if first_failing(candidate, DEFAULT_CHECKS).await?.is_some() {
        return Ok(None);
    }
    candidate.scroll_into_view().await?;
    Ok(Some(candidate.is_at_point().await?))
}

impl PageSession {
    /// Clicks the first unobstructed, enabled match of `target`, or a point.
    /// Each repetition is synchronized with navigation on its own.
    pub async fn click(&self, target: impl Into<Target>, options: ActionOptions) -> Result<String> {
        let started = Instant::now();
        let count = options.click_count();
        let (point, description) = self.click_point(target.into(), &options).await?;
        for repetition in 1..=count {
            self.navigating(&options, || self.press_and_release(point, options.button, repetition))
                .await?;
        }
        let description = match description {
            Some(description) => format!("Clicked {} {} times", description, count),
            None => format!(
                "Clicked {} times on coordinates x : {} and y : {}",
                count, point.x, point.y
            ),
        };
        self.completed(description, started).await
    }

    pub async fn double_click(&self, target: impl Into<Target>, options: ActionOptions) -> Result<String> {
        let started = Instant::now();
        let (point, description) = self.click_point(target.into(), &options).await?;
        self.navigating(&options, || async {
            self.press_and_release(point, options.button, 1).await?;
            self.press_and_release(point, options.button, 2).await
        })
        .await?;
        let description = description.unwrap_or_else(|| format!("coordinates {}", point));
        self.completed(format!("Double clicked {}", description), started)
            .await
    }

    pub async fn right_click(&self, target: impl Into<Target>, options: ActionOptions) -> Result<String> {
        let started = Instant::now();
        let options = options.with_button(MouseButton::Right);
        let (point, description) = self.click_point(target.into(), &options).await?;
        self.navigating(&options, || self.press_and_release(point, MouseButton::Right, 1))
            .await?;
        let description = description.unwrap_or_else(|| format!("coordinates {}", point));
        self.completed(format!("Right clicked {}", description), started)
            .await
    }

    /// Where to click, plus the description of the element when there is one.
    async fn click_point(&self, target: Target, options: &ActionOptions) -> Result<(Point, Option<String>)> {
        match target {
            Target::Point(point) => Ok((point, None)),
            Target::Selector(selector) => {
                let (element, description) = self.clickable(&selector, options).await?;
                self.highlight(&element).await;
                Ok((element.center().await?, Some(description)))
            }
        }
    }

    async fn clickable(&self, selector: &Selector, options: &ActionOptions) -> Result<(Element, String)> {
        let config = self.config().await;
        let search = self.resolve(selector.clone());
        let description = search.description();
        let limit = config.elements_to_match().max(1);
        let (search, described) = (&search, description.as_str());

        let element = poll(options.retry_policy(&config), described, move || async move {
            let candidates = search.run().await?;
            if candidates.is_empty() {
                return Err(PilotError::NotFound {
                    description: described.to_string(),
                });
            }

            let mut tried = 0usize;
            for candidate in candidates.into_iter().take(limit) {
                match unobstructed(&candidate).await {
                    Ok(Some(true)) => return Ok(Some(candidate)),
                    Ok(Some(false)) => tried += 1,
                    Ok(None) => {}
                    Err(err) if err.aborts_retry() => return Err(err),
                    Err(err) => warn!("skipping candidate for {}: {}", described, err),
                }
            }

            Err(match tried {
                0 => PilotError::NotActionable {
                    description: described.to_string(),
                    checks: "visible, not disabled".to_string(),
                },
                1 => PilotError::Occluded {
                    description: described.to_string(),
                },
                _ => PilotError::Ambiguous {
                    description: described.to_string(),
                },
            })
        })
        .await?;

        let info = element.describe().await?;
        Ok((element, selector.description_for(&info)))
    }

    pub(crate) async fn press_and_release(&self, point: Point, button: MouseButton, click_count: u32) -> Result<()> {
        let gateway = self.gateway();
        gateway.dispatch_mouse(MouseEvent::moved(point)).await?;
        gateway
            .dispatch_mouse(MouseEvent::pressed(point, button, click_count))
            .await?;
        gateway
            .dispatch_mouse(MouseEvent::released(point, button, click_count))
            .await
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

    #[tokio::test]
    async fn clicks_the_center_of_the_button() {
        let (page, session) = session(r#"<button data-rect="50,50,70,100">Save</button>"#);
        let description = session.click("Save", ActionOptions::default()).await.unwrap();
        assert_eq!(description, "Clicked button with label Save 1 times");

        let presses: Vec<_> = page
            .mouse_events()
            .into_iter()
            .filter(|event| event.kind != MouseEventKind::Moved)
            .collect();
        assert_eq!(presses.len(), 2);
        assert_eq!(presses[0].kind, MouseEventKind::Pressed);
        assert_eq!(presses[1].kind, MouseEventKind::Released);
        assert!(presses.iter().all(|event| event.point == Point::new(75.0, 60.0)));
    }

    #[tokio::test]
    async fn repetitions_count_up() {
        let (page, session) = session(r#"<button data-rect="0,0,10,10">Go</button>"#);
        session
            .click(Selector::button("Go"), ActionOptions::default().with_click_count(2))
            .await
            .unwrap();
        let counts: Vec<u32> = page
            .mouse_events()
            .into_iter()
            .filter(|event| event.kind == MouseEventKind::Pressed)
            .map(|event| event.click_count)
            .collect();
        assert_eq!(counts, vec![1, 2]);
    }

    #[tokio::test]
    async fn covered_single_candidate_is_occluded() {
        let (_, session) = session(r#"<button data-rect="0,0,10,10" data-covered>Save</button>"#);
        let err = session.click("Save", ActionOptions::default()).await.unwrap_err();
        assert!(matches!(err, PilotError::Occluded { .. }));
        assert_eq!(err.to_string(), "element with label Save is covered by other element");
    }

    #[tokio::test]
    async fn several_covered_candidates_are_ambiguous() {
        let (_, session) = session(
            r#"<button data-rect="0,0,10,10" data-covered>Save</button>
               <button data-rect="20,0,30,10" data-covered>Save</button>"#,
        );
        let err = session
            .click(Selector::button("Save"), ActionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PilotError::Ambiguous { .. }));
    }

    #[tokio::test]
    async fn skips_disabled_and_covered_candidates() {
        let (page, session) = session(
            r#"<button id="a" disabled data-rect="0,0,10,10">Next</button>
               <button id="b" data-covered data-rect="20,0,30,10">Next</button>
               <button id="c" data-rect="40,0,50,10">Next</button>"#,
        );
        session
            .click(Selector::button("Next"), ActionOptions::default())
            .await
            .unwrap();
        assert_eq!(page.clicked_ids(), vec!["c"]);
    }

    #[tokio::test]
    async fn file_inputs_refuse_clicks_without_retrying() {
        let (page, session) = session(
            r#"<label for="f">Upload</label><input type="file" id="f" data-rect="0,0,10,10">"#,
        );
        let started = std::time::Instant::now();
        let err = session
            .click(Selector::file_field("Upload"), ActionOptions::default().with_retry(10, 5000))
            .await
            .unwrap_err();
        assert!(matches!(err, PilotError::UnsupportedOperation(_)));
        assert!(started.elapsed() < std::time::Duration::from_millis(2000));
        assert!(page.mouse_events().is_empty());
    }

    #[tokio::test]
    async fn points_are_clicked_as_given() {
        let (page, session) = session("<p></p>");
        let description = session
            .click(Point::new(5.0, 7.0), ActionOptions::default())
            .await
            .unwrap();
        assert_eq!(description, "Clicked 1 times on coordinates x : 5 and y : 7");
        assert_eq!(page.mouse_events().len(), 3);
    }

    #[tokio::test]
    async fn right_and_double_clicks() {
        let (page, session) = session(r#"<a href="/x" data-rect="0,0,10,10">Menu</a>"#);
        let description = session
            .right_click(Selector::link("Menu"), ActionOptions::default())
            .await
            .unwrap();
        assert_eq!(description, "Right clicked link with label Menu");
        assert!(page
            .mouse_events()
            .iter()
            .any(|event| event.button == MouseButton::Right));

        let description = session
            .double_click(Selector::link("Menu"), ActionOptions::default())
            .await
            .unwrap();
        assert_eq!(description, "Double clicked link with label Menu");
    }

    #[tokio::test]
    async fn missing_targets_are_reported_by_description() {
        let (_, session) = session("<p>nothing</p>");
        let err = session
            .click(Selector::button("Save"), ActionOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "button with label Save not found");
    }
}
