use crate::dom::element::Element;
use crate::errors::{PilotError, Result};
use crate::selectors::resolve::Search;
use crate::wait::{poll, RetryPolicy};
use tracing::warn;

/// A condition an element must meet before it is acted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    Visible,
    NotDisabled,
    /// Focusable and not read-only.
    Writable,
}

pub const DEFAULT_CHECKS: &[Check] = &[Check::Visible, Check::NotDisabled];
pub const WRITE_CHECKS: &[Check] = &[Check::Visible, Check::NotDisabled, Check::Writable];

impl Check {
    pub fn name(&self) -> &'static str {
        match self {
            Check::Visible => "visible",
            Check::NotDisabled => "not disabled",
            Check::Writable => "writable",
        }
    }

    pub async fn passes(&self, element: &Element) -> Result<bool> {
        match self {
            Check::Visible => element.is_visible().await,
            Check::NotDisabled => Ok(!element.is_disabled().await?),
            Check::Writable => element.is_writable().await,
        }
    }
}

/// The first check `element` fails, in declaration order.
pub async fn first_failing(element: &Element, checks: &[Check]) -> Result<Option<Check>> {
    for check in checks {
        if !check.passes(element).await? {
            return Ok(Some(*check));
        }
    }
    Ok(None)
}

fn describe_checks(checks: &[Check]) -> String {
    checks.iter().map(Check::name).collect::<Vec<_>>().join(", ")
}

/// Waits until one of the first `limit` candidates passes every check and
/// returns it. Candidates are re-read on every tick.
pub async fn wait_for_actionable(
    search: &Search,
    checks: &[Check],
    policy: RetryPolicy,
    limit: usize,
) -> Result<Element> {
    let description = search.description();
    let description = description.as_str();
    poll(policy, description, move || async move {
        let candidates = search.run().await?;
        if candidates.is_empty() {
            return Err(PilotError::NotFound {
                description: description.to_string(),
            });
        }

        let mut failed: Vec<Check> = Vec::new();
        for candidate in candidates.into_iter().take(limit.max(1)) {
            match first_failing(&candidate, checks).await {
                Ok(None) => return Ok(Some(candidate)),
                Ok(Some(check)) => {
                    if !failed.contains(&check) {
                        failed.push(check);
                    }
                }
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => warn!("skipping candidate for {}: {}", description, err),
            }
        }

        Err(PilotError::NotActionable {
            description: description.to_string(),
            checks: if failed.is_empty() {
                describe_checks(checks)
            } else {
                describe_checks(&failed)
            },
        })
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selectors::resolve::Resolver;
    use crate::selectors::spec::Selector;
    use crate::testing::FakePage;
    use std::sync::Arc;

    fn resolver(html: &str) -> Resolver {
        Resolver::new(Arc::new(FakePage::new(html)))
    }

    #[tokio::test]
    async fn skips_disabled_candidates() {
        let page = resolver(
            r#"<button id="a" disabled data-rect="0,0,10,10">Go</button>
               <button id="b" data-rect="20,0,30,10">Go</button>"#,
        );
        let search = page.resolve(Selector::button("Go"));
        let element = wait_for_actionable(&search, DEFAULT_CHECKS, RetryPolicy::once(), 10)
            .await
            .unwrap();
        assert_eq!(element.describe().await.unwrap().id.as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn names_the_checks_that_never_passed() {
        let page = resolver(r#"<button disabled data-rect="0,0,10,10">Go</button>"#);
        let search = page.resolve(Selector::button("Go"));
        let err = wait_for_actionable(&search, DEFAULT_CHECKS, RetryPolicy::new(5, 20), 10)
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "button with label Go is not actionable. Check not disabled failed"
        );
    }

    #[tokio::test]
    async fn missing_elements_are_not_found() {
        let page = resolver("<p>nothing here</p>");
        let search = page.resolve(Selector::button("Go"));
        let err = wait_for_actionable(&search, DEFAULT_CHECKS, RetryPolicy::once(), 10)
            .await
            .unwrap_err();
        assert!(matches!(err, PilotError::NotFound { .. }));
    }

    #[tokio::test]
    async fn write_checks_reject_read_only_fields() {
        let page = resolver(r#"<label for="n">Name</label><input id="n" readonly data-rect="0,0,10,10">"#);
        let search = page.resolve(Selector::text_box("Name"));
        let err = wait_for_actionable(&search, WRITE_CHECKS, RetryPolicy::once(), 10)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("writable"));
    }
}
