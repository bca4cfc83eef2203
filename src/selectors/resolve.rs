use crate::core::gateway::Gateway;
use crate::dom::element::Element;
use crate::dom::remote::{LabelStrategy, PageCall, RemoteRef};
use crate::errors::Result;
use crate::selectors::proximity;
use crate::selectors::spec::{attribute_css, ElementKind, Selector, SelectorSpec};
use crate::selectors::text::{MatchMode, TextPattern, TextQuery};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::debug;

pub type SearchFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<Element>>> + Send + 'a>>;

const MODES: [MatchMode; 2] = [MatchMode::Exact, MatchMode::Contains];

/// Turns selectors into elements of the live page.
#[derive(Clone)]
pub struct Resolver {
    gateway: Arc<dyn Gateway>,
}

impl Resolver {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self { gateway }
    }

    /// A lazy search: nothing touches the page until [`Search::run`].
    pub fn resolve(&self, selector: Selector) -> Search {
        Search {
            resolver: self.clone(),
            selector,
        }
    }

    /// One search pass. Zero matches is an empty list, not an error.
    pub fn search<'a>(&'a self, selector: &'a Selector) -> SearchFuture<'a> {
        Box::pin(async move {
            let description = selector.description();
            let elements: Vec<Element> = self
                .candidates(selector)
                .await?
                .into_iter()
                .map(|reference| Element::new(reference, description.clone(), self.gateway.clone()))
                .collect();
            debug!("{} candidates for {}", elements.len(), description);
            proximity::apply(self, elements, &selector.all_constraints()).await
        })
    }

    async fn nodes(&self, call: PageCall) -> Result<Vec<RemoteRef>> {
        self.gateway.call_function(None, &call).await?.into_nodes()
    }

    async fn candidates(&self, selector: &Selector) -> Result<Vec<RemoteRef>> {
        match &selector.spec {
            SelectorSpec::Label(pattern) => self.by_label(selector.kind, pattern).await,
            SelectorSpec::Attributes(attributes) => {
                self.nodes(PageCall::QueryCss {
                    selector: attribute_css(selector.kind, attributes),
                })
                .await
            }
            SelectorSpec::Composite(_) => {
                self.nodes(PageCall::QueryCss {
                    selector: selector.kind.fallback_css(),
                })
                .await
            }
            SelectorSpec::Handle(reference) => Ok(vec![reference.clone()]),
        }
    }

    /// Exact matches first; contains matches only when nothing matched exactly.
    async fn by_label(&self, kind: ElementKind, pattern: &TextPattern) -> Result<Vec<RemoteRef>> {
        if kind.labelled_by_label_element() {
            let found = self.by_label_element(kind, pattern).await?;
            if !found.is_empty() {
                return Ok(found);
            }
        }

        let scope = match kind {
            ElementKind::Text => None,
            _ => Some(kind.fallback_css()),
        };
        for mode in MODES {
            let found = self
                .nodes(PageCall::FindByText {
                    query: TextQuery::new(pattern.clone(), mode),
                    scope: scope.clone(),
                })
                .await?;
            if !found.is_empty() {
                return Ok(found);
            }
        }
        Ok(Vec::new())
    }

    async fn by_label_element(&self, kind: ElementKind, pattern: &TextPattern) -> Result<Vec<RemoteRef>> {
        let control = kind.fallback_css();
        for mode in MODES {
            let label = TextQuery::new(pattern.clone(), mode);
            let mut found = Vec::new();
            for strategy in [LabelStrategy::For, LabelStrategy::Nested] {
                let nodes = self
                    .nodes(PageCall::LabelledControls {
                        label: label.clone(),
                        control: control.clone(),
                        strategy,
                    })
                    .await?;
                for node in nodes {
                    if !found.contains(&node) {
                        found.push(node);
                    }
                }
            }
            if !found.is_empty() {
                return Ok(found);
            }
        }

        for mode in MODES {
            let found = self
                .nodes(PageCall::LabelledControls {
                    label: TextQuery::new(pattern.clone(), mode),
                    control: control.clone(),
                    strategy: LabelStrategy::InlineAdjacent,
                })
                .await?;
            if !found.is_empty() {
                return Ok(found);
            }
        }
        Ok(Vec::new())
    }
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver").finish_non_exhaustive()
    }
}

/// A selector bound to a resolver, re-run on every retry tick.
#[derive(Debug, Clone)]
pub struct Search {
    resolver: Resolver,
    selector: Selector,
}

impl Search {
    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    pub fn description(&self) -> String {
        self.selector.description()
    }

    pub async fn run(&self) -> Result<Vec<Element>> {
        self.resolver.search(&self.selector).await
    }
}
