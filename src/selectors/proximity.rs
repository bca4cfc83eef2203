use crate::dom::element::Element;
use crate::errors::Result;
use crate::selectors::resolve::Resolver;
use crate::selectors::spec::Selector;
use crate::types::Rect;
use std::collections::HashMap;
use tracing::debug;

pub const DEFAULT_NEAR_OFFSET: f64 = 30.0;

/// Spatial relation between a candidate and a reference box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Relation {
    Above,
    Below,
    ToLeftOf,
    ToRightOf,
    Near { offset: f64 },
    Within,
}

impl Relation {
    pub fn near() -> Self {
        Relation::Near {
            offset: DEFAULT_NEAR_OFFSET,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Relation::Above => "above",
            Relation::Below => "below",
            Relation::ToLeftOf => "to left of",
            Relation::ToRightOf => "to right of",
            Relation::Near { .. } => "near",
            Relation::Within => "within",
        }
    }

    /// Pure geometric test of `candidate` against `reference`.
    pub fn holds(&self, candidate: &Rect, reference: &Rect) -> bool {
        match *self {
            Relation::Above => candidate.bottom <= reference.top,
            Relation::Below => candidate.top >= reference.bottom,
            Relation::ToLeftOf => candidate.right <= reference.left,
            Relation::ToRightOf => candidate.left >= reference.right,
            Relation::Near { offset } => {
                let in_band = |edge: f64, low: f64, high: f64| edge >= low - offset && edge <= high + offset;
                let vertical = in_band(candidate.top, reference.top, reference.bottom)
                    || in_band(candidate.bottom, reference.top, reference.bottom);
                let horizontal = in_band(candidate.left, reference.left, reference.right)
                    || in_band(candidate.right, reference.left, reference.right);
                vertical && horizontal
            }
            Relation::Within => reference.contains_rect(candidate),
        }
    }
}

/// A relation to the elements matched by another selector.
#[derive(Debug, Clone, PartialEq)]
pub struct Proximity {
    pub relation: Relation,
    pub reference: Box<Selector>,
}

impl Proximity {
    pub fn new(relation: Relation, reference: Selector) -> Self {
        Self {
            relation,
            reference: Box::new(reference),
        }
    }

    pub fn description(&self) -> String {
        format!("{} {}", self.relation.name(), self.reference.description())
    }
}

/// Summed distance of `candidate` to the nearest qualifying reference of each
/// constraint, or `None` as soon as one constraint has no qualifying reference.
pub fn score(candidate: &Rect, constraints: &[(Relation, &[Rect])]) -> Option<f64> {
    let mut total = 0.0;
    for (relation, references) in constraints {
        let nearest = references
            .iter()
            .filter(|reference| relation.holds(candidate, reference))
            .map(|reference| candidate.edge_distance(reference))
            .min_by(|a, b| a.total_cmp(b))?;
        total += nearest;
    }
    Some(total)
}

/// Best match first; equal distances keep their input order.
pub fn rank<T>(mut scored: Vec<(T, f64)>) -> Vec<T> {
    scored.sort_by(|a, b| a.1.total_cmp(&b.1));
    scored.into_iter().map(|(item, _)| item).collect()
}

/// Filters `elements` down to those satisfying every constraint and ranks them.
pub async fn apply(
    resolver: &Resolver,
    elements: Vec<Element>,
    constraints: &[&Proximity],
) -> Result<Vec<Element>> {
    if constraints.is_empty() || elements.is_empty() {
        return Ok(elements);
    }

    let mut references: HashMap<String, Vec<Rect>> = HashMap::new();
    for constraint in constraints {
        let key = constraint.reference.description();
        if references.contains_key(&key) {
            continue;
        }
        let mut rects = Vec::new();
        for reference in resolver.search(&constraint.reference).await? {
            if let Some(rect) = reference.bounding_rect().await? {
                rects.push(rect);
            }
        }
        debug!("{} reference boxes for {}", rects.len(), key);
        references.insert(key, rects);
    }

    let mut scored = Vec::new();
    for element in elements {
        if !element.is_visible().await? {
            continue;
        }
        let Some(rect) = element.bounding_rect().await? else {
            continue;
        };
        let resolved: Vec<(Relation, &[Rect])> = constraints
            .iter()
            .map(|constraint| {
                let rects = references
                    .get(&constraint.reference.description())
                    .map(Vec::as_slice)
                    .unwrap_or(&[]);
                (constraint.relation, rects)
            })
            .collect();
        if let Some(distance) = score(&rect, &resolved) {
            scored.push((element, distance));
        }
    }
    Ok(rank(scored))
}
