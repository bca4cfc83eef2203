use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1440,
            height: 900,
        }
    }
}

/// A point in CSS pixels, relative to the main frame viewport.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Linear interpolation towards `to`; `t` is clamped to `0.0..=1.0`.
    pub fn lerp(&self, to: &Point, t: f64) -> Point {
        let t = t.clamp(0.0, 1.0);
        Point::new(self.x + (to.x - self.x) * t, self.y + (to.y - self.y) * t)
    }

    pub fn offset(&self, dx: f64, dy: f64) -> Point {
        Point::new(self.x + dx, self.y + dy)
    }
}

impl std::fmt::Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// An axis-aligned rectangle given by its edges.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Rect {
    pub top: f64,
    pub left: f64,
    pub bottom: f64,
    pub right: f64,
}

impl Rect {
    pub const fn new(top: f64, left: f64, bottom: f64, right: f64) -> Self {
        Self {
            top,
            left,
            bottom,
            right,
        }
    }

    /// Bounding rectangle of a CDP quad `[x1, y1, x2, y2, x3, y3, x4, y4]`.
    pub fn from_quad(quad: &[f64]) -> Option<Rect> {
        if quad.len() < 8 {
            return None;
        }
        let xs = quad.iter().step_by(2);
        let ys = quad.iter().skip(1).step_by(2);
        let left = xs.clone().cloned().fold(f64::INFINITY, f64::min);
        let right = xs.cloned().fold(f64::NEG_INFINITY, f64::max);
        let top = ys.clone().cloned().fold(f64::INFINITY, f64::min);
        let bottom = ys.cloned().fold(f64::NEG_INFINITY, f64::max);
        Some(Rect::new(top, left, bottom, right))
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0.0 || self.height() <= 0.0
    }

    pub fn center(&self) -> Point {
        Point::new(
            self.left + self.width() / 2.0,
            self.top + self.height() / 2.0,
        )
    }

    pub fn contains_point(&self, point: &Point) -> bool {
        point.x >= self.left && point.x <= self.right && point.y >= self.top && point.y <= self.bottom
    }

    pub fn contains_rect(&self, inner: &Rect) -> bool {
        inner.top >= self.top
            && inner.left >= self.left
            && inner.bottom <= self.bottom
            && inner.right <= self.right
    }

    /// Sum of the absolute differences of all four edges.
    pub fn edge_distance(&self, other: &Rect) -> f64 {
        (self.top - other.top).abs()
            + (self.left - other.left).abs()
            + (self.bottom - other.bottom).abs()
            + (self.right - other.right).abs()
    }
}

/// Border box of a node as reported by the geometry gateway.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BoxModel {
    pub border: Vec<f64>,
    pub width: f64,
    pub height: f64,
}

impl BoxModel {
    pub fn from_rect(rect: &Rect) -> Self {
        Self {
            border: vec![
                rect.left,
                rect.top,
                rect.right,
                rect.top,
                rect.right,
                rect.bottom,
                rect.left,
                rect.bottom,
            ],
            width: rect.width(),
            height: rect.height(),
        }
    }

    pub fn bounding_rect(&self) -> Option<Rect> {
        Rect::from_quad(&self.border)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quad_resolves_to_bounding_rect() {
        let quad = [50.0, 50.0, 100.0, 50.0, 100.0, 70.0, 50.0, 70.0];
        let rect = Rect::from_quad(&quad).unwrap();
        assert_eq!(rect, Rect::new(50.0, 50.0, 70.0, 100.0));
        assert_eq!(rect.center(), Point::new(75.0, 60.0));
        assert!(Rect::from_quad(&quad[..6]).is_none());
    }

    #[test]
    fn box_model_round_trips_through_rect() {
        let rect = Rect::new(10.0, 20.0, 30.0, 60.0);
        let model = BoxModel::from_rect(&rect);
        assert_eq!(model.bounding_rect(), Some(rect));
        assert_eq!(model.width, 40.0);
    }

    #[test]
    fn edge_distance_sums_all_edges() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(15.0, 0.0, 15.0, 10.0);
        assert_eq!(a.edge_distance(&b), 20.0);
        assert!(Rect::new(0.0, 0.0, 100.0, 100.0).contains_rect(&a));
    }

    #[test]
    fn lerp_walks_between_points() {
        let from = Point::new(0.0, 0.0);
        let to = Point::new(100.0, 50.0);
        assert_eq!(from.lerp(&to, 0.5), Point::new(50.0, 25.0));
        assert_eq!(from.lerp(&to, 2.0), to);
    }
}
