//! plain geometry types for host-page layout, in CSS pixels

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self { Self { x, y } }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self { Self { width, height } }
}

/// An axis-aligned rectangle in viewport coordinates (origin top-left, y grows downward),
/// matching what a bounding-client-rect query reports.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub origin: Point,
    pub size: Size,
}

impl Rect {
    pub const fn from_xywh(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            origin: Point::new(x, y),
            size: Size::new(width, height),
        }
    }

    pub fn left(&self) -> f64 { self.origin.x }
    pub fn top(&self) -> f64 { self.origin.y }
    pub fn right(&self) -> f64 { self.origin.x + self.size.width }
    pub fn bottom(&self) -> f64 { self.origin.y + self.size.height }
    pub fn width(&self) -> f64 { self.size.width }
    pub fn height(&self) -> f64 { self.size.height }

    pub fn is_empty(&self) -> bool { self.size.width <= 0.0 || self.size.height <= 0.0 }

    /// Distance from the right edge to the right side of `viewport`. Negative
    /// when the rect overhangs it.
    pub fn right_gap(&self, viewport: Size) -> f64 { viewport.width - self.right() }
}
