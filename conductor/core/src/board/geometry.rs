//! Board geometry primitives
//!
//! Points, axis-aligned bounds and connector anchors. All coordinates are
//! board units with the origin at the top-left and y growing downwards.

use serde::{Deserialize, Serialize};

/// A point on the board
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal coordinate
    pub x: f64,
    /// Vertical coordinate
    pub y: f64,
}

impl Point {
    /// The board origin
    pub const ORIGIN: Self = Self { x: 0.0, y: 0.0 };

    /// Create a point
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Translate by an offset
    #[must_use]
    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// Midpoint of the segment between two points
    #[must_use]
    pub fn midpoint(self, other: Self) -> Self {
        Self::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

/// Where a connector attaches to an object's bounding box
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Anchor {
    /// Middle of the top edge
    Top,
    /// Middle of the bottom edge
    Bottom,
    /// Middle of the left edge
    Left,
    /// Middle of the right edge
    Right,
    /// Center of the box
    #[default]
    Center,
}

/// Axis-aligned bounding box
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Bounds {
    /// Left edge
    pub x: f64,
    /// Top edge
    pub y: f64,
    /// Width
    pub width: f64,
    /// Height
    pub height: f64,
}

impl Bounds {
    /// Create bounds from top-left corner and size
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Smallest bounds containing both points
    #[must_use]
    pub fn spanning(a: Point, b: Point) -> Self {
        let x = a.x.min(b.x);
        let y = a.y.min(b.y);
        Self::new(x, y, (a.x - b.x).abs(), (a.y - b.y).abs())
    }

    /// Center of the box
    #[must_use]
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Attachment point for an anchor
    #[must_use]
    pub fn anchor_point(&self, anchor: Anchor) -> Point {
        let center = self.center();
        match anchor {
            Anchor::Top => Point::new(center.x, self.y),
            Anchor::Bottom => Point::new(center.x, self.y + self.height),
            Anchor::Left => Point::new(self.x, center.y),
            Anchor::Right => Point::new(self.x + self.width, center.y),
            Anchor::Center => center,
        }
    }
}
