//! Board Objects
//!
//! `BoardObject` is a superset of every shape the board knows about (sticky
//! notes, rectangles, circles, lines, text and connectors). Fields that do not
//! apply to a shape stay `None`. The same struct is used for the client's
//! snapshot, the applier's draft mirror and the calls to the external store.

use serde::{Deserialize, Serialize};

use super::geometry::{Anchor, Bounds, Point};

/// Minimum edge length of a sticky note
pub const STICKY_MIN_SIZE: f64 = 200.0;

/// Kind of board object
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectType {
    /// Sticky note with text
    Sticky,
    /// Rectangle, optionally with text
    Rectangle,
    /// Circle or ellipse
    Circle,
    /// Free line segment
    Line,
    /// Free-standing text
    Text,
    /// Arrow between two objects or points
    Connector,
}

impl ObjectType {
    /// Human-readable name used in tool results and summaries
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Sticky => "sticky note",
            Self::Rectangle => "rectangle",
            Self::Circle => "circle",
            Self::Line => "line",
            Self::Text => "text",
            Self::Connector => "connector",
        }
    }

    /// Size used when a create action gives none
    #[must_use]
    pub fn default_size(self) -> (f64, f64) {
        match self {
            Self::Sticky => (STICKY_MIN_SIZE, STICKY_MIN_SIZE),
            Self::Rectangle => (150.0, 100.0),
            Self::Circle => (100.0, 100.0),
            Self::Text => (200.0, 40.0),
            Self::Line | Self::Connector => (0.0, 0.0),
        }
    }
}

impl std::fmt::Display for ObjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A single object on the board
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoardObject {
    /// Stable object id
    pub id: String,
    /// Shape kind
    #[serde(rename = "type")]
    pub object_type: ObjectType,
    /// Left edge
    #[serde(default)]
    pub x: f64,
    /// Top edge
    #[serde(default)]
    pub y: f64,
    /// Width
    #[serde(default)]
    pub width: f64,
    /// Height
    #[serde(default)]
    pub height: f64,
    /// Fill colour (or stroke colour for lines and connectors)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Text content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Font size for text-bearing shapes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    /// Outline colour
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_color: Option<String>,
    /// Outline or line width
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_width: Option<f64>,
    /// Start point for lines and connectors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<Point>,
    /// End point for lines and connectors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<Point>,
    /// Object the connector starts at
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_id: Option<String>,
    /// Object the connector ends at
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_id: Option<String>,
    /// Attachment point on the start object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_anchor: Option<Anchor>,
    /// Attachment point on the end object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_anchor: Option<Anchor>,
    /// Requester that created the object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

impl BoardObject {
    /// Create an object of the given type with its default size at the origin
    #[must_use]
    pub fn new(id: impl Into<String>, object_type: ObjectType) -> Self {
        let (width, height) = object_type.default_size();
        Self {
            id: id.into(),
            object_type,
            x: 0.0,
            y: 0.0,
            width,
            height,
            color: None,
            text: None,
            font_size: None,
            stroke_color: None,
            stroke_width: None,
            start: None,
            end: None,
            start_id: None,
            end_id: None,
            start_anchor: None,
            end_anchor: None,
            created_by: None,
        }
    }

    /// Bounding box
    #[must_use]
    pub fn bounds(&self) -> Bounds {
        match (self.start, self.end) {
            (Some(start), Some(end)) => Bounds::spanning(start, end),
            _ => Bounds::new(self.x, self.y, self.width, self.height),
        }
    }

    /// Whether this is a connector
    #[must_use]
    pub fn is_connector(&self) -> bool {
        self.object_type == ObjectType::Connector
    }

    /// Whether this connector starts or ends at `id`
    #[must_use]
    pub fn references(&self, id: &str) -> bool {
        self.start_id.as_deref() == Some(id) || self.end_id.as_deref() == Some(id)
    }

    /// Move the object so its top-left corner is at `position`
    ///
    /// Lines and connectors are translated as a whole.
    pub fn move_to(&mut self, position: Point) {
        let dx = position.x - self.x;
        let dy = position.y - self.y;
        self.x = position.x;
        self.y = position.y;
        if let Some(start) = self.start.as_mut() {
            *start = start.offset(dx, dy);
        }
        if let Some(end) = self.end.as_mut() {
            *end = end.offset(dx, dy);
        }
    }

    /// Set endpoints of a line or connector and keep the box in sync
    pub fn set_endpoints(&mut self, start: Point, end: Point) {
        let bounds = Bounds::spanning(start, end);
        self.start = Some(start);
        self.end = Some(end);
        self.x = bounds.x;
        self.y = bounds.y;
        self.width = bounds.width;
        self.height = bounds.height;
    }

    /// Enforce per-type minimum dimensions
    pub fn clamp_size(&mut self) {
        if self.object_type == ObjectType::Sticky {
            self.width = self.width.max(STICKY_MIN_SIZE);
            self.height = self.height.max(STICKY_MIN_SIZE);
        }
    }
}

/// Partial update of a board object
///
/// Only fields that are `Some` are written; everything else keeps its value.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectPatch {
    /// New left edge (board units, already resolved)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    /// New top edge
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    /// New width
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    /// New height
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    /// New colour
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// New text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// New font size
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    /// New outline colour
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stroke_color: Option<String>,
    /// New outline width
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stroke_width: Option<f64>,
}

impl ObjectPatch {
    /// Whether the patch changes nothing
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Whether the patch changes position or size
    #[must_use]
    pub fn changes_geometry(&self) -> bool {
        self.x.is_some() || self.y.is_some() || self.width.is_some() || self.height.is_some()
    }

    /// Write the provided fields into `object`
    pub fn apply_to(&self, object: &mut BoardObject) {
        if self.x.is_some() || self.y.is_some() {
            let target = Point::new(self.x.unwrap_or(object.x), self.y.unwrap_or(object.y));
            object.move_to(target);
        }
        if let Some(width) = self.width {
            object.width = width;
        }
        if let Some(height) = self.height {
            object.height = height;
        }
        if let Some(ref color) = self.color {
            object.color = Some(color.clone());
        }
        if let Some(ref text) = self.text {
            object.text = Some(text.clone());
        }
        if let Some(font_size) = self.font_size {
            object.font_size = Some(font_size);
        }
        if let Some(ref stroke_color) = self.stroke_color {
            object.stroke_color = Some(stroke_color.clone());
        }
        if let Some(stroke_width) = self.stroke_width {
            object.stroke_width = Some(stroke_width);
        }
        object.clamp_size();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_object_defaults() {
        let object: BoardObject =
            serde_json::from_str(r#"{"id":"1","type":"sticky","color":"red"}"#).unwrap();
        assert_eq!(object.object_type, ObjectType::Sticky);
        assert_eq!(object.color.as_deref(), Some("red"));
        assert!(object.x.abs() < f64::EPSILON);
        assert!(object.text.is_none());
    }

    #[test]
    fn test_patch_only_overwrites_provided_fields() {
        let mut object = BoardObject::new("a", ObjectType::Rectangle);
        object.color = Some("blue".to_string());
        object.text = Some("keep".to_string());

        let patch = ObjectPatch {
            color: Some("green".to_string()),
            width: Some(300.0),
            ..ObjectPatch::default()
        };
        patch.apply_to(&mut object);

        assert_eq!(object.color.as_deref(), Some("green"));
        assert_eq!(object.text.as_deref(), Some("keep"));
        assert!((object.width - 300.0).abs() < f64::EPSILON);
        assert!((object.height - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_sticky_size_is_clamped() {
        let mut object = BoardObject::new("s", ObjectType::Sticky);
        ObjectPatch {
            width: Some(50.0),
            height: Some(400.0),
            ..ObjectPatch::default()
        }
        .apply_to(&mut object);
        assert!((object.width - STICKY_MIN_SIZE).abs() < f64::EPSILON);
        assert!((object.height - 400.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_move_translates_endpoints() {
        let mut line = BoardObject::new("l", ObjectType::Line);
        line.set_endpoints(Point::new(0.0, 0.0), Point::new(100.0, 50.0));
        line.move_to(Point::new(10.0, 10.0));
        assert_eq!(line.start, Some(Point::new(10.0, 10.0)));
        assert_eq!(line.end, Some(Point::new(110.0, 60.0)));
    }
}
