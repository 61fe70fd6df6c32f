//! Action vocabulary
//!
//! The closed set of board mutations shared by the model backends, the
//! template expander, the wire protocol and the applier. On the wire an action
//! is `{"tool": "<name>", "arguments": {...}}`.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::board::{Anchor, ObjectPatch, ObjectType};

/// Why a tool invocation could not be turned into an [`Action`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgumentError {
    /// Tool name is not part of the vocabulary
    #[error("unknown tool '{0}'")]
    UnknownTool(String),
    /// Argument string is not JSON
    #[error("arguments are not valid JSON: {0}")]
    MalformedJson(String),
    /// Arguments parsed but are not an object
    #[error("arguments must be a JSON object")]
    NotAnObject,
    /// Required field missing or wrong type
    #[error("{0}")]
    Schema(String),
    /// Fields present but semantically invalid
    #[error("{0}")]
    Invalid(String),
}

/// Name of a tool in the vocabulary
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    /// `create_sticky_note`
    CreateStickyNote,
    /// `create_rectangle`
    CreateRectangle,
    /// `create_circle`
    CreateCircle,
    /// `create_line`
    CreateLine,
    /// `create_text`
    CreateText,
    /// `create_connector`
    CreateConnector,
    /// `move_object`
    MoveObject,
    /// `update_object`
    UpdateObject,
    /// `bulk_update_objects`
    BulkUpdateObjects,
    /// `delete_object`
    DeleteObject,
    /// `clear_board`
    ClearBoard,
    /// `organize_board`
    OrganizeBoard,
    /// `analyze_board`
    AnalyzeBoard,
}

impl ToolName {
    /// Every tool, in catalogue order
    pub const ALL: [Self; 13] = [
        Self::CreateStickyNote,
        Self::CreateRectangle,
        Self::CreateCircle,
        Self::CreateLine,
        Self::CreateText,
        Self::CreateConnector,
        Self::MoveObject,
        Self::UpdateObject,
        Self::BulkUpdateObjects,
        Self::DeleteObject,
        Self::ClearBoard,
        Self::OrganizeBoard,
        Self::AnalyzeBoard,
    ];

    /// Wire name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CreateStickyNote => "create_sticky_note",
            Self::CreateRectangle => "create_rectangle",
            Self::CreateCircle => "create_circle",
            Self::CreateLine => "create_line",
            Self::CreateText => "create_text",
            Self::CreateConnector => "create_connector",
            Self::MoveObject => "move_object",
            Self::UpdateObject => "update_object",
            Self::BulkUpdateObjects => "bulk_update_objects",
            Self::DeleteObject => "delete_object",
            Self::ClearBoard => "clear_board",
            Self::OrganizeBoard => "organize_board",
            Self::AnalyzeBoard => "analyze_board",
        }
    }

    /// Object type produced by a `create_*` tool
    #[must_use]
    pub fn created_type(self) -> Option<ObjectType> {
        match self {
            Self::CreateStickyNote => Some(ObjectType::Sticky),
            Self::CreateRectangle => Some(ObjectType::Rectangle),
            Self::CreateCircle => Some(ObjectType::Circle),
            Self::CreateLine => Some(ObjectType::Line),
            Self::CreateText => Some(ObjectType::Text),
            Self::CreateConnector => Some(ObjectType::Connector),
            _ => None,
        }
    }
}

impl std::fmt::Display for ToolName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolName {
    type Err = ArgumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|tool| tool.as_str() == s)
            .ok_or_else(|| ArgumentError::UnknownTool(s.to_string()))
    }
}

/// Arguments of `create_sticky_note`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StickyNoteArgs {
    /// Note text
    pub text: String,
    /// Horizontal offset from the viewport center
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    /// Vertical offset from the viewport center
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    /// Width (clamped to the sticky minimum)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    /// Height (clamped to the sticky minimum)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    /// Note colour
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Caller-chosen id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// Arguments of `create_rectangle`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RectangleArgs {
    /// Horizontal offset from the viewport center
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    /// Vertical offset from the viewport center
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    /// Width
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    /// Height
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    /// Fill colour
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Outline colour
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_color: Option<String>,
    /// Text drawn inside the rectangle
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Caller-chosen id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// Arguments of `create_circle`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CircleArgs {
    /// Horizontal offset from the viewport center
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    /// Vertical offset from the viewport center
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    /// Radius
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius: Option<f64>,
    /// Fill colour
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Text drawn inside the circle
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Caller-chosen id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// Arguments of `create_line`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LineArgs {
    /// Start x offset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x1: Option<f64>,
    /// Start y offset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y1: Option<f64>,
    /// End x offset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x2: Option<f64>,
    /// End y offset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y2: Option<f64>,
    /// Stroke colour
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Stroke width
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_width: Option<f64>,
    /// Caller-chosen id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// Arguments of `create_text`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TextArgs {
    /// Text content
    pub text: String,
    /// Horizontal offset from the viewport center
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    /// Vertical offset from the viewport center
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    /// Font size
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    /// Text colour
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Caller-chosen id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// Arguments of `create_connector`
///
/// Each end is either anchored to an object (`start_id` / `end_id`) or given
/// as explicit offsets.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectorArgs {
    /// Object the connector starts at
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_id: Option<String>,
    /// Object the connector ends at
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_id: Option<String>,
    /// Explicit start x offset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_x: Option<f64>,
    /// Explicit start y offset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_y: Option<f64>,
    /// Explicit end x offset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_x: Option<f64>,
    /// Explicit end y offset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_y: Option<f64>,
    /// Attachment point on the start object (default bottom)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_anchor: Option<Anchor>,
    /// Attachment point on the end object (default top)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_anchor: Option<Anchor>,
    /// Label drawn at the midpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Stroke colour
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Caller-chosen id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// Arguments of `move_object`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MoveArgs {
    /// Object to move
    pub id: String,
    /// New horizontal offset from the viewport center
    pub x: f64,
    /// New vertical offset from the viewport center
    pub y: f64,
}

/// Arguments of `update_object`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateArgs {
    /// Object to update
    pub id: String,
    /// Fields to overwrite; `x`/`y` are viewport offsets
    #[serde(flatten)]
    pub patch: ObjectPatch,
}

/// Selection criteria for `bulk_update_objects`
///
/// Every provided criterion must match. An empty filter selects everything.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectFilter {
    /// Only objects of this type
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub object_type: Option<ObjectType>,
    /// Only objects with this colour (case-insensitive)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Only these ids
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<String>>,
}

/// Arguments of `bulk_update_objects`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkUpdateArgs {
    /// Which objects to update
    #[serde(default)]
    pub filter: ObjectFilter,
    /// Fields to overwrite on each match
    pub updates: ObjectPatch,
}

/// Arguments of `delete_object`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DeleteArgs {
    /// Object to delete
    pub id: String,
}

/// Arguments of `clear_board`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ClearBoardArgs {}

/// Arguments of `organize_board`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OrganizeArgs {
    /// Strategy name reported back to the model (`by_type` when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
}

impl OrganizeArgs {
    /// Strategy name, defaulting to `by_type`
    #[must_use]
    pub fn strategy(&self) -> &str {
        self.strategy.as_deref().unwrap_or("by_type")
    }
}

/// Arguments of `analyze_board`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeArgs {
    /// Optional aspect to focus on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus: Option<String>,
}

/// One schema-validated board mutation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tool", content = "arguments", rename_all = "snake_case")]
pub enum Action {
    /// Create a sticky note
    CreateStickyNote(StickyNoteArgs),
    /// Create a rectangle
    CreateRectangle(RectangleArgs),
    /// Create a circle
    CreateCircle(CircleArgs),
    /// Create a line
    CreateLine(LineArgs),
    /// Create free text
    CreateText(TextArgs),
    /// Create a connector
    CreateConnector(ConnectorArgs),
    /// Move an object
    MoveObject(MoveArgs),
    /// Update fields of one object
    UpdateObject(UpdateArgs),
    /// Update fields of every object matching a filter
    BulkUpdateObjects(BulkUpdateArgs),
    /// Delete an object
    DeleteObject(DeleteArgs),
    /// Delete everything
    ClearBoard(ClearBoardArgs),
    /// Lay the board out as grids grouped by type
    OrganizeBoard(OrganizeArgs),
    /// Read-only board inspection
    AnalyzeBoard(AnalyzeArgs),
}

impl Action {
    /// Build an action from a tool invocation's name and raw JSON arguments
    ///
    /// # Errors
    ///
    /// Returns an [`ArgumentError`] when the tool is unknown or the arguments
    /// do not satisfy the tool's schema.
    pub fn from_invocation(name: &str, raw_arguments: &str) -> Result<Self, ArgumentError> {
        let tool = ToolName::from_str(name)?;
        let raw = raw_arguments.trim();
        let arguments: serde_json::Value = if raw.is_empty() {
            serde_json::Value::Object(serde_json::Map::new())
        } else {
            serde_json::from_str(raw).map_err(|e| ArgumentError::MalformedJson(e.to_string()))?
        };
        if !arguments.is_object() {
            return Err(ArgumentError::NotAnObject);
        }

        let action: Self = serde_json::from_value(serde_json::json!({
            "tool": tool.as_str(),
            "arguments": arguments,
        }))
        .map_err(|e| ArgumentError::Schema(e.to_string()))?;
        action.validate()?;
        Ok(action)
    }

    /// Tool name of this action
    #[must_use]
    pub fn tool(&self) -> ToolName {
        match self {
            Self::CreateStickyNote(_) => ToolName::CreateStickyNote,
            Self::CreateRectangle(_) => ToolName::CreateRectangle,
            Self::CreateCircle(_) => ToolName::CreateCircle,
            Self::CreateLine(_) => ToolName::CreateLine,
            Self::CreateText(_) => ToolName::CreateText,
            Self::CreateConnector(_) => ToolName::CreateConnector,
            Self::MoveObject(_) => ToolName::MoveObject,
            Self::UpdateObject(_) => ToolName::UpdateObject,
            Self::BulkUpdateObjects(_) => ToolName::BulkUpdateObjects,
            Self::DeleteObject(_) => ToolName::DeleteObject,
            Self::ClearBoard(_) => ToolName::ClearBoard,
            Self::OrganizeBoard(_) => ToolName::OrganizeBoard,
            Self::AnalyzeBoard(_) => ToolName::AnalyzeBoard,
        }
    }

    /// Id explicitly given for a created object
    #[must_use]
    pub fn created_id(&self) -> Option<&str> {
        match self {
            Self::CreateStickyNote(args) => args.id.as_deref(),
            Self::CreateRectangle(args) => args.id.as_deref(),
            Self::CreateCircle(args) => args.id.as_deref(),
            Self::CreateLine(args) => args.id.as_deref(),
            Self::CreateText(args) => args.id.as_deref(),
            Self::CreateConnector(args) => args.id.as_deref(),
            _ => None,
        }
    }

    /// Check constraints serde cannot express
    ///
    /// # Errors
    ///
    /// Returns [`ArgumentError::Invalid`] describing the first violation.
    pub fn validate(&self) -> Result<(), ArgumentError> {
        if let Some(id) = self.created_id() {
            require_non_empty("id", id)?;
        }
        match self {
            Self::CreateStickyNote(args) => {
                require_positive("width", args.width)?;
                require_positive("height", args.height)
            }
            Self::CreateRectangle(args) => {
                require_positive("width", args.width)?;
                require_positive("height", args.height)
            }
            Self::CreateCircle(args) => require_positive("radius", args.radius),
            Self::CreateText(args) => {
                require_non_empty("text", &args.text)?;
                require_positive("font_size", args.font_size)
            }
            Self::CreateConnector(args) => {
                let has_start = args.start_id.is_some()
                    || (args.start_x.is_some() && args.start_y.is_some());
                let has_end =
                    args.end_id.is_some() || (args.end_x.is_some() && args.end_y.is_some());
                if has_start && has_end {
                    Ok(())
                } else {
                    Err(ArgumentError::Invalid(
                        "connector needs start_id or start_x/start_y and end_id or end_x/end_y"
                            .to_string(),
                    ))
                }
            }
            Self::MoveObject(args) => require_non_empty("id", &args.id),
            Self::UpdateObject(args) => {
                require_non_empty("id", &args.id)?;
                require_positive("width", args.patch.width)?;
                require_positive("height", args.patch.height)
            }
            Self::BulkUpdateObjects(args) => {
                if args.updates.is_empty() {
                    return Err(ArgumentError::Invalid("updates must not be empty".to_string()));
                }
                require_positive("width", args.updates.width)?;
                require_positive("height", args.updates.height)
            }
            Self::DeleteObject(args) => require_non_empty("id", &args.id),
            Self::CreateLine(_)
            | Self::ClearBoard(_)
            | Self::OrganizeBoard(_)
            | Self::AnalyzeBoard(_) => Ok(()),
        }
    }
}

fn require_non_empty(field: &str, value: &str) -> Result<(), ArgumentError> {
    if value.trim().is_empty() {
        Err(ArgumentError::Invalid(format!("{field} must not be empty")))
    } else {
        Ok(())
    }
}

fn require_positive(field: &str, value: Option<f64>) -> Result<(), ArgumentError> {
    match value {
        Some(v) if !v.is_finite() || v <= 0.0 => {
            Err(ArgumentError::Invalid(format!("{field} must be a positive number")))
        }
        _ => Ok(()),
    }
}
