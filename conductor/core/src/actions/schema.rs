//! Tool catalogue
//!
//! JSON-Schema descriptions of the vocabulary, handed to the model backends as
//! callable tools. Adapters translate [`ToolDefinition`] into their provider's
//! tool format.

use serde::Serialize;
use serde_json::{json, Value};

use super::vocabulary::ToolName;

/// A callable tool as advertised to a model
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ToolDefinition {
    /// Tool name
    pub name: &'static str,
    /// What the tool does
    pub description: &'static str,
    /// JSON-Schema object describing the arguments
    pub parameters: Value,
}

const COLOR_HINT: &str = "Colour name or hex code, e.g. yellow or #ffd166";
const OFFSET_HINT: &str = "Offset in pixels from the center of the user's viewport";

fn offset(description: &str) -> Value {
    json!({ "type": "number", "description": description })
}

fn string(description: &str) -> Value {
    json!({ "type": "string", "description": description })
}

fn anchor(description: &str) -> Value {
    json!({
        "type": "string",
        "enum": ["top", "bottom", "left", "right", "center"],
        "description": description,
    })
}

fn patch_properties() -> serde_json::Map<String, Value> {
    let mut props = serde_json::Map::new();
    props.insert("x".into(), offset(OFFSET_HINT));
    props.insert("y".into(), offset(OFFSET_HINT));
    props.insert("width".into(), json!({ "type": "number" }));
    props.insert("height".into(), json!({ "type": "number" }));
    props.insert("color".into(), string(COLOR_HINT));
    props.insert("text".into(), json!({ "type": "string" }));
    props.insert("font_size".into(), json!({ "type": "number" }));
    props.insert("stroke_color".into(), string(COLOR_HINT));
    props.insert("stroke_width".into(), json!({ "type": "number" }));
    props
}

impl ToolName {
    /// One-line description shown to the model
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::CreateStickyNote => "Create a sticky note with text. Sticky notes are at least 200x200.",
            Self::CreateRectangle => "Create a rectangle, optionally with text inside.",
            Self::CreateCircle => "Create a circle, optionally with text inside.",
            Self::CreateLine => "Draw a straight line between two points.",
            Self::CreateText => "Place free-standing text on the board.",
            Self::CreateConnector => {
                "Connect two objects (or points) with an arrow. Use object ids created earlier in this command or existing board ids."
            }
            Self::MoveObject => "Move an existing object to a new position.",
            Self::UpdateObject => "Change text, colour, size or position of one object. Only given fields change.",
            Self::BulkUpdateObjects => "Apply the same changes to every object matching a filter.",
            Self::DeleteObject => "Delete one object. Connectors attached to it are removed too.",
            Self::ClearBoard => "Delete every object on the board.",
            Self::OrganizeBoard => "Arrange all objects into tidy grids grouped by type.",
            Self::AnalyzeBoard => "Summarise what is currently on the board.",
        }
    }

    /// JSON-Schema of the tool's arguments
    #[must_use]
    pub fn parameters(self) -> Value {
        match self {
            Self::CreateStickyNote => json!({
                "type": "object",
                "properties": {
                    "text": string("Note text"),
                    "x": offset(OFFSET_HINT),
                    "y": offset(OFFSET_HINT),
                    "width": { "type": "number" },
                    "height": { "type": "number" },
                    "color": string(COLOR_HINT),
                    "id": string("Optional id so later calls can reference this note"),
                },
                "required": ["text"],
            }),
            Self::CreateRectangle => json!({
                "type": "object",
                "properties": {
                    "x": offset(OFFSET_HINT),
                    "y": offset(OFFSET_HINT),
                    "width": { "type": "number" },
                    "height": { "type": "number" },
                    "color": string(COLOR_HINT),
                    "stroke_color": string(COLOR_HINT),
                    "text": { "type": "string" },
                    "id": string("Optional id so later calls can reference this shape"),
                },
            }),
            Self::CreateCircle => json!({
                "type": "object",
                "properties": {
                    "x": offset(OFFSET_HINT),
                    "y": offset(OFFSET_HINT),
                    "radius": { "type": "number" },
                    "color": string(COLOR_HINT),
                    "text": { "type": "string" },
                    "id": string("Optional id so later calls can reference this shape"),
                },
            }),
            Self::CreateLine => json!({
                "type": "object",
                "properties": {
                    "x1": offset(OFFSET_HINT),
                    "y1": offset(OFFSET_HINT),
                    "x2": offset(OFFSET_HINT),
                    "y2": offset(OFFSET_HINT),
                    "color": string(COLOR_HINT),
                    "stroke_width": { "type": "number" },
                    "id": { "type": "string" },
                },
            }),
            Self::CreateText => json!({
                "type": "object",
                "properties": {
                    "text": { "type": "string" },
                    "x": offset(OFFSET_HINT),
                    "y": offset(OFFSET_HINT),
                    "font_size": { "type": "number" },
                    "color": string(COLOR_HINT),
                    "id": { "type": "string" },
                },
                "required": ["text"],
            }),
            Self::CreateConnector => json!({
                "type": "object",
                "properties": {
                    "start_id": string("Id of the object the arrow starts at"),
                    "end_id": string("Id of the object the arrow points to"),
                    "start_x": offset(OFFSET_HINT),
                    "start_y": offset(OFFSET_HINT),
                    "end_x": offset(OFFSET_HINT),
                    "end_y": offset(OFFSET_HINT),
                    "start_anchor": anchor("Side of the start object (default bottom)"),
                    "end_anchor": anchor("Side of the end object (default top)"),
                    "label": string("Text shown at the middle of the arrow"),
                    "color": string(COLOR_HINT),
                    "id": { "type": "string" },
                },
            }),
            Self::MoveObject => json!({
                "type": "object",
                "properties": {
                    "id": { "type": "string" },
                    "x": offset(OFFSET_HINT),
                    "y": offset(OFFSET_HINT),
                },
                "required": ["id", "x", "y"],
            }),
            Self::UpdateObject => {
                let mut props = patch_properties();
                props.insert("id".into(), json!({ "type": "string" }));
                json!({ "type": "object", "properties": props, "required": ["id"] })
            }
            Self::BulkUpdateObjects => json!({
                "type": "object",
                "properties": {
                    "filter": {
                        "type": "object",
                        "properties": {
                            "type": {
                                "type": "string",
                                "enum": ["sticky", "rectangle", "circle", "line", "text", "connector"],
                            },
                            "color": string(COLOR_HINT),
                            "ids": { "type": "array", "items": { "type": "string" } },
                        },
                    },
                    "updates": { "type": "object", "properties": patch_properties() },
                },
                "required": ["updates"],
            }),
            Self::DeleteObject => json!({
                "type": "object",
                "properties": { "id": { "type": "string" } },
                "required": ["id"],
            }),
            Self::ClearBoard => json!({ "type": "object", "properties": {} }),
            Self::OrganizeBoard => json!({
                "type": "object",
                "properties": { "strategy": string("Grouping strategy, default by_type") },
            }),
            Self::AnalyzeBoard => json!({
                "type": "object",
                "properties": { "focus": string("Optional aspect to focus on") },
            }),
        }
    }

    /// Full catalogue entry
    #[must_use]
    pub fn definition(self) -> ToolDefinition {
        ToolDefinition {
            name: self.as_str(),
            description: self.description(),
            parameters: self.parameters(),
        }
    }
}

/// Catalogue of every tool in the vocabulary
#[must_use]
pub fn tool_definitions() -> Vec<ToolDefinition> {
    ToolName::ALL.into_iter().map(ToolName::definition).collect()
}
