//! System prompt
//!
//! One prompt per classification bucket, followed by a compact JSON listing
//! of the board so the model can reference existing ids.

use serde_json::{json, Value};

use crate::board::BoardObject;
use crate::routing::TaskClass;

const SHARED_GUIDANCE: &str = "\
You control a shared whiteboard through tools. Every change to the board must be made with a tool call.
Coordinates are offsets in pixels from the center of the user's viewport; omit x and y to place at the center.
Give objects an id when a later call (for example create_connector) needs to reference them.
Reference existing objects by the ids listed under CURRENT BOARD. Never invent ids for objects that do not exist.
Keep replies short: one sentence describing what you did.";

const FAST_GUIDANCE: &str = "\
The request is a direct edit. Use the fewest tool calls that satisfy it.
For changes to many objects at once prefer bulk_update_objects over repeated update_object calls.";

const CREATIVE_GUIDANCE: &str = "\
The request is a composition. Build it from primitive shapes (circles, rectangles, lines, text, sticky notes) placed relative to each other.
For diagrams and flowcharts create the nodes with ids and no x/y, then connect them with create_connector; the layout is computed automatically.
Work in several passes if needed: create the large shapes first, then details.";

fn summarize(object: &BoardObject) -> Value {
    let mut entry = json!({
        "id": object.id,
        "type": object.object_type,
        "x": object.x.round(),
        "y": object.y.round(),
        "w": object.width.round(),
        "h": object.height.round(),
    });
    if let Some(color) = &object.color {
        entry["color"] = json!(color);
    }
    if let Some(text) = object.text.as_deref().filter(|t| !t.is_empty()) {
        let short: String = text.chars().take(60).collect();
        entry["text"] = json!(short);
    }
    if let (Some(from), Some(to)) = (&object.start_id, &object.end_id) {
        entry["from"] = json!(from);
        entry["to"] = json!(to);
    }
    entry
}

/// Build the system prompt for one command
///
/// At most `max_objects` board objects are listed; the rest are counted.
#[must_use]
pub fn build_system_prompt(class: TaskClass, objects: &[BoardObject], max_objects: usize) -> String {
    let guidance = match class {
        TaskClass::Simple => FAST_GUIDANCE,
        TaskClass::Creative => CREATIVE_GUIDANCE,
    };

    let mut prompt = format!("{SHARED_GUIDANCE}\n{guidance}\n\nCURRENT BOARD");
    if objects.is_empty() {
        prompt.push_str(" (empty)");
        return prompt;
    }

    prompt.push_str(&format!(" ({} objects):", objects.len()));
    for object in objects.iter().take(max_objects) {
        prompt.push('\n');
        prompt.push_str(&summarize(object).to_string());
    }
    let hidden = objects.len().saturating_sub(max_objects);
    if hidden > 0 {
        prompt.push_str(&format!("\n...and {hidden} more objects"));
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::ObjectType;

    #[test]
    fn test_empty_board() {
        let prompt = build_system_prompt(TaskClass::Simple, &[], 100);
        assert!(prompt.ends_with("CURRENT BOARD (empty)"));
        assert!(prompt.contains("bulk_update_objects"));
    }

    #[test]
    fn test_listing_is_capped() {
        let objects: Vec<_> = (0..5)
            .map(|i| BoardObject::new(format!("obj-{i}"), ObjectType::Circle))
            .collect();
        let prompt = build_system_prompt(TaskClass::Creative, &objects, 3);

        assert!(prompt.contains("(5 objects):"));
        assert!(prompt.contains(r#""id":"obj-2""#));
        assert!(!prompt.contains(r#""id":"obj-3""#));
        assert!(prompt.ends_with("...and 2 more objects"));
        assert!(prompt.contains("create_connector"));
    }

    #[test]
    fn test_summary_fields() {
        let mut note = BoardObject::new("n", ObjectType::Sticky);
        note.color = Some("red".to_string());
        note.text = Some("x".repeat(100));
        let entry = summarize(&note);
        assert_eq!(entry["type"], "sticky");
        assert_eq!(entry["color"], "red");
        assert_eq!(entry["text"].as_str().map(str::len), Some(60));
    }
}
