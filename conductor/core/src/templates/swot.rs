//! SWOT analysis grid

use serde::{Deserialize, Serialize};

use crate::actions::{Action, RectangleArgs, StickyNoteArgs, TextArgs};
use crate::board::STICKY_MIN_SIZE;

const PADDING: f64 = 20.0;
const ITEM_GAP: f64 = 20.0;
const ITEMS_PER_ROW: usize = 2;
const QUADRANT_GAP: f64 = 20.0;
const HEADER_HEIGHT: f64 = 60.0;
const HEADER_FONT_SIZE: f64 = 28.0;
const QUADRANT_WIDTH: f64 =
    2.0 * PADDING + ITEMS_PER_ROW as f64 * STICKY_MIN_SIZE + (ITEMS_PER_ROW as f64 - 1.0) * ITEM_GAP;

/// (title, background, note colour), in reading order
const QUADRANTS: [(&str, &str, &str); 4] = [
    ("Strengths", "#d3f9d8", "green"),
    ("Weaknesses", "#ffe3e3", "pink"),
    ("Opportunities", "#d0ebff", "blue"),
    ("Threats", "#fff3bf", "orange"),
];

/// SWOT template
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwotTemplate {
    /// Top-left items
    pub strengths: Vec<String>,
    /// Top-right items
    pub weaknesses: Vec<String>,
    /// Bottom-left items
    pub opportunities: Vec<String>,
    /// Bottom-right items
    pub threats: Vec<String>,
}

impl SwotTemplate {
    fn items(&self) -> [&[String]; 4] {
        [
            &self.strengths,
            &self.weaknesses,
            &self.opportunities,
            &self.threats,
        ]
    }

    /// Background + header per quadrant, then the quadrant's items
    #[must_use]
    pub fn expand(&self) -> Vec<Action> {
        let items = self.items();
        let rows = items
            .iter()
            .map(|list| list.len().div_ceil(ITEMS_PER_ROW))
            .max()
            .unwrap_or(0)
            .max(1) as f64;
        let height =
            HEADER_HEIGHT + rows * STICKY_MIN_SIZE + (rows - 1.0) * ITEM_GAP + PADDING;

        let left = -(QUADRANT_WIDTH + QUADRANT_GAP / 2.0);
        let top = -(height + QUADRANT_GAP / 2.0);

        let mut actions = Vec::new();
        for (index, ((title, background, note_color), list)) in
            QUADRANTS.iter().zip(items).enumerate()
        {
            let x = left + (index % 2) as f64 * (QUADRANT_WIDTH + QUADRANT_GAP);
            let y = top + (index / 2) as f64 * (height + QUADRANT_GAP);
            let key = title.to_lowercase();

            actions.push(Action::CreateRectangle(RectangleArgs {
                x: Some(x),
                y: Some(y),
                width: Some(QUADRANT_WIDTH),
                height: Some(height),
                color: Some((*background).to_string()),
                id: Some(format!("swot-{key}")),
                ..RectangleArgs::default()
            }));
            actions.push(Action::CreateText(TextArgs {
                text: (*title).to_string(),
                x: Some(x + PADDING),
                y: Some(y + PADDING),
                font_size: Some(HEADER_FONT_SIZE),
                id: Some(format!("swot-{key}-header")),
                ..TextArgs::default()
            }));

            for (n, item) in list.iter().enumerate() {
                let column = (n % ITEMS_PER_ROW) as f64;
                let row = (n / ITEMS_PER_ROW) as f64;
                actions.push(Action::CreateStickyNote(StickyNoteArgs {
                    text: item.clone(),
                    x: Some(x + PADDING + column * (STICKY_MIN_SIZE + ITEM_GAP)),
                    y: Some(y + HEADER_HEIGHT + row * (STICKY_MIN_SIZE + ITEM_GAP)),
                    width: Some(STICKY_MIN_SIZE),
                    height: Some(STICKY_MIN_SIZE),
                    color: Some((*note_color).to_string()),
                    id: Some(format!("swot-{key}-{}", n + 1)),
                }));
            }
        }
        actions
    }
}
