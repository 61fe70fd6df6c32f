//! Kanban board
//!
//! Columns sit side by side, centered on the viewport. Each column is a
//! background rectangle sized to its cards, a header text and one sticky note
//! per card stacked top to bottom.

use serde::{Deserialize, Serialize};

use crate::actions::{Action, RectangleArgs, StickyNoteArgs, TextArgs};
use crate::board::STICKY_MIN_SIZE;

const COLUMN_WIDTH: f64 = STICKY_MIN_SIZE + 2.0 * PADDING;
const COLUMN_GAP: f64 = 40.0;
const HEADER_HEIGHT: f64 = 60.0;
const PADDING: f64 = 20.0;
const CARD_GAP: f64 = 20.0;
const TOP: f64 = -300.0;
const HEADER_FONT_SIZE: f64 = 24.0;

const BACKGROUND_COLOR: &str = "#f1f3f5";
const CARD_COLOR: &str = "yellow";

/// One column
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KanbanColumn {
    /// Header text (defaults to "Column N")
    pub title: String,
    /// Card texts, top to bottom
    pub cards: Vec<String>,
}

/// Kanban template
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KanbanTemplate {
    /// Columns, left to right
    pub columns: Vec<KanbanColumn>,
}

impl Default for KanbanTemplate {
    fn default() -> Self {
        let column = |title: &str| KanbanColumn {
            title: title.to_string(),
            cards: Vec::new(),
        };
        Self {
            columns: vec![column("To Do"), column("In Progress"), column("Done")],
        }
    }
}

impl KanbanTemplate {
    /// Background + header per column, then one sticky per card
    #[must_use]
    pub fn expand(&self) -> Vec<Action> {
        let count = self.columns.len() as f64;
        let total_width = count * COLUMN_WIDTH + (count - 1.0).max(0.0) * COLUMN_GAP;
        let left = -total_width / 2.0;
        let tallest = self.columns.iter().map(|c| c.cards.len()).max().unwrap_or(0);
        let height = column_height(tallest);

        let mut actions = Vec::new();
        for (index, column) in self.columns.iter().enumerate() {
            let x = left + index as f64 * (COLUMN_WIDTH + COLUMN_GAP);
            let title = if column.title.trim().is_empty() {
                format!("Column {}", index + 1)
            } else {
                column.title.clone()
            };

            actions.push(Action::CreateRectangle(RectangleArgs {
                x: Some(x),
                y: Some(TOP),
                width: Some(COLUMN_WIDTH),
                height: Some(height),
                color: Some(BACKGROUND_COLOR.to_string()),
                id: Some(format!("kanban-column-{}", index + 1)),
                ..RectangleArgs::default()
            }));
            actions.push(Action::CreateText(TextArgs {
                text: title,
                x: Some(x + PADDING),
                y: Some(TOP + PADDING),
                font_size: Some(HEADER_FONT_SIZE),
                id: Some(format!("kanban-header-{}", index + 1)),
                ..TextArgs::default()
            }));

            for (row, card) in column.cards.iter().enumerate() {
                actions.push(Action::CreateStickyNote(StickyNoteArgs {
                    text: card.clone(),
                    x: Some(x + PADDING),
                    y: Some(TOP + HEADER_HEIGHT + row as f64 * (STICKY_MIN_SIZE + CARD_GAP)),
                    width: Some(STICKY_MIN_SIZE),
                    height: Some(STICKY_MIN_SIZE),
                    color: Some(CARD_COLOR.to_string()),
                    id: Some(format!("kanban-card-{}-{}", index + 1, row + 1)),
                }));
            }
        }
        actions
    }
}

/// Column height fitting `cards` stacked cards (at least one slot)
fn column_height(cards: usize) -> f64 {
    let slots = cards.max(1) as f64;
    HEADER_HEIGHT + slots * STICKY_MIN_SIZE + (slots - 1.0) * CARD_GAP + PADDING
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template(columns: &[&[&str]]) -> KanbanTemplate {
        KanbanTemplate {
            columns: columns
                .iter()
                .enumerate()
                .map(|(i, cards)| KanbanColumn {
                    title: format!("C{i}"),
                    cards: cards.iter().map(|c| (*c).to_string()).collect(),
                })
                .collect(),
        }
    }

    fn card_positions(actions: &[Action], column: usize) -> Vec<(f64, f64)> {
        let prefix = format!("kanban-card-{column}-");
        actions
            .iter()
            .filter_map(|a| match a {
                Action::CreateStickyNote(args)
                    if args.id.as_deref().is_some_and(|id| id.starts_with(&prefix)) =>
                {
                    Some((args.x.unwrap_or_default(), args.y.unwrap_or_default()))
                }
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_default_has_three_empty_columns() {
        let actions = KanbanTemplate::default().expand();
        assert_eq!(actions.len(), 6);
        assert!(actions.iter().all(|a| a.created_id().is_some()));
    }

    #[test]
    fn test_cards_stack_downwards_without_overlap() {
        let actions = template(&[&["A", "B", "C"]]).expand();
        let positions = card_positions(&actions, 1);
        assert_eq!(positions.len(), 3);
        for pair in positions.windows(2) {
            assert!(pair[1].1 >= pair[0].1 + STICKY_MIN_SIZE);
            assert_eq!(pair[0].0, pair[1].0);
        }
    }

    #[test]
    fn test_columns_do_not_overlap() {
        let actions = template(&[&["A"], &["B"]]).expand();
        let first = card_positions(&actions, 1)[0];
        let second = card_positions(&actions, 2)[0];
        assert!(second.0 >= first.0 + COLUMN_WIDTH);
    }

    #[test]
    fn test_backgrounds_share_the_tallest_height() {
        let actions = template(&[&["A"], &["B", "C", "D"]]).expand();
        let heights: Vec<f64> = actions
            .iter()
            .filter_map(|a| match a {
                Action::CreateRectangle(args) => args.height,
                _ => None,
            })
            .collect();
        assert_eq!(heights, vec![column_height(3), column_height(3)]);
    }

    #[test]
    fn test_blank_title_gets_a_default() {
        let actions = KanbanTemplate {
            columns: vec![KanbanColumn::default()],
        }
        .expand();
        assert!(matches!(&actions[1], Action::CreateText(args) if args.text == "Column 1"));
    }
}
