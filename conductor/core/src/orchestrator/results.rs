//! Tool results
//!
//! Short human-readable descriptions of what each action did, fed back to the
//! model as tool-result turns. The loop keeps a lightweight [`BoardView`] so
//! that moves, deletes and analysis can report against the board as the model
//! has changed it so far.

use indexmap::IndexMap;

use crate::actions::{Action, ObjectFilter, ToolName};
use crate::board::{BoardObject, ObjectType};

#[derive(Clone, Debug)]
struct ViewEntry {
    object_type: ObjectType,
    color: Option<String>,
    start_id: Option<String>,
    end_id: Option<String>,
}

impl ViewEntry {
    fn references(&self, id: &str) -> bool {
        self.start_id.as_deref() == Some(id) || self.end_id.as_deref() == Some(id)
    }

    fn matches(&self, id: &str, filter: &ObjectFilter) -> bool {
        filter.object_type.map_or(true, |t| t == self.object_type)
            && filter.color.as_deref().map_or(true, |wanted| {
                self.color
                    .as_deref()
                    .is_some_and(|c| c.eq_ignore_ascii_case(wanted))
            })
            && filter
                .ids
                .as_ref()
                .map_or(true, |ids| ids.iter().any(|candidate| candidate == id))
    }
}

/// The loop's model of the board: ids, types, colours and connector ends
#[derive(Clone, Debug, Default)]
pub struct BoardView {
    entries: IndexMap<String, ViewEntry>,
    anonymous: usize,
}

impl BoardView {
    /// Seed from the command's board snapshot
    #[must_use]
    pub fn from_snapshot(objects: &[BoardObject]) -> Self {
        let entries = objects
            .iter()
            .map(|object| {
                (
                    object.id.clone(),
                    ViewEntry {
                        object_type: object.object_type,
                        color: object.color.clone(),
                        start_id: object.start_id.clone(),
                        end_id: object.end_id.clone(),
                    },
                )
            })
            .collect();
        Self {
            entries,
            anonymous: 0,
        }
    }

    /// Number of objects
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the view is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether an object exists
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    fn insert(&mut self, id: Option<&str>, entry: ViewEntry) {
        let key = match id {
            Some(id) => id.to_string(),
            None => {
                self.anonymous += 1;
                format!("#new-{}", self.anonymous)
            }
        };
        self.entries.insert(key, entry);
    }

    fn remove_cascading(&mut self, id: &str) {
        self.entries.shift_remove(id);
        self.entries.retain(|_, entry| !entry.references(id));
    }

    /// Apply an action to the view and describe its effect
    pub fn record(&mut self, action: &Action) -> String {
        let created = |object_type: ObjectType, color: Option<&String>| ViewEntry {
            object_type,
            color: color.cloned(),
            start_id: None,
            end_id: None,
        };

        match action {
            Action::CreateStickyNote(args) => {
                self.insert(args.id.as_deref(), created(ObjectType::Sticky, args.color.as_ref()));
                created_at(ObjectType::Sticky, args.x, args.y, args.id.as_deref())
            }
            Action::CreateRectangle(args) => {
                self.insert(
                    args.id.as_deref(),
                    created(ObjectType::Rectangle, args.color.as_ref()),
                );
                created_at(ObjectType::Rectangle, args.x, args.y, args.id.as_deref())
            }
            Action::CreateCircle(args) => {
                self.insert(args.id.as_deref(), created(ObjectType::Circle, args.color.as_ref()));
                created_at(ObjectType::Circle, args.x, args.y, args.id.as_deref())
            }
            Action::CreateText(args) => {
                self.insert(args.id.as_deref(), created(ObjectType::Text, args.color.as_ref()));
                created_at(ObjectType::Text, args.x, args.y, args.id.as_deref())
            }
            Action::CreateLine(args) => {
                self.insert(args.id.as_deref(), created(ObjectType::Line, args.color.as_ref()));
                let x1 = args.x1.unwrap_or(0.0);
                let y1 = args.y1.unwrap_or(0.0);
                let x2 = args.x2.unwrap_or(x1 + 100.0);
                let y2 = args.y2.unwrap_or(y1);
                format!(
                    "Created line from ({}, {}) to ({}, {}).",
                    number(x1),
                    number(y1),
                    number(x2),
                    number(y2)
                )
            }
            Action::CreateConnector(args) => {
                self.insert(
                    args.id.as_deref(),
                    ViewEntry {
                        start_id: args.start_id.clone(),
                        end_id: args.end_id.clone(),
                        ..created(ObjectType::Connector, args.color.as_ref())
                    },
                );
                let start = endpoint(args.start_id.as_deref(), args.start_x, args.start_y);
                let end = endpoint(args.end_id.as_deref(), args.end_x, args.end_y);
                match &args.label {
                    Some(label) => format!("Connected {start} to {end} labelled \"{label}\"."),
                    None => format!("Connected {start} to {end}."),
                }
            }
            Action::MoveObject(args) => {
                if self.contains(&args.id) {
                    format!(
                        "Moved object {} to ({}, {}).",
                        args.id,
                        number(args.x),
                        number(args.y)
                    )
                } else {
                    not_found(&args.id)
                }
            }
            Action::UpdateObject(args) => match self.entries.get_mut(&args.id) {
                Some(entry) => {
                    if let Some(color) = &args.patch.color {
                        entry.color = Some(color.clone());
                    }
                    format!("Updated object {}.", args.id)
                }
                None => not_found(&args.id),
            },
            Action::BulkUpdateObjects(args) => {
                let mut updated = 0;
                for (id, entry) in &mut self.entries {
                    if entry.matches(id, &args.filter) {
                        if let Some(color) = &args.updates.color {
                            entry.color = Some(color.clone());
                        }
                        updated += 1;
                    }
                }
                format!("Updated {updated} {}.", plural(updated, "object"))
            }
            Action::DeleteObject(args) => {
                if self.contains(&args.id) {
                    self.remove_cascading(&args.id);
                    format!("Deleted object {}.", args.id)
                } else {
                    not_found(&args.id)
                }
            }
            Action::ClearBoard(_) => {
                let removed = self.entries.len();
                self.entries.clear();
                format!(
                    "Cleared the board ({removed} {} removed).",
                    plural(removed, "object")
                )
            }
            Action::OrganizeBoard(args) => {
                let count = self
                    .entries
                    .values()
                    .filter(|entry| entry.object_type != ObjectType::Connector)
                    .count();
                format!(
                    "Organized {count} {} using strategy {}.",
                    plural(count, "object"),
                    args.strategy()
                )
            }
            Action::AnalyzeBoard(_) => self.analysis(),
        }
    }

    fn analysis(&self) -> String {
        if self.entries.is_empty() {
            return "Board is empty.".to_string();
        }

        let mut by_type: IndexMap<ObjectType, usize> = IndexMap::new();
        let mut by_color: IndexMap<String, usize> = IndexMap::new();
        for entry in self.entries.values() {
            *by_type.entry(entry.object_type).or_default() += 1;
            if let Some(color) = &entry.color {
                *by_color.entry(color.to_lowercase()).or_default() += 1;
            }
        }

        let types: Vec<String> = by_type
            .iter()
            .map(|(object_type, n)| format!("{n} {}", plural(*n, object_type.label())))
            .collect();
        let mut summary = format!(
            "Board has {} {}: {}.",
            self.entries.len(),
            plural(self.entries.len(), "object"),
            types.join(", ")
        );
        if !by_color.is_empty() {
            let colors: Vec<String> = by_color
                .iter()
                .map(|(color, n)| format!("{color} ({n})"))
                .collect();
            summary.push_str(&format!(" Colors: {}.", colors.join(", ")));
        }
        summary
    }
}

fn created_at(object_type: ObjectType, x: Option<f64>, y: Option<f64>, id: Option<&str>) -> String {
    let position = format!(
        "({}, {})",
        number(x.unwrap_or(0.0)),
        number(y.unwrap_or(0.0))
    );
    match id {
        Some(id) => format!("Created {} at {position} with id {id}.", object_type.label()),
        None => format!("Created {} at {position}.", object_type.label()),
    }
}

fn endpoint(id: Option<&str>, x: Option<f64>, y: Option<f64>) -> String {
    match id {
        Some(id) => id.to_string(),
        None => format!(
            "({}, {})",
            number(x.unwrap_or(0.0)),
            number(y.unwrap_or(0.0))
        ),
    }
}

fn not_found(id: &str) -> String {
    format!("Object {id} not found.")
}

/// Coordinates without a trailing `.0`
pub(crate) fn number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        return noun.to_string();
    }
    if let Some(stem) = noun.strip_suffix("is") {
        return format!("{stem}es");
    }
    if noun.ends_with('s')
        || noun.ends_with('x')
        || noun.ends_with("ch")
        || noun.ends_with("sh")
    {
        format!("{noun}es")
    } else {
        format!("{noun}s")
    }
}

fn noun(tool: ToolName) -> &'static str {
    if let Some(object_type) = tool.created_type() {
        return object_type.label();
    }
    match tool {
        ToolName::CreateStickyNote
        | ToolName::CreateRectangle
        | ToolName::CreateCircle
        | ToolName::CreateLine
        | ToolName::CreateText
        | ToolName::CreateConnector => "object",
        ToolName::MoveObject => "move",
        ToolName::UpdateObject => "update",
        ToolName::BulkUpdateObjects => "bulk update",
        ToolName::DeleteObject => "deletion",
        ToolName::ClearBoard => "board clear",
        ToolName::OrganizeBoard => "reorganization",
        ToolName::AnalyzeBoard => "analysis",
    }
}

/// Summary used when a command produced actions but no text
///
/// Counts actions per tool in first-seen order, e.g. `Here's 2 rectangles,
/// a circle!`.
#[must_use]
pub fn fallback_summary(actions: &[Action]) -> String {
    let mut counts: IndexMap<ToolName, usize> = IndexMap::new();
    for action in actions {
        *counts.entry(action.tool()).or_default() += 1;
    }

    let parts: Vec<String> = counts
        .into_iter()
        .map(|(tool, n)| {
            let noun = noun(tool);
            if n == 1 {
                let article = if noun.starts_with(['a', 'e', 'i', 'o', 'u']) {
                    "an"
                } else {
                    "a"
                };
                format!("{article} {noun}")
            } else {
                format!("{n} {}", plural(n, noun))
            }
        })
        .collect();
    format!("Here's {}!", parts.join(", "))
}
