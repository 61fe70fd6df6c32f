//! Template Expander
//!
//! Canned board layouts expanded into the same [`Action`] vocabulary the
//! backends produce, without any model call:
//!
//! - [`swot`]: four coloured quadrants with headers and sticky-note items
//! - [`kanban`]: columns with a background, a header and stacked cards
//! - [`flowchart`]: unpositioned nodes plus connectors; placement is left to
//!   the diagram layout pass of the applier
//!
//! Expansion is pure and deterministic: the same request always yields the
//! same actions in the same order.

pub mod flowchart;
pub mod kanban;
pub mod swot;

use serde::{Deserialize, Serialize};

use crate::actions::Action;

pub use flowchart::{FlowEdge, FlowNodeKind, FlowStep, FlowchartTemplate};
pub use kanban::{KanbanColumn, KanbanTemplate};
pub use swot::SwotTemplate;

/// A template expansion request
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "template", rename_all = "snake_case")]
pub enum TemplateRequest {
    /// Strengths / weaknesses / opportunities / threats grid
    Swot(SwotTemplate),
    /// Kanban board
    Kanban(KanbanTemplate),
    /// Flowchart
    Flowchart(FlowchartTemplate),
}

impl TemplateRequest {
    /// Template name as used on the wire
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Swot(_) => "swot",
            Self::Kanban(_) => "kanban",
            Self::Flowchart(_) => "flowchart",
        }
    }

    /// Expand into actions
    #[must_use]
    pub fn expand(&self) -> Vec<Action> {
        let actions = match self {
            Self::Swot(template) => template.expand(),
            Self::Kanban(template) => template.expand(),
            Self::Flowchart(template) => template.expand(),
        };
        tracing::debug!(template = self.name(), actions = actions.len(), "Expanded template");
        actions
    }
}
