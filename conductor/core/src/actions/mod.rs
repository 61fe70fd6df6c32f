//! Action Vocabulary
//!
//! Actions are the only unit exchanged between the model backends, the
//! template expander, the wire protocol and the applier.
//!
//! - [`vocabulary`]: the closed [`Action`] enum and its typed arguments
//! - [`schema`]: JSON-Schema tool catalogue sent to the backends

pub mod schema;
pub mod vocabulary;

pub use schema::{tool_definitions, ToolDefinition};
pub use vocabulary::{
    Action, AnalyzeArgs, ArgumentError, BulkUpdateArgs, CircleArgs, ClearBoardArgs,
    ConnectorArgs, DeleteArgs, LineArgs, MoveArgs, ObjectFilter, OrganizeArgs, RectangleArgs,
    StickyNoteArgs, TextArgs, ToolName, UpdateArgs,
};
