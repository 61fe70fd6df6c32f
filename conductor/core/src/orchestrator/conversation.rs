//! Conversation turns
//!
//! A command's conversation is the trimmed client history plus the command
//! itself. The loop appends assistant and tool-result turns as it runs.

use serde::{Deserialize, Serialize};

use crate::backend::ToolInvocation;

/// History entries beyond this many are dropped, oldest first
pub const MAX_HISTORY_TURNS: usize = 20;

/// Who produced a turn
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Instructions
    System,
    /// The human
    User,
    /// The model
    Assistant,
    /// Synthetic result of a tool invocation
    #[serde(alias = "tool")]
    ToolResult,
}

/// One message in the conversation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// Author
    pub role: Role,
    /// Text content
    #[serde(default)]
    pub content: String,
    /// Tool invocations made in an assistant turn
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_invocations: Vec<ToolInvocation>,
    /// Invocation a tool result answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ConversationTurn {
    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_invocations: Vec::new(),
            tool_call_id: None,
        }
    }

    /// System turn
    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content)
    }

    /// User turn
    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content)
    }

    /// Assistant turn without tool use
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(Role::Assistant, content)
    }

    /// Assistant turn that invoked tools
    pub fn assistant_with_tools(
        content: impl Into<String>,
        tool_invocations: Vec<ToolInvocation>,
    ) -> Self {
        Self {
            tool_invocations,
            ..Self::plain(Role::Assistant, content)
        }
    }

    /// Result of one tool invocation
    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(call_id.into()),
            ..Self::plain(Role::ToolResult, content)
        }
    }
}

/// Ordered turns for one command
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Conversation {
    turns: Vec<ConversationTurn>,
}

impl Conversation {
    /// The last [`MAX_HISTORY_TURNS`] history entries followed by the command
    #[must_use]
    pub fn for_command(history: &[ConversationTurn], command: &str) -> Self {
        let start = history.len().saturating_sub(MAX_HISTORY_TURNS);
        let mut turns = history[start..].to_vec();
        turns.push(ConversationTurn::user(command));
        Self { turns }
    }

    /// Append a turn
    pub fn push(&mut self, turn: ConversationTurn) {
        self.turns.push(turn);
    }

    /// All turns in order
    #[must_use]
    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    /// Number of turns
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether there are no turns
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
