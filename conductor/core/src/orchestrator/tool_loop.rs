//! Orchestration loop
//!
//! Drives one backend through at most `max_turns` completions:
//!
//! ```text
//! AwaitingResponse ──text only──▶ Done
//!        │
//!        └──tool calls──▶ ExecutingTools ──▶ AwaitingResponse (next turn)
//! ```
//!
//! Each well-formed invocation becomes an [`Action`] plus a synthetic
//! tool-result turn; malformed ones only get an "error, skipped" result so the
//! model can correct itself on the next turn. Reaching the turn budget ends the
//! loop with whatever has been produced.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::conversation::{Conversation, ConversationTurn};
use super::results::{fallback_summary, BoardView};
use crate::actions::{tool_definitions, Action, ArgumentError, ToolDefinition};
use crate::backend::{
    BackendError, CompletionChunk, CompletionRequest, LlmBackend, TokenUsage, ToolInvocation,
};
use crate::board::BoardObject;
use crate::routing::ModelProfile;
use crate::streaming::StreamEvent;
use crate::telemetry::GenerationRecord;

const TURN_SEPARATOR: &str = "\n\n";

/// Why the loop stopped
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// A turn produced no tool invocations
    Done,
    /// The turn budget ran out while the model was still calling tools
    BudgetExhausted,
}

/// Everything a finished loop produced
#[derive(Clone, Debug)]
pub struct LoopOutcome {
    /// Final user-visible text (fallback summary if the model gave none)
    pub text: String,
    /// Well-formed actions, in invocation order
    pub actions: Vec<Action>,
    /// Completions requested
    pub turns_used: usize,
    /// Terminal state
    pub stop: StopReason,
    /// Invocations dropped for malformed arguments
    pub skipped: usize,
    /// Summed token usage
    pub usage: TokenUsage,
    /// One record per completion, for telemetry
    pub generations: Vec<GenerationRecord>,
}

struct TurnOutput {
    text: String,
    usage: Option<TokenUsage>,
    calls: Vec<(ToolInvocation, Result<Action, ArgumentError>)>,
}

fn parse(invocation: &ToolInvocation) -> Result<Action, ArgumentError> {
    Action::from_invocation(&invocation.name, &invocation.arguments)
}

/// Bounded tool-calling loop over one backend
#[derive(Clone)]
pub struct ToolLoop {
    backend: Arc<dyn LlmBackend>,
    profile: ModelProfile,
    system: String,
    tools: Vec<ToolDefinition>,
}

impl ToolLoop {
    /// Loop over `backend` with the full tool catalogue
    pub fn new(backend: Arc<dyn LlmBackend>, profile: ModelProfile, system: impl Into<String>) -> Self {
        Self {
            backend,
            profile,
            system: system.into(),
            tools: tool_definitions(),
        }
    }

    /// Generation settings in use
    #[must_use]
    pub fn profile(&self) -> &ModelProfile {
        &self.profile
    }

    /// Run to completion without streaming
    ///
    /// # Errors
    ///
    /// Any backend failure aborts the loop and is returned as is.
    pub async fn run(
        &self,
        conversation: Conversation,
        board: &[BoardObject],
    ) -> Result<LoopOutcome, BackendError> {
        self.drive(conversation, board, None).await
    }

    /// Run to completion, emitting text deltas and actions as they arrive
    ///
    /// Text is sent as [`StreamEvent::Text`], each well-formed invocation as
    /// [`StreamEvent::Action`] the moment it is parsed. A fallback summary is
    /// sent as a final text event when the model produced no text.
    ///
    /// # Errors
    ///
    /// Any backend failure aborts the loop and is returned as is; the caller
    /// decides how to surface it on the stream.
    pub async fn run_streaming(
        &self,
        conversation: Conversation,
        board: &[BoardObject],
        events: &mpsc::Sender<StreamEvent>,
    ) -> Result<LoopOutcome, BackendError> {
        self.drive(conversation, board, Some(events)).await
    }

    async fn drive(
        &self,
        mut conversation: Conversation,
        board: &[BoardObject],
        events: Option<&mpsc::Sender<StreamEvent>>,
    ) -> Result<LoopOutcome, BackendError> {
        let mut view = BoardView::from_snapshot(board);
        let mut text = String::new();
        let mut actions = Vec::new();
        let mut skipped = 0;
        let mut usage = TokenUsage::default();
        let mut generations = Vec::new();
        let mut stop = StopReason::BudgetExhausted;
        let mut turns_used = 0;

        for turn in 1..=self.profile.max_turns {
            turns_used = turn;
            let request = CompletionRequest::from_profile(
                &self.profile,
                self.system.clone(),
                conversation.turns().to_vec(),
                self.tools.clone(),
            );

            let started_at = Utc::now();
            let start = Instant::now();
            let output = match events {
                Some(events) => self.stream_turn(&request, events, !text.is_empty()).await?,
                None => {
                    let completion = self.backend.complete(&request).await?;
                    let calls = completion
                        .tool_invocations
                        .into_iter()
                        .map(|invocation| {
                            let parsed = parse(&invocation);
                            (invocation, parsed)
                        })
                        .collect();
                    TurnOutput {
                        text: completion.text,
                        usage: completion.usage,
                        calls,
                    }
                }
            };

            tracing::debug!(
                backend = self.backend.name(),
                turn,
                tool_calls = output.calls.len(),
                "Completion received"
            );
            if let Some(turn_usage) = output.usage {
                usage = usage.add(turn_usage);
            }
            generations.push(GenerationRecord {
                model: self.profile.model_id.clone(),
                turn,
                started_at,
                latency_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
                usage: output.usage,
                tool_invocations: output.calls.len(),
            });

            if !output.text.is_empty() {
                if !text.is_empty() {
                    text.push_str(TURN_SEPARATOR);
                }
                text.push_str(&output.text);
            }

            if output.calls.is_empty() {
                stop = StopReason::Done;
                break;
            }

            let invocations = output.calls.iter().map(|(inv, _)| inv.clone()).collect();
            conversation.push(ConversationTurn::assistant_with_tools(output.text, invocations));

            for (invocation, parsed) in output.calls {
                let result = match parsed {
                    Ok(action) => {
                        tracing::debug!(turn, tool = %action.tool(), "Action accepted");
                        let result = view.record(&action);
                        actions.push(action);
                        result
                    }
                    Err(e) => {
                        tracing::warn!(turn, tool = %invocation.name, error = %e, "Skipping tool invocation");
                        skipped += 1;
                        format!(
                            "Error: invalid arguments for {} ({e}). Skipped.",
                            invocation.name
                        )
                    }
                };
                conversation.push(ConversationTurn::tool_result(invocation.id, result));
            }
        }

        if stop == StopReason::BudgetExhausted {
            tracing::info!(
                max_turns = self.profile.max_turns,
                actions = actions.len(),
                "Turn budget exhausted"
            );
        }

        if text.trim().is_empty() && !actions.is_empty() {
            text = fallback_summary(&actions);
            if let Some(events) = events {
                let _ = events.send(StreamEvent::text(text.clone())).await;
            }
        }

        Ok(LoopOutcome {
            text,
            actions,
            turns_used,
            stop,
            skipped,
            usage,
            generations,
        })
    }

    async fn stream_turn(
        &self,
        request: &CompletionRequest,
        events: &mpsc::Sender<StreamEvent>,
        has_prior_text: bool,
    ) -> Result<TurnOutput, BackendError> {
        let mut rx = self.backend.complete_streaming(request).await?;
        let mut output = TurnOutput {
            text: String::new(),
            usage: None,
            calls: Vec::new(),
        };

        while let Some(chunk) = rx.recv().await {
            match chunk {
                CompletionChunk::Text(delta) => {
                    if output.text.is_empty() && has_prior_text {
                        let _ = events.send(StreamEvent::text(TURN_SEPARATOR)).await;
                    }
                    output.text.push_str(&delta);
                    let _ = events.send(StreamEvent::text(delta)).await;
                }
                CompletionChunk::ToolInvocation(invocation) => {
                    let parsed = parse(&invocation);
                    if let Ok(action) = &parsed {
                        let _ = events.send(StreamEvent::action(action.clone())).await;
                    }
                    output.calls.push((invocation, parsed));
                }
                CompletionChunk::Complete { usage } => {
                    output.usage = usage;
                    return Ok(output);
                }
                CompletionChunk::Error(message) => return Err(BackendError::Stream(message)),
            }
        }

        Err(BackendError::Stream(format!(
            "{} stream ended before completion",
            self.backend.name()
        )))
    }
}
