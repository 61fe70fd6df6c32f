//! Whiteboard Conductor - Natural-Language Command Pipeline for a Shared Whiteboard
//!
//! This crate turns a typed command ("add a red sticky note", "draw a
//! snowman") into a bounded sequence of board mutations, streams them to the
//! client, and replays them client-side into positioned board objects. It has
//! no HTTP server of its own; the `whiteboard-daemon` crate wraps it.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────── server side ────────────────────────────┐
//! │                                                                     │
//! │  text ─▶ InputValidator ─▶ SafetyFilter ─▶ TaskClassifier           │
//! │                                               │                     │
//! │                               ┌───────────────┴───────────────┐     │
//! │                               ▼                               ▼     │
//! │                        "fast" backend                "creative" backend
//! │                               └───────────┬───────────────────┘     │
//! │                                           ▼                         │
//! │                                       ToolLoop ──▶ StreamEvent      │
//! └───────────────────────────────────────────┬─────────────────────────┘
//!                                             │ NDJSON records
//! ┌──────────────────────────── client side ──┴─────────────────────────┐
//! │  RecordDecoder ─▶ ActionApplier ─▶ layout pass ─▶ BoardStore        │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`Conductor`]: validates, filters, classifies and runs a command
//! - [`Action`]: one board mutation from the closed tool vocabulary
//! - [`ToolLoop`]: the bounded tool-calling loop over one backend
//! - [`StreamEvent`]: one record of the wire protocol
//! - [`ActionApplier`]: applies actions to a per-command draft of the board
//! - [`TemplateRequest`]: canned layouts expanded without a model call
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use whiteboard_conductor::{backend::ScriptedBackend, Command, Conductor};
//!
//! #[tokio::main]
//! async fn main() {
//!     let fast = Arc::new(ScriptedBackend::new("fast"));
//!     let creative = Arc::new(ScriptedBackend::new("creative"));
//!     let conductor = Conductor::new(fast, creative);
//!
//!     let response = conductor
//!         .process_command(&Command::new("add a sticky note saying hi", "user-1"))
//!         .await;
//!     println!("{}", response.message);
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`actions`]: the action vocabulary and its tool schemas
//! - [`backend`]: LLM backend abstraction (OpenAI-compatible, Anthropic, scripted)
//! - [`board`]: board objects, the applier, layout and the store interface
//! - [`config`]: TOML configuration with env and CLI overrides
//! - [`conductor`]: the command pipeline
//! - [`orchestrator`]: conversation handling, prompts and the tool loop
//! - [`routing`]: task classification and model profiles
//! - [`security`]: input validation and the safety filter
//! - [`streaming`]: the NDJSON wire protocol
//! - [`telemetry`]: command traces
//! - [`templates`]: SWOT, Kanban and flowchart expansion

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod actions;
pub mod backend;
pub mod board;
pub mod conductor;
pub mod config;
pub mod orchestrator;
pub mod routing;
pub mod security;
pub mod streaming;
pub mod telemetry;
pub mod templates;

// Re-exports for convenience
pub use actions::{Action, ArgumentError, ToolName};
pub use backend::{BackendConfig, BackendError, Completion, LlmBackend, ToolInvocation};
pub use board::{
    ActionApplier, ApplierOptions, ApplyOutcome, BoardObject, BoardStore, InMemoryBoardStore,
    ObjectType, StreamReplayer,
};
pub use conductor::{Command, CommandResponse, Conductor, APOLOGY_MESSAGE, REFUSAL_MESSAGE};
pub use orchestrator::{Conversation, ConversationTurn, LoopOutcome, Role, StopReason, ToolLoop};
pub use routing::{Classification, ModelProfile, TaskClass, TaskClassifier};
pub use security::{
    ConductorLimits, DenyReason, FilterVerdict, InputValidator, SafetyFilter, ValidationResult,
};
pub use streaming::{RecordDecoder, RecordEncoder, StreamEvent};
pub use telemetry::{HttpTelemetry, LogTelemetry, NoopTelemetry, Telemetry};
pub use templates::TemplateRequest;

// Config exports
pub use config::{
    default_config_path, load_config, load_config_from_path, ConductorToml, ConfigError,
    ConfigOverrides, ConfigSource, Provider, WhiteboardConfig,
};
