//! LLM Backend Traits
//!
//! Provider-agnostic completion interface. The orchestration loop only sees
//! [`CompletionRequest`], [`Completion`] and [`CompletionChunk`]; each adapter
//! translates them into its provider's wire format.
//!
//! # Design Philosophy
//!
//! The `LlmBackend` trait provides a common interface for:
//! - One-shot completions that may contain tool invocations
//! - Streaming completions that deliver text deltas and fully assembled tool
//!   invocations as soon as each becomes parseable

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::actions::ToolDefinition;
use crate::orchestrator::ConversationTurn;
use crate::routing::ModelProfile;

/// A tool call requested by the model
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Provider-assigned call id, echoed back with the result
    pub id: String,
    /// Tool name
    pub name: String,
    /// Raw JSON argument string as produced by the model
    pub arguments: String,
}

impl ToolInvocation {
    /// Create an invocation
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }
}

/// Token accounting reported by the provider
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Prompt tokens
    pub input_tokens: u32,
    /// Generated tokens
    pub output_tokens: u32,
}

impl TokenUsage {
    /// Sum two usage reports
    #[must_use]
    pub fn add(self, other: Self) -> Self {
        Self {
            input_tokens: self.input_tokens.saturating_add(other.input_tokens),
            output_tokens: self.output_tokens.saturating_add(other.output_tokens),
        }
    }
}

/// One completion call
#[derive(Clone, Debug)]
pub struct CompletionRequest {
    /// Model to use (backend-specific identifier)
    pub model: String,
    /// System prompt
    pub system: String,
    /// Conversation so far
    pub turns: Vec<ConversationTurn>,
    /// Tools the model may call
    pub tools: Vec<ToolDefinition>,
    /// Maximum tokens in response
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
}

impl CompletionRequest {
    /// Request using a bucket's fixed generation settings
    pub fn from_profile(
        profile: &ModelProfile,
        system: impl Into<String>,
        turns: Vec<ConversationTurn>,
        tools: Vec<ToolDefinition>,
    ) -> Self {
        Self {
            model: profile.model_id.clone(),
            system: system.into(),
            turns,
            tools,
            max_tokens: profile.max_tokens,
            temperature: profile.temperature,
        }
    }
}

/// Result of a non-streaming completion
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Completion {
    /// Free text produced by the model
    pub text: String,
    /// Tool invocations, in the order the model made them
    pub tool_invocations: Vec<ToolInvocation>,
    /// Token usage (if reported)
    pub usage: Option<TokenUsage>,
}

impl Completion {
    /// Text-only completion
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Completion that only invokes tools
    #[must_use]
    pub fn tools(tool_invocations: Vec<ToolInvocation>) -> Self {
        Self {
            tool_invocations,
            ..Self::default()
        }
    }

    /// Attach text
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Whether the model asked for any tool
    #[must_use]
    pub fn has_tool_invocations(&self) -> bool {
        !self.tool_invocations.is_empty()
    }
}

/// Incremental output of a streaming completion
#[derive(Clone, Debug, PartialEq)]
pub enum CompletionChunk {
    /// A text delta
    Text(String),
    /// A tool invocation whose arguments are complete
    ToolInvocation(ToolInvocation),
    /// Response completed successfully
    Complete {
        /// Token usage (if reported)
        usage: Option<TokenUsage>,
    },
    /// Error occurred during streaming
    Error(String),
}

/// Backend call failure
///
/// Every variant is fatal for the command that triggered it.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Transport-level failure
    #[error("request to {backend} failed: {source}")]
    Http {
        /// Backend name
        backend: String,
        /// Underlying error
        #[source]
        source: reqwest::Error,
    },
    /// Provider answered with a non-success status
    #[error("{backend} returned {status}: {body}")]
    Status {
        /// Backend name
        backend: String,
        /// HTTP status code
        status: u16,
        /// Response body
        body: String,
    },
    /// Response body did not match the provider's format
    #[error("could not decode {backend} response: {message}")]
    Decode {
        /// Backend name
        backend: String,
        /// What went wrong
        message: String,
    },
    /// Provider requires a key and none was configured
    #[error("no API key configured for {0}")]
    MissingApiKey(String),
    /// Stream broke or reported an error
    #[error("{0}")]
    Stream(String),
}

/// LLM Backend trait
///
/// Implement this trait to add support for different LLM providers.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Get the backend name (e.g., "OpenAI", "Anthropic")
    fn name(&self) -> &str;

    /// Send a request and wait for the complete response
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, BackendError>;

    /// Send a request and get a streaming response
    ///
    /// Returns a channel receiver that gets text deltas and tool invocations
    /// as they arrive. The channel closes after `Complete` or `Error`.
    async fn complete_streaming(
        &self,
        request: &CompletionRequest,
    ) -> Result<mpsc::Receiver<CompletionChunk>, BackendError>;
}

/// Backend connection configuration
#[derive(Clone, PartialEq, Eq)]
pub enum BackendConfig {
    /// OpenAI-compatible chat-completions API
    OpenAi {
        /// API root
        base_url: String,
        /// Bearer token (optional for local servers)
        api_key: Option<String>,
    },
    /// Anthropic Messages API
    Anthropic {
        /// API root
        base_url: String,
        /// API key
        api_key: Option<String>,
    },
    /// Offline backend that never calls out
    Scripted,
}

impl BackendConfig {
    /// Provider name as written in configuration
    #[must_use]
    pub fn provider(&self) -> &'static str {
        match self {
            Self::OpenAi { .. } => "openai",
            Self::Anthropic { .. } => "anthropic",
            Self::Scripted => "scripted",
        }
    }
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OpenAi { base_url, api_key } | Self::Anthropic { base_url, api_key } => f
                .debug_struct(self.provider())
                .field("base_url", base_url)
                .field("api_key", &api_key.as_ref().map(|_| "<redacted>"))
                .finish(),
            Self::Scripted => f.write_str("scripted"),
        }
    }
}
