//! LLM Backend Integration
//!
//! This module provides abstracted access to LLM backends through a common
//! trait interface. The orchestration loop never sees provider types.
//!
//! # Available Backends
//!
//! - **OpenAI**: chat-completions API and compatible servers (default "fast")
//! - **Anthropic**: Messages API (default "creative")
//! - **Scripted**: replays queued completions, for tests and offline runs
//!
//! # Usage
//!
//! ```ignore
//! use whiteboard_conductor::backend::{connect, BackendConfig, CompletionRequest};
//!
//! let backend = connect(&BackendConfig::Anthropic { base_url, api_key })?;
//! let completion = backend.complete(&request).await?;
//! ```

mod anthropic;
mod openai;
mod scripted;
mod sse;
mod traits;

use std::sync::Arc;

pub use anthropic::{AnthropicBackend, ANTHROPIC_VERSION, DEFAULT_ANTHROPIC_BASE_URL};
pub use openai::{OpenAiBackend, DEFAULT_OPENAI_BASE_URL};
pub use scripted::ScriptedBackend;
pub use sse::{SseDecoder, SseEvent};
pub use traits::{
    BackendConfig, BackendError, Completion, CompletionChunk, CompletionRequest, LlmBackend,
    TokenUsage, ToolInvocation,
};

/// Reply used by the offline backend
pub const OFFLINE_REPLY: &str = "No model backend is configured, so nothing was changed.";

/// Build a backend from its configuration
///
/// # Errors
///
/// Returns [`BackendError::MissingApiKey`] for an Anthropic backend without a
/// key, or a transport error if the HTTP client cannot be built.
pub fn connect(config: &BackendConfig) -> Result<Arc<dyn LlmBackend>, BackendError> {
    let backend: Arc<dyn LlmBackend> = match config {
        BackendConfig::OpenAi { base_url, api_key } => {
            Arc::new(OpenAiBackend::new(base_url.clone(), api_key.clone())?)
        }
        BackendConfig::Anthropic { base_url, api_key } => {
            let key = api_key
                .clone()
                .ok_or_else(|| BackendError::MissingApiKey("Anthropic".to_string()))?;
            Arc::new(AnthropicBackend::new(base_url.clone(), key)?)
        }
        BackendConfig::Scripted => Arc::new(ScriptedBackend::repeating(
            "Scripted",
            Completion::text(OFFLINE_REPLY),
        )),
    };
    tracing::debug!(backend = backend.name(), "Connected LLM backend");
    Ok(backend)
}

/// Turn a non-success response into [`BackendError::Status`]
pub(crate) async fn ensure_success(
    backend: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, BackendError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(BackendError::Status {
        backend: backend.to_string(),
        status,
        body,
    })
}
