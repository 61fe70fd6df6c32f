//! Anthropic Backend
//!
//! Messages API adapter. Every message is sent as a list of content blocks;
//! tool calls come back as `tool_use` blocks and results go out as
//! `tool_result` blocks inside a user message.
//!
//! # Streaming events
//!
//! - `message_start` / `message_delta`: usage
//! - `content_block_start`: opens a text or `tool_use` block
//! - `content_block_delta`: `text_delta` or `input_json_delta` fragments
//! - `content_block_stop`: a `tool_use` block is now complete
//! - `message_stop`: end of response

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use super::sse::SseDecoder;
use super::traits::{
    BackendError, Completion, CompletionChunk, CompletionRequest, LlmBackend, TokenUsage,
    ToolInvocation,
};
use crate::orchestrator::Role;

/// Default API root
pub const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";

/// `anthropic-version` header value
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

const NAME: &str = "Anthropic";

/// Anthropic Messages API client
#[derive(Clone)]
pub struct AnthropicBackend {
    base_url: String,
    api_key: String,
    http_client: reqwest::Client,
}

impl AnthropicBackend {
    /// Create a new backend
    ///
    /// # Errors
    ///
    /// Fails when the HTTP client cannot be constructed.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, BackendError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|source| BackendError::Http {
                backend: NAME.to_string(),
                source,
            })?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            http_client,
        })
    }

    /// Create from `ANTHROPIC_API_KEY` (and optional `ANTHROPIC_BASE_URL`)
    ///
    /// # Errors
    ///
    /// Fails with [`BackendError::MissingApiKey`] when the key is unset.
    pub fn from_env() -> Result<Self, BackendError> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| BackendError::MissingApiKey(NAME.to_string()))?;
        let base_url = std::env::var("ANTHROPIC_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_ANTHROPIC_BASE_URL.to_string());
        Self::new(base_url, api_key)
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url)
    }

    async fn post(&self, body: &Value) -> Result<reqwest::Response, BackendError> {
        let response = self
            .http_client
            .post(self.messages_url())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(body)
            .send()
            .await
            .map_err(|source| BackendError::Http {
                backend: NAME.to_string(),
                source,
            })?;
        super::ensure_success(NAME, response).await
    }
}

/// System prompt plus any system turns from the history
pub(crate) fn build_system(request: &CompletionRequest) -> String {
    let mut parts: Vec<&str> = Vec::new();
    if !request.system.is_empty() {
        parts.push(&request.system);
    }
    parts.extend(
        request
            .turns
            .iter()
            .filter(|turn| turn.role == Role::System && !turn.content.is_empty())
            .map(|turn| turn.content.as_str()),
    );
    parts.join("\n\n")
}

fn text_block(text: &str) -> Value {
    json!({ "type": "text", "text": text })
}

/// Translate the conversation into Messages API messages
///
/// Consecutive turns with the same role are merged into one message.
pub(crate) fn build_messages(request: &CompletionRequest) -> Vec<Value> {
    let mut messages: Vec<(&'static str, Vec<Value>)> = Vec::new();

    for turn in &request.turns {
        let (role, blocks) = match turn.role {
            Role::System => continue,
            Role::User => ("user", vec![text_block(&turn.content)]),
            Role::Assistant => {
                let mut blocks = Vec::new();
                if !turn.content.is_empty() {
                    blocks.push(text_block(&turn.content));
                }
                for call in &turn.tool_invocations {
                    let input = serde_json::from_str::<Value>(&call.arguments)
                        .ok()
                        .filter(Value::is_object)
                        .unwrap_or_else(|| json!({}));
                    blocks.push(json!({
                        "type": "tool_use",
                        "id": call.id,
                        "name": call.name,
                        "input": input,
                    }));
                }
                ("assistant", blocks)
            }
            Role::ToolResult => match &turn.tool_call_id {
                Some(id) => (
                    "user",
                    vec![json!({
                        "type": "tool_result",
                        "tool_use_id": id,
                        "content": turn.content,
                    })],
                ),
                None => ("user", vec![text_block(&turn.content)]),
            },
        };
        if blocks.is_empty() {
            continue;
        }
        match messages.last_mut() {
            Some((last_role, last_blocks)) if *last_role == role => last_blocks.extend(blocks),
            _ => messages.push((role, blocks)),
        }
    }

    messages
        .into_iter()
        .map(|(role, content)| json!({ "role": role, "content": content }))
        .collect()
}

/// Full request body
pub(crate) fn build_body(request: &CompletionRequest, stream: bool) -> Value {
    let mut body = json!({
        "model": request.model,
        "max_tokens": request.max_tokens,
        "temperature": request.temperature,
        "messages": build_messages(request),
    });
    let system = build_system(request);
    if !system.is_empty() {
        body["system"] = Value::String(system);
    }
    if !request.tools.is_empty() {
        let tools: Vec<Value> = request
            .tools
            .iter()
            .map(|tool| {
                json!({
                    "name": tool.name,
                    "description": tool.description,
                    "input_schema": tool.parameters,
                })
            })
            .collect();
        body["tools"] = Value::Array(tools);
    }
    if stream {
        body["stream"] = json!(true);
    }
    body
}

fn count(value: &Value, key: &str) -> Option<u32> {
    value
        .get(key)
        .and_then(Value::as_u64)
        .map(|c| u32::try_from(c).unwrap_or(u32::MAX))
}

/// Parse a non-streaming response body
pub(crate) fn parse_completion(data: &Value) -> Result<Completion, BackendError> {
    let blocks = data
        .get("content")
        .and_then(Value::as_array)
        .ok_or_else(|| BackendError::Decode {
            backend: NAME.to_string(),
            message: "response has no content array".to_string(),
        })?;

    let mut completion = Completion::default();
    for block in blocks {
        match block.get("type").and_then(Value::as_str) {
            Some("text") => {
                if let Some(text) = block.get("text").and_then(Value::as_str) {
                    completion.text.push_str(text);
                }
            }
            Some("tool_use") => {
                let input = block.get("input").cloned().unwrap_or_else(|| json!({}));
                completion.tool_invocations.push(ToolInvocation::new(
                    block.get("id").and_then(Value::as_str).unwrap_or(""),
                    block.get("name").and_then(Value::as_str).unwrap_or(""),
                    input.to_string(),
                ));
            }
            _ => {}
        }
    }

    completion.usage = data.get("usage").map(|usage| TokenUsage {
        input_tokens: count(usage, "input_tokens").unwrap_or(0),
        output_tokens: count(usage, "output_tokens").unwrap_or(0),
    });
    Ok(completion)
}

#[derive(Debug, Default)]
struct OpenToolBlock {
    id: String,
    name: String,
    input_json: String,
}

/// Streaming event accumulator
#[derive(Debug, Default)]
pub(crate) struct StreamState {
    tool_blocks: HashMap<u64, OpenToolBlock>,
    usage: TokenUsage,
    saw_usage: bool,
    done: bool,
}

impl StreamState {
    /// Handle one SSE `data:` payload
    pub(crate) fn handle(&mut self, data: &str) -> Vec<CompletionChunk> {
        let Ok(value) = serde_json::from_str::<Value>(data) else {
            tracing::debug!(backend = NAME, "Ignoring unparsable stream payload");
            return Vec::new();
        };
        let index = value.get("index").and_then(Value::as_u64).unwrap_or(0);

        match value.get("type").and_then(Value::as_str) {
            Some("message_start") => {
                if let Some(input) = value
                    .get("message")
                    .and_then(|m| m.get("usage"))
                    .and_then(|u| count(u, "input_tokens"))
                {
                    self.usage.input_tokens = input;
                    self.saw_usage = true;
                }
                Vec::new()
            }
            Some("content_block_start") => {
                let Some(block) = value.get("content_block") else {
                    return Vec::new();
                };
                match block.get("type").and_then(Value::as_str) {
                    Some("tool_use") => {
                        self.tool_blocks.insert(
                            index,
                            OpenToolBlock {
                                id: block.get("id").and_then(Value::as_str).unwrap_or("").to_string(),
                                name: block
                                    .get("name")
                                    .and_then(Value::as_str)
                                    .unwrap_or("")
                                    .to_string(),
                                input_json: String::new(),
                            },
                        );
                        Vec::new()
                    }
                    Some("text") => block
                        .get("text")
                        .and_then(Value::as_str)
                        .filter(|t| !t.is_empty())
                        .map(|t| vec![CompletionChunk::Text(t.to_string())])
                        .unwrap_or_default(),
                    _ => Vec::new(),
                }
            }
            Some("content_block_delta") => {
                let Some(delta) = value.get("delta") else {
                    return Vec::new();
                };
                match delta.get("type").and_then(Value::as_str) {
                    Some("text_delta") => delta
                        .get("text")
                        .and_then(Value::as_str)
                        .filter(|t| !t.is_empty())
                        .map(|t| vec![CompletionChunk::Text(t.to_string())])
                        .unwrap_or_default(),
                    Some("input_json_delta") => {
                        if let (Some(block), Some(part)) = (
                            self.tool_blocks.get_mut(&index),
                            delta.get("partial_json").and_then(Value::as_str),
                        ) {
                            block.input_json.push_str(part);
                        }
                        Vec::new()
                    }
                    _ => Vec::new(),
                }
            }
            Some("content_block_stop") => self
                .tool_blocks
                .remove(&index)
                .map(|block| {
                    let arguments = if block.input_json.trim().is_empty() {
                        "{}".to_string()
                    } else {
                        block.input_json
                    };
                    vec![CompletionChunk::ToolInvocation(ToolInvocation::new(
                        block.id, block.name, arguments,
                    ))]
                })
                .unwrap_or_default(),
            Some("message_delta") => {
                if let Some(output) = value.get("usage").and_then(|u| count(u, "output_tokens")) {
                    self.usage.output_tokens = output;
                    self.saw_usage = true;
                }
                Vec::new()
            }
            Some("message_stop") => self.finish(),
            Some("error") => {
                self.done = true;
                let message = value
                    .get("error")
                    .and_then(|e| e.get("message"))
                    .and_then(Value::as_str)
                    .unwrap_or("stream error")
                    .to_string();
                vec![CompletionChunk::Error(message)]
            }
            _ => Vec::new(),
        }
    }

    /// Mark the stream complete
    ///
    /// Tool blocks that never saw `content_block_stop` are dropped: their
    /// arguments may be truncated.
    pub(crate) fn finish(&mut self) -> Vec<CompletionChunk> {
        if self.done {
            return Vec::new();
        }
        self.done = true;
        if !self.tool_blocks.is_empty() {
            tracing::warn!(
                backend = NAME,
                open_blocks = self.tool_blocks.len(),
                "Stream ended with unfinished tool calls"
            );
            self.tool_blocks.clear();
        }
        vec![CompletionChunk::Complete {
            usage: self.saw_usage.then_some(self.usage),
        }]
    }

    pub(crate) fn is_done(&self) -> bool {
        self.done
    }
}

#[async_trait]
impl LlmBackend for AnthropicBackend {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, BackendError> {
        let response = self.post(&build_body(request, false)).await?;
        let data: Value = response.json().await.map_err(|e| BackendError::Decode {
            backend: NAME.to_string(),
            message: e.to_string(),
        })?;
        parse_completion(&data)
    }

    async fn complete_streaming(
        &self,
        request: &CompletionRequest,
    ) -> Result<mpsc::Receiver<CompletionChunk>, BackendError> {
        let response = self.post(&build_body(request, true)).await?;
        let (tx, rx) = mpsc::channel(100);
        let mut stream = response.bytes_stream();

        tokio::spawn(async move {
            let mut decoder = SseDecoder::new();
            let mut state = StreamState::default();

            while let Some(chunk) = stream.next().await {
                let bytes = match chunk {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        let _ = tx.send(CompletionChunk::Error(e.to_string())).await;
                        return;
                    }
                };
                for event in decoder.push(&bytes) {
                    for out in state.handle(&event.data) {
                        if tx.send(out).await.is_err() {
                            return;
                        }
                    }
                    if state.is_done() {
                        return;
                    }
                }
            }

            let mut tail = Vec::new();
            if let Some(event) = decoder.finish() {
                tail.extend(state.handle(&event.data));
            }
            tail.extend(state.finish());
            for out in tail {
                if tx.send(out).await.is_err() {
                    return;
                }
            }
        });

        Ok(rx)
    }
}
