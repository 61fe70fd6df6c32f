//! OpenAI-compatible Backend
//!
//! Chat-completions adapter. Works against api.openai.com and any server that
//! speaks the same `/chat/completions` dialect.
//!
//! # Tool calls
//!
//! Tools are advertised as `{"type": "function", "function": {...}}`. In
//! streaming mode the arguments of each call arrive as fragments keyed by
//! `index`; a call is emitted once a later index starts or the choice
//! finishes.

use std::collections::BTreeMap;
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
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

const NAME: &str = "OpenAI";

/// OpenAI-compatible chat-completions client
#[derive(Clone)]
pub struct OpenAiBackend {
    /// API root, without trailing slash
    base_url: String,
    /// Bearer token (local servers often need none)
    api_key: Option<String>,
    /// HTTP client
    http_client: reqwest::Client,
}

impl OpenAiBackend {
    /// Create a new backend
    ///
    /// # Errors
    ///
    /// Fails when the HTTP client cannot be constructed.
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Result<Self, BackendError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|source| BackendError::Http {
                backend: NAME.to_string(),
                source,
            })?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            http_client,
        })
    }

    /// Create from `OPENAI_BASE_URL` and `OPENAI_API_KEY`
    ///
    /// # Errors
    ///
    /// Fails when the HTTP client cannot be constructed.
    pub fn from_env() -> Result<Self, BackendError> {
        let base_url = std::env::var("OPENAI_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_OPENAI_BASE_URL.to_string());
        Self::new(base_url, std::env::var("OPENAI_API_KEY").ok())
    }

    /// Get chat-completions endpoint URL
    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    async fn post(&self, body: &Value) -> Result<reqwest::Response, BackendError> {
        let mut builder = self.http_client.post(self.chat_url()).json(body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder.send().await.map_err(|source| BackendError::Http {
            backend: NAME.to_string(),
            source,
        })?;
        super::ensure_success(NAME, response).await
    }
}

/// Translate the conversation into chat-completions messages
pub(crate) fn build_messages(request: &CompletionRequest) -> Vec<Value> {
    let mut messages = Vec::with_capacity(request.turns.len() + 1);
    if !request.system.is_empty() {
        messages.push(json!({ "role": "system", "content": request.system }));
    }

    for turn in &request.turns {
        let message = match turn.role {
            Role::System => json!({ "role": "system", "content": turn.content }),
            Role::User => json!({ "role": "user", "content": turn.content }),
            Role::Assistant if turn.tool_invocations.is_empty() => {
                json!({ "role": "assistant", "content": turn.content })
            }
            Role::Assistant => {
                let calls: Vec<Value> = turn
                    .tool_invocations
                    .iter()
                    .map(|call| {
                        json!({
                            "id": call.id,
                            "type": "function",
                            "function": { "name": call.name, "arguments": call.arguments },
                        })
                    })
                    .collect();
                let content = if turn.content.is_empty() {
                    Value::Null
                } else {
                    Value::String(turn.content.clone())
                };
                json!({ "role": "assistant", "content": content, "tool_calls": calls })
            }
            Role::ToolResult => match &turn.tool_call_id {
                Some(id) => json!({ "role": "tool", "tool_call_id": id, "content": turn.content }),
                None => json!({ "role": "user", "content": turn.content }),
            },
        };
        messages.push(message);
    }
    messages
}

/// Full request body
pub(crate) fn build_body(request: &CompletionRequest, stream: bool) -> Value {
    let mut body = json!({
        "model": request.model,
        "messages": build_messages(request),
        "max_tokens": request.max_tokens,
        "temperature": request.temperature,
    });

    if !request.tools.is_empty() {
        let tools: Vec<Value> = request
            .tools
            .iter()
            .map(|tool| {
                json!({
                    "type": "function",
                    "function": {
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.parameters,
                    },
                })
            })
            .collect();
        body["tools"] = Value::Array(tools);
        body["tool_choice"] = json!("auto");
    }

    if stream {
        body["stream"] = json!(true);
        body["stream_options"] = json!({ "include_usage": true });
    }
    body
}

fn parse_usage(value: &Value) -> Option<TokenUsage> {
    let usage = value.get("usage").filter(|u| u.is_object())?;
    let count = |key: &str| {
        usage
            .get(key)
            .and_then(Value::as_u64)
            .map_or(0, |c| u32::try_from(c).unwrap_or(u32::MAX))
    };
    Some(TokenUsage {
        input_tokens: count("prompt_tokens"),
        output_tokens: count("completion_tokens"),
    })
}

/// Parse a non-streaming response body
pub(crate) fn parse_completion(data: &Value) -> Result<Completion, BackendError> {
    let message = data
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .ok_or_else(|| BackendError::Decode {
            backend: NAME.to_string(),
            message: "response has no choices[0].message".to_string(),
        })?;

    let text = message
        .get("content")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();

    let tool_invocations = message
        .get("tool_calls")
        .and_then(Value::as_array)
        .map(|calls| {
            calls
                .iter()
                .filter_map(|call| {
                    let function = call.get("function")?;
                    Some(ToolInvocation::new(
                        call.get("id").and_then(Value::as_str).unwrap_or(""),
                        function.get("name")?.as_str()?,
                        function
                            .get("arguments")
                            .and_then(Value::as_str)
                            .unwrap_or("{}"),
                    ))
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(Completion {
        text,
        tool_invocations,
        usage: parse_usage(data),
    })
}

#[derive(Debug, Default)]
struct PartialCall {
    id: String,
    name: String,
    arguments: String,
}

impl PartialCall {
    fn into_invocation(self) -> ToolInvocation {
        ToolInvocation::new(self.id, self.name, self.arguments)
    }
}

/// Streaming delta accumulator
#[derive(Debug, Default)]
pub(crate) struct StreamState {
    calls: BTreeMap<u64, PartialCall>,
    usage: Option<TokenUsage>,
    done: bool,
}

impl StreamState {
    /// Handle one SSE `data:` payload
    pub(crate) fn handle(&mut self, data: &str) -> Vec<CompletionChunk> {
        let mut out = Vec::new();
        if data.trim() == "[DONE]" {
            out.extend(self.finish());
            return out;
        }

        let Ok(value) = serde_json::from_str::<Value>(data) else {
            tracing::debug!(backend = NAME, "Ignoring unparsable stream payload");
            return out;
        };
        if let Some(error) = value.get("error") {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .map_or_else(|| error.to_string(), str::to_string);
            out.push(CompletionChunk::Error(message));
            self.done = true;
            return out;
        }
        if let Some(usage) = parse_usage(&value) {
            self.usage = Some(usage);
        }

        let Some(choice) = value.get("choices").and_then(|c| c.get(0)) else {
            return out;
        };
        if let Some(delta) = choice.get("delta") {
            if let Some(text) = delta.get("content").and_then(Value::as_str) {
                if !text.is_empty() {
                    out.push(CompletionChunk::Text(text.to_string()));
                }
            }
            for fragment in delta
                .get("tool_calls")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
            {
                let index = fragment.get("index").and_then(Value::as_u64).unwrap_or(0);
                // A new index means every earlier call is complete.
                out.extend(self.flush_below(index));

                let call = self.calls.entry(index).or_default();
                if let Some(id) = fragment.get("id").and_then(Value::as_str) {
                    call.id = id.to_string();
                }
                if let Some(function) = fragment.get("function") {
                    if let Some(name) = function.get("name").and_then(Value::as_str) {
                        call.name.push_str(name);
                    }
                    if let Some(args) = function.get("arguments").and_then(Value::as_str) {
                        call.arguments.push_str(args);
                    }
                }
            }
        }
        if choice
            .get("finish_reason")
            .is_some_and(|reason| !reason.is_null())
        {
            out.extend(self.flush_all());
        }
        out
    }

    fn flush_below(&mut self, index: u64) -> Vec<CompletionChunk> {
        let rest = self.calls.split_off(&index);
        let ready = std::mem::replace(&mut self.calls, rest);
        ready
            .into_values()
            .map(|call| CompletionChunk::ToolInvocation(call.into_invocation()))
            .collect()
    }

    fn flush_all(&mut self) -> Vec<CompletionChunk> {
        std::mem::take(&mut self.calls)
            .into_values()
            .map(|call| CompletionChunk::ToolInvocation(call.into_invocation()))
            .collect()
    }

    /// Flush remaining calls and mark the stream complete
    pub(crate) fn finish(&mut self) -> Vec<CompletionChunk> {
        if self.done {
            return Vec::new();
        }
        self.done = true;
        let mut out = self.flush_all();
        out.push(CompletionChunk::Complete { usage: self.usage });
        out
    }

    pub(crate) fn is_done(&self) -> bool {
        self.done
    }
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
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

        // Spawn task to process stream
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
                            // Receiver dropped, stop streaming
                            return;
                        }
                    }
                    if state.is_done() {
                        return;
                    }
                }
            }

            // Stream ended without [DONE]
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::tool_definitions;
    use crate::orchestrator::ConversationTurn;
    use pretty_assertions::assert_eq;

    fn request(turns: Vec<ConversationTurn>) -> CompletionRequest {
        CompletionRequest {
            model: "gpt-4o-mini".to_string(),
            system: "be brief".to_string(),
            turns,
            tools: tool_definitions(),
            max_tokens: 1024,
            temperature: 0.3,
        }
    }

    #[test]
    fn test_backend_url() {
        let backend = OpenAiBackend::new("http://localhost:8080/v1/", None).unwrap();
        assert_eq!(backend.chat_url(), "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn test_messages_map_tool_turns() {
        let call = ToolInvocation::new("call_1", "delete_object", r#"{"id":"1"}"#);
        let messages = build_messages(&request(vec![
            ConversationTurn::user("delete it"),
            ConversationTurn::assistant_with_tools("", vec![call]),
            ConversationTurn::tool_result("call_1", "Deleted object 1."),
        ]));

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[2]["content"], Value::Null);
        assert_eq!(messages[2]["tool_calls"][0]["function"]["name"], "delete_object");
        assert_eq!(messages[3]["role"], "tool");
        assert_eq!(messages[3]["tool_call_id"], "call_1");
    }

    #[test]
    fn test_body_advertises_tools() {
        let body = build_body(&request(vec![ConversationTurn::user("hi")]), true);
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "create_sticky_note");
        assert_eq!(body["stream"], true);
        assert_eq!(body["stream_options"]["include_usage"], true);
    }

    #[test]
    fn test_parse_completion_with_tool_calls() {
        let data = json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_9",
                        "type": "function",
                        "function": { "name": "create_rectangle", "arguments": "{}" },
                    }],
                },
            }],
            "usage": { "prompt_tokens": 12, "completion_tokens": 3 },
        });
        let completion = parse_completion(&data).unwrap();
        assert_eq!(completion.text, "");
        assert_eq!(
            completion.tool_invocations,
            vec![ToolInvocation::new("call_9", "create_rectangle", "{}")]
        );
        assert_eq!(completion.usage.map(|u| u.input_tokens), Some(12));
    }

    #[test]
    fn test_parse_completion_without_choices_fails() {
        assert!(matches!(
            parse_completion(&json!({ "choices": [] })),
            Err(BackendError::Decode { .. })
        ));
    }

    #[test]
    fn test_stream_accumulates_fragments_by_index() {
        let mut state = StreamState::default();
        let mut out = Vec::new();
        for data in [
            r#"{"choices":[{"delta":{"content":"On it"}}]}"#,
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"a","function":{"name":"create_circle","arguments":"{\"ra"}}]}}]}"#,
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"dius\":5}"}}]}}]}"#,
            r#"{"choices":[{"delta":{"tool_calls":[{"index":1,"id":"b","function":{"name":"clear_board","arguments":"{}"}}]}}]}"#,
            r#"{"choices":[{"delta":{},"finish_reason":"tool_calls"}]}"#,
            r#"{"choices":[],"usage":{"prompt_tokens":4,"completion_tokens":2}}"#,
            "[DONE]",
        ] {
            out.extend(state.handle(data));
        }

        assert_eq!(
            out,
            vec![
                CompletionChunk::Text("On it".to_string()),
                CompletionChunk::ToolInvocation(ToolInvocation::new(
                    "a",
                    "create_circle",
                    r#"{"radius":5}"#
                )),
                CompletionChunk::ToolInvocation(ToolInvocation::new("b", "clear_board", "{}")),
                CompletionChunk::Complete {
                    usage: Some(TokenUsage {
                        input_tokens: 4,
                        output_tokens: 2,
                    }),
                },
            ]
        );
        assert!(state.is_done());
        assert!(state.finish().is_empty());
    }

    #[test]
    fn test_stream_error_payload() {
        let mut state = StreamState::default();
        let out = state.handle(r#"{"error":{"message":"rate limited"}}"#);
        assert_eq!(out, vec![CompletionChunk::Error("rate limited".to_string())]);
        assert!(state.is_done());
    }
}
