//! Command Telemetry
//!
//! Traces one command from input to response:
//! - `start_trace` when the command arrives
//! - `record_generation` per backend completion
//! - `update_trace` with the outcome
//! - `flush` to export
//!
//! Flushing is always spawned by the caller and never awaited on the response
//! path, so a slow ingest endpoint cannot delay users.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::backend::TokenUsage;

// ============================================================================
// Records
// ============================================================================

/// Opening data for a command trace
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TraceStart {
    /// Trace id (uuid v4)
    pub trace_id: String,
    /// Who sent the command
    pub requester: String,
    /// Command text
    pub input: String,
    /// When the command arrived
    pub started_at: DateTime<Utc>,
}

impl TraceStart {
    /// New trace with a fresh id
    pub fn new(requester: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            trace_id: uuid::Uuid::new_v4().to_string(),
            requester: requester.into(),
            input: input.into(),
            started_at: Utc::now(),
        }
    }
}

/// One backend completion
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationRecord {
    /// Model id
    pub model: String,
    /// 1-based turn number within the command
    pub turn: usize,
    /// When the request was sent
    pub started_at: DateTime<Utc>,
    /// Time until the completion finished
    pub latency_ms: u64,
    /// Token usage (if reported)
    pub usage: Option<TokenUsage>,
    /// Tool invocations in the completion
    pub tool_invocations: usize,
}

/// Outcome of a command
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TraceUpdate {
    /// Classification bucket
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    /// Why the command was refused, if it was
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filtered: Option<String>,
    /// User-visible message
    pub output: String,
    /// Actions produced
    pub actions: usize,
    /// Turns used
    pub turns: usize,
    /// Raw backend error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Trait
// ============================================================================

/// Sink for command traces
#[async_trait]
pub trait Telemetry: Send + Sync {
    /// Open a trace
    fn start_trace(&self, trace: &TraceStart);

    /// Attach a completion to a trace
    fn record_generation(&self, trace_id: &str, generation: &GenerationRecord);

    /// Record a trace's outcome
    fn update_trace(&self, trace_id: &str, update: &TraceUpdate);

    /// Export anything buffered
    async fn flush(&self);
}

/// Discards everything
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopTelemetry;

#[async_trait]
impl Telemetry for NoopTelemetry {
    fn start_trace(&self, _trace: &TraceStart) {}

    fn record_generation(&self, _trace_id: &str, _generation: &GenerationRecord) {}

    fn update_trace(&self, _trace_id: &str, _update: &TraceUpdate) {}

    async fn flush(&self) {}
}

/// Writes traces to the `tracing` log
#[derive(Clone, Copy, Debug, Default)]
pub struct LogTelemetry;

#[async_trait]
impl Telemetry for LogTelemetry {
    fn start_trace(&self, trace: &TraceStart) {
        tracing::info!(
            trace_id = %trace.trace_id,
            requester = %trace.requester,
            input_len = trace.input.len(),
            "Trace started"
        );
    }

    fn record_generation(&self, trace_id: &str, generation: &GenerationRecord) {
        tracing::info!(
            trace_id,
            model = %generation.model,
            turn = generation.turn,
            latency_ms = generation.latency_ms,
            input_tokens = generation.usage.map(|u| u.input_tokens),
            output_tokens = generation.usage.map(|u| u.output_tokens),
            tool_invocations = generation.tool_invocations,
            "Generation"
        );
    }

    fn update_trace(&self, trace_id: &str, update: &TraceUpdate) {
        tracing::info!(
            trace_id,
            class = update.class.as_deref(),
            filtered = update.filtered.as_deref(),
            actions = update.actions,
            turns = update.turns,
            error = update.error.as_deref(),
            "Trace finished"
        );
    }

    async fn flush(&self) {}
}

// ============================================================================
// HTTP export
// ============================================================================

/// Buffers trace events and POSTs them as one batch on flush
pub struct HttpTelemetry {
    endpoint: String,
    api_key: Option<String>,
    http_client: reqwest::Client,
    buffer: Mutex<Vec<serde_json::Value>>,
}

impl HttpTelemetry {
    /// Exporter posting to `endpoint`
    ///
    /// # Errors
    ///
    /// Fails when the HTTP client cannot be constructed.
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> reqwest::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            endpoint: endpoint.into(),
            api_key,
            http_client,
            buffer: Mutex::new(Vec::new()),
        })
    }

    /// Events waiting for the next flush
    pub fn pending(&self) -> usize {
        self.buffer.lock().len()
    }

    fn push(&self, kind: &str, body: serde_json::Value) {
        self.buffer.lock().push(json!({
            "id": uuid::Uuid::new_v4().to_string(),
            "type": kind,
            "timestamp": Utc::now().to_rfc3339(),
            "body": body,
        }));
    }
}

#[async_trait]
impl Telemetry for HttpTelemetry {
    fn start_trace(&self, trace: &TraceStart) {
        self.push(
            "trace-create",
            json!({
                "id": trace.trace_id,
                "name": "whiteboard-command",
                "userId": trace.requester,
                "input": trace.input,
                "timestamp": trace.started_at.to_rfc3339(),
            }),
        );
    }

    fn record_generation(&self, trace_id: &str, generation: &GenerationRecord) {
        self.push(
            "generation-create",
            json!({
                "traceId": trace_id,
                "name": format!("turn-{}", generation.turn),
                "model": generation.model,
                "startTime": generation.started_at.to_rfc3339(),
                "latencyMs": generation.latency_ms,
                "usage": generation.usage,
                "toolInvocations": generation.tool_invocations,
            }),
        );
    }

    fn update_trace(&self, trace_id: &str, update: &TraceUpdate) {
        self.push(
            "trace-update",
            json!({
                "id": trace_id,
                "output": update,
            }),
        );
    }

    async fn flush(&self) {
        let batch = std::mem::take(&mut *self.buffer.lock());
        if batch.is_empty() {
            return;
        }
        let count = batch.len();

        let mut request = self
            .http_client
            .post(&self.endpoint)
            .json(&json!({ "batch": batch }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        match request.send().await {
            Ok(response) if response.status().is_success() => {
                tracing::debug!(events = count, "Telemetry flushed");
            }
            Ok(response) => {
                tracing::warn!(status = %response.status(), events = count, "Telemetry export rejected");
            }
            Err(e) => {
                tracing::warn!(error = %e, events = count, "Telemetry export failed");
            }
        }
    }
}
