//! Daemon Server Implementation
//!
//! HTTP front end for the Conductor:
//! - `GET  /health`: liveness
//! - `POST /api/commands`: batched JSON response
//! - `POST /api/commands/stream`: chunked NDJSON body, one record per event
//! - `POST /api/templates`: template expansion to actions
//! - `GET  /api/board`: board contents (demo mode only)
//!
//! # Demo Mode
//!
//! With a demo board attached, batched commands and template expansions are
//! also applied server-side to an in-memory store, and the store's contents stand in for the snapshot
//! when the client sends none.
//!
//! ```text
//!   client ── POST /api/commands ──▶ Conductor ──▶ actions
//!                                                   │ (demo)
//!                                                   ▼
//!                                         ActionApplier ──▶ InMemoryBoardStore
//! ```

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use whiteboard_conductor::board::ApplierOptions;
use whiteboard_conductor::streaming::encode;
use whiteboard_conductor::{
    Action, ActionApplier, BoardObject, Command, CommandResponse, Conductor, InMemoryBoardStore,
    TemplateRequest,
};

/// Content type of the streaming endpoint
pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

// ============================================================================
// Error type
// ============================================================================

/// Handler error rendered as `{"error": "..."}`
pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.into(),
        }
    }

    fn unprocessable(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: msg.into(),
        }
    }

    fn not_found(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

// ============================================================================
// State
// ============================================================================

/// Server-side board used in demo mode
pub struct DemoBoard {
    store: Arc<InMemoryBoardStore>,
    settle_delay: Duration,
}

impl DemoBoard {
    /// Empty demo board
    pub fn new(settle_delay: Duration) -> Self {
        Self {
            store: Arc::new(InMemoryBoardStore::with_foreign_keys()),
            settle_delay,
        }
    }

    async fn apply(&self, requester: &str, snapshot: Vec<BoardObject>, actions: &[Action]) {
        let options = ApplierOptions {
            settle_delay: self.settle_delay,
            requester: Some(requester.to_string()),
            ..ApplierOptions::default()
        };
        let mut applier = ActionApplier::new(self.store.clone(), snapshot, options);
        applier.apply_all(actions).await;
        let outcome = applier.finish().await;
        for error in &outcome.report.store_errors {
            warn!(error = %error, "Demo board rejected a write");
        }
    }
}

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    conductor: Conductor,
    demo: Option<Arc<DemoBoard>>,
}

impl AppState {
    /// State without a demo board
    pub fn new(conductor: Conductor) -> Self {
        Self {
            conductor,
            demo: None,
        }
    }

    /// Attach a demo board
    #[must_use]
    pub fn with_demo_board(mut self, board: DemoBoard) -> Self {
        self.demo = Some(Arc::new(board));
        self
    }
}

// ============================================================================
// Router
// ============================================================================

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/commands", post(process_command))
        .route("/api/commands/stream", post(process_command_streaming))
        .route("/api/templates", post(expand_template))
        .route("/api/board", get(board))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve until Ctrl-C or SIGTERM
///
/// # Errors
///
/// Fails when the address cannot be parsed or bound.
pub async fn run(state: AppState, bind: &str, port: u16) -> Result<()> {
    let app = build_router(state);
    let addr: SocketAddr = format!("{bind}:{port}")
        .parse()
        .with_context(|| format!("invalid listen address {bind}:{port}"))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "Whiteboard daemon listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Whiteboard daemon shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}

// ============================================================================
// Handlers
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

fn prepare(state: &AppState, mut command: Command) -> Result<Command, AppError> {
    if command.text.trim().is_empty() {
        return Err(AppError::bad_request("text must not be empty"));
    }
    if let Some(demo) = &state.demo {
        if command.current_board_objects.is_empty() {
            command.current_board_objects = demo.store.objects();
        }
    }
    Ok(command)
}

async fn process_command(
    State(state): State<AppState>,
    Json(command): Json<Command>,
) -> Result<Json<CommandResponse>, AppError> {
    let command = prepare(&state, command)?;
    let response = state.conductor.process_command(&command).await;

    if let Some(demo) = &state.demo {
        demo.apply(
            &command.requester_id,
            command.current_board_objects,
            &response.actions,
        )
        .await;
    }
    Ok(Json(response))
}

async fn process_command_streaming(
    State(state): State<AppState>,
    Json(command): Json<Command>,
) -> Result<Response, AppError> {
    let command = prepare(&state, command)?;
    let events = state.conductor.process_command_streaming(command);

    let records = ReceiverStream::new(events).filter_map(|event| match encode(&event) {
        Ok(record) => Some(Ok::<_, Infallible>(record)),
        Err(e) => {
            warn!(error = %e, "Dropping unencodable stream event");
            None
        }
    });

    Ok((
        [(header::CONTENT_TYPE, NDJSON_CONTENT_TYPE)],
        Body::from_stream(records),
    )
        .into_response())
}

#[derive(Serialize)]
struct TemplateResponse {
    template: &'static str,
    actions: Vec<Action>,
}

async fn expand_template(
    State(state): State<AppState>,
    Json(request): Json<TemplateRequest>,
) -> Result<Json<TemplateResponse>, AppError> {
    let actions = request.expand();
    if actions.is_empty() {
        return Err(AppError::unprocessable(format!(
            "{} template produced no actions",
            request.name()
        )));
    }
    if let Some(demo) = &state.demo {
        demo.apply("template", demo.store.objects(), &actions).await;
    }
    Ok(Json(TemplateResponse {
        template: request.name(),
        actions,
    }))
}

async fn board(State(state): State<AppState>) -> Result<Json<Vec<BoardObject>>, AppError> {
    let demo = state
        .demo
        .as_ref()
        .ok_or_else(|| AppError::not_found("no demo board attached"))?;
    Ok(Json(demo.store.objects()))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    use whiteboard_conductor::backend::{Completion, ScriptedBackend};
    use whiteboard_conductor::{Conductor, NoopTelemetry, RecordDecoder, StreamEvent, ToolInvocation};

    use super::{build_router, AppState, DemoBoard, NDJSON_CONTENT_TYPE};

    // ------------------------------------------------------------------------
    // HTTP helpers
    // ------------------------------------------------------------------------

    fn state(fast: ScriptedBackend) -> AppState {
        let conductor = Conductor::new(Arc::new(fast), Arc::new(ScriptedBackend::new("creative")))
            .with_telemetry(Arc::new(NoopTelemetry));
        AppState::new(conductor)
    }

    fn add_note() -> ScriptedBackend {
        ScriptedBackend::new("fast")
            .then_reply(Completion::tools(vec![ToolInvocation::new(
                "c1",
                "create_sticky_note",
                r#"{"text":"hello","color":"yellow"}"#,
            )]))
            .then_reply(Completion::text("Added a note."))
    }

    async fn post(state: AppState, uri: &str, body: serde_json::Value) -> axum::response::Response {
        build_router(state)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    async fn get(state: AppState, uri: &str) -> axum::response::Response {
        build_router(state)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
        to_bytes(response.into_body(), 1_048_576).await.unwrap().to_vec()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        serde_json::from_slice(&body_bytes(response).await).unwrap()
    }

    // ------------------------------------------------------------------------
    // Tests
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_health() {
        let response = get(state(ScriptedBackend::new("fast")), "/health").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_batched_command() {
        let response = post(
            state(add_note()),
            "/api/commands",
            serde_json::json!({"text": "add a sticky note saying hello", "requesterId": "u1"}),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["message"], "Added a note.");
        assert_eq!(body["actions"][0]["tool"], "create_sticky_note");
        assert_eq!(body["class"], "simple");
        assert!(body.get("error").is_none());
    }

    #[tokio::test]
    async fn test_empty_text_is_rejected() {
        let response = post(
            state(ScriptedBackend::new("fast")),
            "/api/commands",
            serde_json::json!({"text": "   "}),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "text must not be empty");
    }

    #[tokio::test]
    async fn test_streaming_command_is_ndjson() {
        let response = post(
            state(add_note()),
            "/api/commands/stream",
            serde_json::json!({"text": "add a sticky note saying hello", "requesterId": "u1"}),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            NDJSON_CONTENT_TYPE
        );

        let mut decoder = RecordDecoder::new();
        decoder.push(&body_bytes(response).await);
        let events = decoder.drain();
        assert!(matches!(events[0], StreamEvent::Action { .. }));
        let text: String = events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert!(text.ends_with("Added a note."));
    }

    #[tokio::test]
    async fn test_kanban_template() {
        let response = post(
            state(ScriptedBackend::new("fast")),
            "/api/templates",
            serde_json::json!({
                "template": "kanban",
                "columns": [{"title": "Todo", "cards": ["A"]}, {"title": "Done", "cards": ["B", "C"]}],
            }),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["template"], "kanban");
        assert_eq!(body["actions"].as_array().map(Vec::len), Some(7));
    }

    #[tokio::test]
    async fn test_empty_template_is_unprocessable() {
        let response = post(
            state(ScriptedBackend::new("fast")),
            "/api/templates",
            serde_json::json!({"template": "kanban", "columns": []}),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_board_requires_demo_mode() {
        let response = get(state(ScriptedBackend::new("fast")), "/api/board").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_demo_board_persists_actions() {
        let state = state(add_note()).with_demo_board(DemoBoard::new(Duration::ZERO));
        let response = post(
            state.clone(),
            "/api/commands",
            serde_json::json!({"text": "add a sticky note saying hello", "requesterId": "u1"}),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let board = body_json(get(state, "/api/board").await).await;
        let objects = board.as_array().unwrap();
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0]["text"], "hello");
    }

    #[tokio::test]
    async fn test_demo_board_receives_templates() {
        let state =
            state(ScriptedBackend::new("fast")).with_demo_board(DemoBoard::new(Duration::ZERO));
        let response = post(
            state.clone(),
            "/api/templates",
            serde_json::json!({"template": "flowchart"}),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let board = body_json(get(state, "/api/board").await).await;
        let objects = board.as_array().unwrap();
        // Start, Step, End plus two connectors
        assert_eq!(objects.len(), 5);
        assert!(objects
            .iter()
            .filter(|o| o["type"] == "connector")
            .all(|o| o["start_id"].is_string() && o["end_id"].is_string()));
    }
}
