//! HTTP API gateway for webhound.
//!
//! Endpoints:
//!
//! - `POST /api/chat`                 — Accept a user message, start a run
//! - `GET  /api/chat/{id}?since=N`    — Poll for messages at offset >= N
//! - `GET  /api/files/download`       — Serve a downloaded artifact
//! - `GET  /api/config/prompts`       — Prebuilt prompt catalog
//! - `GET  /api/config/system`        — System prompt, tools, agent settings
//! - `GET  /health`                   — Liveness probe
//!
//! Built on Axum. The polling endpoint is a pure read of the session's
//! append-only log: same offset before new activity means the same slice,
//! so clients resume safely after a dropped connection.

use axum::{
    Router,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Json},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use webhound_agent::{AgentLoop, SessionStore, prompts};
use webhound_config::AppConfig;
use webhound_core::error::SessionError;
use webhound_core::message::ChatMessage;
use webhound_telemetry::ActivityLog;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub store: Arc<SessionStore>,
    pub agent: Arc<AgentLoop>,
    pub config: AppConfig,
}

pub type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/chat", post(send_message_handler))
        .route("/api/chat/{id}", get(poll_chat_handler))
        .route("/api/files/download", get(download_file_handler))
        .route("/api/config/prompts", get(prompts_handler))
        .route("/api/config/system", get(system_config_handler))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let client = webhound_providers::build_from_config(&config)
        .ok_or("No API key configured — set WEBHOUND_API_KEY or add api_key to config.toml")?;

    let tools = Arc::new(webhound_tools::default_registry(&config));
    let activity = Arc::new(if config.telemetry.enabled {
        ActivityLog::jsonl(&config.telemetry.log_dir)
    } else {
        ActivityLog::disabled()
    });

    let agent = Arc::new(AgentLoop::new(client, tools, activity, &config.agent));
    let store = Arc::new(SessionStore::new());

    let state = Arc::new(GatewayState {
        store,
        agent,
        config,
    });

    let app = build_router(state);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Request / Response types ---

#[derive(Deserialize)]
struct ChatRequest {
    /// The user's message.
    message: String,
    /// Existing chat ID (omit to create a new chat).
    #[serde(default)]
    chat_id: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct ChatResponse {
    chat_id: String,
    accepted: bool,
}

#[derive(Deserialize)]
struct PollParams {
    #[serde(default)]
    since: usize,
}

#[derive(Serialize, Deserialize)]
struct PollResponse {
    id: String,
    messages: Vec<ChatMessage>,
    is_processing: bool,
    total_messages: usize,
}

#[derive(Deserialize)]
struct DownloadParams {
    path: String,
}

#[derive(Serialize, Deserialize)]
struct PromptDto {
    id: String,
    label: String,
    message: String,
    prefill: bool,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `POST /api/chat` — append the user message and start a background run.
async fn send_message_handler(
    State(state): State<SharedState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, Json<ErrorResponse>)> {
    let message = payload.message.trim();
    if message.is_empty() {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "Message is required",
        ));
    }

    let session = state.store.create_or_get(payload.chat_id.as_deref()).await;

    match state
        .store
        .start_run(session.clone(), message, state.agent.clone())
    {
        Ok(()) => {
            info!(chat_id = %session.id, "Run accepted");
            Ok(Json(ChatResponse {
                chat_id: session.id.clone(),
                accepted: true,
            }))
        }
        Err(SessionError::AlreadyProcessing) => Err(error_response(
            StatusCode::CONFLICT,
            SessionError::AlreadyProcessing.to_string(),
        )),
        Err(e) => Err(error_response(StatusCode::NOT_FOUND, e.to_string())),
    }
}

/// `GET /api/chat/{id}?since=N` — the polling read.
async fn poll_chat_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Query(params): Query<PollParams>,
) -> Result<Json<PollResponse>, (StatusCode, Json<ErrorResponse>)> {
    let snapshot = state
        .store
        .snapshot_since(&id, params.since)
        .await
        .ok_or_else(|| error_response(StatusCode::NOT_FOUND, "Chat not found"))?;

    Ok(Json(PollResponse {
        id,
        messages: snapshot.messages,
        is_processing: snapshot.is_processing,
        total_messages: snapshot.total_messages,
    }))
}

/// `GET /api/files/download?path=<filename>` — serve a downloaded artifact.
/// Path-traversal protected: the resolved path must stay under the
/// download directory.
async fn download_file_handler(
    State(state): State<SharedState>,
    Query(params): Query<DownloadParams>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    let base = tokio::fs::canonicalize(PathBuf::from(&state.config.download.base_dir))
        .await
        .map_err(|_| error_response(StatusCode::NOT_FOUND, "File not found"))?;

    let resolved = tokio::fs::canonicalize(base.join(&params.path))
        .await
        .map_err(|_| error_response(StatusCode::NOT_FOUND, "File not found"))?;

    if !resolved.starts_with(&base) {
        return Err(error_response(StatusCode::FORBIDDEN, "Access denied"));
    }

    let bytes = tokio::fs::read(&resolved)
        .await
        .map_err(|_| error_response(StatusCode::NOT_FOUND, "File not found"))?;

    let filename = resolved
        .file_name()
        .map(|f| f.to_string_lossy().to_string())
        .unwrap_or_else(|| "download".to_string());

    Ok((
        [
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
            (
                header::CONTENT_TYPE,
                "application/octet-stream".to_string(),
            ),
        ],
        bytes,
    ))
}

/// `GET /api/config/prompts` — prebuilt prompts for the client sidebar.
async fn prompts_handler(State(state): State<SharedState>) -> Json<Vec<PromptDto>> {
    Json(
        state
            .config
            .prebuilt_prompts
            .iter()
            .map(|p| PromptDto {
                id: p.id.clone(),
                label: p.label.clone(),
                message: p.message.clone(),
                prefill: p.prefill,
            })
            .collect(),
    )
}

/// `GET /api/config/system` — full system transparency: prompt, tools,
/// agent settings.
async fn system_config_handler(State(state): State<SharedState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "system_prompt": prompts::build_system_prompt(),
        "tools": state.agent.tool_definitions(),
        "agent": {
            "model": state.agent.model(),
            "max_tool_calls": state.agent.max_tool_calls(),
            "temperature": state.agent.temperature(),
        },
        "prebuilt_prompts": state
            .config
            .prebuilt_prompts
            .iter()
            .map(|p| serde_json::json!({
                "id": p.id,
                "label": p.label,
                "message": p.message,
                "prefill": p.prefill,
            }))
            .collect::<Vec<_>>(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;
    use webhound_config::PrebuiltPrompt;
    use webhound_core::tool::ToolRegistry;

    fn test_state(config: AppConfig) -> SharedState {
        // A client that answers immediately; these tests never reach it.
        let client = Arc::new(webhound_providers::OpenAiCompatClient::new(
            "test",
            "http://localhost:9",
            "sk-test",
        ));
        let agent = Arc::new(AgentLoop::new(
            client,
            Arc::new(ToolRegistry::new()),
            Arc::new(ActivityLog::memory()),
            &config.agent,
        ));
        Arc::new(GatewayState {
            store: Arc::new(SessionStore::new()),
            agent,
            config,
        })
    }

    #[tokio::test]
    async fn health_endpoint() {
        let app = build_router(test_state(AppConfig::default()));
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn empty_message_is_rejected() {
        let app = build_router(test_state(AppConfig::default()));
        let response = app
            .oneshot(
                Request::post("/api/chat")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"message": "   "}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn polling_unknown_chat_is_not_found() {
        let app = build_router(test_state(AppConfig::default()));
        let response = app
            .oneshot(
                Request::get("/api/chat/nope?since=0")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn prompts_endpoint_serves_catalog() {
        let config = AppConfig {
            prebuilt_prompts: vec![PrebuiltPrompt {
                id: "q4".into(),
                label: "Q4 docs".into(),
                message: "Fetch the Q4 documents".into(),
                prefill: false,
            }],
            ..AppConfig::default()
        };
        let app = build_router(test_state(config));
        let response = app
            .oneshot(
                Request::get("/api/config/prompts")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let prompts: Vec<PromptDto> = serde_json::from_slice(&body).unwrap();
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0].id, "q4");
    }

    #[tokio::test]
    async fn system_config_reports_agent_settings() {
        let app = build_router(test_state(AppConfig::default()));
        let response = app
            .oneshot(
                Request::get("/api/config/system")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let config: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(config["agent"]["max_tool_calls"], 50);
        assert!(
            config["system_prompt"]
                .as_str()
                .unwrap()
                .contains("research")
        );
    }

    #[tokio::test]
    async fn download_traversal_is_blocked() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("report.pdf"), b"%PDF-1.4 data").unwrap();
        let config = AppConfig {
            download: webhound_config::DownloadConfig {
                base_dir: dir.path().to_string_lossy().to_string(),
            },
            ..AppConfig::default()
        };
        let app = build_router(test_state(config));

        // Legitimate file is served with an attachment header
        let response = app
            .clone()
            .oneshot(
                Request::get("/api/files/download?path=report.pdf")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(
            response
                .headers()
                .get(header::CONTENT_DISPOSITION)
                .unwrap()
                .to_str()
                .unwrap()
                .contains("report.pdf")
        );

        // Escaping the download dir is refused
        let response = app
            .oneshot(
                Request::get("/api/files/download?path=../../etc/passwd")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_ne!(response.status(), StatusCode::OK);
    }
}
