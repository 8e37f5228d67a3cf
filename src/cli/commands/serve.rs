//! HTTP chat API.
//!
//! `POST /chat` always answers 200; the outcome is in the body's `status` field.

use crate::assistant::{Assistant, ChatRequest, ChatResponse};
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

/// Shared application state.
struct AppState {
    assistant: Assistant,
}

/// Run the HTTP API server.
pub async fn run_serve(host: Option<String>, port: Option<u16>, settings: Settings) -> anyhow::Result<()> {
    if let Err(e) = preflight::check(Operation::Chat, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'wrench doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let assistant = Assistant::new(&settings)?;

    if settings.retrieval.index_on_start {
        let spinner = Output::spinner("Checking embedding index...");
        let result = assistant.indexer().ensure_indexed().await;
        spinner.finish_and_clear();
        match result {
            Ok(report) => Output::index_report(&report),
            // Indexing is retried lazily by the first semantic request.
            Err(e) => Output::warning(&format!("Indexing on start failed: {}", e)),
        }
    }

    let app = router(Arc::new(AppState { assistant }));

    let host = host.unwrap_or_else(|| settings.server.host.clone());
    let port = port.unwrap_or(settings.server.port);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Wrench API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET  /health");
    Output::kv("Chat", "POST /chat");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/chat", post(chat))
        .layer(cors)
        .with_state(state)
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Json<ChatResponse> {
    info!(
        "Chat request (model {:?}, serial {:?}, {} turns)",
        req.model,
        req.serial,
        req.conversation.len()
    );

    let outcome = state.assistant.chat(&req).await;
    let response = ChatResponse::from(&outcome);
    if response.kind.is_some() {
        warn!("Chat request failed: {}", response.response);
    }
    Json(response)
}
