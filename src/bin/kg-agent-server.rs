//! kg-agent HTTP server.
//!
//! - `GET  /`: liveness text
//! - `GET  /health`: status, version and graph size
//! - `GET  /stats`: pipeline counters
//! - `POST /query`: `{"prompt": "..."}` → agent response
//!
//! Only malformed requests get a 4xx; every pipeline outcome is a 200.
//!
//! Configuration comes from `KG_AGENT_CONFIG` (or the XDG config file) plus
//! the `KG_AGENT_*` overrides.
//!
//! Build and run: `cargo run --features server --bin kg-agent-server`

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::Value;
use tower_http::cors::CorsLayer;

use kg_agent::agent::llm;
use kg_agent::agent::{AgentOptions, AgentResponse, KgAgent, StatsSnapshot};
use kg_agent::config::AgentConfig;
use kg_agent::paths::AgentPaths;

// ── Responses ─────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    triples: usize,
    ontology_triples: usize,
}

#[derive(Serialize)]
struct StatsResponse {
    #[serde(flatten)]
    stats: StatsSnapshot,
    triples: usize,
}

type ApiError = (StatusCode, Json<Value>);

fn api_error(status: StatusCode, message: &str) -> ApiError {
    (status, Json(serde_json::json!({ "error": message })))
}

// ── Handlers ──────────────────────────────────────────────────────────────

async fn home() -> &'static str {
    tracing::info!("home route accessed");
    "Knowledge graph agent backend is running!"
}

async fn health(State(agent): State<Arc<KgAgent>>) -> Json<HealthResponse> {
    let store = agent.store();
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        triples: store.len().unwrap_or_default(),
        ontology_triples: store.ontology_len(),
    })
}

async fn stats(State(agent): State<Arc<KgAgent>>) -> Json<StatsResponse> {
    Json(StatsResponse {
        stats: agent.stats(),
        triples: agent.store().len().unwrap_or_default(),
    })
}

async fn query(
    State(agent): State<Arc<KgAgent>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<AgentResponse>, ApiError> {
    let Json(body) = body.map_err(|e| {
        tracing::warn!(error = %e, "received non-JSON request to /query");
        api_error(StatusCode::BAD_REQUEST, "Request must be JSON")
    })?;

    let prompt = body
        .get("prompt")
        .and_then(Value::as_str)
        .filter(|p| !p.trim().is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            tracing::warn!("no prompt provided in the request");
            api_error(StatusCode::BAD_REQUEST, "No prompt provided")
        })?;

    let response = tokio::task::spawn_blocking(move || agent.answer(&prompt))
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "pipeline task failed");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
        })?;
    Ok(Json(response))
}

fn router(agent: Arc<KgAgent>) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/query", post(query))
        .layer(CorsLayer::permissive())
        .with_state(agent)
}

// ── Main ──────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,oxigraph=warn")),
        )
        .init();

    let paths = AgentPaths::resolve()
        .map_err(|e| tracing::warn!("failed to resolve XDG paths: {e}"))
        .ok();
    let explicit = std::env::var("KG_AGENT_CONFIG").ok().map(PathBuf::from);
    let config = AgentConfig::resolve(explicit.as_deref(), paths.as_ref()).unwrap_or_else(|e| {
        tracing::error!("failed to load configuration: {e}");
        std::process::exit(1);
    });

    let store = config.graph.open().unwrap_or_else(|e| {
        tracing::error!("failed to load knowledge graph: {e}");
        std::process::exit(1);
    });
    let generator = llm::from_config(&config.llm).unwrap_or_else(|e| {
        tracing::error!("failed to configure language model: {e}");
        std::process::exit(1);
    });

    let agent = Arc::new(KgAgent::new(
        Arc::new(store),
        generator,
        AgentOptions::from_config(&config, paths.as_ref()),
    ));
    tracing::info!(?agent, "kg-agent server initialized");

    let addr = format!("{}:{}", config.server.bind, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("failed to bind {addr}: {e}");
            std::process::exit(1);
        });
    tracing::info!("kg-agent server listening on {addr}");

    if let Err(e) = axum::serve(listener, router(agent)).await {
        tracing::error!("server error: {e}");
        std::process::exit(1);
    }
}
