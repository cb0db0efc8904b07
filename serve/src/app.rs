//! Axum app: shared state, router, and liveness handlers.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::{middleware as axum_middleware, Json, Router};
use serde_json::{json, Value};

use boost::{Mapper, ModuleRegistry, SessionRegistry};
use config::BoostConfig;

use crate::{completions, events, middleware, models};

/// Process-wide wiring shared by every handler.
pub struct AppState {
    pub config: Arc<BoostConfig>,
    pub modules: Arc<ModuleRegistry>,
    pub mapper: Arc<Mapper>,
    pub sessions: Arc<SessionRegistry>,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(config: Arc<BoostConfig>, modules: Arc<ModuleRegistry>) -> Arc<Self> {
        let http = reqwest::Client::new();
        let mapper = Arc::new(Mapper::new(config.clone(), modules.clone(), http.clone()));
        Arc::new(Self {
            config,
            modules,
            mapper,
            sessions: Arc::new(SessionRegistry::new()),
            http,
        })
    }

    /// State resolved from the process environment.
    pub fn from_env() -> Arc<Self> {
        let config = Arc::new(BoostConfig::from_env());
        let modules = Arc::new(ModuleRegistry::builtin(&config));
        Self::new(config, modules)
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    // Bearer auth covers the OpenAI surface and the SSE listener route; the
    // WebSocket route and liveness endpoints stay open, as the original.
    let protected = Router::new()
        .route("/v1/models", get(models::list_models))
        .route("/v1/chat/completions", post(completions::chat_completions))
        .route("/events/:id", get(events::sse_events))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_api_key,
        ));

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/events/:id/ws", get(events::ws_events))
        .merge(protected)
        .layer(axum_middleware::from_fn(middleware::request_id))
        .with_state(state)
}

async fn root() -> Json<Value> {
    Json(json!({"status": "ok", "message": "Boost is running"}))
}

async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}
