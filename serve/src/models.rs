//! `GET /v1/models`: the synthetic catalog.
//!
//! Advertises the cross-product of enabled modules and downstream models,
//! optionally including the un-boosted base models, filtered by the
//! configured model filter.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};
use tracing::debug;

use boost::{matches_filter, Mapper};

use crate::app::AppState;

pub async fn list_models(State(state): State<Arc<AppState>>) -> Json<Value> {
    let downstream = state.mapper.list_downstream().await;
    let should_filter = !state.config.model_filter.is_empty();

    let mut candidates = Vec::new();
    for model in &downstream {
        if state.config.serve_base_models {
            candidates.push(model.clone());
        }
        for module in state.modules.modules() {
            candidates.push(Mapper::get_proxy_model(module.as_ref(), model));
        }
    }

    let data: Vec<Value> = candidates
        .into_iter()
        .filter(|model| {
            if !should_filter {
                return true;
            }
            model
                .as_object()
                .is_some_and(|obj| matches_filter(obj, &state.config.model_filter))
        })
        .collect();

    debug!("serving {} models in the API", data.len());
    Json(json!({"object": "list", "data": data}))
}
