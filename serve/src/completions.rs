//! `POST /v1/chat/completions`: the boosted completion flow.
//!
//! Parse → refresh the mapper → resolve the backend binding → build the
//! session. Direct UI tasks pass straight through to the backend; everything
//! else runs the module pipeline and streams (or aggregates) the session's
//! primary queue.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::{Stream, StreamExt};
use serde_json::{json, Value};
use tracing::debug;

use boost::{BoostError, CompletionOptions, Session};
use sse_wire::ChatCompletionRequest;

use crate::app::AppState;

pub async fn chat_completions(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let request: ChatCompletionRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            debug!("invalid JSON in request body: {e}");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "Invalid JSON in request body"})),
            )
                .into_response();
        }
    };

    // Refresh downstream models so we know where to route the request.
    state.mapper.list_downstream().await;

    let init = match state.mapper.resolve_request_config(&request).await {
        Ok(init) => init,
        Err(e) => return error_response(&e),
    };
    let session = match Session::new(
        init,
        state.config.clone(),
        state.modules.clone(),
        state.http.clone(),
    ) {
        Ok(session) => session,
        Err(e) => return error_response(&e),
    };

    // A few UI workflows are delegated to the underlying model as-is.
    let direct = session
        .with_chat(|chat| state.mapper.is_direct_task(chat))
        .await;
    if direct {
        debug!("detected direct task, skipping boost");
        return match session.session_completion(CompletionOptions::default()).await {
            Ok(value) => Json(value).into_response(),
            Err(e) => error_response(&e),
        };
    }

    let stream = session.clone().serve(&state.sessions);
    if request.stream {
        sse_response(stream)
    } else {
        match session.consume_stream(stream).await {
            Some(value) => Json(value).into_response(),
            None => Json(Value::Null).into_response(),
        }
    }
}

/// Wraps a stream of pre-framed `data:` lines as a `text/event-stream`
/// response body.
pub(crate) fn sse_response<S>(stream: S) -> Response
where
    S: Stream<Item = String> + Send + 'static,
{
    let body = Body::from_stream(stream.map(Ok::<_, Infallible>));
    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response()
}

pub(crate) fn error_response(error: &BoostError) -> Response {
    let status = match error {
        BoostError::MissingModel | BoostError::EmptyConversation | BoostError::Parse(_) => {
            StatusCode::BAD_REQUEST
        }
        BoostError::UnknownModel(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({"error": error.to_string()}))).into_response()
}
