//! Sideband listener routes: `GET /events/{id}` (SSE) and
//! `GET /events/{id}/ws` (WebSocket).
//!
//! Both attach a fresh listener queue to a live session. The SSE route
//! streams the queue's pre-framed lines; the WebSocket route forwards each
//! payload as a JSON text frame and feeds inbound frames back into the
//! session as `websocket.message` listener events. Unknown session ids get
//! a 404 (the WebSocket variant closes with a short reason).

use std::sync::Arc;

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tracing::debug;

use boost::Session;
use sse_wire::{data_payload, SsePayload};

use crate::app::AppState;
use crate::completions::sse_response;

pub async fn sse_events(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    let Some(session) = state.sessions.get(&id) else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "Event not found"})),
        )
            .into_response();
    };
    sse_response(session.listen())
}

pub async fn ws_events(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(session) = state.sessions.get(&id) else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "Event not found"})),
        )
            .into_response();
    };
    ws.on_upgrade(move |socket| handle_socket(socket, session))
}

async fn handle_socket(socket: WebSocket, session: Arc<Session>) {
    let (mut sender, mut receiver) = socket.split();
    let mut listener = Box::pin(session.listen());

    loop {
        tokio::select! {
            line = listener.next() => {
                let Some(line) = line else { break };
                match data_payload(&line) {
                    Some(SsePayload::Data(payload)) => {
                        if sender.send(WsMessage::Text(payload)).await.is_err() {
                            break;
                        }
                    }
                    Some(SsePayload::Done) => break,
                    None => {}
                }
            }
            inbound = receiver.next() => {
                match inbound {
                    Some(Ok(WsMessage::Text(text))) => {
                        match serde_json::from_str::<Value>(&text) {
                            Ok(value) => session.emit_listener_event("websocket.message", value),
                            Err(e) => debug!("ignoring non-JSON websocket message: {e}"),
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    let _ = sender.close().await;
}
