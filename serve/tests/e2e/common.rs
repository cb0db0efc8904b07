//! Shared harness: mock OpenAI upstream + boost server on ephemeral ports.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use boost::{BoostError, Chat, CompletionOptions, Module, ModuleRegistry, Session};

/// A fake OpenAI-compatible backend serving one model (`llama3`).
pub struct MockUpstream {
    pub addr: SocketAddr,
    /// Captured `/chat/completions` request bodies, in order.
    pub requests: Arc<Mutex<Vec<Value>>>,
}

struct MockState {
    requests: Arc<Mutex<Vec<Value>>>,
    calls: AtomicUsize,
    /// When true, the first streaming call answers with a split
    /// `set_temperature` tool call instead of content.
    tool_call_first: bool,
}

pub async fn spawn_mock_upstream(tool_call_first: bool) -> MockUpstream {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let state = Arc::new(MockState {
        requests: requests.clone(),
        calls: AtomicUsize::new(0),
        tool_call_first,
    });
    let app = Router::new()
        .route("/v1/models", get(list_models))
        .route("/v1/chat/completions", post(chat_completions))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    MockUpstream { addr, requests }
}

async fn list_models() -> Json<Value> {
    Json(json!({
        "object": "list",
        "data": [{"id": "llama3", "object": "model", "owned_by": "library"}]
    }))
}

fn content_chunk(content: &str) -> String {
    let chunk = json!({
        "id": "chatcmpl-up",
        "object": "chat.completion.chunk",
        "created": 1_700_000_000,
        "model": "llama3",
        "choices": [{
            "index": 0,
            "delta": {"role": "assistant", "content": content},
            "finish_reason": null
        }]
    });
    format!("data: {chunk}\n\n")
}

fn finish_chunk(reason: &str) -> String {
    let chunk = json!({
        "id": "chatcmpl-up",
        "object": "chat.completion.chunk",
        "created": 1_700_000_000,
        "model": "llama3",
        "choices": [{"index": 0, "delta": {}, "finish_reason": reason}]
    });
    format!("data: {chunk}\n\n")
}

fn tool_chunk(call: Value) -> String {
    let chunk = json!({
        "id": "chatcmpl-up",
        "object": "chat.completion.chunk",
        "created": 1_700_000_000,
        "model": "llama3",
        "choices": [{
            "index": 0,
            "delta": {"role": "assistant", "tool_calls": [call]},
            "finish_reason": null
        }]
    });
    format!("data: {chunk}\n\n")
}

async fn chat_completions(State(state): State<Arc<MockState>>, body: Bytes) -> Response {
    let body: Value = serde_json::from_slice(&body).unwrap();
    state.requests.lock().unwrap().push(body.clone());
    let call_index = state.calls.fetch_add(1, Ordering::SeqCst);

    if !body["stream"].as_bool().unwrap_or(false) {
        return Json(json!({
            "id": "cmpl-up",
            "object": "chat.completion",
            "created": 1_700_000_000,
            "model": "llama3",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "upstream says hi"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 1, "completion_tokens": 2, "total_tokens": 3}
        }))
        .into_response();
    }

    let mut sse = String::new();
    if state.tool_call_first && call_index == 0 {
        sse.push_str(&tool_chunk(json!({
            "index": 0,
            "id": "call_1",
            "type": "function",
            "function": {"name": "boost_lt_set_temperature", "arguments": "{\"temperature\""}
        })));
        sse.push_str(&tool_chunk(json!({
            "index": 0,
            "function": {"arguments": ": 0.2, \"reason\""}
        })));
        sse.push_str(&tool_chunk(json!({
            "index": 0,
            "function": {"arguments": ": \"testing\"}"}
        })));
        sse.push_str(&finish_chunk("tool_calls"));
    } else {
        for piece in ["x", "y", "z"] {
            sse.push_str(&content_chunk(piece));
        }
        sse.push_str(&finish_chunk("stop"));
    }
    sse.push_str("data: [DONE]\n\n");

    ([(header::CONTENT_TYPE, "text/event-stream")], sse).into_response()
}

/// A running boost server bound to an ephemeral port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub state: Arc<serve::AppState>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }
}

pub async fn spawn_boost(
    upstream: SocketAddr,
    configure: impl FnOnce(&mut config::BoostConfig),
    extra_modules: Vec<Arc<dyn Module>>,
) -> TestServer {
    let mut cfg = config::BoostConfig::from_env();
    cfg.backends = vec![config::Backend {
        url: format!("http://{upstream}/v1"),
        key: "sk-upstream".to_string(),
    }];
    configure(&mut cfg);
    let config = Arc::new(cfg);

    let mut modules = ModuleRegistry::builtin(&config);
    for module in extra_modules {
        modules.register(module);
    }
    let state = serve::AppState::new(config, Arc::new(modules));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server_state = state.clone();
    tokio::spawn(async move {
        serve::run_serve_on_listener(listener, server_state)
            .await
            .unwrap();
    });
    TestServer { addr, state }
}

/// Emits two statuses, then streams the final completion.
pub struct StatusesModule;

#[async_trait::async_trait]
impl Module for StatusesModule {
    fn name(&self) -> &'static str {
        "statuses"
    }

    fn id_prefix(&self) -> &'static str {
        "st"
    }

    async fn apply(&self, chat: &mut Chat, session: &Arc<Session>) -> Result<(), BoostError> {
        session.emit_status("STATUS_A");
        session.emit_status("STATUS_B");
        session
            .stream_final_completion(chat, CompletionOptions::default())
            .await?;
        Ok(())
    }
}

/// Waits before emitting so a sideband listener can attach first.
pub struct SlowModule;

#[async_trait::async_trait]
impl Module for SlowModule {
    fn name(&self) -> &'static str {
        "slow"
    }

    fn id_prefix(&self) -> &'static str {
        "slow"
    }

    async fn apply(&self, chat: &mut Chat, session: &Arc<Session>) -> Result<(), BoostError> {
        tokio::time::sleep(Duration::from_millis(600)).await;
        session.emit_status("EARLY");
        session
            .stream_final_completion(chat, CompletionOptions::default())
            .await?;
        Ok(())
    }
}

/// Polls the registry until the in-flight session shows up.
pub async fn wait_for_session(state: &serve::AppState) -> String {
    for _ in 0..200 {
        let ids = state.sessions.ids();
        if let Some(id) = ids.first() {
            return id.clone();
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("no session registered within 2s");
}
