//! Per-request session: upstream binding, the primary chat, the local tool
//! registry, and the emission pipeline.
//!
//! A session is built from the resolved request config, registers itself in
//! the [`SessionRegistry`](registry::SessionRegistry), runs its module in a
//! background task, and streams the primary queue back to the HTTP handler.
//! The upstream client half lives in [`upstream`].

mod pipeline;
pub mod registry;
mod upstream;

pub use upstream::CompletionOptions;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use futures::Stream;
use serde_json::{Map, Value};
use tracing::{debug, error};
use uuid::Uuid;

use config::BoostConfig;
use sse_wire::{
    write_sse_line, ChatCompletionChunk, ChunkChoice, Delta, DeltaToolCall, ListenerEvent,
};

use crate::chat::{Chat, Message};
use crate::error::BoostError;
use crate::format::{format_artifact, format_status};
use crate::module::ModuleRegistry;
use crate::tools::{LocalToolRegistry, ToolFn};

use pipeline::Pipeline;
use registry::SessionRegistry;

/// Reserved prefix for request parameters consumed by modules.
pub const BOOST_PARAM_PREFIX: &str = "@boost_";

const SYSTEM_FINGERPRINT: &str = "fp_boost";

fn now_epoch() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Inputs for a session, produced by the mapper from a client request.
#[derive(Debug, Clone)]
pub struct SessionInit {
    pub url: String,
    pub key: String,
    pub model: String,
    pub params: Map<String, Value>,
    pub messages: Vec<Message>,
    pub module: Option<String>,
}

/// Per-request state owning the upstream client, the primary emission
/// queue, and its listener queues.
pub struct Session {
    id: String,
    url: String,
    key: String,
    query: Vec<(String, String)>,
    model: String,
    module: Option<String>,
    params: Mutex<Map<String, Value>>,
    boost_params: Map<String, Value>,
    pub(crate) chat: tokio::sync::Mutex<Chat>,
    tools: Mutex<LocalToolRegistry>,
    pipeline: Pipeline,
    config: Arc<BoostConfig>,
    modules: Arc<ModuleRegistry>,
    http: reqwest::Client,
    chunk_seq: AtomicU64,
}

impl Session {
    pub fn new(
        init: SessionInit,
        config: Arc<BoostConfig>,
        modules: Arc<ModuleRegistry>,
        http: reqwest::Client,
    ) -> Result<Arc<Self>, BoostError> {
        let chat = Chat::from_conversation(&init.messages)?;
        let (params, boost_params) = split_params(&config.extra_llm_params, init.params);
        Ok(Arc::new(Self {
            id: Uuid::new_v4().to_string(),
            url: init.url,
            key: init.key,
            query: Vec::new(),
            model: init.model,
            module: init.module,
            params: Mutex::new(params),
            boost_params,
            chat: tokio::sync::Mutex::new(chat),
            tools: Mutex::new(LocalToolRegistry::new()),
            pipeline: Pipeline::new(),
            config,
            modules,
            http,
            chunk_seq: AtomicU64::new(0),
        }))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn module(&self) -> Option<&str> {
        self.module.as_deref()
    }

    pub fn config(&self) -> &BoostConfig {
        &self.config
    }

    /// Parameters stripped of the reserved prefix, exposed to modules.
    pub fn boost_params(&self) -> &Map<String, Value> {
        &self.boost_params
    }

    /// A forwarded request parameter, by key.
    pub fn param(&self, key: &str) -> Option<Value> {
        self.params
            .lock()
            .ok()
            .and_then(|params| params.get(key).cloned())
    }

    /// Sets a forwarded request parameter for subsequent upstream calls.
    pub fn set_param(&self, key: &str, value: Value) {
        if let Ok(mut params) = self.params.lock() {
            params.insert(key.to_string(), value);
        }
    }

    pub(crate) fn params_snapshot(&self) -> Map<String, Value> {
        self.params
            .lock()
            .map(|params| params.clone())
            .unwrap_or_default()
    }

    /// Snapshot of the primary chat history (root-first).
    pub async fn chat_history(&self) -> Vec<Message> {
        self.chat.lock().await.history()
    }

    /// Case-insensitive substring check over the primary chat.
    pub async fn chat_has_substring(&self, substring: &str) -> bool {
        self.chat.lock().await.has_substring(substring)
    }

    /// Runs a closure against the primary chat under its lock.
    pub async fn with_chat<R>(&self, f: impl FnOnce(&Chat) -> R) -> R {
        let chat = self.chat.lock().await;
        f(&chat)
    }

    // ---- local tools -------------------------------------------------

    /// Registers a request-scoped tool callable with its JSON-Schema
    /// parameters; duplicate registration is a programmer error.
    pub fn register_tool(
        &self,
        name: &str,
        description: &str,
        parameters: Value,
        func: ToolFn,
    ) -> Result<(), BoostError> {
        let mut tools = self
            .tools
            .lock()
            .map_err(|_| BoostError::DuplicateTool(name.to_string()))?;
        tools.set(name, description, parameters, func)
    }

    pub(crate) fn is_local_tool(&self, name: &str) -> bool {
        self.tools
            .lock()
            .map(|tools| tools.is_local(name))
            .unwrap_or(false)
    }

    pub(crate) fn lookup_tool(&self, name: &str) -> Result<ToolFn, BoostError> {
        self.tools
            .lock()
            .map_err(|_| BoostError::UnknownTool(name.to_string()))?
            .lookup(name)
    }

    pub(crate) fn tool_definitions(&self) -> Vec<Value> {
        self.tools
            .lock()
            .map(|tools| tools.definitions())
            .unwrap_or_default()
    }

    // ---- chunk minting -----------------------------------------------

    fn next_chunk_id(&self) -> String {
        let n = self.chunk_seq.fetch_add(1, Ordering::SeqCst) + 1;
        format!("chatcmpl-{n}")
    }

    pub(crate) fn chunk_from_delta(&self, delta: Delta) -> ChatCompletionChunk {
        ChatCompletionChunk {
            id: self.next_chunk_id(),
            object: ChatCompletionChunk::OBJECT.to_string(),
            created: now_epoch(),
            model: self.model.clone(),
            system_fingerprint: SYSTEM_FINGERPRINT.to_string(),
            choices: vec![ChunkChoice {
                index: 0,
                delta,
                finish_reason: None,
            }],
        }
    }

    pub(crate) fn chunk_from_message(&self, message: &str) -> ChatCompletionChunk {
        self.chunk_from_delta(Delta {
            role: Some("assistant".to_string()),
            content: Some(message.to_string()),
            tool_calls: None,
        })
    }

    pub(crate) fn chunk_from_tool_call(&self, call: DeltaToolCall) -> ChatCompletionChunk {
        self.chunk_from_delta(Delta {
            role: Some("assistant".to_string()),
            content: None,
            tool_calls: Some(vec![call]),
        })
    }

    // ---- emission ----------------------------------------------------

    /// Emits one pre-framed line to the primary queue and all listeners.
    pub fn emit_data(&self, line: String) {
        self.pipeline.emit(line);
    }

    pub fn emit_chunk(&self, chunk: &ChatCompletionChunk) {
        self.emit_data(write_sse_line(chunk));
    }

    pub(crate) fn emit_chunk_value(&self, chunk: &Value) {
        self.emit_data(write_sse_line(chunk));
    }

    /// Emits plain assistant text into the stream.
    pub fn emit_message(&self, message: &str) {
        let chunk = self.chunk_from_message(message);
        self.emit_chunk(&chunk);
    }

    /// Emits a status message rendered with the configured style.
    pub fn emit_status(&self, status: &str) {
        let formatted = format_status(self.config.status_style, status);
        self.emit_message(&formatted);
    }

    /// Emits an HTML artifact as a fenced code block.
    pub fn emit_artifact(&self, artifact: &str) {
        let formatted = format_artifact(artifact);
        self.emit_message(&formatted);
    }

    /// Emits a sideband event to listener queues only.
    pub fn emit_listener_event(&self, event: &str, data: Value) {
        let line = ListenerEvent::new(event, data).to_sse_line();
        self.pipeline.emit_to_listeners(line);
    }

    /// Emits the terminator and closes all queues.
    pub fn emit_done(&self) {
        self.pipeline.emit_done();
    }

    pub fn is_streaming(&self) -> bool {
        self.pipeline.is_streaming()
    }

    pub fn is_final_stream(&self) -> bool {
        self.pipeline.is_final_stream()
    }

    pub(crate) fn set_final_stream(&self) {
        self.pipeline.set_final_stream();
    }

    /// Attaches a fresh listener queue for a sideband consumer.
    pub fn listen(&self) -> impl Stream<Item = String> + Send + 'static {
        self.pipeline.listen()
    }

    /// The primary queue as the client-facing response stream, gated by the
    /// intermediate-output setting.
    pub fn response_stream(&self) -> impl Stream<Item = String> + Send + 'static {
        self.pipeline
            .primary_stream(self.config.intermediate_output)
    }

    // ---- serving -----------------------------------------------------

    /// Registers the session, spawns the module pipeline in a background
    /// task, and returns the primary response stream. The task emits the
    /// terminator and unregisters whether the module succeeds or fails.
    pub fn serve(
        self: Arc<Self>,
        sessions: &Arc<SessionRegistry>,
    ) -> impl Stream<Item = String> + Send + 'static {
        debug!("serving boosted session {}", self.id);
        sessions.register(self.clone());

        let session = self.clone();
        let sessions = sessions.clone();
        tokio::spawn(async move {
            let id = session.id().to_string();
            session.clone().run_module().await;
            session.emit_done();
            sessions.unregister(&id);
        });

        self.response_stream()
    }

    async fn run_module(self: Arc<Self>) {
        let result = match self.module.clone() {
            None => {
                debug!("no module specified, forwarding final stream");
                let mut chat = self.chat.lock().await;
                self.stream_final_completion(&mut chat, CompletionOptions::default())
                    .await
                    .map(|_| ())
            }
            Some(name) => match self.modules.get(&name) {
                Some(module) => {
                    debug!("applying '{}' to '{}'", name, self.model);
                    let mut chat = self.chat.lock().await;
                    module.apply(&mut chat, &self).await
                }
                None => Err(BoostError::UnknownModule(name)),
            },
        };

        if let Err(e) = result {
            error!(
                "module '{}' failed for session {}: {e}",
                self.module.as_deref().unwrap_or("<none>"),
                self.id
            );
        }
    }

    pub(crate) fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.url)
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub(crate) fn bearer_key(&self) -> &str {
        &self.key
    }

    pub(crate) fn query_params(&self) -> &[(String, String)] {
        &self.query
    }
}

/// Splits request parameters into forwarded params (with the configured
/// extras merged underneath) and the reserved `@boost_` map exposed to
/// modules.
fn split_params(
    extra: &Map<String, Value>,
    params: Map<String, Value>,
) -> (Map<String, Value>, Map<String, Value>) {
    let mut forwarded = extra.clone();
    let mut boost = Map::new();
    for (key, value) in params {
        if let Some(stripped) = key.strip_prefix(BOOST_PARAM_PREFIX) {
            boost.insert(stripped.to_string(), value);
        } else {
            forwarded.insert(key, value);
        }
    }
    (forwarded, boost)
}
