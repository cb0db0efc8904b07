//! Upstream chat-completion client: non-streaming calls, SSE streaming with
//! tool-call reassembly and local dispatch, and stream aggregation.
//!
//! The streaming path emits every non-tool-call chunk into the session's
//! pipeline as it arrives. Tool-call deltas are accumulated per `index`;
//! when the stream finishes with `finish_reason: "tool_calls"` (or ends with
//! no content while calls are pending), local tools are executed and the
//! upstream call is re-issued with the updated chat, while unknown tools are
//! forwarded to the client as an assembled chunk.

use std::collections::BTreeMap;

use futures::{pin_mut, Stream, StreamExt};
use serde_json::{json, Map, Value};
use tracing::{debug, error, info};

use sse_wire::{data_payload, DeltaToolCall, DeltaToolCallFunction, SseLineReader, SsePayload};

use crate::chat::{Chat, Message};
use crate::error::BoostError;

use super::Session;

/// Options for one upstream call; the Rust face of the original's kwargs.
#[derive(Debug, Clone, Default)]
pub struct CompletionOptions {
    /// Extra body parameters for this call, merged over the session's.
    pub params: Map<String, Value>,
    /// JSON Schema for structured output; sent as `response_format`.
    pub schema: Option<Value>,
    /// Model override for this call.
    pub model: Option<String>,
    /// When true, `chat_completion` returns the parsed content instead of
    /// the raw response object.
    pub resolve: bool,
}

impl CompletionOptions {
    pub fn with_params(mut self, params: Map<String, Value>) -> Self {
        self.params = params;
        self
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn resolved(mut self) -> Self {
        self.resolve = true;
        self
    }
}

impl Session {
    fn resolve_request_params(&self, opts: &CompletionOptions) -> Map<String, Value> {
        let mut params = Map::new();
        params.insert(
            "model".to_string(),
            Value::String(opts.model.clone().unwrap_or_else(|| self.model().to_string())),
        );
        for (key, value) in self.params_snapshot() {
            params.insert(key, value);
        }
        for (key, value) in &opts.params {
            params.insert(key.clone(), value.clone());
        }
        if let Some(schema) = &opts.schema {
            params.insert(
                "response_format".to_string(),
                json!({
                    "type": "json_schema",
                    "json_schema": {
                        "name": "StructuredResponseSchema",
                        "schema": schema,
                    }
                }),
            );
        }
        params
    }

    fn build_body(&self, history: &[Message], params: &Map<String, Value>, stream: bool) -> Value {
        let mut body = params.clone();
        body.insert(
            "messages".to_string(),
            serde_json::to_value(history).unwrap_or_else(|_| Value::Array(Vec::new())),
        );
        body.insert("stream".to_string(), Value::Bool(stream));
        if stream {
            body.insert("stream_options".to_string(), json!({"include_usage": true}));
            let definitions = self.tool_definitions();
            if !definitions.is_empty() {
                let mut tools = body
                    .get("tools")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                tools.extend(definitions);
                body.insert("tools".to_string(), Value::Array(tools));
            }
        }
        Value::Object(body)
    }

    async fn post_upstream(&self, body: &Value) -> Result<reqwest::Response, BoostError> {
        let response = self
            .http()
            .post(self.endpoint())
            .bearer_auth(self.bearer_key())
            .query(self.query_params())
            .json(body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BoostError::upstream_status(status, body));
        }
        Ok(response)
    }

    /// Non-streaming completion over explicit messages. With `resolve`, the
    /// parsed content is returned instead of the raw response object. Does
    /// not run the tool-execution loop.
    pub async fn chat_completion(
        &self,
        messages: Vec<Message>,
        opts: CompletionOptions,
    ) -> Result<Value, BoostError> {
        let params = self.resolve_request_params(&opts);
        let body = self.build_body(&messages, &params, false);
        debug!("chat completion against '{}'", self.endpoint());

        let response = self.post_upstream(&body).await?;
        let value: Value = response.json().await?;
        if opts.resolve {
            response_content(&params, &value)
        } else {
            Ok(value)
        }
    }

    /// Non-streaming completion over a single formatted user prompt.
    pub async fn chat_completion_prompt(
        &self,
        prompt: impl Into<String>,
        opts: CompletionOptions,
    ) -> Result<Value, BoostError> {
        self.chat_completion(vec![Message::new("user", prompt)], opts)
            .await
    }

    /// Non-streaming completion over the session's own chat (pass-through).
    pub async fn session_completion(&self, opts: CompletionOptions) -> Result<Value, BoostError> {
        let history = self.chat_history().await;
        self.chat_completion(history, opts).await
    }

    /// Streaming completion over `chat`, emitting every non-tool-call chunk
    /// through the pipeline. Returns the fully accumulated text. Local tool
    /// calls are executed against `chat` and the upstream call re-issued;
    /// unknown tool calls are forwarded to the client and end the call.
    pub async fn stream_chat_completion(
        &self,
        chat: &mut Chat,
        opts: CompletionOptions,
    ) -> Result<String, BoostError> {
        let mut result = String::new();
        let mut assembler = ToolCallAssembler::new();

        loop {
            // Re-resolved per iteration so parameter changes made by local
            // tools apply to the re-issued call.
            let params = self.resolve_request_params(&opts);
            let body = self.build_body(&chat.history(), &params, true);
            let response = self.post_upstream(&body).await?;

            let mut end_of_stream = false;
            let mut current_content = String::new();
            let mut reader = SseLineReader::new();
            let bytes_stream = response.bytes_stream();
            pin_mut!(bytes_stream);

            while let Some(item) = bytes_stream.next().await {
                let bytes = item?;
                reader.push(&bytes);
                while let Some(payload) = reader.next_payload() {
                    let data = match payload {
                        SsePayload::Done => {
                            end_of_stream = true;
                            continue;
                        }
                        SsePayload::Data(data) => data,
                    };
                    let parsed: Value = match serde_json::from_str(&data) {
                        Ok(value) => value,
                        Err(e) => {
                            error!("failed to parse chunk: \"{data}\": {e}");
                            continue;
                        }
                    };

                    if finish_reason(&parsed) == Some("tool_calls") {
                        end_of_stream = true;
                    }

                    let content = chunk_content(&parsed);
                    if !content.is_empty() {
                        current_content.push_str(content);
                        result.push_str(content);
                    }

                    if let Some(delta_call) = first_tool_call(&parsed) {
                        debug!("tool call chunk: {parsed}");
                        assembler.push(delta_call);
                    } else {
                        self.emit_chunk_value(&parsed);
                    }
                }
            }

            if assembler.has_calls() && (end_of_stream || current_content.is_empty()) {
                for call in assembler.take() {
                    let name = call.name.clone().unwrap_or_default();

                    if !self.is_local_tool(&name) {
                        // Passing control back to the client.
                        let chunk = self.chunk_from_tool_call(call.to_delta());
                        self.emit_chunk(&chunk);
                        return Ok(result);
                    }

                    let args = parse_tool_args(&call.arguments);
                    let call_id = call.id.clone().unwrap_or_default();
                    chat.tool_call(call.to_value());

                    match self.call_local_tool(&name, args).await {
                        Ok(output) => {
                            info!("called local tool '{name}'");
                            chat.tool(&call_id, output);
                        }
                        Err(e) => {
                            error!("tool '{name}' failed: {e}");
                            chat.tool(&call_id, format!("Error: {e}"));
                        }
                    }
                }
                assembler = ToolCallAssembler::new();
                continue;
            }

            break;
        }

        Ok(result)
    }

    /// Streaming completion over a single formatted user prompt.
    pub async fn stream_prompt_completion(
        &self,
        prompt: impl Into<String>,
        opts: CompletionOptions,
    ) -> Result<String, BoostError> {
        let mut chat = Chat::from_prompt(prompt);
        self.stream_chat_completion(&mut chat, opts).await
    }

    /// Marks the session's final stream and runs a streaming completion;
    /// final-stream chunks always pass the emission gate.
    pub async fn stream_final_completion(
        &self,
        chat: &mut Chat,
        opts: CompletionOptions,
    ) -> Result<String, BoostError> {
        self.set_final_stream();
        self.stream_chat_completion(chat, opts).await
    }

    /// Final-stream variant over a single prompt.
    pub async fn stream_final_prompt_completion(
        &self,
        prompt: impl Into<String>,
        opts: CompletionOptions,
    ) -> Result<String, BoostError> {
        self.set_final_stream();
        self.stream_prompt_completion(prompt, opts).await
    }

    /// Runs a non-streaming completion against the upstream and appends the
    /// response as an assistant turn. Returns the raw response object.
    pub async fn advance(&self, chat: &mut Chat) -> Result<Value, BoostError> {
        let response = self
            .chat_completion(chat.history(), CompletionOptions::default())
            .await?;
        let content = response["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        chat.assistant(content);
        Ok(response)
    }

    /// Streaming variant of [`advance`](Session::advance): emits chunks and
    /// appends the accumulated text as an assistant turn.
    pub async fn emit_advance(&self, chat: &mut Chat) -> Result<String, BoostError> {
        let text = self
            .stream_chat_completion(chat, CompletionOptions::default())
            .await?;
        chat.assistant(text.clone());
        Ok(text)
    }

    async fn call_local_tool(&self, name: &str, args: Value) -> Result<String, BoostError> {
        let func = self.lookup_tool(name)?;
        func(args).await
    }

    /// Aggregates a stream of pre-framed SSE lines into a single
    /// non-streaming completion object, or `None` when no chunk arrived.
    pub async fn consume_stream<S>(&self, stream: S) -> Option<Value>
    where
        S: Stream<Item = String>,
    {
        pin_mut!(stream);
        let mut output: Option<Value> = None;
        let mut content = String::new();
        let mut tool_calls: Vec<Value> = Vec::new();

        while let Some(line) = stream.next().await {
            let Some(SsePayload::Data(data)) = data_payload(&line) else {
                continue;
            };
            let Ok(chunk) = serde_json::from_str::<Value>(&data) else {
                continue;
            };
            let has_choices = chunk["choices"]
                .as_array()
                .is_some_and(|choices| !choices.is_empty());
            if output.is_none() && has_choices {
                output = Some(self.output_from_chunk(&chunk));
            }
            content.push_str(chunk_content(&chunk));
            if let Some(calls) = chunk["choices"][0]["delta"]["tool_calls"].as_array() {
                tool_calls.extend(calls.iter().cloned());
            }
        }

        let mut output = output?;
        output["choices"][0]["message"]["content"] = Value::String(content);
        if !tool_calls.is_empty() {
            output["choices"][0]["message"]["tool_calls"] = Value::Array(tool_calls);
            output["choices"][0]["finish_reason"] = Value::String("tool_calls".to_string());
        }
        Some(output)
    }

    fn output_from_chunk(&self, chunk: &Value) -> Value {
        let choices: Vec<Value> = chunk["choices"]
            .as_array()
            .map(|choices| {
                choices
                    .iter()
                    .map(|choice| {
                        json!({
                            "index": choice.get("index").cloned().unwrap_or(json!(0)),
                            "message": {
                                "role": choice["delta"].get("role").and_then(Value::as_str).unwrap_or("assistant"),
                                "content": choice["delta"].get("content").and_then(Value::as_str).unwrap_or(""),
                            },
                            "finish_reason": Value::Null,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        json!({
            "id": chunk.get("id").cloned().unwrap_or(json!("chatcmpl-0")),
            "object": "chat.completion",
            "created": chunk.get("created").cloned().unwrap_or(json!(0)),
            "model": self.model(),
            "system_fingerprint": "fp_boost",
            "choices": choices,
            "usage": {
                "prompt_tokens": 0,
                "completion_tokens": 0,
                "total_tokens": 0,
            }
        })
    }
}

/// Extracts the parsed content of a non-streaming response; when the
/// request asked for JSON output, the content string is parsed first.
pub fn response_content(
    params: &Map<String, Value>,
    response: &Value,
) -> Result<Value, BoostError> {
    let content = response["choices"][0]["message"]["content"]
        .as_str()
        .unwrap_or_default();

    let format_type = params
        .get("response_format")
        .and_then(|rf| rf.get("type"))
        .and_then(Value::as_str);
    if matches!(format_type, Some("json") | Some("json_schema")) {
        return Ok(serde_json::from_str(content)?);
    }
    Ok(Value::String(content.to_string()))
}

fn finish_reason(chunk: &Value) -> Option<&str> {
    chunk["choices"][0]["finish_reason"].as_str()
}

fn chunk_content(chunk: &Value) -> &str {
    chunk["choices"][0]["delta"]["content"]
        .as_str()
        .unwrap_or_default()
}

fn first_tool_call(chunk: &Value) -> Option<&Value> {
    chunk["choices"][0]["delta"]["tool_calls"]
        .as_array()
        .filter(|calls| !calls.is_empty())
        .map(|calls| &calls[0])
}

/// Arguments parse with the raw-string fallback for malformed JSON.
fn parse_tool_args(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return json!({});
    }
    match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(_) => {
            error!("invalid JSON in tool call arguments: {raw}");
            json!({"query": raw})
        }
    }
}

/// One reassembled tool call.
#[derive(Debug, Clone)]
struct PendingToolCall {
    index: u32,
    id: Option<String>,
    call_type: String,
    name: Option<String>,
    arguments: String,
}

impl PendingToolCall {
    fn to_value(&self) -> Value {
        json!({
            "id": self.id.clone().unwrap_or_default(),
            "type": self.call_type,
            "function": {
                "name": self.name.clone().unwrap_or_default(),
                "arguments": self.arguments,
            }
        })
    }

    fn to_delta(&self) -> DeltaToolCall {
        DeltaToolCall {
            index: self.index,
            id: self.id.clone(),
            call_type: Some(self.call_type.clone()),
            function: Some(DeltaToolCallFunction {
                name: self.name.clone(),
                arguments: Some(self.arguments.clone()),
            }),
        }
    }
}

/// Accumulates tool-call deltas per `index`: the first non-empty id is
/// sticky (with the stream's first id as fallback), the first non-empty
/// name wins, arguments concatenate in arrival order.
#[derive(Default)]
struct ToolCallAssembler {
    calls: BTreeMap<u32, PendingToolCall>,
    first_id: Option<String>,
}

impl ToolCallAssembler {
    fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, delta: &Value) {
        let index = delta.get("index").and_then(Value::as_u64).unwrap_or(0) as u32;
        let id = delta
            .get("id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .map(str::to_string);
        if self.first_id.is_none() {
            self.first_id = id.clone();
        }

        let entry = self.calls.entry(index).or_insert_with(|| PendingToolCall {
            index,
            id: None,
            call_type: delta
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("function")
                .to_string(),
            name: None,
            arguments: String::new(),
        });

        if entry.id.is_none() {
            entry.id = id.or_else(|| self.first_id.clone());
        }
        if entry.name.as_deref().unwrap_or("").is_empty() {
            if let Some(name) = delta["function"]["name"].as_str().filter(|n| !n.is_empty()) {
                entry.name = Some(name.to_string());
            }
        }
        if let Some(arguments) = delta["function"]["arguments"].as_str() {
            entry.arguments.push_str(arguments);
        }
    }

    fn has_calls(&self) -> bool {
        !self.calls.is_empty()
    }

    fn take(&mut self) -> Vec<PendingToolCall> {
        std::mem::take(&mut self.calls).into_values().collect()
    }
}
