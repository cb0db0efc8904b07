//! Chat-completion request DTOs.
//!
//! Parses incoming POST bodies for `/v1/chat/completions`. Everything the
//! client sends besides `model`, `messages`, and `stream` is collected into
//! an open [`extra`](ChatCompletionRequest::extra) map and forwarded as
//! request parameters; reserved `@boost_`-prefixed keys are split out later
//! by the session.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Chat completion request body (OpenAI-compatible).
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionRequest {
    /// Synthetic or plain model id; resolved by the mapper.
    pub model: String,
    /// Conversation so far, root-first.
    #[serde(default)]
    pub messages: Vec<RequestMessage>,
    /// When true, the response is streamed as SSE; otherwise aggregated.
    #[serde(default)]
    pub stream: bool,
    /// All remaining body keys (temperature, top_p, tools, `@boost_*`, ...),
    /// forwarded as-is except for the reserved prefix.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A single message in the request.
///
/// Content can be a string or an array of parts (OpenAI multimodal); both
/// are accepted and flattened to text via [`MessageContent::as_text`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestMessage {
    pub role: String,
    pub content: Option<MessageContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Value>,
}

/// Message content: plain string or an array of parts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    String(String),
    Array(Vec<ContentPart>),
}

impl MessageContent {
    /// The text of this content: the string variant as-is, or concatenation
    /// of all `text` fields from array parts. Other part types are skipped.
    pub fn as_text(&self) -> String {
        match self {
            MessageContent::String(s) => s.clone(),
            MessageContent::Array(parts) => parts
                .iter()
                .filter_map(|p| p.text.as_deref())
                .collect::<Vec<_>>()
                .join(""),
        }
    }
}

/// One part of a multimodal content array.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentPart {
    #[serde(rename = "type")]
    pub part_type: Option<String>,
    pub text: Option<String>,
}
