//! OpenAI-compatible SSE wire shapes.
//!
//! This crate defines the wire-level types shared by the proxy's client and
//! server sides: chat-completion request/chunk/response DTOs, `data: <json>`
//! line framing, and the `boost.listener.event` envelope used on sideband
//! channels. It does not depend on HTTP; callers feed bytes and consume lines.

pub mod chunk;
pub mod event;
pub mod lines;
pub mod request;

pub use chunk::{
    ChatCompletion, ChatCompletionChunk, ChunkChoice, CompletionChoice, CompletionMessage,
    CompletionUsage, Delta, DeltaToolCall, DeltaToolCallFunction,
};
pub use event::ListenerEvent;
pub use lines::{data_payload, write_sse_line, SseLineReader, SsePayload, DONE_LINE};
pub use request::{ChatCompletionRequest, MessageContent, RequestMessage};
