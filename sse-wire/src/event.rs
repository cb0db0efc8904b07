//! Listener-event envelope for sideband consumers.
//!
//! Listener events are additive JSON envelopes carried only on listener
//! queues (SSE `/events/{id}` and the WebSocket variant); the primary
//! response stream never contains them. Consumers must tolerate their
//! presence alongside regular completion chunks.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::lines::write_sse_line;

/// Envelope `{object: "boost.listener.event", event, data}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenerEvent {
    pub object: String,
    pub event: String,
    pub data: Value,
}

impl ListenerEvent {
    pub const OBJECT: &'static str = "boost.listener.event";

    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            object: Self::OBJECT.to_string(),
            event: event.into(),
            data,
        }
    }

    /// Frames this event as a `data: <json>\n\n` line.
    pub fn to_sse_line(&self) -> String {
        write_sse_line(self)
    }
}
