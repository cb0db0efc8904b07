//! `data: <json>` line framing for SSE bodies.
//!
//! The reader side buffers raw bytes until a newline is seen, so partial
//! lines persist across network reads; the writer side frames one JSON
//! payload per event. Comment lines (`:` prefix) and blank lines are
//! skipped per the SSE grammar.

use serde::Serialize;

/// The stream terminator, as framed on the wire.
pub const DONE_LINE: &str = "data: [DONE]\n\n";

/// Serializes a payload to a single SSE line: `data: <JSON>\n\n`.
pub fn write_sse_line<T: Serialize>(payload: &T) -> String {
    let json = serde_json::to_string(payload).expect("payload serialization is infallible");
    format!("data: {json}\n\n")
}

/// Classified content of one SSE line.
#[derive(Debug, PartialEq, Eq)]
pub enum SsePayload {
    /// The literal `[DONE]` marker.
    Done,
    /// The raw payload of a `data:` line, still unparsed.
    Data(String),
}

/// Incremental line reader over a byte stream.
///
/// Push each network read with [`push`](SseLineReader::push), then drain
/// complete payloads with [`next_payload`](SseLineReader::next_payload).
/// Bytes after the last newline stay buffered for the next push.
#[derive(Default)]
pub struct SseLineReader {
    buf: Vec<u8>,
}

impl SseLineReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Returns the next complete payload, or `None` when no full line is
    /// buffered. Blank lines, comments, and non-`data:` lines are consumed
    /// silently.
    pub fn next_payload(&mut self) -> Option<SsePayload> {
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line[..line.len() - 1]);
            let line = line.trim();

            if line.is_empty() || line.starts_with(':') {
                continue;
            }
            let Some(rest) = line.strip_prefix("data:") else {
                continue;
            };
            let rest = rest.trim();
            if rest == "[DONE]" {
                return Some(SsePayload::Done);
            }
            return Some(SsePayload::Data(rest.to_string()));
        }
        None
    }
}

/// Extracts the payload of an already-complete SSE line, if it carries one.
///
/// Used when re-reading the proxy's own pre-framed lines (e.g. aggregation
/// of the primary queue), where buffering is not needed.
pub fn data_payload(line: &str) -> Option<SsePayload> {
    let line = line.trim();
    if line.is_empty() || line.starts_with(':') {
        return None;
    }
    let rest = line.strip_prefix("data:")?.trim();
    if rest == "[DONE]" {
        return Some(SsePayload::Done);
    }
    Some(SsePayload::Data(rest.to_string()))
}
