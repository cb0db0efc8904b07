//! Per-session emission pipeline: one primary queue feeding the HTTP
//! response plus any number of listener queues for sideband consumers.
//!
//! Every emit fans out to all queues. Primary items are tagged at emit time
//! with whether the session was in its final stream, so the intermediate
//! output gate filters deterministically at the consumer. Listener queues
//! are never gated. The terminator is always forwarded.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use futures::future::ready;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_stream::wrappers::UnboundedReceiverStream;

use sse_wire::DONE_LINE;

/// `None` is the close sentinel; the bool records the final-stream flag at
/// emission time.
type PrimaryItem = Option<(String, bool)>;
type ListenerItem = Option<String>;

pub(crate) struct Pipeline {
    primary_tx: UnboundedSender<PrimaryItem>,
    primary_rx: Mutex<Option<UnboundedReceiver<PrimaryItem>>>,
    listeners: Mutex<Vec<UnboundedSender<ListenerItem>>>,
    streaming: AtomicBool,
    final_stream: AtomicBool,
    done: AtomicBool,
}

impl Pipeline {
    pub fn new() -> Self {
        let (primary_tx, primary_rx) = mpsc::unbounded_channel();
        Self {
            primary_tx,
            primary_rx: Mutex::new(Some(primary_rx)),
            listeners: Mutex::new(Vec::new()),
            streaming: AtomicBool::new(false),
            final_stream: AtomicBool::new(false),
            done: AtomicBool::new(false),
        }
    }

    /// Emits one pre-framed line to the primary queue and all listeners.
    pub fn emit(&self, line: String) {
        self.streaming.store(true, Ordering::SeqCst);
        let is_final = self.final_stream.load(Ordering::SeqCst);
        let _ = self.primary_tx.send(Some((line.clone(), is_final)));
        self.emit_to_listeners(line);
    }

    /// Emits to listener queues only (listener events never reach the
    /// primary). Dead listeners are dropped.
    pub fn emit_to_listeners(&self, line: String) {
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.retain(|tx| tx.send(Some(line.clone())).is_ok());
        }
    }

    /// Emits the terminator and closes every queue. Idempotent.
    pub fn emit_done(&self) {
        if self.done.swap(true, Ordering::SeqCst) {
            return;
        }
        // The terminator always passes the gate.
        let _ = self.primary_tx.send(Some((DONE_LINE.to_string(), true)));
        let _ = self.primary_tx.send(None);
        if let Ok(mut listeners) = self.listeners.lock() {
            for tx in listeners.drain(..) {
                let _ = tx.send(Some(DONE_LINE.to_string()));
                let _ = tx.send(None);
            }
        }
        self.streaming.store(false, Ordering::SeqCst);
    }

    pub fn set_final_stream(&self) {
        self.final_stream.store(true, Ordering::SeqCst);
    }

    pub fn is_final_stream(&self) -> bool {
        self.final_stream.load(Ordering::SeqCst)
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming.load(Ordering::SeqCst)
    }

    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::SeqCst)
    }

    /// Attaches a fresh listener queue. A listener attached after the
    /// terminator receives nothing and its stream ends immediately.
    pub fn listen(&self) -> impl Stream<Item = String> + Send + 'static {
        let (tx, rx) = mpsc::unbounded_channel();
        if !self.is_done() {
            if let Ok(mut listeners) = self.listeners.lock() {
                listeners.push(tx);
            }
        }
        UnboundedReceiverStream::new(rx)
            .take_while(|item| ready(item.is_some()))
            .filter_map(ready)
    }

    /// Takes the primary queue as a stream, applying the intermediate
    /// output gate. A second take yields an empty stream.
    pub fn primary_stream(
        &self,
        intermediate_output: bool,
    ) -> impl Stream<Item = String> + Send + 'static {
        let rx = self
            .primary_rx
            .lock()
            .ok()
            .and_then(|mut guard| guard.take())
            .unwrap_or_else(|| {
                let (_tx, rx) = mpsc::unbounded_channel();
                rx
            });
        UnboundedReceiverStream::new(rx)
            .take_while(|item| ready(item.is_some()))
            .filter_map(move |item| {
                ready(item.and_then(|(line, is_final)| {
                    (intermediate_output || is_final).then_some(line)
                }))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn primary_preserves_emission_order() {
        let pipeline = Pipeline::new();
        pipeline.emit("data: 1\n\n".to_string());
        pipeline.emit("data: 2\n\n".to_string());
        pipeline.emit_done();
        let lines: Vec<String> = pipeline.primary_stream(true).collect().await;
        assert_eq!(lines, vec!["data: 1\n\n", "data: 2\n\n", DONE_LINE]);
    }

    #[tokio::test]
    async fn gate_skips_non_final_chunks() {
        let pipeline = Pipeline::new();
        pipeline.emit("data: intermediate\n\n".to_string());
        pipeline.set_final_stream();
        pipeline.emit("data: final\n\n".to_string());
        pipeline.emit_done();
        let lines: Vec<String> = pipeline.primary_stream(false).collect().await;
        assert_eq!(lines, vec!["data: final\n\n", DONE_LINE]);
    }

    #[tokio::test]
    async fn gate_open_passes_everything() {
        let pipeline = Pipeline::new();
        pipeline.emit("data: a\n\n".to_string());
        pipeline.set_final_stream();
        pipeline.emit("data: b\n\n".to_string());
        pipeline.emit_done();
        let lines: Vec<String> = pipeline.primary_stream(true).collect().await;
        assert_eq!(lines.len(), 3);
    }

    #[tokio::test]
    async fn listeners_see_the_primary_sequence_ungated() {
        let pipeline = Pipeline::new();
        let listener = pipeline.listen();
        pipeline.emit("data: a\n\n".to_string());
        pipeline.set_final_stream();
        pipeline.emit("data: b\n\n".to_string());
        pipeline.emit_done();
        let lines: Vec<String> = listener.collect().await;
        assert_eq!(lines, vec!["data: a\n\n", "data: b\n\n", DONE_LINE]);
    }

    #[tokio::test]
    async fn two_listeners_observe_identical_sequences() {
        let pipeline = Pipeline::new();
        let first = pipeline.listen();
        let second = pipeline.listen();
        pipeline.emit("data: x\n\n".to_string());
        pipeline.emit_done();
        let first: Vec<String> = first.collect().await;
        let second: Vec<String> = second.collect().await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn listener_events_skip_the_primary() {
        let pipeline = Pipeline::new();
        let listener = pipeline.listen();
        pipeline.emit_to_listeners("data: sideband\n\n".to_string());
        pipeline.emit_done();
        let listener_lines: Vec<String> = listener.collect().await;
        let primary_lines: Vec<String> = pipeline.primary_stream(true).collect().await;
        assert_eq!(listener_lines, vec!["data: sideband\n\n", DONE_LINE]);
        assert_eq!(primary_lines, vec![DONE_LINE]);
    }

    #[tokio::test]
    async fn late_listener_gets_an_empty_closed_stream() {
        let pipeline = Pipeline::new();
        pipeline.emit("data: early\n\n".to_string());
        pipeline.emit_done();
        let lines: Vec<String> = pipeline.listen().collect().await;
        assert!(lines.is_empty());
    }

    #[tokio::test]
    async fn emit_done_is_idempotent() {
        let pipeline = Pipeline::new();
        pipeline.emit_done();
        pipeline.emit_done();
        let lines: Vec<String> = pipeline.primary_stream(true).collect().await;
        assert_eq!(lines, vec![DONE_LINE]);
    }

    #[test]
    fn streaming_flag_tracks_lifecycle() {
        let pipeline = Pipeline::new();
        assert!(!pipeline.is_streaming());
        pipeline.emit("data: x\n\n".to_string());
        assert!(pipeline.is_streaming());
        pipeline.emit_done();
        assert!(!pipeline.is_streaming());
        assert!(pipeline.is_done());
    }
}
