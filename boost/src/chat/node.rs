//! Arena-backed conversation tree nodes.
//!
//! Nodes are stored in a flat arena owned by the chat and reference each
//! other through [`NodeId`] indices, so the tree stays `Send` without
//! reference-counted back pointers. Invariants: at most one parent per
//! node, ancestors form a strict chain, children keep insertion order.

use std::collections::HashMap;

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Index of a node within its chat's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) usize);

/// A single role-tagged turn in the conversation tree.
#[derive(Debug, Clone)]
pub struct ChatNode {
    /// Short opaque id, unique enough for logs and per-module bookkeeping.
    pub id: String,
    pub role: String,
    pub content: String,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// Per-module scratch space (e.g. klmbr word mappings).
    pub meta: HashMap<String, Value>,
    /// Present on assistant turns that carry tool calls.
    pub tool_calls: Option<Value>,
    /// Present on tool-result turns, referencing the originating call.
    pub tool_call_id: Option<String>,
}

const ID_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

fn short_id() -> String {
    let mut rng = rand::thread_rng();
    (0..6)
        .map(|_| ID_CHARS[rng.gen_range(0..ID_CHARS.len())] as char)
        .collect()
}

impl ChatNode {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: short_id(),
            role: role.into(),
            content: content.into(),
            parent: None,
            children: Vec::new(),
            meta: HashMap::new(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Case-insensitive containment check on this node's content.
    pub fn contains(&self, substring: &str) -> bool {
        self.content
            .to_lowercase()
            .contains(&substring.to_lowercase())
    }

    /// The `{role, content, ...}` record for this node.
    pub fn message(&self) -> Message {
        Message {
            role: self.role.clone(),
            content: self.content.clone(),
            tool_calls: self.tool_calls.clone(),
            tool_call_id: self.tool_call_id.clone(),
        }
    }
}

impl std::fmt::Display for ChatNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.role, self.content)
    }
}

/// A plain `{role, content}` record, plus the optional tool fields, as sent
/// to and received from upstream chat-completion APIs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}
