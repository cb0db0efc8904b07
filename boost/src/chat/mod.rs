//! Mutable conversation tree manipulated by modules.
//!
//! A [`Chat`] wraps a tail node in an arena of [`ChatNode`]s. Appends go to
//! the tail, system turns are spliced in as a new root, and the
//! root-to-tail path is the linear history sent upstream. Turn-advancing
//! conveniences (`advance`, `emit_advance`) live on the session, which
//! takes the chat explicitly.

mod node;

pub use node::{ChatNode, Message, NodeId};

use serde_json::Value;

use crate::error::BoostError;

/// Conversation tree with a designated tail.
#[derive(Debug, Clone)]
pub struct Chat {
    nodes: Vec<ChatNode>,
    tail: NodeId,
}

impl Chat {
    /// Creates a chat with a single root turn.
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        let root = ChatNode::new(role, content);
        Self {
            nodes: vec![root],
            tail: NodeId(0),
        }
    }

    /// Builds a linear chat from a conversation, first message as root.
    pub fn from_conversation(messages: &[Message]) -> Result<Self, BoostError> {
        let (first, rest) = messages.split_first().ok_or(BoostError::EmptyConversation)?;
        let mut chat = Self::new(&first.role, &first.content);
        chat.nodes[0].tool_calls = first.tool_calls.clone();
        chat.nodes[0].tool_call_id = first.tool_call_id.clone();
        for message in rest {
            let id = chat.add_message(&message.role, &message.content);
            chat.nodes[id.0].tool_calls = message.tool_calls.clone();
            chat.nodes[id.0].tool_call_id = message.tool_call_id.clone();
        }
        Ok(chat)
    }

    /// Builds a one-turn chat from a single user prompt.
    pub fn from_prompt(prompt: impl Into<String>) -> Self {
        Self::new("user", prompt)
    }

    fn alloc(&mut self, node: ChatNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    pub fn node(&self, id: NodeId) -> &ChatNode {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut ChatNode {
        &mut self.nodes[id.0]
    }

    pub fn tail(&self) -> NodeId {
        self.tail
    }

    pub fn tail_node(&self) -> &ChatNode {
        self.node(self.tail)
    }

    /// Moves the tail to an existing node.
    pub fn set_tail(&mut self, id: NodeId) {
        debug_assert!(id.0 < self.nodes.len());
        self.tail = id;
    }

    /// Appends a new tail child and returns it.
    pub fn add_message(&mut self, role: impl Into<String>, content: impl Into<String>) -> NodeId {
        let mut node = ChatNode::new(role, content);
        node.parent = Some(self.tail);
        let id = self.alloc(node);
        let tail = self.tail;
        self.nodes[tail.0].children.push(id);
        self.tail = id;
        id
    }

    pub fn user(&mut self, content: impl Into<String>) -> NodeId {
        self.add_message("user", content)
    }

    pub fn assistant(&mut self, content: impl Into<String>) -> NodeId {
        self.add_message("assistant", content)
    }

    /// Inserts a system turn as the new parent of the current ancestor, so
    /// the history begins with it. Repeated calls keep prepending at the
    /// head.
    pub fn system(&mut self, content: impl Into<String>) -> NodeId {
        let root = self.ancestor();
        let node = ChatNode::new("system", content);
        let id = self.alloc(node);
        self.nodes[id.0].children.push(root);
        self.nodes[root.0].parent = Some(id);
        id
    }

    /// Splices a new node after `after`, re-parenting `after`'s existing
    /// children onto the new node. When `after` is the tail, the new node
    /// becomes the tail.
    pub fn insert_after(
        &mut self,
        after: NodeId,
        role: impl Into<String>,
        content: impl Into<String>,
    ) -> NodeId {
        let mut node = ChatNode::new(role, content);
        node.parent = Some(after);
        node.children = std::mem::take(&mut self.nodes[after.0].children);
        let id = self.alloc(node);
        let children = self.nodes[id.0].children.clone();
        for child in children {
            self.nodes[child.0].parent = Some(id);
        }
        self.nodes[after.0].children.push(id);
        if after == self.tail {
            self.tail = id;
        }
        id
    }

    /// Attaches a tool call as an assistant turn (for history).
    pub fn tool_call(&mut self, call: Value) -> NodeId {
        let id = self.add_message("assistant", "");
        self.nodes[id.0].tool_calls = Some(Value::Array(vec![call]));
        id
    }

    /// Attaches a tool result referencing the originating call id.
    pub fn tool(&mut self, call_id: impl Into<String>, result: impl Into<String>) -> NodeId {
        let id = self.add_message("tool", result);
        self.nodes[id.0].tool_call_id = Some(call_id.into());
        id
    }

    /// The root of the chain the tail belongs to.
    pub fn ancestor(&self) -> NodeId {
        let mut current = self.tail;
        while let Some(parent) = self.nodes[current.0].parent {
            current = parent;
        }
        current
    }

    /// Ancestor-to-tail node path.
    pub fn plain(&self) -> Vec<NodeId> {
        let mut path = vec![self.tail];
        let mut current = self.tail;
        while let Some(parent) = self.nodes[current.0].parent {
            path.push(parent);
            current = parent;
        }
        path.reverse();
        path
    }

    /// Ancestor-to-tail `{role, content}` records.
    pub fn history(&self) -> Vec<Message> {
        self.plain()
            .into_iter()
            .map(|id| self.node(id).message())
            .collect()
    }

    /// Materializes a detached copy preserving the linear history.
    pub fn clone_linear(&self) -> Self {
        let history = self.history();
        // history always has at least the root
        let mut chat = Self::new(&history[0].role, &history[0].content);
        chat.nodes[0].tool_calls = history[0].tool_calls.clone();
        chat.nodes[0].tool_call_id = history[0].tool_call_id.clone();
        for message in &history[1..] {
            let id = chat.add_message(&message.role, &message.content);
            chat.nodes[id.0].tool_calls = message.tool_calls.clone();
            chat.nodes[id.0].tool_call_id = message.tool_call_id.clone();
        }
        chat
    }

    /// Delegates to the selection sub-language's `match` strategy.
    pub fn match_nodes(
        &self,
        role: Option<&str>,
        substring: Option<&str>,
        index: Option<i64>,
    ) -> Vec<NodeId> {
        crate::selection::match_nodes(self, role, substring, index)
    }

    /// First node matched by [`match_nodes`](Chat::match_nodes), if any.
    pub fn match_one(
        &self,
        role: Option<&str>,
        substring: Option<&str>,
        index: Option<i64>,
    ) -> Option<NodeId> {
        self.match_nodes(role, substring, index).into_iter().next()
    }

    /// Case-insensitive substring check over every node on the path.
    pub fn has_substring(&self, substring: &str) -> bool {
        self.plain()
            .into_iter()
            .any(|id| self.node(id).contains(substring))
    }
}

impl std::fmt::Display for Chat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let lines: Vec<String> = self
            .plain()
            .into_iter()
            .map(|id| self.node(id).to_string())
            .collect();
        write!(f, "{}", lines.join("\n"))
    }
}
