//! Request-scoped local tool registry.
//!
//! Modules register callables the session can execute during tool-call
//! dispatch without a network round-trip. Names are stored (and advertised
//! to the upstream) under the reserved [`LOCAL_TOOL_MARKER`] so they cannot
//! collide with client-provided remote tools; `is_local` keys on that
//! marker during dispatch. The registry lives on the session and dies with
//! the request.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::{json, Value};

use crate::error::BoostError;

/// Reserved prefix marking a tool as local to the gateway.
pub const LOCAL_TOOL_MARKER: &str = "boost_lt_";

/// An async callable over JSON arguments, returning the tool-result text.
pub type ToolFn = Arc<dyn Fn(Value) -> BoxFuture<'static, Result<String, BoostError>> + Send + Sync>;

struct LocalTool {
    definition: Value,
    func: ToolFn,
}

/// Marks a name with the reserved prefix (idempotent).
pub fn marked_name(name: &str) -> String {
    if name.starts_with(LOCAL_TOOL_MARKER) {
        name.to_string()
    } else {
        format!("{LOCAL_TOOL_MARKER}{name}")
    }
}

/// Map of tool-name to callable plus its OpenAI-compatible definition.
#[derive(Default)]
pub struct LocalToolRegistry {
    tools: HashMap<String, LocalTool>,
    order: Vec<String>,
}

impl LocalToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a callable under the marked form of `name`. The caller
    /// supplies the description and the JSON-Schema `parameters` object;
    /// the registry builds the OpenAI `function` envelope around them.
    /// Duplicate registration is a programmer error.
    pub fn set(
        &mut self,
        name: &str,
        description: &str,
        parameters: Value,
        func: ToolFn,
    ) -> Result<(), BoostError> {
        let marked = marked_name(name);
        if self.tools.contains_key(&marked) {
            return Err(BoostError::DuplicateTool(marked));
        }
        let definition = json!({
            "type": "function",
            "function": {
                "name": marked,
                "description": description,
                "parameters": parameters,
            }
        });
        self.order.push(marked.clone());
        self.tools.insert(marked, LocalTool { definition, func });
        Ok(())
    }

    /// Whether a tool name observed during dispatch belongs to this
    /// registry (decides local execution vs pass-through).
    pub fn is_local(&self, name: &str) -> bool {
        self.tools.contains_key(&marked_name(name))
    }

    /// The callable registered under `name`; unknown names error.
    pub fn lookup(&self, name: &str) -> Result<ToolFn, BoostError> {
        self.tools
            .get(&marked_name(name))
            .map(|tool| tool.func.clone())
            .ok_or_else(|| BoostError::UnknownTool(name.to_string()))
    }

    /// Invokes the callable registered under `name` with JSON arguments.
    pub async fn call(&self, name: &str, args: Value) -> Result<String, BoostError> {
        let func = self.lookup(name)?;
        func(args).await
    }

    /// OpenAI-compatible tool descriptions, in registration order.
    pub fn definitions(&self) -> Vec<Value> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| tool.definition.clone())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }
}
