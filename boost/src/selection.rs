//! Message-selection sub-language.
//!
//! Modules declare a strategy plus a params map to pick which turns of a
//! conversation to operate on. [`matches_filter`] is the related utility
//! used for model-catalog filtering (`field[.op]=value` clauses).

use rand::seq::SliceRandom;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::warn;

use crate::chat::{Chat, NodeId};
use crate::error::BoostError;

/// Node-selection strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Every node.
    All,
    /// Node at index 0.
    First,
    /// Node at index -1.
    Last,
    /// One uniformly random node.
    Any,
    /// Every user-role node.
    User,
    /// First `max(1, ⌊N·p/100⌋)` nodes.
    Percentage,
    /// Filter by role / substring / index.
    Match,
}

impl std::str::FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(Self::All),
            "first" => Ok(Self::First),
            "last" => Ok(Self::Last),
            "any" => Ok(Self::Any),
            "user" => Ok(Self::User),
            "percentage" => Ok(Self::Percentage),
            "match" => Ok(Self::Match),
            _ => Err(format!("unknown selection strategy: {s}")),
        }
    }
}

/// Applies a named strategy with its params map to the chat.
pub fn apply_strategy(
    chat: &Chat,
    strategy: &str,
    params: &Map<String, Value>,
) -> Result<Vec<NodeId>, BoostError> {
    let strategy: Strategy = strategy
        .parse()
        .map_err(|_| BoostError::UnknownStrategy(strategy.to_string()))?;

    Ok(match strategy {
        Strategy::All => chat.plain(),
        Strategy::First => match_nodes(chat, None, None, Some(0)),
        Strategy::Last => match_nodes(chat, None, None, Some(-1)),
        Strategy::Any => {
            let nodes = chat.plain();
            nodes
                .choose(&mut rand::thread_rng())
                .map(|id| vec![*id])
                .unwrap_or_default()
        }
        Strategy::User => match_nodes(chat, Some("user"), None, None),
        Strategy::Percentage => {
            let p = params
                .get("percentage")
                .and_then(Value::as_f64)
                .unwrap_or(50.0);
            percentage_nodes(chat, p)
        }
        Strategy::Match => {
            let role = params.get("role").and_then(Value::as_str);
            let substring = params.get("substring").and_then(Value::as_str);
            let index = params.get("index").and_then(Value::as_i64);
            match_nodes(chat, role, substring, index)
        }
    })
}

/// First `max(1, ⌊N·p/100⌋)` nodes of the path.
pub fn percentage_nodes(chat: &Chat, percentage: f64) -> Vec<NodeId> {
    let nodes = chat.plain();
    let count = ((nodes.len() as f64) * (percentage / 100.0)).floor() as usize;
    let count = count.max(1).min(nodes.len());
    nodes[..count].to_vec()
}

/// Filters the path by role, then substring (contains), then index
/// (negative counts from the end; out of range selects nothing).
pub fn match_nodes(
    chat: &Chat,
    role: Option<&str>,
    substring: Option<&str>,
    index: Option<i64>,
) -> Vec<NodeId> {
    let mut nodes: Vec<NodeId> = chat.plain();

    if let Some(role) = role {
        nodes.retain(|id| chat.node(*id).role == role);
    }
    if let Some(substring) = substring {
        nodes.retain(|id| chat.node(*id).content.contains(substring));
    }
    if let Some(index) = index {
        let len = nodes.len() as i64;
        let resolved = if index < 0 { len + index } else { index };
        if resolved < 0 || resolved >= len {
            return Vec::new();
        }
        return vec![nodes[resolved as usize]];
    }

    nodes
}

fn value_str(value: &Value) -> String {
    match value.as_str() {
        Some(s) => s.to_string(),
        None => value.to_string(),
    }
}

/// Checks a JSON object against `field[.op]=value` clauses; ops are
/// `exact` (default), `contains`, and `regex` (anchored at the start).
/// All clauses must hold.
pub fn matches_filter(obj: &Map<String, Value>, filter: &Map<String, Value>) -> bool {
    for (key, expected) in filter {
        let (field, op) = key
            .split_once('.')
            .unwrap_or((key.as_str(), "exact"));

        let Some(actual) = obj.get(field) else {
            return false;
        };
        let actual = value_str(actual);
        let expected = value_str(expected);

        let holds = match op {
            "regex" => match Regex::new(&expected) {
                Ok(re) => re.find(&actual).is_some_and(|m| m.start() == 0),
                Err(e) => {
                    warn!("invalid filter regex '{expected}': {e}");
                    false
                }
            },
            "contains" => actual.contains(&expected),
            _ => actual == expected,
        };
        if !holds {
            return false;
        }
    }
    true
}
