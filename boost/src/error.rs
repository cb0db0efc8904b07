//! Error taxonomy for the boost core.

use thiserror::Error;

/// Errors surfaced by the core: upstream transport, request resolution,
/// module and tool dispatch.
#[derive(Debug, Error)]
pub enum BoostError {
    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("upstream returned {status}: {body}")]
    UpstreamStatus { status: u16, body: String },

    #[error("failed to parse payload: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("unable to proxy request without a model specifier")]
    MissingModel,

    #[error("request has no messages")]
    EmptyConversation,

    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error("module '{0}' not found")]
    UnknownModule(String),

    #[error("unknown selection strategy: {0}")]
    UnknownStrategy(String),

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("tool '{0}' is already registered")]
    DuplicateTool(String),

    #[error("tool '{name}' failed: {message}")]
    ToolFailed { name: String, message: String },
}

impl BoostError {
    /// Upstream status error from a non-2xx response body.
    pub fn upstream_status(status: reqwest::StatusCode, body: String) -> Self {
        Self::UpstreamStatus {
            status: status.as_u16(),
            body,
        }
    }
}
