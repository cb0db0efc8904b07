//! # Boost
//!
//! Core of an OpenAI-compatible inference proxy gateway. Each request is
//! routed through a named **module** that rewrites prompts, issues auxiliary
//! upstream calls, and streams intermediate and final tokens back through a
//! per-session emission pipeline with sideband listeners.
//!
//! ## Main modules
//!
//! - [`chat`]: [`Chat`] / [`ChatNode`] — the mutable conversation tree
//!   modules manipulate.
//! - [`selection`]: strategy sub-language over chats ([`apply_strategy`])
//!   and catalog filtering ([`matches_filter`]).
//! - [`module`]: the [`Module`] trait, [`ModuleRegistry`], and the built-in
//!   set (`klmbr`, `rcn`, `g1`, `eli5`, `autotemp`).
//! - [`tools`]: request-scoped [`LocalToolRegistry`] for tool-call dispatch
//!   without a network round-trip.
//! - [`session`]: [`Session`] — per-request state, the emission pipeline,
//!   and the upstream streaming client; [`SessionRegistry`] for late
//!   listener attach.
//! - [`mapper`]: [`Mapper`] — downstream catalog aggregation, synthetic
//!   model ids, request resolution, direct-task heuristic.
//! - [`format`]: status / artifact rendering.
//!
//! The HTTP front lives in the `serve` crate; wire DTOs in `sse-wire`.

pub mod chat;
pub mod error;
pub mod format;
pub mod mapper;
pub mod module;
pub mod selection;
pub mod session;
pub mod tools;

pub use chat::{Chat, ChatNode, Message, NodeId};
pub use error::BoostError;
pub use format::{format_artifact, format_status, remove_html_code_blocks};
pub use mapper::{Mapper, MODEL_CACHE_TTL};
pub use module::{Module, ModuleRegistry};
pub use selection::{apply_strategy, matches_filter, Strategy};
pub use session::registry::SessionRegistry;
pub use session::{CompletionOptions, Session, SessionInit, BOOST_PARAM_PREFIX};
pub use tools::{marked_name, LocalToolRegistry, ToolFn, LOCAL_TOOL_MARKER};
