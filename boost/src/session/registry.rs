//! Process-wide session registry.
//!
//! Sessions register before their module runs and unregister after the
//! terminator, so late SSE/WebSocket listeners can attach by id while the
//! session is live and get a 404 afterwards.

use std::sync::Arc;

use dashmap::DashMap;

use super::Session;

#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, Arc<Session>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, session: Arc<Session>) {
        self.sessions.insert(session.id().to_string(), session);
    }

    pub fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.get(id).map(|entry| entry.value().clone())
    }

    pub fn unregister(&self, id: &str) {
        self.sessions.remove(id);
    }

    /// Ids of all live sessions.
    pub fn ids(&self) -> Vec<String> {
        self.sessions
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
