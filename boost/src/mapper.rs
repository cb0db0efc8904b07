//! Model mapper: downstream catalog aggregation and synthetic-id routing.
//!
//! Aggregates `/v1/models` from every configured backend (memoized with a
//! short TTL), builds the synthetic `<module-prefix>-<backend-id>` entries,
//! and resolves incoming model ids back to `<module, backend model,
//! backend url, backend key>`. Also hosts the direct-task heuristic that
//! lets UI auxiliary prompts bypass module logic.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, error};

use config::BoostConfig;
use sse_wire::{ChatCompletionRequest, RequestMessage};

use crate::chat::{Chat, Message};
use crate::error::BoostError;
use crate::module::{Module, ModuleRegistry};
use crate::session::SessionInit;

/// How long a downstream catalog snapshot stays fresh.
pub const MODEL_CACHE_TTL: Duration = Duration::from_secs(60);

#[derive(Default)]
struct MapperCache {
    models: Vec<Value>,
    model_to_backend: HashMap<String, usize>,
    fetched_at: Option<Instant>,
}

pub struct Mapper {
    config: Arc<BoostConfig>,
    modules: Arc<ModuleRegistry>,
    http: reqwest::Client,
    cache: RwLock<MapperCache>,
}

impl Mapper {
    pub fn new(
        config: Arc<BoostConfig>,
        modules: Arc<ModuleRegistry>,
        http: reqwest::Client,
    ) -> Self {
        Self {
            config,
            modules,
            http,
            cache: RwLock::new(MapperCache::default()),
        }
    }

    /// Aggregated downstream models, refreshed when the snapshot is older
    /// than [`MODEL_CACHE_TTL`].
    pub async fn list_downstream(&self) -> Vec<Value> {
        let stale = {
            let cache = self.cache.read().await;
            cache
                .fetched_at
                .map_or(true, |at| at.elapsed() >= MODEL_CACHE_TTL)
        };
        if stale {
            self.refresh().await;
        }
        self.cache.read().await.models.clone()
    }

    async fn refresh(&self) {
        debug!("listing downstream models");
        let mut models = Vec::new();
        let mut mapping = HashMap::new();

        for (idx, backend) in self.config.backends.iter().enumerate() {
            let endpoint = format!("{}/models", backend.url);
            let result = self
                .http
                .get(&endpoint)
                .bearer_auth(&backend.key)
                .send()
                .await;
            let data = match result {
                Ok(response) if response.status().is_success() => {
                    response.json::<Value>().await.ok()
                }
                Ok(response) => {
                    error!("failed to fetch models from {endpoint}: {}", response.status());
                    None
                }
                Err(e) => {
                    error!("failed to fetch models from {endpoint}: {e}");
                    None
                }
            };
            let Some(data) = data else { continue };
            let Some(list) = data.get("data").and_then(Value::as_array) else {
                continue;
            };
            debug!("found {} models at {endpoint}", list.len());
            for model in list {
                if let Some(id) = model.get("id").and_then(Value::as_str) {
                    mapping.insert(id.to_string(), idx);
                }
                models.push(model.clone());
            }
        }

        let mut cache = self.cache.write().await;
        cache.models = models;
        // Stale mappings are kept until overwritten so in-flight requests
        // keep routing during backend churn.
        cache.model_to_backend.extend(mapping);
        cache.fetched_at = Some(Instant::now());
    }

    /// The synthetic catalog entry for a module / backend-model pair.
    pub fn get_proxy_model(module: &dyn Module, model: &Value) -> Value {
        let mut entry = model.clone();
        let id = model.get("id").and_then(Value::as_str).unwrap_or_default();
        if let Some(obj) = entry.as_object_mut() {
            obj.insert(
                "id".to_string(),
                Value::String(format!("{}-{}", module.id_prefix(), id)),
            );
            obj.insert(
                "name".to_string(),
                Value::String(format!("{} {}", module.id_prefix(), id)),
            );
        }
        entry
    }

    /// The backend model id behind a (possibly synthetic) model id.
    pub fn resolve_proxy_model(&self, model_id: &str) -> String {
        match model_id.split_once('-') {
            Some((prefix, rest)) if self.modules.prefix_to_name(prefix).is_some() => {
                rest.to_string()
            }
            _ => model_id.to_string(),
        }
    }

    /// The module behind a synthetic model id, or `None` for pass-through.
    pub fn resolve_proxy_module(&self, model_id: &str) -> Option<String> {
        let (prefix, _) = model_id.split_once('-')?;
        self.modules.prefix_to_name(prefix).map(str::to_string)
    }

    /// Resolves a chat-completion request to its backend binding.
    pub async fn resolve_request_config(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<SessionInit, BoostError> {
        if request.model.is_empty() {
            return Err(BoostError::MissingModel);
        }

        let proxy_model = self.resolve_proxy_model(&request.model);
        let proxy_module = self.resolve_proxy_module(&request.model);

        let backend = {
            let cache = self.cache.read().await;
            cache.model_to_backend.get(&proxy_model).copied()
        }
        .and_then(|idx| self.config.backends.get(idx))
        .ok_or_else(|| BoostError::UnknownModel(request.model.clone()))?;

        debug!(
            "resolved proxy model '{proxy_model}', module {:?}, backend '{}'",
            proxy_module, backend.url
        );

        Ok(SessionInit {
            url: backend.url.clone(),
            key: backend.key.clone(),
            model: proxy_model,
            params: request.extra.clone(),
            messages: to_messages(&request.messages),
            module: proxy_module,
        })
    }

    /// Whether the chat matches one of the configured direct-task
    /// fragments (matched case-insensitively over the whole chat).
    pub fn is_direct_task(&self, chat: &Chat) -> bool {
        self.config
            .direct_tasks
            .iter()
            .any(|fragment| chat.has_substring(fragment))
    }

    #[cfg(test)]
    pub(crate) async fn prime(&self, models: Vec<Value>, mapping: &[(&str, usize)]) {
        let mut cache = self.cache.write().await;
        cache.models = models;
        cache.model_to_backend = mapping
            .iter()
            .map(|(id, idx)| (id.to_string(), *idx))
            .collect();
        cache.fetched_at = Some(Instant::now());
    }
}

fn to_messages(messages: &[RequestMessage]) -> Vec<Message> {
    messages
        .iter()
        .map(|m| Message {
            role: m.role.clone(),
            content: m.content.as_ref().map(|c| c.as_text()).unwrap_or_default(),
            tool_calls: m.tool_calls.clone(),
            tool_call_id: m.tool_call_id.clone(),
        })
        .collect()
}
