//! Module trait and registry.
//!
//! A module is a named algorithm that transforms a chat and emits chunks
//! through a session; its id prefix builds the synthetic model ids
//! advertised by the catalog. Modules are compiled in and the registry is
//! assembled at startup from the built-in set, filtered by
//! `HARBOR_BOOST_MODULES` (`all` enables everything; unknown names are
//! skipped with a warning).

pub mod autotemp;
pub mod eli5;
pub mod g1;
pub mod klmbr;
pub mod rcn;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use config::BoostConfig;

use crate::chat::Chat;
use crate::error::BoostError;
use crate::session::Session;

/// A named algorithm applied to a chat through a session.
#[async_trait]
pub trait Module: Send + Sync {
    /// Registry name, used for lookup.
    fn name(&self) -> &'static str;

    /// Prefix used to build synthetic model ids (`<prefix>-<backend-id>`).
    fn id_prefix(&self) -> &'static str;

    /// Optional human-readable documentation.
    fn docs(&self) -> Option<&'static str> {
        None
    }

    /// Runs the module against the session's chat.
    async fn apply(&self, chat: &mut Chat, session: &Arc<Session>) -> Result<(), BoostError>;
}

fn builtins() -> Vec<Arc<dyn Module>> {
    vec![
        Arc::new(klmbr::Klmbr),
        Arc::new(rcn::Rcn),
        Arc::new(g1::G1),
        Arc::new(eli5::Eli5),
        Arc::new(autotemp::Autotemp),
    ]
}

/// Name-indexed set of modules, in registration order.
#[derive(Default)]
pub struct ModuleRegistry {
    modules: HashMap<String, Arc<dyn Module>>,
    order: Vec<String>,
}

impl ModuleRegistry {
    /// An empty registry (no modules advertised).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registers a module under its name; later registrations win.
    pub fn register(&mut self, module: Arc<dyn Module>) {
        let name = module.name().to_string();
        if self.modules.insert(name.clone(), module).is_none() {
            self.order.push(name);
        }
    }

    /// Builds the registry from the built-in set, honoring the configured
    /// enable list.
    pub fn builtin(config: &BoostConfig) -> Self {
        let available = builtins();
        let mut registry = Self::empty();

        if config.modules_all() {
            for module in available {
                registry.register(module);
            }
        } else {
            for name in &config.modules {
                match available.iter().find(|m| m.name() == name) {
                    Some(module) => registry.register(module.clone()),
                    None => warn!("module '{name}' not found, skipping"),
                }
            }
        }

        if registry.is_empty() {
            warn!("no modules loaded, is boost configured correctly?");
        } else {
            info!(
                "loaded {} modules: {}",
                registry.len(),
                registry.order.join(", ")
            );
        }
        registry
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Module>> {
        self.modules.get(name).cloned()
    }

    /// Translates a synthetic-model id prefix to a module name.
    pub fn prefix_to_name(&self, prefix: &str) -> Option<&str> {
        self.order
            .iter()
            .find(|name| {
                self.modules
                    .get(*name)
                    .is_some_and(|m| m.id_prefix() == prefix)
            })
            .map(String::as_str)
    }

    /// Modules in registration order.
    pub fn modules(&self) -> impl Iterator<Item = &Arc<dyn Module>> {
        self.order.iter().filter_map(|name| self.modules.get(name))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_modules(modules: &[&str]) -> BoostConfig {
        let mut config = BoostConfig::from_env();
        config.modules = modules.iter().map(|s| s.to_string()).collect();
        config
    }

    #[test]
    fn builtin_honors_enable_list() {
        let registry = ModuleRegistry::builtin(&config_with_modules(&["rcn", "g1"]));
        assert_eq!(registry.len(), 2);
        assert!(registry.get("rcn").is_some());
        assert!(registry.get("eli5").is_none());
    }

    #[test]
    fn builtin_all_enables_everything() {
        let registry = ModuleRegistry::builtin(&config_with_modules(&["all"]));
        assert_eq!(registry.len(), 5);
    }

    #[test]
    fn unknown_names_are_skipped() {
        let registry = ModuleRegistry::builtin(&config_with_modules(&["rcn", "does-not-exist"]));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn prefix_resolution() {
        let registry = ModuleRegistry::builtin(&config_with_modules(&["all"]));
        assert_eq!(registry.prefix_to_name("rcn"), Some("rcn"));
        assert_eq!(registry.prefix_to_name("autotemp"), Some("autotemp"));
        assert_eq!(registry.prefix_to_name("zzz"), None);
    }

    #[test]
    fn registration_order_is_preserved() {
        let registry = ModuleRegistry::builtin(&config_with_modules(&["g1", "rcn"]));
        let names: Vec<&str> = registry.names().collect();
        assert_eq!(names, vec!["g1", "rcn"]);
    }
}
