//! Typed configuration for the boost gateway, resolved from `HARBOR_BOOST_*`
//! environment variables with `.env` support (existing env wins over `.env`).
//!
//! Every value has a default, so `BoostConfig::from_env()` never fails; bad
//! scalar values fall back rather than abort. Value grammar lives in
//! [`env`]: lists are `;`-separated, dicts are `k=v,…` with scalar coercion,
//! and `PREFIX_*` wildcard names are collected in sorted order.

mod dotenv;
pub mod env;

use serde_json::{Map, Value};

pub use dotenv::load_and_apply;

use env::{env_str, env_wildcard, parse_bool, parse_config_dict, parse_str_list};

/// One upstream OpenAI-compatible backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backend {
    pub url: String,
    pub key: String,
}

/// Rendering style for status messages emitted into the response stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusStyle {
    #[default]
    MdCodeblock,
    MdH1,
    MdH2,
    MdH3,
    Plain,
    None,
}

impl StatusStyle {
    /// Parses the `HARBOR_BOOST_STATUS_STYLE` value; unknown styles fall
    /// back to the default (`md:codeblock`), matching the formatter table.
    pub fn parse_or_default(raw: &str) -> Self {
        match raw.trim() {
            "md:codeblock" => Self::MdCodeblock,
            "md:h1" => Self::MdH1,
            "md:h2" => Self::MdH2,
            "md:h3" => Self::MdH3,
            "plain" => Self::Plain,
            "none" => Self::None,
            _ => Self::default(),
        }
    }
}

/// Message-selection knobs shared by several modules.
#[derive(Debug, Clone, Default)]
pub struct StratConfig {
    pub strat: String,
    pub strat_params: Map<String, Value>,
}

#[derive(Debug, Clone)]
pub struct KlmbrConfig {
    pub percentage: u32,
    pub mods: Vec<String>,
    pub strat: String,
    pub strat_params: Map<String, Value>,
}

#[derive(Debug, Clone)]
pub struct G1Config {
    pub strat: String,
    pub strat_params: Map<String, Value>,
    pub max_steps: u32,
}

/// Resolved gateway configuration.
#[derive(Debug, Clone)]
pub struct BoostConfig {
    /// Upstream backends, index-aligned url/key pairs.
    pub backends: Vec<Backend>,
    /// Modules advertised by `/v1/models`; the single entry `all` enables
    /// every built-in.
    pub modules: Vec<String>,
    /// The emission gate: when false, only final-stream chunks reach the
    /// primary consumer.
    pub intermediate_output: bool,
    pub status_style: StatusStyle,
    /// Also advertise un-boosted backend models.
    pub serve_base_models: bool,
    /// `field[.op]=value` catalog filter clauses.
    pub model_filter: Map<String, Value>,
    /// Extra parameters merged under every upstream request body.
    pub extra_llm_params: Map<String, Value>,
    /// Accepted bearer tokens; empty disables auth.
    pub api_keys: Vec<String>,
    /// Substrings that mark a request as a direct UI task (bypasses modules).
    pub direct_tasks: Vec<String>,

    pub klmbr: KlmbrConfig,
    pub rcn: StratConfig,
    pub g1: G1Config,
    pub eli5: StratConfig,
}

/// Default direct-task fragments: title generation, tag generation,
/// autocompletion, search-necessity, and an explicit test marker.
pub const DEFAULT_DIRECT_TASKS: &[&str] = &[
    "3-5 word title",
    "1-3 broad tags categorizing",
    "You are an autocompletion system",
    "determine the necessity of generating search queries",
    "boost_direct_task_marker",
];

impl BoostConfig {
    /// Resolves the full configuration from the process environment.
    pub fn from_env() -> Self {
        let mut urls = parse_str_list(&env_str("HARBOR_BOOST_OPENAI_URLS", ""));
        let mut keys = parse_str_list(&env_str("HARBOR_BOOST_OPENAI_KEYS", ""));
        urls.extend(env_wildcard("HARBOR_BOOST_OPENAI_URL_"));
        keys.extend(env_wildcard("HARBOR_BOOST_OPENAI_KEY_"));
        keys.resize(urls.len(), String::new());
        let backends = urls
            .into_iter()
            .zip(keys)
            .map(|(url, key)| Backend {
                url: url.trim_end_matches('/').to_string(),
                key,
            })
            .collect();

        let api_keys = {
            let mut all = vec![env_str("HARBOR_BOOST_API_KEY", "")];
            all.extend(parse_str_list(&env_str("HARBOR_BOOST_API_KEYS", "")));
            all.extend(env_wildcard("HARBOR_BOOST_API_KEY_"));
            all.retain(|k| !k.is_empty());
            all
        };

        let direct_tasks = {
            let raw = env_str("HARBOR_BOOST_DIRECT_TASKS", "");
            if raw.trim().is_empty() {
                DEFAULT_DIRECT_TASKS.iter().map(|s| s.to_string()).collect()
            } else {
                parse_str_list(&raw)
            }
        };

        Self {
            backends,
            modules: parse_str_list(&env_str("HARBOR_BOOST_MODULES", "klmbr;rcn;g1")),
            intermediate_output: parse_bool(&env_str("HARBOR_BOOST_INTERMEDIATE_OUTPUT", "true")),
            status_style: StatusStyle::parse_or_default(&env_str(
                "HARBOR_BOOST_STATUS_STYLE",
                "md:codeblock",
            )),
            serve_base_models: parse_bool(&env_str("HARBOR_BOOST_BASE_MODELS", "false")),
            model_filter: parse_config_dict(&env_str("HARBOR_BOOST_MODEL_FILTER", "")),
            extra_llm_params: parse_config_dict(&env_str("HARBOR_BOOST_EXTRA_LLM_PARAMS", "")),
            api_keys,
            direct_tasks,
            klmbr: KlmbrConfig {
                percentage: env_str("HARBOR_BOOST_KLMBR_PERCENTAGE", "15")
                    .parse()
                    .unwrap_or(15),
                mods: parse_str_list(&env_str("HARBOR_BOOST_KLMBR_MODS", "all")),
                strat: env_str("HARBOR_BOOST_KLMBR_STRAT", "all"),
                strat_params: parse_config_dict(&env_str("HARBOR_BOOST_KLMBR_STRAT_PARAMS", "")),
            },
            rcn: StratConfig {
                strat: env_str("HARBOR_BOOST_RCN_STRAT", "match"),
                strat_params: parse_config_dict(&env_str(
                    "HARBOR_BOOST_RCN_STRAT_PARAMS",
                    "role=user,index=-1",
                )),
            },
            g1: G1Config {
                strat: env_str("HARBOR_BOOST_G1_STRAT", "match"),
                strat_params: parse_config_dict(&env_str(
                    "HARBOR_BOOST_G1_STRAT_PARAMS",
                    "role=user,index=-1",
                )),
                max_steps: env_str("HARBOR_BOOST_G1_MAX_STEPS", "15")
                    .parse()
                    .unwrap_or(15),
            },
            eli5: StratConfig {
                strat: env_str("HARBOR_BOOST_ELI5_STRAT", "match"),
                strat_params: parse_config_dict(&env_str(
                    "HARBOR_BOOST_ELI5_STRAT_PARAMS",
                    "role=user,index=-1",
                )),
            },
        }
    }

    /// True when the module list is the single entry `all`.
    pub fn modules_all(&self) -> bool {
        self.modules.len() == 1 && self.modules[0] == "all"
    }

    /// True when bearer auth is enabled.
    pub fn auth_enabled(&self) -> bool {
        !self.api_keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_style_parses_known_and_falls_back() {
        assert_eq!(StatusStyle::parse_or_default("md:h2"), StatusStyle::MdH2);
        assert_eq!(StatusStyle::parse_or_default("plain"), StatusStyle::Plain);
        assert_eq!(
            StatusStyle::parse_or_default("nonsense"),
            StatusStyle::MdCodeblock
        );
    }

    #[test]
    fn from_env_defaults() {
        let config = BoostConfig::from_env();
        assert!(config.intermediate_output);
        assert!(!config.serve_base_models);
        assert_eq!(config.modules, vec!["klmbr", "rcn", "g1"]);
        assert_eq!(config.direct_tasks.len(), DEFAULT_DIRECT_TASKS.len());
        assert_eq!(config.g1.max_steps, 15);
        assert_eq!(config.rcn.strat, "match");
        assert_eq!(config.rcn.strat_params["role"], "user");
        assert_eq!(config.rcn.strat_params["index"], -1);
    }

    #[test]
    fn named_backends_align_with_keys() {
        std::env::set_var("HARBOR_BOOST_OPENAI_URL_TESTCFG", "http://one/v1/");
        std::env::set_var("HARBOR_BOOST_OPENAI_KEY_TESTCFG", "sk-one");
        let config = BoostConfig::from_env();
        std::env::remove_var("HARBOR_BOOST_OPENAI_URL_TESTCFG");
        std::env::remove_var("HARBOR_BOOST_OPENAI_KEY_TESTCFG");

        let backend = config
            .backends
            .iter()
            .find(|b| b.url == "http://one/v1")
            .expect("named backend present");
        assert_eq!(backend.key, "sk-one");
    }

    #[test]
    fn missing_keys_pad_to_empty() {
        std::env::set_var("HARBOR_BOOST_OPENAI_URLS", "http://a;http://b");
        std::env::set_var("HARBOR_BOOST_OPENAI_KEYS", "only-a");
        let config = BoostConfig::from_env();
        std::env::remove_var("HARBOR_BOOST_OPENAI_URLS");
        std::env::remove_var("HARBOR_BOOST_OPENAI_KEYS");

        let a = config.backends.iter().find(|b| b.url == "http://a").unwrap();
        let b = config.backends.iter().find(|b| b.url == "http://b").unwrap();
        assert_eq!(a.key, "only-a");
        assert_eq!(b.key, "");
    }

    #[test]
    fn modules_all_detection() {
        let mut config = BoostConfig::from_env();
        config.modules = vec!["all".to_string()];
        assert!(config.modules_all());
        config.modules = vec!["rcn".to_string(), "g1".to_string()];
        assert!(!config.modules_all());
    }
}
