//! Per-process backend configuration: which user this process serves,
//! where its LLM keys come from, and the static table of module →
//! provider base URLs, loaded once at startup rather than discovered
//! dynamically.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tom_core::config::{GlobalConfig, UserConfigEntry};
use tom_core::error::{Result, TomError};
use tom_core::llm::{LlmProvider, LlmRegistry};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleConfig {
    pub name: String,
    pub base_url: String,
    pub complexity: u8,
    pub is_personal: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub username: String,
    pub listen_port: u16,
    pub modules: Vec<ModuleConfig>,
}

pub fn build_llm_registry(global: &GlobalConfig) -> Result<LlmRegistry> {
    let mut providers = HashMap::new();
    for (name, cfg) in &global.llms {
        let api_key = std::env::var(&cfg.env_var).unwrap_or_else(|_| cfg.api.clone());
        let base_url = default_base_url(name);
        providers.insert(
            name.clone(),
            LlmProvider::new(name.clone(), api_key, base_url, cfg.models.clone()),
        );
    }
    if !providers.contains_key(&global.llm) {
        return Err(TomError::Config(format!(
            "default LLM provider '{}' missing from registry",
            global.llm
        )));
    }
    Ok(LlmRegistry {
        providers,
        default: global.llm.clone(),
    })
}

fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "openai" => "https://api.openai.com/v1".to_string(),
        "mistral" => "https://api.mistral.ai/v1".to_string(),
        "deepseek" => "https://api.deepseek.com".to_string(),
        "grok" => "https://api.x.ai/v1".to_string(),
        other => format!("https://api.{other}.com/v1"),
    }
}

pub fn find_user<'a>(users: &'a [UserConfigEntry], username: &str) -> Option<&'a UserConfigEntry> {
    users.iter().find(|u| u.username == username)
}
