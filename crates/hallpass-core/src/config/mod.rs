use crate::error::{HallpassError, Result};
use config::{Config, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HallpassConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub llm: LlmConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Custom path for the SQLite database. Defaults to `~/.config/hallpass/hallpass.db`.
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HS256 signing secret. Falls back to `HALLPASS_JWT_SECRET`.
    #[serde(default)]
    pub jwt_secret: Option<String>,
    #[serde(default = "default_token_ttl_days")]
    pub token_ttl_days: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            token_ttl_days: default_token_ttl_days(),
        }
    }
}

impl AuthConfig {
    /// Resolve the signing secret from config or the environment.
    ///
    /// Development fallback is `"secret"`, with a warning — never ship that.
    pub fn resolve_secret(&self) -> String {
        if let Some(ref secret) = self.jwt_secret {
            if !secret.is_empty() {
                return secret.clone();
            }
        }
        if let Ok(secret) = std::env::var("HALLPASS_JWT_SECRET") {
            if !secret.is_empty() {
                return secret;
            }
        }
        tracing::warn!("no JWT secret configured, using insecure development default");
        "secret".to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub env_var: Option<String>,
    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: usize,
    /// Deadline for a single model call, in seconds.
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: default_llm_provider(),
            model: default_llm_model(),
            api_key: None,
            base_url: None,
            env_var: None,
            max_tokens: default_llm_max_tokens(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

/// Valid LLM provider names.
pub const VALID_LLM_PROVIDERS: &[&str] = &["groq", "openai", "ollama"];

impl HallpassConfig {
    /// Load configuration with a two-layer TOML merge:
    /// 1. ~/.config/hallpass/config.toml (global)
    /// 2. ./hallpass.toml (working directory)
    pub fn load(dir: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                builder = builder.add_source(File::from(global_path).required(false));
            }
        }

        let local = dir.unwrap_or(Path::new(".")).join("hallpass.toml");
        if local.exists() {
            builder = builder.add_source(File::from(local).required(false));
        }

        let config = builder
            .build()
            .map_err(|e| HallpassError::Config(e.to_string()))?;

        let mut cfg: Self = config
            .try_deserialize()
            .map_err(|e| HallpassError::Config(e.to_string()))?;

        cfg.validate();
        Ok(cfg)
    }

    /// Load with defaults only (no files).
    pub fn default_config() -> Self {
        Self::default()
    }

    /// Validate config values, fixing what can be fixed and returning warnings.
    pub fn validate(&mut self) -> Vec<String> {
        let mut warnings = Vec::new();

        if !VALID_LLM_PROVIDERS.contains(&self.llm.provider.as_str()) {
            warnings.push(format!(
                "unknown LLM provider '{}', valid: {}",
                self.llm.provider,
                VALID_LLM_PROVIDERS.join(", ")
            ));
        }

        if self.auth.token_ttl_days <= 0 {
            warnings.push(format!(
                "auth.token_ttl_days must be positive, got {}; using {}",
                self.auth.token_ttl_days,
                default_token_ttl_days()
            ));
            self.auth.token_ttl_days = default_token_ttl_days();
        }

        for w in &warnings {
            tracing::warn!("config: {w}");
        }
        warnings
    }

    /// Resolve the SQLite database path.
    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.storage.path {
            Some(p) => Ok(PathBuf::from(p)),
            None => dirs::config_dir()
                .map(|p| p.join("hallpass").join("hallpass.db"))
                .ok_or_else(|| {
                    HallpassError::Config("cannot determine config directory".to_string())
                }),
        }
    }
}

fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("hallpass").join("config.toml"))
}

// -- Defaults --

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    3000
}
fn default_token_ttl_days() -> i64 {
    7
}
fn default_llm_provider() -> String {
    "groq".to_string()
}
fn default_llm_model() -> String {
    "llama-3.3-70b-versatile".to_string()
}
fn default_llm_max_tokens() -> usize {
    1024
}
fn default_llm_timeout_secs() -> u64 {
    30
}
