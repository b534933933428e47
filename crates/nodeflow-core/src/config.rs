use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{NodeflowError, Result};

/// Top-level nodeflow configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub transform: TransformConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub gateway: Option<GatewayConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Upper bound for a single node executor call. 0 disables the limit.
    #[serde(default = "default_node_timeout")]
    pub node_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            node_timeout_secs: default_node_timeout(),
        }
    }
}

fn default_node_timeout() -> u64 { 60 }

/// Credentials injected into API nodes by provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub stripe_secret_key: Option<String>,
}

impl ProvidersConfig {
    /// Credentials with unresolved `${VAR}` placeholders dropped.
    pub fn credentials(&self) -> ProviderCredentials {
        ProviderCredentials {
            stripe_secret_key: resolved_secret(self.stripe_secret_key.as_deref()),
        }
    }
}

/// Resolved provider secrets handed to the node executors.
#[derive(Debug, Clone, Default)]
pub struct ProviderCredentials {
    pub stripe_secret_key: Option<String>,
}

/// Settings for the OpenAI-compatible text-cleaning service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_transform_url")]
    pub base_url: String,
    #[serde(default = "default_transform_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_transform_url(),
            model: default_transform_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl TransformConfig {
    pub fn resolved_api_key(&self) -> Option<String> {
        resolved_secret(self.api_key.as_deref())
    }
}

fn default_transform_url() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}
fn default_transform_model() -> String { "gpt-4o".to_string() }
fn default_temperature() -> f32 { 0.7 }
fn default_max_tokens() -> u32 { 2000 }
fn default_timeout_secs() -> u64 { 120 }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite database holding workflows and execution logs.
    #[serde(default = "default_store_path")]
    pub path: String,
    #[serde(default = "default_max_log_entries")]
    pub max_log_entries: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            max_log_entries: default_max_log_entries(),
        }
    }
}

fn default_store_path() -> String { "data/nodeflow.db".to_string() }
fn default_max_log_entries() -> usize { 1000 }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String { "127.0.0.1:3000".to_string() }

impl AppConfig {
    /// Load config from a TOML file, expanding `${ENV_VAR}` references first.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| NodeflowError::ConfigNotFound(path.display().to_string()))?;

        let expanded = expand_env_vars(&content);

        toml::from_str(&expanded).map_err(|e| NodeflowError::Config(e.to_string()))
    }

    /// Load the file if present, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Err(NodeflowError::ConfigNotFound(p)) => {
                tracing::warn!(path = %p, "Config file not found, using defaults");
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Resolve the store path (expand ~).
    pub fn store_path(&self) -> PathBuf {
        let p = &self.store.path;
        if let Some(rest) = p.strip_prefix("~/") {
            if let Some(home) = home_dir() {
                return home.join(rest);
            }
        }
        PathBuf::from(p)
    }

    pub fn gateway_or_default(&self) -> GatewayConfig {
        self.gateway.clone().unwrap_or_default()
    }
}

/// Treat empty values and unexpanded `${VAR}` references as absent.
fn resolved_secret(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty() && !v.starts_with("${"))
        .map(str::to_string)
}

/// Substitute `${NAME}` with the value of environment variable `NAME`.
///
/// Unset variables and unterminated references are left as written, so
/// secrets that were never exported read as absent in `resolved_secret`.
fn expand_env_vars(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(at) = rest.find("${") {
        out.push_str(&rest[..at]);
        let tail = &rest[at + 2..];
        let Some((name, after)) = tail.split_once('}') else {
            out.push_str(&rest[at..]);
            return out;
        };
        match std::env::var(name) {
            Ok(value) => out.push_str(&value),
            Err(_) => out.push_str(&rest[at..at + 3 + name.len()]),
        }
        rest = after;
    }
    out.push_str(rest);
    out
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .filter(|h| !h.is_empty())
        .map(PathBuf::from)
}
