use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{FlowError, Result};

/// Top-level promptflow configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub executor: ExecutorConfig,
    /// Providers keyed by the name flows use to refer to them.
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Deadline for a whole flow execution.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 { 300 }

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Client implementation: "openai", "anthropic", or an OpenAI-compatible
    /// preset name. Defaults to the provider's registry name.
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub extra_headers: HashMap<String, String>,
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

impl ProviderConfig {
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Default::default()
        }
    }

    /// The client kind, falling back to the registry name.
    pub fn kind_or<'a>(&'a self, name: &'a str) -> &'a str {
        self.kind.as_deref().unwrap_or(name)
    }
}

/// Retry configuration for provider requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

fn default_max_retries() -> u32 { 3 }
fn default_initial_backoff() -> u64 { 1000 }
fn default_max_backoff() -> u64 { 30000 }

/// Environment variables read by [`AppConfig::from_env`], with the provider
/// each one enables.
pub const PROVIDER_ENV_VARS: &[(&str, &str)] = &[
    ("openai", "OPENAI_API_KEY"),
    ("anthropic", "ANTHROPIC_API_KEY"),
    ("github_playground_openai", "GITHUB_PLAYGROUND_PAT"),
];

impl AppConfig {
    /// Load config from a TOML file, with env var expansion.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| FlowError::ConfigNotFound(path.display().to_string()))?;

        Self::parse(&content)
    }

    /// Parse TOML config text, expanding `${ENV_VAR}` references first.
    pub fn parse(content: &str) -> Result<Self> {
        let expanded = expand_env_vars(content);

        toml::from_str(&expanded).map_err(|e| FlowError::Config(e.to_string()))
    }

    /// Default provider set keyed off well-known environment variables.
    ///
    /// Every provider is registered even when its key is unset, so a flow that
    /// names it fails at call time with a clear message instead of "provider
    /// not found".
    pub fn from_env() -> Self {
        let providers = PROVIDER_ENV_VARS
            .iter()
            .map(|(name, var)| {
                let api_key = std::env::var(var).unwrap_or_default();
                (name.to_string(), ProviderConfig::with_api_key(api_key))
            })
            .collect();

        Self {
            executor: ExecutorConfig::default(),
            providers,
        }
    }

    /// Load `path` if it exists, otherwise fall back to [`AppConfig::from_env`].
    pub fn load_or_env(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::from_env())
        }
    }

    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.executor.timeout_secs)
    }
}

/// Expand `${ENV_VAR}` patterns in a string.
fn expand_env_vars(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(open) = rest.find("${") {
        out.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        let Some(close) = after.find('}') else {
            // Unterminated reference: copy the remainder as-is.
            out.push_str(&rest[open..]);
            return out;
        };
        let name = &after[..close];
        match std::env::var(name) {
            Ok(value) => out.push_str(&value),
            Err(_) => out.push_str(&rest[open..open + 2 + close + 1]),
        }
        rest = &after[close + 1..];
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_uses_defaults() {
        let config = AppConfig::parse("").unwrap();
        assert_eq!(config.executor.timeout_secs, 300);
        assert!(config.providers.is_empty());
    }

    #[test]
    fn unset_env_var_is_kept_verbatim() {
        let expanded = expand_env_vars("key = \"${PROMPTFLOW_SURELY_UNSET_VAR}\"");
        assert_eq!(expanded, "key = \"${PROMPTFLOW_SURELY_UNSET_VAR}\"");
    }

    #[test]
    fn provider_kind_defaults_to_name() {
        let config = AppConfig::parse(
            r#"
[providers.openai]
api_key = "sk-test"

[providers.local]
kind = "ollama"
base_url = "http://localhost:11434/v1/chat/completions"
"#,
        )
        .unwrap();

        assert_eq!(config.providers["openai"].kind_or("openai"), "openai");
        assert_eq!(config.providers["local"].kind_or("local"), "ollama");
    }

    #[test]
    fn invalid_toml_is_config_error() {
        let err = AppConfig::parse("[executor\ntimeout_secs = 1").unwrap_err();
        assert!(matches!(err, FlowError::Config(_)));
    }
}
