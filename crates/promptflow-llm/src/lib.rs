pub mod pricing;
pub mod providers;
pub mod retry;

use std::sync::Arc;

use tracing::debug;

use promptflow_core::config::{AppConfig, ProviderConfig};
use promptflow_core::error::{FlowError, Result};
use promptflow_core::traits::Provider;
use promptflow_engine::ProviderRegistry;

pub use providers::anthropic::AnthropicProvider;
pub use providers::openai::OpenAiProvider;
pub use providers::presets;
pub use retry::RetryingProvider;

/// Build the provider registered as `name` from its config.
///
/// The client is chosen by `kind` (or `name` when unset): `anthropic`/`claude`
/// use the Anthropic API, known presets use their OpenAI-compatible endpoint,
/// and anything else is accepted only with an explicit `base_url`.
pub fn create_provider(name: &str, config: &ProviderConfig) -> Result<Arc<dyn Provider>> {
    let kind = config.kind_or(name);
    let api_key = config.api_key.clone().unwrap_or_default();

    let provider: Arc<dyn Provider> = match kind {
        "anthropic" | "claude" => {
            let mut provider = AnthropicProvider::new(name, api_key)
                .with_headers(config.extra_headers.clone().into_iter().collect());
            if let Some(url) = &config.base_url {
                provider = provider.with_base_url(url.as_str());
            }
            Arc::new(provider)
        }
        _ => {
            let mut provider = match presets::get_preset(kind) {
                Some(preset) => OpenAiProvider::new(name, api_key)
                    .with_preset(&preset)
                    .with_headers(presets::build_extra_headers(&preset, &config.extra_headers)),
                None if config.base_url.is_some() => OpenAiProvider::new(name, api_key)
                    .with_headers(config.extra_headers.clone().into_iter().collect()),
                None => {
                    return Err(FlowError::Config(format!(
                        "unknown provider kind '{kind}' for provider '{name}' \
                         (set base_url for OpenAI-compatible endpoints)"
                    )))
                }
            };
            if let Some(url) = &config.base_url {
                provider = provider.with_base_url(url.as_str());
            }
            Arc::new(provider)
        }
    };

    Ok(match &config.retry {
        Some(retry) => Arc::new(RetryingProvider::new(provider, retry.clone())),
        None => provider,
    })
}

/// Registry with one provider per `[providers.<name>]` entry.
pub fn build_registry(config: &AppConfig) -> Result<ProviderRegistry> {
    let mut registry = ProviderRegistry::new();
    for (name, provider_config) in &config.providers {
        let provider = create_provider(name, provider_config)?;
        debug!(
            provider = %name,
            kind = %provider_config.kind_or(name),
            has_key = provider_config.api_key.as_deref().is_some_and(|k| !k.is_empty()),
            "Registered provider"
        );
        registry.register_as(name.as_str(), provider);
    }
    Ok(registry)
}
