use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::result::NodeMetrics;
use crate::settings::Settings;

/// A single completion request sent to a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub model: String,
    pub settings: Settings,
}

/// Generated text plus usage reported by the provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub content: String,
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub input_cost: f64,
    #[serde(default)]
    pub output_cost: f64,
    /// Model that actually served the request.
    #[serde(default)]
    pub model: String,
}

impl CompletionResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn metrics(&self) -> NodeMetrics {
        NodeMetrics {
            input_tokens: self.input_tokens,
            output_tokens: self.output_tokens,
            input_cost: self.input_cost,
            output_cost: self.output_cost,
        }
    }
}

/// Text-completion backend.
pub trait Provider: Send + Sync + 'static {
    /// Registry name (e.g., "openai", "anthropic").
    fn name(&self) -> &str;

    /// Send a prompt and wait for the full completion.
    fn complete(&self, request: CompletionRequest) -> BoxFuture<'_, Result<CompletionResponse>>;
}
