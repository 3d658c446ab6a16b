use futures::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use promptflow_core::error::{FlowError, Result};
use promptflow_core::traits::{CompletionRequest, CompletionResponse, Provider};

use super::presets::ProviderPreset;
use super::sampling_params;
use crate::pricing::PriceTable;

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// OpenAI-compatible chat completions client. Works with OpenAI, the GitHub
/// models playground, Ollama, Groq, OpenRouter, etc.
pub struct OpenAiProvider {
    name: String,
    http: Client,
    api_key: String,
    needs_api_key: bool,
    base_url: String,
    extra_headers: Vec<(String, String)>,
    pricing: PriceTable,
    model_prefix: Option<String>,
}

impl OpenAiProvider {
    pub fn new(name: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            http: Client::new(),
            api_key: api_key.into(),
            needs_api_key: true,
            base_url: OPENAI_API_URL.to_string(),
            extra_headers: Vec::new(),
            pricing: PriceTable::OpenAi,
            model_prefix: None,
        }
    }

    /// Apply a preset's endpoint, key requirement, and pricing.
    pub fn with_preset(mut self, preset: &ProviderPreset) -> Self {
        self.base_url = preset.default_base_url.to_string();
        self.needs_api_key = preset.needs_api_key;
        self.pricing = preset.pricing;
        self.model_prefix = preset.model_prefix.map(str::to_string);
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.extra_headers = headers;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_body(&self, request: &CompletionRequest) -> Result<ChatRequest> {
        let (temperature, max_tokens) = sampling_params(&request.settings)?;
        Ok(ChatRequest {
            model: request.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: request.prompt.clone(),
            }],
            temperature,
            max_tokens,
            stream: false,
        })
    }

    fn parse_response(
        &self,
        requested_model: &str,
        response: ChatResponse,
    ) -> Result<CompletionResponse> {
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| FlowError::LlmParse(format!("no response from {}", self.name)))?;

        let usage = response.usage.unwrap_or_default();
        let priced_model = match &self.model_prefix {
            Some(prefix) => requested_model
                .strip_prefix(prefix.as_str())
                .unwrap_or(requested_model),
            None => requested_model,
        };
        let (input_cost, output_cost) = self
            .pricing
            .lookup(priced_model)
            .cost(usage.prompt_tokens, usage.completion_tokens);

        Ok(CompletionResponse {
            content,
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
            input_cost,
            output_cost,
            model: if response.model.is_empty() {
                requested_model.to_string()
            } else {
                response.model
            },
        })
    }
}

#[derive(Serialize, Debug)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Serialize, Debug)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize, Debug)]
struct ChatResponse {
    #[serde(default)]
    model: String,
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize, Debug)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize, Debug)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

impl Provider for OpenAiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn complete(&self, request: CompletionRequest) -> BoxFuture<'_, Result<CompletionResponse>> {
        Box::pin(async move {
            if self.needs_api_key && self.api_key.is_empty() {
                return Err(FlowError::Config(format!(
                    "{} provider received an empty API key",
                    self.name
                )));
            }

            let body = self.build_body(&request)?;
            debug!(
                provider = %self.name,
                model = %body.model,
                url = %self.base_url,
                "Sending chat completion"
            );

            let mut req = self.http.post(&self.base_url).json(&body);
            if !self.api_key.is_empty() {
                req = req.header("Authorization", format!("Bearer {}", self.api_key));
            }
            for (k, v) in &self.extra_headers {
                req = req.header(k.as_str(), v.as_str());
            }

            let response = req
                .send()
                .await
                .map_err(|e| FlowError::LlmRequest(e.to_string()))?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "unknown".to_string());
                return Err(FlowError::LlmRequest(format!("HTTP {}: {}", status, body)));
            }

            let parsed: ChatResponse = response
                .json()
                .await
                .map_err(|e| FlowError::LlmParse(e.to_string()))?;

            self.parse_response(&request.model, parsed)
        })
    }
}
