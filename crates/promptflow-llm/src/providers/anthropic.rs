use futures::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use promptflow_core::error::{FlowError, Result};
use promptflow_core::traits::{CompletionRequest, CompletionResponse, Provider};

use super::sampling_params;
use crate::pricing::anthropic_price;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    name: String,
    http: Client,
    api_key: String,
    base_url: String,
    extra_headers: Vec<(String, String)>,
}

impl AnthropicProvider {
    pub fn new(name: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            http: Client::new(),
            api_key: api_key.into(),
            base_url: ANTHROPIC_API_URL.to_string(),
            extra_headers: Vec::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.extra_headers = headers;
        self
    }

    fn build_body(&self, request: &CompletionRequest) -> Result<MessagesRequest> {
        let (temperature, max_tokens) = sampling_params(&request.settings)?;
        Ok(MessagesRequest {
            model: request.model.clone(),
            max_tokens,
            temperature,
            messages: vec![ApiMessage {
                role: "user".to_string(),
                content: request.prompt.clone(),
            }],
        })
    }

    fn parse_response(
        &self,
        requested_model: &str,
        response: MessagesResponse,
    ) -> Result<CompletionResponse> {
        let content = response
            .content
            .into_iter()
            .find(|block| block.kind == "text")
            .map(|block| block.text)
            .filter(|text| !text.is_empty())
            .ok_or_else(|| {
                FlowError::LlmParse("no text content in response from Anthropic".to_string())
            })?;

        let (input_cost, output_cost) = anthropic_price(requested_model)
            .cost(response.usage.input_tokens, response.usage.output_tokens);

        Ok(CompletionResponse {
            content,
            input_tokens: response.usage.input_tokens,
            output_tokens: response.usage.output_tokens,
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
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<ApiMessage>,
}

#[derive(Serialize, Debug)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Deserialize, Debug)]
struct MessagesResponse {
    #[serde(default)]
    model: String,
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: UsageInfo,
}

#[derive(Deserialize, Debug)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Deserialize, Debug, Default)]
struct UsageInfo {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn complete(&self, request: CompletionRequest) -> BoxFuture<'_, Result<CompletionResponse>> {
        Box::pin(async move {
            if self.api_key.is_empty() {
                return Err(FlowError::Config(
                    "Anthropic API key not set (use ANTHROPIC_API_KEY environment variable)".into(),
                ));
            }

            let body = self.build_body(&request)?;
            debug!(provider = %self.name, model = %body.model, "Sending messages request");

            let mut req = self
                .http
                .post(&self.base_url)
                .header("x-api-key", self.api_key.as_str())
                .header("anthropic-version", ANTHROPIC_VERSION)
                .header("content-type", "application/json");
            for (k, v) in &self.extra_headers {
                req = req.header(k.as_str(), v.as_str());
            }

            let response = req
                .json(&body)
                .send()
                .await
                .map_err(|e| FlowError::LlmRequest(e.to_string()))?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "unknown error".to_string());
                return Err(FlowError::LlmRequest(format!("HTTP {}: {}", status, body)));
            }

            let parsed: MessagesResponse = response
                .json()
                .await
                .map_err(|e| FlowError::LlmParse(e.to_string()))?;

            self.parse_response(&request.model, parsed)
        })
    }
}
