//! Mocks and fixtures shared by the promptflow test suites.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;

use promptflow_core::error::{FlowError, Result};
use promptflow_core::flow::{FlowDefinition, NodeDefinition};
use promptflow_core::loader;
use promptflow_core::traits::{CompletionRequest, CompletionResponse, Provider};

/// Recorded requests, shared between a [`MockProvider`] and the test.
pub type CallLog = Arc<Mutex<Vec<CompletionRequest>>>;

#[derive(Debug, Clone)]
enum Reply {
    Echo,
    Fixed(CompletionResponse),
    Fail(String),
}

/// Scriptable in-memory provider.
///
/// By default it echoes the prompt back as the completion text. Every request
/// is recorded before the reply is produced, so tests can assert on calls that
/// were later cancelled.
#[derive(Debug, Clone)]
pub struct MockProvider {
    name: String,
    default: Reply,
    by_prompt: HashMap<String, Reply>,
    delay: Option<Duration>,
    calls: CallLog,
}

impl MockProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: Reply::Echo,
            by_prompt: HashMap::new(),
            delay: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Reply with `text` to every prompt without a specific reply.
    pub fn with_reply(self, text: impl Into<String>) -> Self {
        self.with_response(CompletionResponse::text(text))
    }

    pub fn with_response(mut self, response: CompletionResponse) -> Self {
        self.default = Reply::Fixed(response);
        self
    }

    /// Reply with `text` when the rendered prompt is exactly `prompt`.
    pub fn with_reply_for(mut self, prompt: impl Into<String>, text: impl Into<String>) -> Self {
        self.by_prompt
            .insert(prompt.into(), Reply::Fixed(CompletionResponse::text(text)));
        self
    }

    /// Fail every call with a request error carrying `message`.
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.default = Reply::Fail(message.into());
        self
    }

    /// Fail only when the rendered prompt is exactly `prompt`.
    pub fn failing_for(mut self, prompt: impl Into<String>, message: impl Into<String>) -> Self {
        self.by_prompt
            .insert(prompt.into(), Reply::Fail(message.into()));
        self
    }

    /// Sleep before replying.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Handle to the call log. Stays valid after the provider is moved into a
    /// registry.
    pub fn calls(&self) -> CallLog {
        Arc::clone(&self.calls)
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    fn reply_for(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        let reply = self.by_prompt.get(&request.prompt).unwrap_or(&self.default);
        match reply {
            Reply::Echo => Ok(CompletionResponse {
                content: request.prompt.clone(),
                input_tokens: request.prompt.split_whitespace().count() as u64,
                output_tokens: request.prompt.split_whitespace().count() as u64,
                input_cost: 0.0,
                output_cost: 0.0,
                model: request.model.clone(),
            }),
            Reply::Fixed(response) => Ok(response.clone()),
            Reply::Fail(message) => Err(FlowError::LlmRequest(message.clone())),
        }
    }
}

impl Provider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn complete(&self, request: CompletionRequest) -> BoxFuture<'_, Result<CompletionResponse>> {
        Box::pin(async move {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(request.clone());
            }
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.reply_for(&request)
        })
    }
}

/// Flow inputs from string pairs.
pub fn inputs(pairs: &[(&str, &str)]) -> HashMap<String, serde_json::Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
        .collect()
}

/// Two-node flow: `draft` reads the flow input `topic`, `polish` reads
/// `draft.text` and exposes `result` as a flow output. Both use the `mock`
/// provider by default.
pub fn linear_flow() -> FlowDefinition {
    FlowDefinition::new("linear", "1.0")
        .with_default_provider("mock")
        .with_default_model("mock-model")
        .with_node(
            NodeDefinition::new("draft")
                .with_flow_input("topic")
                .with_prompt("Write about {{ topic }}")
                .with_output("text"),
        )
        .with_node(
            NodeDefinition::new("polish")
                .with_input("draft", "draft.text")
                .with_prompt("Polish: {{ draft }}")
                .with_flow_output("result"),
        )
}

/// Write `flow` to a temporary file named `file_name` (its extension picks the
/// format). Keep the returned directory alive for as long as the file is used.
pub fn temp_flow_file(flow: &FlowDefinition, file_name: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join(file_name);
    loader::save_file(flow, &path).expect("write flow file");
    (dir, path)
}

/// Write raw text to a temporary file named `file_name`.
pub fn temp_file(content: &str, file_name: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join(file_name);
    std::fs::write(&path, content).expect("write temp file");
    (dir, path)
}
