use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::settings::SettingError;

/// A structural problem with a flow definition, tagged with the path of the
/// offending field (e.g. `nodes[2].inputs[0].name`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
    /// Either [`ErrorKind::Structural`] or [`ErrorKind::Cycle`].
    #[serde(default = "structural")]
    pub kind: ErrorKind,
}

fn structural() -> ErrorKind {
    ErrorKind::Structural
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            kind: ErrorKind::Structural,
        }
    }

    /// A dependency cycle between nodes.
    pub fn cycle(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Cycle,
            ..Self::new(field, message)
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Coarse classification of a [`FlowError`], recorded on results so callers
/// can react without matching on message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Structural,
    Cycle,
    InputResolution,
    Template,
    Configuration,
    Backend,
    Cancelled,
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Structural => "structural",
            ErrorKind::Cycle => "cycle",
            ErrorKind::InputResolution => "input_resolution",
            ErrorKind::Template => "template",
            ErrorKind::Configuration => "configuration",
            ErrorKind::Backend => "backend",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Io => "io",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum FlowError {
    // Structural errors
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("failed to parse flow: {0}")]
    Parse(String),

    #[error("cycle detected in flow graph (unscheduled nodes: {})", .unscheduled.join(", "))]
    Cycle { unscheduled: Vec<String> },

    // Input resolution errors
    #[error("flow input not provided: {0}")]
    MissingFlowInput(String),

    #[error("node outputs not found: {0}")]
    NodeOutputsNotFound(String),

    #[error("output not found: {node_id}.{output}")]
    OutputNotFound { node_id: String, output: String },

    #[error("invalid input reference: {0}")]
    InvalidReference(String),

    // Template errors
    #[error("failed to render prompt template for node {node_id}: {message}")]
    Template { node_id: String, message: String },

    // Configuration errors
    #[error("no provider specified for node and no default provider set")]
    NoProvider,

    #[error("no model specified for node and no default model set")]
    NoModel,

    #[error("provider not found: {0}")]
    ProviderNotFound(String),

    #[error("invalid setting: {0}")]
    Setting(#[from] SettingError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // Backend errors
    #[error("LLM call failed: {provider}: {message}")]
    Provider { provider: String, message: String },

    #[error("LLM request failed: {0}")]
    LlmRequest(String),

    #[error("LLM response parse error: {0}")]
    LlmParse(String),

    // Cancellation
    #[error("execution cancelled")]
    Cancelled,

    #[error("execution deadline exceeded")]
    DeadlineExceeded,

    #[error("node {node_id} failed: {source}")]
    NodeFailed {
        node_id: String,
        #[source]
        source: Box<FlowError>,
    },

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FlowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FlowError::Validation(e) => e.kind,
            FlowError::Parse(_) => ErrorKind::Structural,
            FlowError::Cycle { .. } => ErrorKind::Cycle,
            FlowError::MissingFlowInput(_)
            | FlowError::NodeOutputsNotFound(_)
            | FlowError::OutputNotFound { .. }
            | FlowError::InvalidReference(_) => ErrorKind::InputResolution,
            FlowError::Template { .. } => ErrorKind::Template,
            FlowError::NoProvider
            | FlowError::NoModel
            | FlowError::ProviderNotFound(_)
            | FlowError::Setting(_)
            | FlowError::Config(_)
            | FlowError::ConfigNotFound(_) => ErrorKind::Configuration,
            FlowError::Provider { .. } | FlowError::LlmRequest(_) | FlowError::LlmParse(_) => {
                ErrorKind::Backend
            }
            FlowError::Cancelled | FlowError::DeadlineExceeded => ErrorKind::Cancelled,
            FlowError::NodeFailed { source, .. } => source.kind(),
            FlowError::Io(_) | FlowError::Json(_) => ErrorKind::Io,
        }
    }

    pub fn is_cancellation(&self) -> bool {
        self.kind() == ErrorKind::Cancelled
    }
}

pub type Result<T> = std::result::Result<T, FlowError>;
