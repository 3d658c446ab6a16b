//! In-memory representation of a prompt flow.
//!
//! A flow is a named, versioned set of nodes. Each node wraps a single
//! completion call and is wired to the rest of the flow through named input
//! and output bindings. Declaration order of nodes only matters as the
//! tie-break when several nodes are ready to run at once.

use serde::{Deserialize, Serialize};

use crate::settings::Settings;

/// Input source meaning "supplied by the caller under the same name".
pub const FLOW_INPUT: &str = "input";

/// Output destination meaning "include in the flow's outputs".
pub const FLOW_OUTPUT: &str = "output";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowDefinition {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub config: FlowConfig,
    #[serde(default)]
    pub nodes: Vec<NodeDefinition>,
}

/// Flow-level defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
    #[serde(default, skip_serializing_if = "Settings::is_empty")]
    pub settings: Settings,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeDefinition {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default)]
    pub inputs: Vec<InputBinding>,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub outputs: Vec<OutputBinding>,
    #[serde(default, skip_serializing_if = "Settings::is_empty")]
    pub settings: Settings,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputBinding {
    #[serde(default)]
    pub name: String,
    /// `"input"` for a flow input, otherwise `"<node_id>.<output_name>"`.
    #[serde(default)]
    pub from: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputBinding {
    #[serde(default)]
    pub name: String,
    /// `"output"` to expose this value as a flow output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
}

/// Parsed form of [`InputBinding::from`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource<'a> {
    FlowInput,
    NodeOutput { node_id: &'a str, output: &'a str },
}

impl FlowDefinition {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_default_provider(mut self, provider: impl Into<String>) -> Self {
        self.config.default_provider = Some(provider.into());
        self
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.config.default_model = Some(model.into());
        self
    }

    pub fn with_node(mut self, node: NodeDefinition) -> Self {
        self.nodes.push(node);
        self
    }
}

impl NodeDefinition {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// Add an input fed by the caller.
    pub fn with_flow_input(self, name: impl Into<String>) -> Self {
        self.with_input(name, FLOW_INPUT)
    }

    pub fn with_input(mut self, name: impl Into<String>, from: impl Into<String>) -> Self {
        self.inputs.push(InputBinding {
            name: name.into(),
            from: from.into(),
        });
        self
    }

    /// Add an output only visible to downstream nodes.
    pub fn with_output(mut self, name: impl Into<String>) -> Self {
        self.outputs.push(OutputBinding {
            name: name.into(),
            to: None,
        });
        self
    }

    /// Add an output that is also exposed as a flow output.
    pub fn with_flow_output(mut self, name: impl Into<String>) -> Self {
        self.outputs.push(OutputBinding {
            name: name.into(),
            to: Some(FLOW_OUTPUT.to_string()),
        });
        self
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Provider for this node after falling back to the flow default.
    pub fn effective_provider<'a>(&'a self, config: &'a FlowConfig) -> Option<&'a str> {
        non_empty(self.provider.as_deref())
            .or_else(|| non_empty(config.default_provider.as_deref()))
    }

    /// Model for this node after falling back to the flow default.
    pub fn effective_model<'a>(&'a self, config: &'a FlowConfig) -> Option<&'a str> {
        non_empty(self.model.as_deref()).or_else(|| non_empty(config.default_model.as_deref()))
    }

    /// Ids of the nodes this node reads from, in input order. May repeat.
    pub fn dependencies(&self) -> impl Iterator<Item = &str> {
        self.inputs.iter().filter_map(|input| match input.source() {
            Ok(InputSource::NodeOutput { node_id, .. }) => Some(node_id),
            _ => None,
        })
    }
}

impl InputBinding {
    pub fn is_flow_input(&self) -> bool {
        self.from == FLOW_INPUT
    }

    /// Parse the source descriptor. The reference form is split at the first
    /// `.`; both halves must be non-empty.
    pub fn source(&self) -> Result<InputSource<'_>, String> {
        if self.is_flow_input() {
            return Ok(InputSource::FlowInput);
        }
        match self.from.split_once('.') {
            Some((node_id, output)) if !node_id.is_empty() && !output.is_empty() => {
                Ok(InputSource::NodeOutput { node_id, output })
            }
            _ => Err(format!(
                "invalid input reference format: {} (expected 'nodeID.outputName')",
                self.from
            )),
        }
    }
}

impl OutputBinding {
    pub fn is_flow_output(&self) -> bool {
        self.to.as_deref() == Some(FLOW_OUTPUT)
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.is_empty())
}
