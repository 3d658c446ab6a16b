use std::collections::{BTreeMap, HashMap};

use tracing::{debug, warn};

use promptflow_core::error::{FlowError, Result};
use promptflow_core::flow::{FlowDefinition, InputSource, NodeDefinition};
use promptflow_core::result::{NodeMetrics, NodeResult};
use promptflow_core::traits::CompletionRequest;

use crate::control::ExecutionControl;
use crate::registry::ProviderRegistry;
use crate::template::render_prompt;
use crate::{FlowInputs, NodeOutputs};

/// Runs one node: resolves its inputs, renders the prompt, and calls the
/// node's provider.
pub struct NodeRunner<'a> {
    registry: &'a ProviderRegistry,
    control: &'a ExecutionControl,
}

impl<'a> NodeRunner<'a> {
    pub fn new(registry: &'a ProviderRegistry, control: &'a ExecutionControl) -> Self {
        Self { registry, control }
    }

    /// Run `node` and return its result alongside the failure, if any.
    ///
    /// The result is always populated (timing, error text, error kind) so the
    /// caller can report partial progress even when the node fails.
    pub async fn run(
        &self,
        flow: &FlowDefinition,
        node: &NodeDefinition,
        flow_inputs: &FlowInputs,
        prior_outputs: &HashMap<String, NodeOutputs>,
    ) -> (NodeResult, Result<()>) {
        let mut result = NodeResult::started(&node.id);

        match self.execute(flow, node, flow_inputs, prior_outputs).await {
            Ok((outputs, metrics)) => {
                result.outputs = outputs;
                result.metrics = metrics;
                result.succeed();
                debug!(
                    node_id = %node.id,
                    duration_ms = result.duration_ms,
                    input_tokens = metrics.input_tokens,
                    output_tokens = metrics.output_tokens,
                    "Node succeeded"
                );
                (result, Ok(()))
            }
            Err(e) => {
                result.fail(&e);
                warn!(node_id = %node.id, kind = %e.kind(), error = %e, "Node failed");
                (result, Err(e))
            }
        }
    }

    async fn execute(
        &self,
        flow: &FlowDefinition,
        node: &NodeDefinition,
        flow_inputs: &FlowInputs,
        prior_outputs: &HashMap<String, NodeOutputs>,
    ) -> Result<(NodeOutputs, NodeMetrics)> {
        self.control.check()?;

        let inputs = resolve_inputs(node, flow_inputs, prior_outputs)?;
        let prompt = render_prompt(&node.id, &node.prompt, &inputs)?;

        let provider_name = node
            .effective_provider(&flow.config)
            .ok_or(FlowError::NoProvider)?;
        let model = node
            .effective_model(&flow.config)
            .ok_or(FlowError::NoModel)?;

        let provider = self
            .registry
            .get(provider_name)
            .ok_or_else(|| FlowError::ProviderNotFound(provider_name.to_string()))?;

        debug!(
            node_id = %node.id,
            provider = provider_name,
            model,
            prompt_len = prompt.len(),
            "Calling provider"
        );

        let request = CompletionRequest {
            prompt,
            model: model.to_string(),
            settings: node.settings.clone(),
        };

        let response = self
            .control
            .run(async {
                provider.complete(request).await.map_err(|e| {
                    if e.is_cancellation() {
                        e
                    } else {
                        FlowError::Provider {
                            provider: provider_name.to_string(),
                            message: e.to_string(),
                        }
                    }
                })
            })
            .await?;

        // Only the first declared output receives the completion text.
        let mut outputs = NodeOutputs::new();
        if let Some(first) = node.outputs.first() {
            outputs.insert(
                first.name.clone(),
                serde_json::Value::String(response.content.clone()),
            );
        }

        Ok((outputs, response.metrics()))
    }
}

/// Resolve each declared input of `node` from the caller's flow inputs or an
/// earlier node's outputs. Keys of the returned map are input names.
pub fn resolve_inputs(
    node: &NodeDefinition,
    flow_inputs: &FlowInputs,
    prior_outputs: &HashMap<String, NodeOutputs>,
) -> Result<BTreeMap<String, serde_json::Value>> {
    let mut resolved = BTreeMap::new();

    for input in &node.inputs {
        let source = input
            .source()
            .map_err(|_| FlowError::InvalidReference(input.from.clone()))?;

        let value = match source {
            InputSource::FlowInput => flow_inputs
                .get(&input.name)
                .cloned()
                .ok_or_else(|| FlowError::MissingFlowInput(input.name.clone()))?,
            InputSource::NodeOutput { node_id, output } => {
                let outputs = prior_outputs
                    .get(node_id)
                    .ok_or_else(|| FlowError::NodeOutputsNotFound(node_id.to_string()))?;
                outputs
                    .get(output)
                    .cloned()
                    .ok_or_else(|| FlowError::OutputNotFound {
                        node_id: node_id.to_string(),
                        output: output.to_string(),
                    })?
            }
        };

        resolved.insert(input.name.clone(), value);
    }

    Ok(resolved)
}
