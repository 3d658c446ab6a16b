use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use promptflow_core::error::{FlowError, Result};
use promptflow_core::flow::FlowDefinition;
use promptflow_core::result::ExecutionResult;

use crate::control::ExecutionControl;
use crate::registry::ProviderRegistry;
use crate::runner::NodeRunner;
use crate::scheduler::schedule;
use crate::validator::validate;
use crate::{FlowInputs, NodeOutputs};

/// Where an execution currently is. Exposed for logging and progress reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    NotStarted,
    Validating,
    Scheduling,
    /// Running the node at this position in the schedule.
    Running(usize),
    Succeeded,
    Failed,
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionState::NotStarted => f.write_str("not_started"),
            ExecutionState::Validating => f.write_str("validating"),
            ExecutionState::Scheduling => f.write_str("scheduling"),
            ExecutionState::Running(k) => write!(f, "running({k})"),
            ExecutionState::Succeeded => f.write_str("succeeded"),
            ExecutionState::Failed => f.write_str("failed"),
        }
    }
}

/// Executes flows against a shared provider registry.
///
/// One executor may serve many concurrent executions; each call to
/// [`FlowExecutor::execute`] owns its own intermediate state.
#[derive(Debug, Clone)]
pub struct FlowExecutor {
    registry: Arc<ProviderRegistry>,
}

impl FlowExecutor {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Validate, schedule, and run `flow` sequentially.
    ///
    /// The returned result is always populated. On failure it holds every node
    /// result produced so far and the error is returned alongside it.
    pub async fn execute(
        &self,
        flow: &FlowDefinition,
        inputs: &FlowInputs,
        control: &ExecutionControl,
    ) -> (ExecutionResult, Result<()>) {
        let mut result = ExecutionResult::started(&flow.name);
        let execution_id = result.execution_id;
        let mut state = ExecutionState::NotStarted;

        info!(
            %execution_id,
            flow = %flow.name,
            version = %flow.version,
            nodes = flow.nodes.len(),
            "Starting flow execution"
        );

        advance(&mut state, ExecutionState::Validating, &execution_id);
        if let Err(e) = validate(flow) {
            let err = FlowError::from(e);
            result.fail(format!("validation failed: {err}"), &err);
            advance(&mut state, ExecutionState::Failed, &execution_id);
            error!(%execution_id, error = %err, "Flow validation failed");
            return (result, Err(err));
        }

        advance(&mut state, ExecutionState::Scheduling, &execution_id);
        let order = match schedule(flow) {
            Ok(order) => order,
            Err(err) => {
                result.fail(format!("failed to build execution order: {err}"), &err);
                advance(&mut state, ExecutionState::Failed, &execution_id);
                error!(%execution_id, error = %err, "Flow scheduling failed");
                return (result, Err(err));
            }
        };

        let runner = NodeRunner::new(&self.registry, control);
        let mut node_outputs: HashMap<String, NodeOutputs> = HashMap::with_capacity(order.len());

        for (k, node) in order.iter().enumerate() {
            advance(&mut state, ExecutionState::Running(k), &execution_id);
            info!(
                %execution_id,
                node_id = %node.id,
                step = k + 1,
                of = order.len(),
                "Executing node"
            );

            let (node_result, outcome) = runner.run(flow, node, inputs, &node_outputs).await;

            match outcome {
                Ok(()) => {
                    node_outputs.insert(node.id.clone(), node_result.outputs.clone());
                    result.node_results.push(node_result);
                }
                Err(source) => {
                    result.node_results.push(node_result);
                    let err = FlowError::NodeFailed {
                        node_id: node.id.clone(),
                        source: Box::new(source),
                    };
                    result.fail(err.to_string(), &err);
                    advance(&mut state, ExecutionState::Failed, &execution_id);
                    error!(
                        %execution_id,
                        node_id = %node.id,
                        kind = %err.kind(),
                        error = %err,
                        "Flow execution failed"
                    );
                    return (result, Err(err));
                }
            }
        }

        // Flow outputs in declaration order; later nodes overwrite earlier ones.
        for node in &flow.nodes {
            let Some(produced) = node_outputs.get(&node.id) else {
                continue;
            };
            for output in node.outputs.iter().filter(|o| o.is_flow_output()) {
                let value = produced
                    .get(&output.name)
                    .cloned()
                    .unwrap_or(serde_json::Value::Null);
                if result.outputs.insert(output.name.clone(), value).is_some() {
                    warn!(
                        %execution_id,
                        node_id = %node.id,
                        output = %output.name,
                        "Flow output overwritten by a later node"
                    );
                }
            }
        }

        result.succeed();
        advance(&mut state, ExecutionState::Succeeded, &execution_id);

        let totals = result.total_metrics();
        info!(
            %execution_id,
            flow = %flow.name,
            duration_ms = result.duration_ms,
            input_tokens = totals.input_tokens,
            output_tokens = totals.output_tokens,
            cost = totals.total_cost(),
            "Flow execution complete"
        );

        (result, Ok(()))
    }

    /// [`execute`](Self::execute) with a fresh control that expires after
    /// `timeout`.
    pub async fn execute_with_timeout(
        &self,
        flow: &FlowDefinition,
        inputs: &FlowInputs,
        timeout: Duration,
    ) -> (ExecutionResult, Result<()>) {
        let control = ExecutionControl::new().with_timeout(timeout);
        self.execute(flow, inputs, &control).await
    }
}

fn advance(state: &mut ExecutionState, next: ExecutionState, execution_id: &impl fmt::Display) {
    let from = *state;
    debug!(%execution_id, %from, to = %next, "Execution state");
    *state = next;
}
