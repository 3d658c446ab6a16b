//! Structural validation of a flow definition.
//!
//! Checks run in a fixed order and stop at the first violation:
//! required fields, then each node's own structure, then cross-node
//! references, then cycles.

use std::collections::{HashMap, HashSet};

use promptflow_core::error::ValidationError;
use promptflow_core::flow::{FlowDefinition, InputSource, NodeDefinition};

/// Validate `flow`, returning the first violation found.
pub fn validate(flow: &FlowDefinition) -> Result<(), ValidationError> {
    check_required_fields(flow)?;

    let mut seen_ids: HashSet<&str> = HashSet::new();
    for (i, node) in flow.nodes.iter().enumerate() {
        if node.id.is_empty() {
            return Err(ValidationError::new(
                format!("nodes[{i}].id"),
                "node ID is required",
            ));
        }
        if !seen_ids.insert(node.id.as_str()) {
            return Err(ValidationError::new(
                format!("nodes[{i}].id"),
                format!("duplicate node ID: {}", node.id),
            ));
        }
        check_node(i, node)?;
    }

    check_references(flow)?;
    check_cycles(flow)
}

fn check_required_fields(flow: &FlowDefinition) -> Result<(), ValidationError> {
    if flow.name.is_empty() {
        return Err(ValidationError::new("name", "flow name is required"));
    }
    if flow.version.is_empty() {
        return Err(ValidationError::new("version", "flow version is required"));
    }
    if flow.nodes.is_empty() {
        return Err(ValidationError::new("nodes", "at least one node is required"));
    }
    Ok(())
}

fn check_node(index: usize, node: &NodeDefinition) -> Result<(), ValidationError> {
    let mut input_names: HashSet<&str> = HashSet::new();
    for (j, input) in node.inputs.iter().enumerate() {
        if input.name.is_empty() {
            return Err(ValidationError::new(
                format!("nodes[{index}].inputs[{j}].name"),
                "input name is required",
            ));
        }
        if input.from.is_empty() {
            return Err(ValidationError::new(
                format!("nodes[{index}].inputs[{j}].from"),
                "input source is required",
            ));
        }
        if !input_names.insert(input.name.as_str()) {
            return Err(ValidationError::new(
                format!("nodes[{index}].inputs[{j}].name"),
                format!("duplicate input name: {}", input.name),
            ));
        }
        if let Err(message) = input.source() {
            return Err(ValidationError::new(
                format!("nodes[{index}].inputs[{j}].from"),
                message,
            ));
        }
    }

    let mut output_names: HashSet<&str> = HashSet::new();
    for (j, output) in node.outputs.iter().enumerate() {
        if output.name.is_empty() {
            return Err(ValidationError::new(
                format!("nodes[{index}].outputs[{j}].name"),
                "output name is required",
            ));
        }
        if !output_names.insert(output.name.as_str()) {
            return Err(ValidationError::new(
                format!("nodes[{index}].outputs[{j}].name"),
                format!("duplicate output name: {}", output.name),
            ));
        }
    }

    Ok(())
}

fn check_references(flow: &FlowDefinition) -> Result<(), ValidationError> {
    // node id -> declared output names
    let available: HashMap<&str, HashSet<&str>> = flow
        .nodes
        .iter()
        .map(|node| {
            let outputs = node.outputs.iter().map(|o| o.name.as_str()).collect();
            (node.id.as_str(), outputs)
        })
        .collect();

    for (i, node) in flow.nodes.iter().enumerate() {
        for (j, input) in node.inputs.iter().enumerate() {
            let Ok(InputSource::NodeOutput { node_id, output }) = input.source() else {
                continue;
            };
            let field = format!("nodes[{i}].inputs[{j}].from");

            let Some(outputs) = available.get(node_id) else {
                return Err(ValidationError::new(
                    field,
                    format!("referenced node does not exist: {node_id}"),
                ));
            };
            if !outputs.contains(output) {
                return Err(ValidationError::new(
                    field,
                    format!("referenced output does not exist: {node_id}.{output}"),
                ));
            }
        }
    }

    Ok(())
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    Unvisited,
    OnStack,
    Done,
}

/// Depth-first search over producer -> consumer edges. Roots are tried in
/// declaration order so the reported node is stable across runs.
fn check_cycles(flow: &FlowDefinition) -> Result<(), ValidationError> {
    let index: HashMap<&str, usize> = flow
        .nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (n.id.as_str(), i))
        .collect();

    let mut consumers: Vec<Vec<usize>> = vec![Vec::new(); flow.nodes.len()];
    for (consumer, node) in flow.nodes.iter().enumerate() {
        for producer in node.dependencies() {
            if let Some(&p) = index.get(producer) {
                consumers[p].push(consumer);
            }
        }
    }

    let mut state = vec![Visit::Unvisited; flow.nodes.len()];
    for root in 0..flow.nodes.len() {
        if state[root] != Visit::Unvisited {
            continue;
        }
        if let Some(node) = find_back_edge(root, &consumers, &mut state) {
            return Err(ValidationError::cycle(
                "nodes",
                format!(
                    "cycle detected in flow graph involving node: {}",
                    flow.nodes[node].id
                ),
            ));
        }
    }

    Ok(())
}

/// Iterative DFS from `root`. Returns the first node reached while it is
/// still on the recursion stack.
fn find_back_edge(root: usize, consumers: &[Vec<usize>], state: &mut [Visit]) -> Option<usize> {
    // (node, next edge to follow)
    let mut stack: Vec<(usize, usize)> = vec![(root, 0)];
    state[root] = Visit::OnStack;

    while let Some(frame) = stack.last_mut() {
        let (node, edge) = *frame;
        if let Some(&next) = consumers[node].get(edge) {
            frame.1 += 1;
            match state[next] {
                Visit::OnStack => return Some(next),
                Visit::Unvisited => {
                    state[next] = Visit::OnStack;
                    stack.push((next, 0));
                }
                Visit::Done => {}
            }
        } else {
            state[node] = Visit::Done;
            stack.pop();
        }
    }

    None
}
