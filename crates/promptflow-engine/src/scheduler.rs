use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use promptflow_core::error::{FlowError, Result};
use promptflow_core::flow::{FlowDefinition, NodeDefinition};

/// Compute a deterministic execution order (Kahn's algorithm).
///
/// Nodes that become ready at the same time run in declaration order. Every
/// cross-node reference counts toward the consumer's in-degree, so a node that
/// reads two outputs of the same producer waits on both edges. References to
/// unknown nodes add no edge; the runner reports them when the node executes.
pub fn schedule(flow: &FlowDefinition) -> Result<Vec<&NodeDefinition>> {
    let count = flow.nodes.len();

    // First declaration wins if ids repeat; validation rejects that anyway.
    let mut index: HashMap<&str, usize> = HashMap::with_capacity(count);
    for (i, node) in flow.nodes.iter().enumerate() {
        index.entry(node.id.as_str()).or_insert(i);
    }

    let mut consumers: Vec<Vec<usize>> = vec![Vec::new(); count];
    let mut in_degree: Vec<usize> = vec![0; count];
    for (consumer, node) in flow.nodes.iter().enumerate() {
        for producer in node.dependencies() {
            if let Some(&p) = index.get(producer) {
                consumers[p].push(consumer);
                in_degree[consumer] += 1;
            }
        }
    }

    let mut ready: BinaryHeap<Reverse<usize>> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, &degree)| degree == 0)
        .map(|(i, _)| Reverse(i))
        .collect();

    let mut order = Vec::with_capacity(count);
    while let Some(Reverse(i)) = ready.pop() {
        order.push(&flow.nodes[i]);
        for &consumer in &consumers[i] {
            in_degree[consumer] -= 1;
            if in_degree[consumer] == 0 {
                ready.push(Reverse(consumer));
            }
        }
    }

    if order.len() != count {
        let unscheduled = in_degree
            .iter()
            .enumerate()
            .filter(|(_, &degree)| degree > 0)
            .map(|(i, _)| flow.nodes[i].id.clone())
            .collect();
        return Err(FlowError::Cycle { unscheduled });
    }

    Ok(order)
}
