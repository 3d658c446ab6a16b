use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ErrorKind, FlowError};

/// Token and cost accounting reported by a provider for one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeMetrics {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub input_cost: f64,
    #[serde(default)]
    pub output_cost: f64,
}

impl NodeMetrics {
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }

    pub fn total_cost(&self) -> f64 {
        self.input_cost + self.output_cost
    }

    pub fn accumulate(&mut self, other: &NodeMetrics) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.input_cost += other.input_cost;
        self.output_cost += other.output_cost;
    }
}

/// Outcome of running a single node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeResult {
    pub node_id: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(default)]
    pub outputs: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub metrics: NodeMetrics,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_ms: u64,
}

impl NodeResult {
    /// A not-yet-finished result for `node_id`, stamped with the current time.
    pub fn started(node_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            node_id: node_id.into(),
            success: false,
            error: None,
            error_kind: None,
            outputs: BTreeMap::new(),
            metrics: NodeMetrics::default(),
            start_time: now,
            end_time: now,
            duration_ms: 0,
        }
    }

    /// Stamp the end time and mark the node as succeeded.
    pub fn succeed(&mut self) {
        self.success = true;
        self.error = None;
        self.error_kind = None;
        self.finish();
    }

    /// Stamp the end time and record `err` as the failure.
    pub fn fail(&mut self, err: &FlowError) {
        self.success = false;
        self.error = Some(err.to_string());
        self.error_kind = Some(err.kind());
        self.finish();
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    fn finish(&mut self) {
        self.end_time = Utc::now();
        self.duration_ms = elapsed_ms(self.start_time, self.end_time);
    }
}

/// Outcome of running a whole flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub execution_id: Uuid,
    pub flow_name: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(default)]
    pub outputs: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub node_results: Vec<NodeResult>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_ms: u64,
}

impl ExecutionResult {
    pub fn started(flow_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            execution_id: Uuid::new_v4(),
            flow_name: flow_name.into(),
            success: false,
            error: None,
            error_kind: None,
            outputs: BTreeMap::new(),
            node_results: Vec::new(),
            start_time: now,
            end_time: now,
            duration_ms: 0,
        }
    }

    pub fn succeed(&mut self) {
        self.success = true;
        self.error = None;
        self.error_kind = None;
        self.finish();
    }

    /// Record a failure. `message` is the human-readable summary; the kind is
    /// taken from `err`.
    pub fn fail(&mut self, message: impl Into<String>, err: &FlowError) {
        self.success = false;
        self.error = Some(message.into());
        self.error_kind = Some(err.kind());
        self.finish();
    }

    /// Sum of all node metrics, including failed nodes.
    pub fn total_metrics(&self) -> NodeMetrics {
        let mut total = NodeMetrics::default();
        for node in &self.node_results {
            total.accumulate(&node.metrics);
        }
        total
    }

    pub fn node_result(&self, node_id: &str) -> Option<&NodeResult> {
        self.node_results.iter().find(|r| r.node_id == node_id)
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    fn finish(&mut self) {
        self.end_time = Utc::now();
        self.duration_ms = elapsed_ms(self.start_time, self.end_time);
    }
}

fn elapsed_ms(start: DateTime<Utc>, end: DateTime<Utc>) -> u64 {
    (end - start).num_milliseconds().max(0) as u64
}
