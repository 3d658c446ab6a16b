//! Flow execution engine.
//!
//! A flow is checked by [`validate`], ordered by [`schedule`], and run node by
//! node by the [`FlowExecutor`]. Each node renders its prompt from resolved
//! inputs and calls a provider looked up in the shared [`ProviderRegistry`].
//! An [`ExecutionControl`] carries cancellation and the deadline for one run.

use std::collections::{BTreeMap, HashMap};

pub mod control;
pub mod executor;
pub mod registry;
pub mod runner;
pub mod scheduler;
pub mod template;
pub mod validator;

pub use control::ExecutionControl;
pub use executor::{ExecutionState, FlowExecutor};
pub use registry::ProviderRegistry;
pub use runner::{resolve_inputs, NodeRunner};
pub use scheduler::schedule;
pub use template::render_prompt;
pub use validator::validate;

/// Caller-supplied flow inputs, keyed by input name.
pub type FlowInputs = HashMap<String, serde_json::Value>;

/// Outputs emitted by one node, keyed by output name.
pub type NodeOutputs = BTreeMap<String, serde_json::Value>;
