use std::sync::Arc;
use std::time::Duration;

use promptflow_core::error::{ErrorKind, FlowError};
use promptflow_core::flow::{FlowDefinition, NodeDefinition};
use promptflow_engine::{ExecutionControl, FlowExecutor, FlowInputs, ProviderRegistry};
use promptflow_test_utils::{inputs, linear_flow, MockProvider};
use serde_json::json;

fn executor_with(provider: MockProvider) -> FlowExecutor {
    let mut registry = ProviderRegistry::new();
    registry.register(provider);
    FlowExecutor::new(Arc::new(registry))
}

#[tokio::test]
async fn linear_flow_feeds_outputs_forward() {
    let mock = MockProvider::new("mock")
        .with_reply_for("Write about rust", "Rust is a systems language.")
        .with_reply_for("Polish: Rust is a systems language.", "Rust: fast and safe.");
    let calls = mock.calls();
    let executor = executor_with(mock);

    let (result, outcome) = executor
        .execute(
            &linear_flow(),
            &inputs(&[("topic", "rust")]),
            &ExecutionControl::new(),
        )
        .await;

    assert!(outcome.is_ok(), "{:?}", result.error);
    assert!(result.success);
    assert_eq!(result.flow_name, "linear");

    let order: Vec<&str> = result.node_results.iter().map(|r| r.node_id.as_str()).collect();
    assert_eq!(order, vec!["draft", "polish"]);

    let prompts: Vec<String> = calls.lock().unwrap().iter().map(|c| c.prompt.clone()).collect();
    assert_eq!(
        prompts,
        vec!["Write about rust", "Polish: Rust is a systems language."]
    );

    assert_eq!(result.outputs.len(), 1);
    assert_eq!(result.outputs["result"], json!("Rust: fast and safe."));
}

#[tokio::test]
async fn only_designated_outputs_are_exposed() {
    let executor = executor_with(MockProvider::new("mock").with_reply("ok"));
    let flow = FlowDefinition::new("outputs", "1")
        .with_default_provider("mock")
        .with_default_model("m")
        .with_node(NodeDefinition::new("a").with_output("internal"))
        .with_node(
            NodeDefinition::new("b")
                .with_input("x", "a.internal")
                .with_flow_output("answer"),
        );

    let (result, outcome) = executor
        .execute(&flow, &FlowInputs::new(), &ExecutionControl::new())
        .await;
    outcome.unwrap();

    assert_eq!(result.outputs.keys().collect::<Vec<_>>(), vec!["answer"]);
    assert_eq!(
        result.node_result("a").unwrap().outputs["internal"],
        json!("ok")
    );
}

#[tokio::test]
async fn designated_second_output_is_null() {
    let executor = executor_with(MockProvider::new("mock").with_reply("text"));
    let flow = FlowDefinition::new("multi", "1")
        .with_default_provider("mock")
        .with_default_model("m")
        .with_node(
            NodeDefinition::new("a")
                .with_flow_output("first")
                .with_flow_output("second"),
        );

    let (result, outcome) = executor
        .execute(&flow, &FlowInputs::new(), &ExecutionControl::new())
        .await;
    outcome.unwrap();

    assert_eq!(result.outputs["first"], json!("text"));
    assert_eq!(result.outputs["second"], serde_json::Value::Null);
}

#[tokio::test]
async fn later_flow_output_with_same_name_wins() {
    let mock = MockProvider::new("mock")
        .with_reply_for("one", "from a")
        .with_reply_for("two", "from b");
    let executor = executor_with(mock);
    let flow = FlowDefinition::new("dup", "1")
        .with_default_provider("mock")
        .with_default_model("m")
        .with_node(NodeDefinition::new("a").with_prompt("one").with_flow_output("out"))
        .with_node(NodeDefinition::new("b").with_prompt("two").with_flow_output("out"));

    let (result, outcome) = executor
        .execute(&flow, &FlowInputs::new(), &ExecutionControl::new())
        .await;
    outcome.unwrap();
    assert_eq!(result.outputs["out"], json!("from b"));
}

#[tokio::test]
async fn failure_stops_downstream_nodes() {
    let mock = MockProvider::new("mock").failing_for("Write about rust", "503 unavailable");
    let calls = mock.calls();
    let executor = executor_with(mock);

    let (result, outcome) = executor
        .execute(
            &linear_flow(),
            &inputs(&[("topic", "rust")]),
            &ExecutionControl::new(),
        )
        .await;

    let err = outcome.unwrap_err();
    match &err {
        FlowError::NodeFailed { node_id, source } => {
            assert_eq!(node_id, "draft");
            assert!(matches!(**source, FlowError::Provider { .. }));
        }
        other => panic!("expected node failure, got {other:?}"),
    }
    assert_eq!(err.kind(), ErrorKind::Backend);

    assert!(!result.success);
    assert_eq!(result.error_kind, Some(ErrorKind::Backend));
    assert!(result.error.as_deref().unwrap().starts_with("node draft failed:"));
    assert_eq!(result.node_results.len(), 1);
    assert!(!result.node_results[0].success);
    assert!(result.outputs.is_empty());
    assert_eq!(calls.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn missing_flow_input_fails_without_calling_provider() {
    let mock = MockProvider::new("mock");
    let calls = mock.calls();
    let executor = executor_with(mock);

    let (result, outcome) = executor
        .execute(&linear_flow(), &FlowInputs::new(), &ExecutionControl::new())
        .await;

    assert!(matches!(outcome, Err(FlowError::NodeFailed { .. })));
    assert_eq!(result.error_kind, Some(ErrorKind::InputResolution));
    assert_eq!(
        result.error.as_deref(),
        Some("node draft failed: flow input not provided: topic")
    );
    assert!(calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn invalid_flow_is_rejected_before_running() {
    let mock = MockProvider::new("mock");
    let calls = mock.calls();
    let executor = executor_with(mock);
    let flow = FlowDefinition::new("", "1").with_node(NodeDefinition::new("a"));

    let (result, outcome) = executor
        .execute(&flow, &FlowInputs::new(), &ExecutionControl::new())
        .await;

    assert!(matches!(outcome, Err(FlowError::Validation(_))));
    assert_eq!(result.error_kind, Some(ErrorKind::Structural));
    assert_eq!(
        result.error.as_deref(),
        Some("validation failed: name: flow name is required")
    );
    assert!(result.node_results.is_empty());
    assert!(calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn cyclic_flow_is_rejected_before_running() {
    let mock = MockProvider::new("mock");
    let executor = executor_with(mock.clone());
    let flow = FlowDefinition::new("cycle", "1")
        .with_node(NodeDefinition::new("a").with_input("x", "b.out").with_output("out"))
        .with_node(NodeDefinition::new("b").with_input("x", "a.out").with_output("out"));

    let (result, outcome) = executor
        .execute(&flow, &FlowInputs::new(), &ExecutionControl::new())
        .await;

    let err = outcome.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cycle);
    assert!(!result.success);
    assert_eq!(result.error_kind, Some(ErrorKind::Cycle));
    assert_eq!(
        result.error.as_deref(),
        Some("validation failed: nodes: cycle detected in flow graph involving node: a")
    );
    assert!(result.node_results.is_empty());
    assert_eq!(mock.call_count(), 0);
}

#[tokio::test]
async fn expired_deadline_fails_as_cancelled() {
    let mock = MockProvider::new("mock");
    let calls = mock.calls();
    let executor = executor_with(mock);

    let (result, outcome) = executor
        .execute_with_timeout(&linear_flow(), &inputs(&[("topic", "x")]), Duration::ZERO)
        .await;

    let err = outcome.unwrap_err();
    assert!(err.is_cancellation());
    assert_eq!(result.error_kind, Some(ErrorKind::Cancelled));
    assert_eq!(result.node_results.len(), 1);
    assert!(calls.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn deadline_interrupts_slow_provider() {
    let mock = MockProvider::new("mock").with_delay(Duration::from_secs(120));
    let calls = mock.calls();
    let executor = executor_with(mock);

    let (result, outcome) = executor
        .execute_with_timeout(
            &linear_flow(),
            &inputs(&[("topic", "x")]),
            Duration::from_secs(5),
        )
        .await;

    assert!(outcome.unwrap_err().is_cancellation());
    assert_eq!(result.error_kind, Some(ErrorKind::Cancelled));
    assert_eq!(result.node_results.len(), 1);
    assert_eq!(calls.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn cancellation_from_caller() {
    let executor = executor_with(MockProvider::new("mock").with_delay(Duration::from_secs(60)));
    let control = ExecutionControl::new();
    let token = control.cancel_token();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();
    });

    let (result, outcome) = executor
        .execute(&linear_flow(), &inputs(&[("topic", "x")]), &control)
        .await;

    match outcome {
        Err(FlowError::NodeFailed { source, .. }) => {
            assert!(matches!(*source, FlowError::Cancelled))
        }
        other => panic!("expected cancellation, got {other:?}"),
    }
    assert_eq!(result.error_kind, Some(ErrorKind::Cancelled));
}

#[tokio::test]
async fn repeated_execution_is_pure() {
    let executor = executor_with(MockProvider::new("mock"));
    let flow = linear_flow();
    let flow_inputs = inputs(&[("topic", "graphs")]);

    let (first, _) = executor
        .execute(&flow, &flow_inputs, &ExecutionControl::new())
        .await;
    let (second, _) = executor
        .execute(&flow, &flow_inputs, &ExecutionControl::new())
        .await;

    assert!(first.success && second.success);
    assert_eq!(first.outputs, second.outputs);
    assert_ne!(first.execution_id, second.execution_id);
    assert_eq!(flow, linear_flow());
}

#[tokio::test]
async fn concurrent_executions_share_registry() {
    let mut registry = ProviderRegistry::new();
    registry.register(MockProvider::new("mock"));
    let executor = FlowExecutor::new(Arc::new(registry));

    let mut handles = Vec::new();
    for i in 0..8 {
        let executor = executor.clone();
        handles.push(tokio::spawn(async move {
            let topic = format!("topic {i}");
            let flow_inputs = inputs(&[("topic", topic.as_str())]);
            let (result, outcome) = executor
                .execute(&linear_flow(), &flow_inputs, &ExecutionControl::new())
                .await;
            outcome.map(|_| (topic, result))
        }));
    }

    for handle in handles {
        let (topic, result) = handle.await.unwrap().unwrap();
        // The mock echoes prompts, so the output traces back to this run's input.
        assert_eq!(
            result.outputs["result"],
            json!(format!("Polish: Write about {topic}"))
        );
    }
}

#[tokio::test]
async fn totals_include_every_node() {
    let executor = executor_with(MockProvider::new("mock"));
    let (result, outcome) = executor
        .execute(
            &linear_flow(),
            &inputs(&[("topic", "one")]),
            &ExecutionControl::new(),
        )
        .await;
    outcome.unwrap();

    // "Write about one" = 3 words, "Polish: Write about one" = 4 words.
    let totals = result.total_metrics();
    assert_eq!(totals.input_tokens, 7);
    assert_eq!(totals.output_tokens, 7);
}
