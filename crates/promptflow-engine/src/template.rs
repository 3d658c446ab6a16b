//! Prompt rendering using minijinja templates.
//!
//! A node's prompt is rendered against its resolved inputs, keyed by input
//! name:
//!
//! ```text
//! Summarize the following text in {{ style }} style:
//! {{ text }}
//! ```
//!
//! Undefined variables are an error rather than an empty string, so a typo in
//! a prompt fails the node instead of silently sending a truncated prompt.

use std::collections::BTreeMap;

use minijinja::{Environment, UndefinedBehavior, Value};

use promptflow_core::error::{FlowError, Result};

/// Render `template` for `node_id` with the given variables.
pub fn render_prompt(
    node_id: &str,
    template: &str,
    variables: &BTreeMap<String, serde_json::Value>,
) -> Result<String> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env.set_keep_trailing_newline(true);

    let context = Value::from_serialize(variables);
    env.render_str(template, context)
        .map_err(|e| FlowError::Template {
            node_id: node_id.to_string(),
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars(pairs: &[(&str, serde_json::Value)]) -> BTreeMap<String, serde_json::Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn interpolates_by_name() {
        let out = render_prompt(
            "n",
            "Translate to {{ lang }}: {{ text }}",
            &vars(&[("lang", json!("French")), ("text", json!("hello"))]),
        )
        .unwrap();
        assert_eq!(out, "Translate to French: hello");
    }

    #[test]
    fn supports_filters_and_structured_values() {
        let out = render_prompt(
            "n",
            "{{ name | upper }} has {{ items | length }} items",
            &vars(&[("name", json!("ada")), ("items", json!([1, 2, 3]))]),
        )
        .unwrap();
        assert_eq!(out, "ADA has 3 items");
    }

    #[test]
    fn undefined_variable_is_an_error() {
        let err = render_prompt("summarize", "{{ missing }}", &BTreeMap::new()).unwrap_err();
        match err {
            FlowError::Template { node_id, .. } => assert_eq!(node_id, "summarize"),
            other => panic!("expected template error, got {other:?}"),
        }
    }

    #[test]
    fn syntax_error_is_an_error() {
        let err = render_prompt("n", "{% if %}", &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, FlowError::Template { .. }));
    }

    #[test]
    fn plain_text_passes_through() {
        let out = render_prompt("n", "no variables here", &BTreeMap::new()).unwrap();
        assert_eq!(out, "no variables here");
    }
}
