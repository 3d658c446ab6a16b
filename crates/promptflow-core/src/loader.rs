//! Reading and writing flow definition files.
//!
//! Flows can be written as YAML, JSON, or TOML. Parsing does not validate the
//! result; the executor always validates before running.

use std::path::Path;

use tracing::debug;

use crate::error::{FlowError, Result};
use crate::flow::{FlowDefinition, NodeDefinition};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Yaml,
    Toml,
}

impl Format {
    /// Detect the format from a file extension (`.json`, `.yaml`/`.yml`, `.toml`).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "json" => Some(Format::Json),
            "yaml" | "yml" => Some(Format::Yaml),
            "toml" => Some(Format::Toml),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Yaml => "yaml",
            Format::Toml => "toml",
        }
    }
}

impl std::str::FromStr for Format {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Format::Json),
            "yaml" | "yml" => Ok(Format::Yaml),
            "toml" => Ok(Format::Toml),
            other => Err(FlowError::Parse(format!(
                "unsupported format: {other} (use json, yaml, or toml)"
            ))),
        }
    }
}

/// Parse flow text in a known format.
pub fn parse_str(content: &str, format: Format) -> Result<FlowDefinition> {
    match format {
        Format::Json => serde_json::from_str(content)
            .map_err(|e| FlowError::Parse(format!("failed to parse JSON: {e}"))),
        Format::Yaml => serde_yaml::from_str(content)
            .map_err(|e| FlowError::Parse(format!("failed to parse YAML: {e}"))),
        Format::Toml => toml::from_str(content)
            .map_err(|e| FlowError::Parse(format!("failed to parse TOML: {e}"))),
    }
}

/// Parse flow text, picking the format from `filename`. Unknown extensions
/// are tried as YAML, then JSON.
pub fn parse_named(content: &str, filename: &Path) -> Result<FlowDefinition> {
    match Format::from_path(filename) {
        Some(format) => parse_str(content, format),
        None => parse_str(content, Format::Yaml).or_else(|_| {
            parse_str(content, Format::Json).map_err(|_| {
                FlowError::Parse(format!(
                    "failed to parse {} as YAML or JSON",
                    filename.display()
                ))
            })
        }),
    }
}

/// Read and parse a flow file.
pub fn parse_file(path: &Path) -> Result<FlowDefinition> {
    let content = std::fs::read_to_string(path)?;
    let flow = parse_named(&content, path)?;
    debug!(path = %path.display(), flow = %flow.name, nodes = flow.nodes.len(), "Loaded flow");
    Ok(flow)
}

/// Serialize a flow in the given format.
pub fn to_string(flow: &FlowDefinition, format: Format) -> Result<String> {
    match format {
        Format::Json => Ok(serde_json::to_string_pretty(flow)?),
        Format::Yaml => serde_yaml::to_string(flow)
            .map_err(|e| FlowError::Parse(format!("failed to marshal flow: {e}"))),
        Format::Toml => toml::to_string_pretty(flow)
            .map_err(|e| FlowError::Parse(format!("failed to marshal flow: {e}"))),
    }
}

/// Write a flow to `path`, choosing the format from its extension.
pub fn save_file(flow: &FlowDefinition, path: &Path) -> Result<()> {
    let format = Format::from_path(path).ok_or_else(|| {
        FlowError::Parse(format!(
            "unsupported file extension: {} (use .json, .yaml, .yml, or .toml)",
            path.display()
        ))
    })?;
    std::fs::write(path, to_string(flow, format)?)?;
    Ok(())
}

/// A single-node starter flow used by `promptflow init`.
pub fn sample_flow(name: &str) -> FlowDefinition {
    FlowDefinition::new(name, "1.0")
        .with_description("A sample prompt flow")
        .with_default_provider("github_playground_openai")
        .with_default_model("openai/gpt-4o-mini")
        .with_node(
            NodeDefinition::new("process")
                .with_flow_input("user_input")
                .with_prompt(
                    "You are a helpful assistant.\n\nUser input: {{ user_input }}\n\nPlease provide a helpful response.\n",
                )
                .with_flow_output("response"),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML_FLOW: &str = r#"
version: "1.0"
name: summarize
config:
  default_provider: openai
  default_model: gpt-4o-mini
nodes:
  - id: summarize
    inputs:
      - name: text
        from: input
    prompt: "Summarize: {{ text }}"
    outputs:
      - name: summary
        to: output
    settings:
      temperature: 0.2
      max_tokens: 200
"#;

    #[test]
    fn parses_yaml() {
        let flow = parse_str(YAML_FLOW, Format::Yaml).unwrap();
        assert_eq!(flow.name, "summarize");
        assert_eq!(flow.config.default_model.as_deref(), Some("gpt-4o-mini"));
        let node = &flow.nodes[0];
        assert!(node.inputs[0].is_flow_input());
        assert!(node.outputs[0].is_flow_output());
        assert_eq!(node.settings.get_u32("max_tokens").unwrap(), Some(200));
    }

    #[test]
    fn unknown_extension_is_still_parsed() {
        let json = r#"{"version": "1", "name": "j", "nodes": []}"#;
        let flow = parse_named(json, Path::new("flow.txt")).unwrap();
        assert_eq!(flow.name, "j");
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let err = parse_str("{ not json", Format::Json).unwrap_err();
        assert!(matches!(err, FlowError::Parse(_)));
    }

    #[test]
    fn format_from_path() {
        assert_eq!(Format::from_path(Path::new("a.YML")), Some(Format::Yaml));
        assert_eq!(Format::from_path(Path::new("a.toml")), Some(Format::Toml));
        assert_eq!(Format::from_path(Path::new("a")), None);
    }

    #[test]
    fn save_rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let err = save_file(&sample_flow("x"), &dir.path().join("x.txt")).unwrap_err();
        assert!(matches!(err, FlowError::Parse(_)));
    }

    #[test]
    fn saved_yaml_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("demo.flow.yaml");
        let flow = sample_flow("demo");
        save_file(&flow, &path).unwrap();
        assert_eq!(parse_file(&path).unwrap(), flow);
    }
}
