use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{CommandFactory, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use promptflow_core::config::AppConfig;
use promptflow_core::loader::{self, Format};
use promptflow_core::result::ExecutionResult;
use promptflow_engine::{validate, ExecutionControl, FlowExecutor, FlowInputs};

#[derive(Parser)]
#[command(name = "promptflow", version, about = "Run prompt flows: graphs of LLM calls")]
struct Cli {
    /// Path to config file (falls back to environment variables if missing)
    #[arg(short, long, default_value = "promptflow.toml", env = "PROMPTFLOW_CONFIG")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a sample flow definition
    Init {
        /// Name of the flow
        name: String,
        /// Output file path (default: <name>.flow.<format>)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Output format: yaml, json, or toml
        #[arg(short, long, default_value = "yaml")]
        format: String,
    },
    /// Validate a flow definition
    Validate {
        /// Path to flow definition file
        file: PathBuf,
    },
    /// Execute a flow with the given inputs
    Run {
        /// Path to flow definition file
        file: PathBuf,
        /// Input values as key=value pairs
        #[arg(short, long = "input")]
        input: Vec<String>,
        /// Execution timeout in seconds (default: executor.timeout_secs)
        #[arg(short, long)]
        timeout: Option<u64>,
        /// Print the execution result as JSON
        #[arg(long)]
        json: bool,
    },
    /// List configured providers
    Providers,
    /// Show current configuration
    Config,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("promptflow=info,warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "promptflow", &mut std::io::stdout());
        }
        Commands::Init {
            name,
            output,
            format,
        } => init_flow(&name, output, &format)?,
        Commands::Validate { file } => validate_flow(&file)?,
        Commands::Run {
            file,
            input,
            timeout,
            json,
        } => {
            let config = AppConfig::load_or_env(&cli.config)?;
            run_flow(&config, &file, &input, timeout, json).await?;
        }
        Commands::Providers => {
            let config = AppConfig::load_or_env(&cli.config)?;
            if config.providers.is_empty() {
                println!("No providers configured.");
            }
            for (name, provider) in &config.providers {
                let has_key = provider.api_key.as_deref().is_some_and(|k| !k.is_empty());
                println!(
                    "{:<28} kind={:<12} key={}",
                    name,
                    provider.kind_or(name),
                    if has_key { "set" } else { "missing" }
                );
            }
        }
        Commands::Config => {
            let mut config = AppConfig::load_or_env(&cli.config)?;
            for provider in config.providers.values_mut() {
                if provider.api_key.as_deref().is_some_and(|k| !k.is_empty()) {
                    provider.api_key = Some("********".to_string());
                }
            }
            println!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

fn init_flow(name: &str, output: Option<PathBuf>, format: &str) -> anyhow::Result<()> {
    let format: Format = format.parse()?;
    let path = output
        .unwrap_or_else(|| PathBuf::from(format!("{name}.flow.{}", format.extension())));

    if path.exists() {
        bail!("file already exists: {}", path.display());
    }
    // An explicit output path may carry any extension; write the chosen format.
    let content = loader::to_string(&loader::sample_flow(name), format)?;
    std::fs::write(&path, content)
        .with_context(|| format!("failed to save flow: {}", path.display()))?;

    println!("Created flow definition: {}", path.display());
    Ok(())
}

fn validate_flow(file: &Path) -> anyhow::Result<()> {
    let flow = loader::parse_file(file)
        .with_context(|| format!("failed to parse flow: {}", file.display()))?;
    validate(&flow).context("validation failed")?;

    println!("✓ Flow '{}' is valid", flow.name);
    println!("  - {} nodes", flow.nodes.len());
    println!(
        "  - Default provider: {}",
        flow.config.default_provider.as_deref().unwrap_or("(none)")
    );
    println!(
        "  - Default model: {}",
        flow.config.default_model.as_deref().unwrap_or("(none)")
    );
    Ok(())
}

async fn run_flow(
    config: &AppConfig,
    file: &Path,
    input: &[String],
    timeout: Option<u64>,
    json: bool,
) -> anyhow::Result<()> {
    let flow = loader::parse_file(file)
        .with_context(|| format!("failed to parse flow: {}", file.display()))?;
    let inputs = parse_inputs(input)?;

    let registry = promptflow_llm::build_registry(config)?;
    let executor = FlowExecutor::new(Arc::new(registry));

    let timeout = timeout.map(Duration::from_secs).unwrap_or_else(|| config.timeout());
    let control = ExecutionControl::new().with_timeout(timeout);

    let cancel = control.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling execution");
            cancel.cancel();
        }
    });

    if !json {
        println!("Executing flow '{}'...\n", flow.name);
    }
    info!(flow = %flow.name, timeout_secs = timeout.as_secs(), "Running flow");

    let (result, outcome) = executor.execute(&flow, &inputs, &control).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_execution_result(&result);
    }

    outcome.context("execution failed")?;
    Ok(())
}

/// Parse `key=value` arguments. Later duplicates override earlier ones.
fn parse_inputs(args: &[String]) -> anyhow::Result<FlowInputs> {
    let mut inputs = FlowInputs::new();
    for arg in args {
        let Some((key, value)) = arg.split_once('=') else {
            bail!("invalid input format: {arg} (expected key=value)");
        };
        let value = serde_json::Value::String(value.to_string());
        if inputs.insert(key.to_string(), value).is_some() {
            warn!(input = key, "Input already defined, overriding");
        }
    }
    Ok(inputs)
}

fn print_execution_result(result: &ExecutionResult) {
    println!("=== Execution Result ===");
    println!("Flow: {}", result.flow_name);
    println!("Execution: {}", result.execution_id);
    println!("Success: {}", result.success);
    println!("Duration: {:?}", result.duration());
    if let Some(error) = &result.error {
        println!("Error: {error}");
    }

    println!("\n=== Node Results ===");
    for (i, node) in result.node_results.iter().enumerate() {
        println!("\n[{}] Node: {}", i + 1, node.node_id);
        println!("    Success: {}", node.success);
        println!("    Duration: {:?}", node.duration());
        if let Some(error) = &node.error {
            println!("    Error: {error}");
        }
        let m = &node.metrics;
        if m.total_tokens() > 0 {
            println!(
                "    Tokens: {} (input: {}, output: {})",
                m.total_tokens(),
                m.input_tokens,
                m.output_tokens
            );
        }
        if m.total_cost() > 0.0 {
            println!(
                "    Cost: ${:.6} (input: ${:.6}, output: ${:.6})",
                m.total_cost(),
                m.input_cost,
                m.output_cost
            );
        }
        if !node.outputs.is_empty() {
            println!("    Outputs:");
            for (key, value) in &node.outputs {
                match value {
                    serde_json::Value::String(s) => println!("      {key}: {s}"),
                    other => println!("      {key}: {other}"),
                }
            }
        }
    }

    let totals = result.total_metrics();
    println!("\n=== Summary ===");
    println!("Total Tokens: {}", totals.total_tokens());
    if totals.total_cost() > 0.0 {
        println!("Total Cost: ${:.6}", totals.total_cost());
    }

    if !result.outputs.is_empty() {
        println!("\n=== Flow Outputs ===");
        match serde_json::to_string_pretty(&result.outputs) {
            Ok(outputs) => println!("{outputs}"),
            Err(e) => warn!(error = %e, "Failed to render flow outputs"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_key_value_inputs() {
        let inputs = parse_inputs(&args(&["topic=rust", "query=a=b"])).unwrap();
        assert_eq!(inputs["topic"], serde_json::json!("rust"));
        assert_eq!(inputs["query"], serde_json::json!("a=b"));
    }

    #[test]
    fn later_input_overrides() {
        let inputs = parse_inputs(&args(&["k=1", "k=2"])).unwrap();
        assert_eq!(inputs["k"], serde_json::json!("2"));
    }

    #[test]
    fn rejects_missing_equals() {
        assert!(parse_inputs(&args(&["novalue"])).is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
