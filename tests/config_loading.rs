use std::io::Write;
use std::time::Duration;

use promptflow_core::config::{AppConfig, RetryConfig};
use promptflow_core::error::FlowError;

#[test]
fn test_load_full_config_from_file() {
    let toml_content = r#"
[executor]
timeout_secs = 45

[providers.openai]
api_key = "sk-test-key"

[providers.writer]
kind = "anthropic"
api_key = "ant-key"
base_url = "https://proxy.internal/v1/messages"

[providers.writer.retry]
max_retries = 5
initial_backoff_ms = 250

[providers.local]
kind = "ollama"

[providers.router]
kind = "openrouter"
api_key = "or-key"

[providers.router.extra_headers]
X-Title = "nightly-evals"
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");

    assert_eq!(config.timeout(), Duration::from_secs(45));
    assert_eq!(config.providers.len(), 4);

    let openai = &config.providers["openai"];
    assert_eq!(openai.api_key.as_deref(), Some("sk-test-key"));
    assert_eq!(openai.kind_or("openai"), "openai");

    let writer = &config.providers["writer"];
    assert_eq!(writer.kind_or("writer"), "anthropic");
    assert_eq!(
        writer.retry,
        Some(RetryConfig {
            max_retries: 5,
            initial_backoff_ms: 250,
            max_backoff_ms: 30000,
        })
    );

    assert_eq!(
        config.providers["router"].extra_headers["X-Title"],
        "nightly-evals"
    );

    let registry = promptflow_llm::build_registry(&config).expect("build registry");
    assert_eq!(registry.list(), vec!["local", "openai", "router", "writer"]);
}

#[test]
fn test_env_var_expansion_in_config() {
    std::env::set_var("PROMPTFLOW_TEST_API_KEY", "expanded-key-value");

    let toml_content = r#"
[providers.openai]
api_key = "${PROMPTFLOW_TEST_API_KEY}"
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");
    assert_eq!(
        config.providers["openai"].api_key.as_deref(),
        Some("expanded-key-value")
    );

    std::env::remove_var("PROMPTFLOW_TEST_API_KEY");
}

#[test]
fn test_minimal_config_uses_defaults() {
    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(b"").expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");
    assert_eq!(config.executor.timeout_secs, 300);
    assert!(config.providers.is_empty());
}

#[test]
fn test_missing_file_falls_back_to_env() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("absent.toml");

    assert!(matches!(
        AppConfig::load(&path),
        Err(FlowError::ConfigNotFound(_))
    ));

    let config = AppConfig::load_or_env(&path).expect("env config");
    assert!(config.providers.contains_key("openai"));
    assert!(config.providers.contains_key("anthropic"));
    assert!(config.providers.contains_key("github_playground_openai"));
}

#[test]
fn test_unknown_provider_kind_is_rejected() {
    let config = AppConfig::parse(
        r#"
[providers.mystery]
kind = "not-a-backend"
"#,
    )
    .expect("parse config");

    let err = promptflow_llm::build_registry(&config).unwrap_err();
    assert!(err.to_string().contains("unknown provider kind"));
}
