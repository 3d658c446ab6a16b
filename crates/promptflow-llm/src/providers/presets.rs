use std::collections::HashMap;

use crate::pricing::PriceTable;

/// A named OpenAI-compatible endpoint.
#[derive(Debug, Clone, Copy)]
pub struct ProviderPreset {
    pub default_base_url: &'static str,
    pub needs_api_key: bool,
    pub extra_headers: &'static [(&'static str, &'static str)],
    pub pricing: PriceTable,
    /// Stripped from the model name before the price lookup
    /// (`openai/gpt-4o-mini` is priced as `gpt-4o-mini`).
    pub model_prefix: Option<&'static str>,
}

const fn paid(default_base_url: &'static str) -> ProviderPreset {
    ProviderPreset {
        default_base_url,
        needs_api_key: true,
        extra_headers: &[],
        pricing: PriceTable::OpenAi,
        model_prefix: None,
    }
}

/// Look up a preset by name.
pub fn get_preset(provider: &str) -> Option<ProviderPreset> {
    match provider {
        "openai" => Some(paid("https://api.openai.com/v1/chat/completions")),
        "github_playground_openai" => Some(ProviderPreset {
            model_prefix: Some("openai/"),
            ..paid("https://models.github.ai/inference/chat/completions")
        }),
        "ollama" => Some(ProviderPreset {
            needs_api_key: false,
            pricing: PriceTable::Free,
            ..paid("http://localhost:11434/v1/chat/completions")
        }),
        "groq" => Some(paid("https://api.groq.com/openai/v1/chat/completions")),
        "openrouter" => Some(ProviderPreset {
            extra_headers: &[("X-Title", "promptflow")],
            ..paid("https://openrouter.ai/api/v1/chat/completions")
        }),
        "together" => Some(paid("https://api.together.xyz/v1/chat/completions")),
        "mistral" => Some(paid("https://api.mistral.ai/v1/chat/completions")),
        "deepseek" => Some(paid("https://api.deepseek.com/v1/chat/completions")),
        _ => None,
    }
}

/// Preset headers with user overrides applied.
pub fn build_extra_headers(
    preset: &ProviderPreset,
    user_headers: &HashMap<String, String>,
) -> Vec<(String, String)> {
    let mut headers: Vec<(String, String)> = preset
        .extra_headers
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    for (k, v) in user_headers {
        match headers.iter_mut().find(|(hk, _)| hk.eq_ignore_ascii_case(k)) {
            Some(existing) => existing.1 = v.clone(),
            None => headers.push((k.clone(), v.clone())),
        }
    }

    headers
}

pub fn all_preset_names() -> &'static [&'static str] {
    &[
        "openai",
        "github_playground_openai",
        "ollama",
        "groq",
        "openrouter",
        "together",
        "mistral",
        "deepseek",
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_listed_preset_resolves() {
        for name in all_preset_names() {
            assert!(get_preset(name).is_some(), "missing preset {name}");
        }
        assert!(get_preset("nope").is_none());
    }

    #[test]
    fn github_playground_strips_prefix() {
        let preset = get_preset("github_playground_openai").unwrap();
        assert_eq!(preset.model_prefix, Some("openai/"));
        assert!(preset.needs_api_key);
    }

    #[test]
    fn user_headers_override_preset() {
        let preset = get_preset("openrouter").unwrap();
        let user = HashMap::from([
            ("x-title".to_string(), "custom".to_string()),
            ("X-Extra".to_string(), "1".to_string()),
        ]);
        let mut headers = build_extra_headers(&preset, &user);
        headers.sort();
        assert_eq!(
            headers,
            vec![
                ("X-Extra".to_string(), "1".to_string()),
                ("X-Title".to_string(), "custom".to_string()),
            ]
        );
    }
}
