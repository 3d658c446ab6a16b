pub mod anthropic;
pub mod openai;
pub mod presets;

pub use anthropic::AnthropicProvider;
pub use openai::OpenAiProvider;

use promptflow_core::error::Result;
use promptflow_core::settings::Settings;

pub(crate) const DEFAULT_TEMPERATURE: f64 = 0.7;
pub(crate) const DEFAULT_MAX_TOKENS: u32 = 1000;

/// `temperature` and `max_tokens` from node settings, with defaults. A
/// setting of the wrong type fails the request.
pub(crate) fn sampling_params(settings: &Settings) -> Result<(f32, u32)> {
    let temperature = settings
        .get_f64("temperature")?
        .unwrap_or(DEFAULT_TEMPERATURE);
    let max_tokens = settings.get_u32("max_tokens")?.unwrap_or(DEFAULT_MAX_TOKENS);
    Ok((temperature as f32, max_tokens))
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptflow_core::error::FlowError;

    #[test]
    fn defaults_when_unset() {
        let (temperature, max_tokens) = sampling_params(&Settings::new()).unwrap();
        assert!((temperature - 0.7).abs() < 1e-6);
        assert_eq!(max_tokens, 1000);
    }

    #[test]
    fn integer_temperature_is_accepted() {
        let settings = Settings::new().with("temperature", 1_i64).with("max_tokens", 64_i64);
        assert_eq!(sampling_params(&settings).unwrap(), (1.0, 64));
    }

    #[test]
    fn mistyped_setting_is_an_error() {
        let settings = Settings::new().with("max_tokens", "lots");
        assert!(matches!(
            sampling_params(&settings),
            Err(FlowError::Setting(_))
        ));
    }
}
