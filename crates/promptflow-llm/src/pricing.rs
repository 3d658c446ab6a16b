//! Approximate per-model pricing, in USD per million tokens.
//!
//! Used only to estimate cost from reported token usage. Unknown models fall
//! back to the cheapest tier of their family.

/// Price of one model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPrice {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

impl ModelPrice {
    pub const FREE: ModelPrice = ModelPrice::new(0.0, 0.0);

    pub const fn new(input_per_million: f64, output_per_million: f64) -> Self {
        Self {
            input_per_million,
            output_per_million,
        }
    }

    /// (input cost, output cost) in USD.
    pub fn cost(&self, input_tokens: u64, output_tokens: u64) -> (f64, f64) {
        (
            input_tokens as f64 / 1_000_000.0 * self.input_per_million,
            output_tokens as f64 / 1_000_000.0 * self.output_per_million,
        )
    }
}

/// Which price table a provider consults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PriceTable {
    #[default]
    OpenAi,
    Anthropic,
    /// Local or self-hosted endpoints.
    Free,
}

impl PriceTable {
    pub fn lookup(&self, model: &str) -> ModelPrice {
        match self {
            PriceTable::OpenAi => openai_price(model),
            PriceTable::Anthropic => anthropic_price(model),
            PriceTable::Free => ModelPrice::FREE,
        }
    }
}

pub fn openai_price(model: &str) -> ModelPrice {
    match model {
        "gpt-4" | "gpt-4-0613" => ModelPrice::new(30.0, 60.0),
        "gpt-4-turbo" | "gpt-4-turbo-preview" | "gpt-4-1106-preview" => ModelPrice::new(10.0, 30.0),
        "gpt-4o" => ModelPrice::new(2.5, 10.0),
        "gpt-4o-mini" => ModelPrice::new(0.15, 0.6),
        "gpt-3.5-turbo" | "gpt-3.5-turbo-0125" => ModelPrice::new(0.5, 1.5),
        _ => ModelPrice::new(0.5, 1.5),
    }
}

pub fn anthropic_price(model: &str) -> ModelPrice {
    match model {
        "claude-3-opus-20240229" => ModelPrice::new(15.0, 75.0),
        "claude-3-5-sonnet-20241022"
        | "claude-3-5-sonnet-20240620"
        | "claude-3-sonnet-20240229" => ModelPrice::new(3.0, 15.0),
        "claude-3-haiku-20240307" => ModelPrice::new(0.25, 1.25),
        _ => ModelPrice::new(0.25, 1.25),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cost_is_per_million() {
        let (input, output) = openai_price("gpt-4").cost(1_000_000, 500_000);
        assert!((input - 30.0).abs() < 1e-9);
        assert!((output - 30.0).abs() < 1e-9);
    }

    #[test]
    fn unknown_models_use_cheapest_tier() {
        assert_eq!(openai_price("gpt-next"), openai_price("gpt-3.5-turbo"));
        assert_eq!(anthropic_price("claude-9"), anthropic_price("claude-3-haiku-20240307"));
    }

    #[test]
    fn free_table_costs_nothing() {
        assert_eq!(PriceTable::Free.lookup("llama3").cost(10, 10), (0.0, 0.0));
    }
}
