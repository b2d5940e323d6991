//! Static per-model price table.
//!
//! Prices are USD per 1,000 tokens. Only the hosted OpenAI models carry
//! entries; every other kind or model estimates to zero.

use domain::{BackendKind, TokenCost};

/// `(model, input per 1K, output per 1K)`.
const OPENAI_PRICES: &[(&str, f64, f64)] = &[
    ("gpt-3.5-turbo", 0.0005, 0.0015),
    ("gpt-3.5-turbo-16k", 0.003, 0.004),
    ("gpt-4", 0.03, 0.06),
    ("gpt-4-turbo-preview", 0.01, 0.03),
    ("gpt-4o", 0.005, 0.015),
    ("gpt-4o-mini", 0.00015, 0.0006),
];

/// Per-1K input and output price for `model` under `kind`, if listed.
pub fn price_per_1k(kind: BackendKind, model: &str) -> Option<(f64, f64)> {
    match kind {
        BackendKind::OpenAi => OPENAI_PRICES
            .iter()
            .find(|(name, _, _)| *name == model)
            .map(|&(_, input, output)| (input, output)),
        _ => None,
    }
}

/// Estimated cost of one invocation. Unlisted models cost zero.
pub fn estimate_cost(
    kind: BackendKind,
    model: &str,
    input_tokens: u64,
    output_tokens: u64,
) -> TokenCost {
    price_per_1k(kind, model)
        .and_then(|(input, output)| {
            TokenCost::new(
                input_tokens as f64 / 1000.0 * input + output_tokens as f64 / 1000.0 * output,
            )
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listed_model_is_priced_per_thousand_tokens() {
        let cost = estimate_cost(BackendKind::OpenAi, "gpt-4", 1000, 500);
        assert!((cost.as_f64() - 0.06).abs() < 1e-12);
    }

    #[test]
    fn test_unlisted_entries_cost_zero() {
        assert!(estimate_cost(BackendKind::OpenAi, "gpt-5-preview", 1000, 1000).is_zero());
        assert!(estimate_cost(BackendKind::Claude, "gpt-4", 1000, 1000).is_zero());
        assert!(estimate_cost(BackendKind::Ollama, "qwen3:8b", 1000, 1000).is_zero());
    }
}
