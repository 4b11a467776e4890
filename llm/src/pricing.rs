//! Static per-model price table for advisory cost estimation.
//!
//! Figures are USD per 1K tokens. Estimates are logged, never billed;
//! the secondary provider's word-count usage proxy makes them approximate
//! on the fallback path.

use crate::types::Usage;

#[derive(Debug, Clone, Copy)]
pub struct ModelPrice {
    pub prompt_per_1k: f64,
    pub completion_per_1k: f64,
}

const PRICES: &[(&str, ModelPrice)] = &[
    (
        "gpt-4o",
        ModelPrice {
            prompt_per_1k: 0.0025,
            completion_per_1k: 0.01,
        },
    ),
    (
        "gpt-4o-mini",
        ModelPrice {
            prompt_per_1k: 0.00015,
            completion_per_1k: 0.0006,
        },
    ),
    (
        "gpt-4-turbo",
        ModelPrice {
            prompt_per_1k: 0.01,
            completion_per_1k: 0.03,
        },
    ),
    (
        "gpt-4",
        ModelPrice {
            prompt_per_1k: 0.03,
            completion_per_1k: 0.06,
        },
    ),
    (
        "gpt-3.5-turbo",
        ModelPrice {
            prompt_per_1k: 0.0005,
            completion_per_1k: 0.0015,
        },
    ),
    (
        "o1",
        ModelPrice {
            prompt_per_1k: 0.015,
            completion_per_1k: 0.06,
        },
    ),
    (
        "o1-mini",
        ModelPrice {
            prompt_per_1k: 0.0011,
            completion_per_1k: 0.0044,
        },
    ),
    (
        "o3-mini",
        ModelPrice {
            prompt_per_1k: 0.0011,
            completion_per_1k: 0.0044,
        },
    ),
    (
        "claude-3-5-sonnet",
        ModelPrice {
            prompt_per_1k: 0.003,
            completion_per_1k: 0.015,
        },
    ),
];

const DEFAULT_PRICE: ModelPrice = ModelPrice {
    prompt_per_1k: 0.005,
    completion_per_1k: 0.015,
};

fn price_for(model: &str) -> ModelPrice {
    let lower = model.to_ascii_lowercase();

    if let Some((_, price)) = PRICES.iter().find(|(name, _)| *name == lower) {
        return *price;
    }

    let prefix_match = PRICES
        .iter()
        .filter(|(name, _)| lower.starts_with(name))
        .max_by_key(|(name, _)| name.len());
    if let Some((_, price)) = prefix_match {
        return *price;
    }

    tracing::warn!(model, "Model not in price table, using default pricing");
    DEFAULT_PRICE
}

/// Estimated USD cost of one completion given reported token usage.
pub fn estimate_cost(model: &str, usage: &Usage) -> f64 {
    let price = price_for(model);
    f64::from(usage.prompt_tokens) / 1000.0 * price.prompt_per_1k
        + f64::from(usage.completion_tokens) / 1000.0 * price.completion_per_1k
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage(prompt: u32, completion: u32) -> Usage {
        Usage {
            prompt_tokens: prompt,
            completion_tokens: completion,
            total_tokens: prompt + completion,
        }
    }

    #[test]
    fn test_exact_model_pricing() {
        let cost = estimate_cost("gpt-4o", &usage(1000, 1000));
        assert!((cost - 0.0125).abs() < 1e-9);
    }

    #[test]
    fn test_prefix_fallback_pricing() {
        let dated = estimate_cost("gpt-4o-2024-08-06", &usage(1000, 1000));
        let exact = estimate_cost("gpt-4o", &usage(1000, 1000));
        assert!((dated - exact).abs() < 1e-9);

        // Longest prefix wins, mini is not priced as the full model.
        let mini = estimate_cost("gpt-4o-mini-2024-07-18", &usage(1000, 1000));
        assert!(mini < exact);
    }

    #[test]
    fn test_unknown_model_default_pricing() {
        let cost = estimate_cost("mystery-model", &usage(2000, 0));
        assert!((cost - 0.01).abs() < 1e-9);
    }
}
