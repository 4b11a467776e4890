//! Model/token resolution: sampling temperature, output-token ceilings and
//! the token-limit parameter name for a given model id.
//!
//! All lookups are pure. Unknown models degrade to a conservative default
//! with a warning rather than failing the call.

use serde::{Deserialize, Serialize};

/// Model families that reject explicit sampling temperatures and accept
/// only the `max_completion_tokens` limit field. Prefix match,
/// case-insensitive.
const RESTRICTED_TEMPERATURE_PREFIXES: &[&str] = &["o1", "o3", "o4", "gpt-5"];

/// Static per-model output-token ceilings, checked before prefix fallback.
const TOKEN_CEILINGS: &[(&str, u32)] = &[
    ("gpt-4o", 16_384),
    ("gpt-4o-mini", 16_384),
    ("gpt-4-turbo", 4_096),
    ("gpt-4", 8_192),
    ("gpt-3.5-turbo", 4_096),
    ("gpt-5", 128_000),
    ("gpt-5-mini", 128_000),
    ("o1", 100_000),
    ("o1-mini", 65_536),
    ("o3", 100_000),
    ("o3-mini", 100_000),
    ("o4-mini", 100_000),
];

/// Ceiling applied when neither an exact nor a prefix match exists.
const DEFAULT_TOKEN_CEILING: u32 = 4_096;

/// Name of the output-token limit field, which differs by model family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenParam {
    MaxTokens,
    MaxCompletionTokens,
}

impl TokenParam {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenParam::MaxTokens => "max_tokens",
            TokenParam::MaxCompletionTokens => "max_completion_tokens",
        }
    }
}

fn is_restricted_family(model: &str) -> bool {
    let lower = model.to_ascii_lowercase();
    RESTRICTED_TEMPERATURE_PREFIXES
        .iter()
        .any(|prefix| lower.starts_with(prefix))
}

/// Returns `1.0` for the restricted-temperature family, otherwise the
/// configured default.
pub fn temperature_for(model: &str, default: f64) -> f64 {
    if is_restricted_family(model) {
        1.0
    } else {
        default
    }
}

/// Output-token ceiling for `model`: exact table entry, then longest
/// prefix match, then the conservative default with a warning.
pub fn max_completion_tokens_for(model: &str) -> u32 {
    let lower = model.to_ascii_lowercase();

    if let Some((_, ceiling)) = TOKEN_CEILINGS.iter().find(|(name, _)| *name == lower) {
        return *ceiling;
    }

    let prefix_match = TOKEN_CEILINGS
        .iter()
        .filter(|(name, _)| lower.starts_with(name))
        .max_by_key(|(name, _)| name.len());
    if let Some((_, ceiling)) = prefix_match {
        return *ceiling;
    }

    tracing::warn!(
        model,
        default = DEFAULT_TOKEN_CEILING,
        "Unknown model, applying default output-token ceiling"
    );
    DEFAULT_TOKEN_CEILING
}

/// Clamps `requested` to the model's ceiling and selects the correct
/// token-limit field name for the model family.
pub fn resolve_token_param(model: &str, requested: u32) -> (u32, TokenParam) {
    let ceiling = max_completion_tokens_for(model);
    let param = if is_restricted_family(model) {
        TokenParam::MaxCompletionTokens
    } else {
        TokenParam::MaxTokens
    };
    (requested.min(ceiling), param)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_restricted_family_temperature_is_one() {
        for model in ["o1", "o1-mini", "O3-MINI", "o4-mini", "gpt-5", "GPT-5-mini"] {
            assert_eq!(temperature_for(model, 0.7), 1.0, "model {model}");
        }
    }

    #[test]
    fn test_unrestricted_models_use_default() {
        for model in ["gpt-4o", "gpt-4o-mini", "gpt-3.5-turbo", "mystery-model"] {
            assert_eq!(temperature_for(model, 0.4), 0.4, "model {model}");
        }
    }

    #[test]
    fn test_ceiling_exact_then_prefix_then_default() {
        assert_eq!(max_completion_tokens_for("gpt-4o"), 16_384);
        // Prefix fallback: dated snapshot names resolve via their family.
        assert_eq!(max_completion_tokens_for("gpt-4o-2024-08-06"), 16_384);
        assert_eq!(max_completion_tokens_for("o1-mini-2024-09-12"), 65_536);
        // Longest prefix wins: gpt-4o-mini over gpt-4o, gpt-4o over gpt-4.
        assert_eq!(max_completion_tokens_for("gpt-4o-mini-2024-07-18"), 16_384);
        assert_eq!(max_completion_tokens_for("gpt-4-0613"), 8_192);
        // Unknown model degrades to the default.
        assert_eq!(max_completion_tokens_for("llama-3-70b"), DEFAULT_TOKEN_CEILING);
    }

    #[test]
    fn test_resolve_never_exceeds_ceiling() {
        for requested in [0u32, 1, 4_096, 16_384, 1_000_000] {
            let (limit, _) = resolve_token_param("gpt-4o", requested);
            assert!(limit <= max_completion_tokens_for("gpt-4o"));
            let (limit, _) = resolve_token_param("unknown-model", requested);
            assert!(limit <= DEFAULT_TOKEN_CEILING);
        }
    }

    #[test]
    fn test_token_param_field_name_by_family() {
        let (_, param) = resolve_token_param("o1-mini", 1024);
        assert_eq!(param, TokenParam::MaxCompletionTokens);
        assert_eq!(param.as_str(), "max_completion_tokens");

        let (_, param) = resolve_token_param("gpt-4o", 1024);
        assert_eq!(param, TokenParam::MaxTokens);
        assert_eq!(param.as_str(), "max_tokens");
    }
}
