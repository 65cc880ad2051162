//! Token estimation and cost calculation.
//!
//! Providers that report usage are trusted; otherwise token counts come from
//! [`estimate_tokens`], a rough four-characters-per-token heuristic.

use super::models::{CostInfo, ModelPrice, Usage};

/// Approximate token count: one token per four characters, rounded up.
///
/// Counts Unicode scalar values, not bytes. This is only an estimate and can
/// be off by a wide margin for code or non-Latin scripts.
#[must_use]
pub fn estimate_tokens(text: &str) -> u64 {
    let chars = text.chars().count() as u64;
    chars.div_ceil(4)
}

/// Estimated usage for a prompt/completion pair.
#[must_use]
pub fn estimate_usage(prompt: &str, completion: &str) -> Usage {
    Usage::new(estimate_tokens(prompt), estimate_tokens(completion))
}

/// Per-token pricing for one model.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ModelPricing {
    /// USD per prompt token.
    pub prompt: f64,
    /// USD per completion token.
    pub completion: f64,
}

impl From<ModelPrice> for ModelPricing {
    fn from(price: ModelPrice) -> Self {
        Self {
            prompt: price.prompt,
            completion: price.completion,
        }
    }
}

/// Cost split by direction.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TokenCostBreakdown {
    pub input_cost_usd: f64,
    pub output_cost_usd: f64,
    pub total_cost_usd: f64,
}

impl ModelPricing {
    #[must_use]
    pub const fn new(prompt: f64, completion: f64) -> Self {
        Self { prompt, completion }
    }

    /// Calculate cost for given token counts.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn calculate_cost(&self, input: u64, output: u64) -> TokenCostBreakdown {
        let input_cost = input as f64 * self.prompt;
        let output_cost = output as f64 * self.completion;
        TokenCostBreakdown {
            input_cost_usd: input_cost,
            output_cost_usd: output_cost,
            total_cost_usd: input_cost + output_cost,
        }
    }

    /// Confirmed cost record using these prices and a provider-reported total.
    #[must_use]
    pub fn confirmed_cost(
        &self,
        usage: Usage,
        native: Usage,
        total_cost: f64,
        latency_ms: Option<u64>,
        finish_reason: Option<String>,
    ) -> CostInfo {
        let breakdown = self.calculate_cost(native.input_tokens, native.output_tokens);
        CostInfo {
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            total_tokens: usage.total_tokens,
            total_cost,
            input_cost: breakdown.input_cost_usd,
            output_cost: breakdown.output_cost_usd,
            latency_ms,
            finish_reason,
            confirmed: true,
        }
    }
}
