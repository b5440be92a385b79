//! Static per-backend price table and the cost calculation over token usage.

use crate::extractor::{Backend, TokenUsage};
use crate::ScrapeError;
use serde::Serialize;

/// Immutable per-backend pricing record, read-only at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModelPricing {
    pub input_price_per_token: f64,
    pub output_price_per_token: f64,
    pub supports_batch: bool,
}

pub fn pricing_for(backend: Backend) -> ModelPricing {
    match backend {
        Backend::Gpt4oMini => ModelPricing {
            input_price_per_token: 0.150 / 1_000_000.0,
            output_price_per_token: 0.600 / 1_000_000.0,
            supports_batch: true,
        },
        Backend::Gpt4o => ModelPricing {
            input_price_per_token: 2.5 / 1_000_000.0,
            output_price_per_token: 10.0 / 1_000_000.0,
            supports_batch: true,
        },
        Backend::Gemini15Flash => ModelPricing {
            input_price_per_token: 0.075 / 1_000_000.0,
            output_price_per_token: 0.30 / 1_000_000.0,
            supports_batch: false,
        },
        // Local and Groq-hosted Llama are free tiers.
        Backend::LocalLlama8b | Backend::GroqLlama70b => ModelPricing {
            input_price_per_token: 0.0,
            output_price_per_token: 0.0,
            supports_batch: false,
        },
    }
}

pub fn lookup_pricing(model: &str) -> Result<ModelPricing, ScrapeError> {
    let backend =
        Backend::parse(model).map_err(|_| ScrapeError::UnknownModelError(model.to_string()))?;
    Ok(pricing_for(backend))
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CostBreakdown {
    pub input_cost: f64,
    pub output_cost: f64,
    pub total_cost: f64,
}

/// Pure cost calculation: tokens times per-token prices, no rounding.
/// Display formatting is the caller's business.
pub fn price(usage: &TokenUsage, model: &str) -> Result<CostBreakdown, ScrapeError> {
    let pricing = lookup_pricing(model)?;
    let input_cost = usage.input_tokens as f64 * pricing.input_price_per_token;
    let output_cost = usage.output_tokens as f64 * pricing.output_price_per_token;
    Ok(CostBreakdown {
        input_cost,
        output_cost,
        total_cost: input_cost + output_cost,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn unknown_model_fails_lookup() {
        let err = lookup_pricing("no-such-model").unwrap_err();
        assert!(matches!(err, ScrapeError::UnknownModelError(_)));
    }

    #[test]
    fn every_backend_has_a_pricing_entry() {
        for backend in Backend::ALL {
            assert!(lookup_pricing(backend.as_str()).is_ok());
        }
    }

    #[test]
    fn gemini_flash_costs_match_the_price_sheet() {
        let usage = TokenUsage {
            input_tokens: 1_000_000,
            output_tokens: 1_000_000,
        };
        let cost = price(&usage, "gemini-1.5-flash").unwrap();
        assert!(close(cost.input_cost, 0.075));
        assert!(close(cost.output_cost, 0.30));
        assert!(close(cost.total_cost, 0.375));
    }

    #[test]
    fn pricing_is_linear_and_additive() {
        let a = TokenUsage {
            input_tokens: 1234,
            output_tokens: 567,
        };
        let b = TokenUsage {
            input_tokens: 89,
            output_tokens: 1011,
        };
        for backend in Backend::ALL {
            let separate_a = price(&a, backend.as_str()).unwrap();
            let separate_b = price(&b, backend.as_str()).unwrap();
            let combined = price(&(a + b), backend.as_str()).unwrap();
            assert!(close(combined.input_cost, separate_a.input_cost + separate_b.input_cost));
            assert!(close(combined.output_cost, separate_a.output_cost + separate_b.output_cost));
            assert!(close(combined.total_cost, separate_a.total_cost + separate_b.total_cost));
        }
    }

    #[test]
    fn local_backends_are_free() {
        let usage = TokenUsage {
            input_tokens: 100_000,
            output_tokens: 100_000,
        };
        for model in ["Llama3.1 8B", "Groq Llama3.1 70b"] {
            let cost = price(&usage, model).unwrap();
            assert_eq!(cost.total_cost, 0.0);
        }
    }
}
