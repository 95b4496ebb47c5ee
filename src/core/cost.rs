//! Cost estimation and usage accumulation

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::core::models::ModelPrice;

/// Fallback price when a model is not in the table
pub const GENERIC_PRICE: ModelPrice = ModelPrice::new(0.000075, 0.0003);

/// Published per-1000-character prices
const DEFAULT_PRICING: &[(&str, f64, f64)] = &[
    ("gemini-1.5-flash", 0.000_018_75, 0.000_075),
    ("gemini-1.5-pro", 0.000_312_5, 0.001_25),
    ("gemini-1.0-pro", 0.000_125, 0.000_375),
    ("gemini-pro", 0.000_125, 0.000_375),
];

/// Cost of one request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostEstimate {
    pub amount: f64,
    /// True when the generic fallback rate was used
    pub approximate: bool,
}

/// Converts character counts into money using a per-model price table
#[derive(Debug, Clone)]
pub struct CostEstimator {
    prices: Vec<(String, ModelPrice)>,
}

impl Default for CostEstimator {
    fn default() -> Self {
        Self {
            prices: DEFAULT_PRICING
                .iter()
                .map(|(name, input, output)| (name.to_string(), ModelPrice::new(*input, *output)))
                .collect(),
        }
    }
}

impl CostEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in table with `overrides` taking precedence
    pub fn with_overrides(overrides: &HashMap<String, ModelPrice>) -> Self {
        let mut estimator = Self::default();
        let mut names: Vec<&String> = overrides.keys().collect();
        names.sort();
        for name in names.into_iter().rev() {
            estimator.prices.retain(|(known, _)| known != name);
            estimator.prices.insert(0, (name.clone(), overrides[name]));
        }
        estimator
    }

    /// Known price of a model: exact name first, then substring
    pub fn price(&self, model: &str) -> Option<ModelPrice> {
        if let Some((_, price)) = self.prices.iter().find(|(name, _)| name == model) {
            return Some(*price);
        }
        if model.is_empty() {
            return None;
        }
        self.prices
            .iter()
            .find(|(name, _)| model.contains(name.as_str()))
            .map(|(_, price)| *price)
    }

    /// Cost of sending `input_chars` and receiving `output_chars`. Never negative.
    pub fn cost(&self, input_chars: usize, output_chars: usize, model: &str) -> CostEstimate {
        let (price, approximate) = match self.price(model) {
            Some(price) => (price, false),
            None => (GENERIC_PRICE, true),
        };

        let amount = input_chars as f64 * price.input_per_1k_chars / 1000.0
            + output_chars as f64 * price.output_per_1k_chars / 1000.0;
        let amount = if amount.is_finite() { amount.max(0.0) } else { 0.0 };

        CostEstimate {
            amount,
            approximate,
        }
    }
}

/// Usage totals across runs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageTotals {
    pub input_chars: usize,
    pub output_chars: usize,
    pub total_cost: f64,
    pub api_calls: usize,
    pub cache_hits: usize,
}

/// Session-wide usage counters. Only grows until `reset`.
#[derive(Debug, Default)]
pub struct UsageTracker {
    totals: RwLock<UsageTotals>,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for one successful provider response
    pub fn record_call(&self, input_chars: usize, output_chars: usize, cost: f64) {
        let mut totals = self.totals.write();
        totals.input_chars += input_chars;
        totals.output_chars += output_chars;
        totals.total_cost += cost.max(0.0);
        totals.api_calls += 1;
        debug!(
            "Usage: {} calls, {:.6} total cost",
            totals.api_calls, totals.total_cost
        );
    }

    pub fn record_cache_hits(&self, hits: usize) {
        self.totals.write().cache_hits += hits;
    }

    pub fn totals(&self) -> UsageTotals {
        self.totals.read().clone()
    }

    /// Status line shown after each batch
    pub fn summary(&self, cache_size: usize) -> String {
        let totals = self.totals.read();
        let cost = if totals.total_cost > 0.0 {
            format!(" | Cost: ${:.4}", totals.total_cost)
        } else {
            String::new()
        };
        format!(
            "Cache: {} | Hits: {} | API: {}{}",
            cache_size, totals.cache_hits, totals.api_calls, cost
        )
    }

    pub fn reset(&self) {
        *self.totals.write() = UsageTotals::default();
        info!("Usage counters reset");
    }
}
