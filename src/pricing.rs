//! Per-model token prices and the expense calculation.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::errors::ChatError;

/// USD per 1000 tokens for one model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PricingEntry {
    /// Rate for prompt (input) tokens.
    #[serde(rename = "prompt")]
    pub prompt_rate: f64,
    /// Rate for completion (output) tokens.
    #[serde(rename = "completion")]
    pub completion_rate: f64,
}

impl PricingEntry {
    pub const fn new(prompt_rate: f64, completion_rate: f64) -> Self {
        Self {
            prompt_rate,
            completion_rate,
        }
    }
}

const BUILTIN_RATES: &[(&str, PricingEntry)] = &[
    ("gpt-3.5-turbo", PricingEntry::new(0.0015, 0.002)),
    ("gpt-3.5-turbo-0613", PricingEntry::new(0.0015, 0.002)),
    ("gpt-3.5-turbo-16k", PricingEntry::new(0.003, 0.004)),
    ("gpt-4", PricingEntry::new(0.03, 0.06)),
    ("gpt-4-0613", PricingEntry::new(0.03, 0.06)),
    ("gpt-4-32k", PricingEntry::new(0.06, 0.12)),
    ("gpt-4-32k-0613", PricingEntry::new(0.06, 0.12)),
    ("gpt-4-turbo", PricingEntry::new(0.01, 0.03)),
    ("gpt-4o", PricingEntry::new(0.0025, 0.01)),
    ("gpt-4o-mini", PricingEntry::new(0.00015, 0.0006)),
    ("o3-mini", PricingEntry::new(0.0011, 0.0044)),
];

/// Lookup table from model identifier to its rates.
#[derive(Debug, Clone, PartialEq)]
pub struct PricingTable {
    rates: HashMap<String, PricingEntry>,
}

impl PricingTable {
    /// The built-in rates, extended (or overridden) by `extra`.
    pub fn with_overrides(extra: &HashMap<String, PricingEntry>) -> Self {
        let mut table = Self::default();
        for (model, entry) in extra {
            table.rates.insert(model.clone(), *entry);
        }
        table
    }

    pub fn get(&self, model: &str) -> Result<PricingEntry, ChatError> {
        self.rates
            .get(model)
            .copied()
            .ok_or_else(|| ChatError::UnknownModel {
                model: model.to_string(),
            })
    }
}

impl Default for PricingTable {
    fn default() -> Self {
        Self {
            rates: BUILTIN_RATES
                .iter()
                .map(|(model, entry)| (model.to_string(), *entry))
                .collect(),
        }
    }
}

/// Cost in USD of the given token counts, rounded to 6 decimal places.
pub fn calculate_expense(
    prompt_tokens: u64,
    completion_tokens: u64,
    prompt_rate: f64,
    completion_rate: f64,
) -> f64 {
    let expense = (prompt_tokens as f64 / 1000.0) * prompt_rate
        + (completion_tokens as f64 / 1000.0) * completion_rate;
    (expense * 1e6).round() / 1e6
}
