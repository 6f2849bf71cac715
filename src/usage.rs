//! Token accounting across a chat and the expense estimate shown at exit.

use crate::errors::ChatError;
use crate::openai::Usage;
use crate::pricing::{calculate_expense, PricingTable};

/// Running token totals. Both counters only ever grow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageCounters {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl UsageCounters {
    pub fn record(&mut self, usage: &Usage) {
        self.prompt_tokens = self.prompt_tokens.saturating_add(usage.prompt_tokens);
        self.completion_tokens = self
            .completion_tokens
            .saturating_add(usage.completion_tokens);
    }

    pub fn total(&self) -> u64 {
        self.prompt_tokens.saturating_add(self.completion_tokens)
    }
}

/// Final token count and cost estimate for a chat.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpenseReport {
    pub model: String,
    pub total_tokens: u64,
    pub expense: f64,
}

impl ExpenseReport {
    /// Price `counters` at the rates of `model`. A model missing from the
    /// table is an error, never a zero-cost report.
    pub fn compute(
        counters: &UsageCounters,
        model: &str,
        pricing: &PricingTable,
    ) -> Result<Self, ChatError> {
        let rates = pricing.get(model)?;
        Ok(Self {
            model: model.to_string(),
            total_tokens: counters.total(),
            expense: calculate_expense(
                counters.prompt_tokens,
                counters.completion_tokens,
                rates.prompt_rate,
                rates.completion_rate,
            ),
        })
    }
}
