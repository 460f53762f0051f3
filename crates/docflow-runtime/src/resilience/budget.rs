//! Token budget for completion calls.
//!
//! One budget per pipeline run. A call whose estimated size does not fit the
//! remaining budget is refused before it reaches the provider.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};

use crate::providers::TokenUsage;

pub struct TokenBudget {
    pub max_tokens: u32,
    used: AtomicU32,
}

impl TokenBudget {
    pub fn new(max_tokens: u32) -> Self {
        Self {
            max_tokens,
            used: AtomicU32::new(0),
        }
    }

    pub fn can_afford(&self, tokens: u32) -> bool {
        self.remaining() >= tokens
    }

    pub fn record(&self, tokens: u32) {
        self.used.fetch_add(tokens, Ordering::SeqCst);
    }

    pub fn remaining(&self) -> u32 {
        self.max_tokens.saturating_sub(self.used.load(Ordering::SeqCst))
    }

    pub fn used(&self) -> u32 {
        self.used.load(Ordering::SeqCst)
    }
}

/// Accumulated completion usage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmUsage {
    pub total_tokens: u32,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,

    /// Provider calls made (cache hits excluded)
    pub llm_calls: u32,

    /// Answers served from the response cache
    pub cache_hits: u32,

    /// Estimated cost in USD
    pub estimated_cost: f64,
}

impl LlmUsage {
    pub fn add(&mut self, usage: &TokenUsage, model: &str) {
        self.prompt_tokens += usage.prompt_tokens;
        self.completion_tokens += usage.completion_tokens;
        self.total_tokens += usage.total();
        self.llm_calls += 1;
        self.estimated_cost += Self::estimate_cost(usage, model);
    }

    pub fn add_cache_hit(&mut self) {
        self.cache_hits += 1;
    }

    fn estimate_cost(usage: &TokenUsage, model: &str) -> f64 {
        // USD per million tokens
        let (input_rate, output_rate) = match model {
            m if m.contains("gpt-4o-mini") => (0.15, 0.6),
            m if m.contains("gpt-4o") => (2.5, 10.0),
            m if m.contains("gpt-4.1-mini") => (0.4, 1.6),
            // Local models cost nothing per token
            _ => (0.0, 0.0),
        };

        let input_cost = (usage.prompt_tokens as f64 / 1_000_000.0) * input_rate;
        let output_cost = (usage.completion_tokens as f64 / 1_000_000.0) * output_rate;
        input_cost + output_cost
    }
}

/// Budget plus the usage recorded against it.
pub struct BudgetTracker {
    budget: TokenBudget,
    usage: RwLock<LlmUsage>,
}

impl BudgetTracker {
    pub fn new(max_tokens: u32) -> Self {
        Self {
            budget: TokenBudget::new(max_tokens),
            usage: RwLock::new(LlmUsage::default()),
        }
    }

    pub fn can_afford(&self, estimated_tokens: u32) -> bool {
        self.budget.can_afford(estimated_tokens)
    }

    pub fn record_usage(&self, usage: &TokenUsage, model: &str) {
        self.budget.record(usage.total());
        self.usage.write().add(usage, model);
    }

    pub fn record_cache_hit(&self) {
        self.usage.write().add_cache_hit();
    }

    pub fn usage(&self) -> LlmUsage {
        self.usage.read().clone()
    }

    pub fn remaining(&self) -> u32 {
        self.budget.remaining()
    }

    pub fn max_tokens(&self) -> u32 {
        self.budget.max_tokens
    }
}

impl Default for BudgetTracker {
    fn default() -> Self {
        Self::new(100_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_enforcement() {
        let budget = TokenBudget::new(100);

        assert!(budget.can_afford(100));
        assert!(!budget.can_afford(101));

        budget.record(60);
        assert_eq!(budget.remaining(), 40);
        assert!(!budget.can_afford(50));
        assert!(budget.can_afford(40));
    }

    #[test]
    fn test_tracker_records_usage() {
        let tracker = BudgetTracker::new(500);
        let usage = TokenUsage {
            prompt_tokens: 30,
            completion_tokens: 20,
        };

        tracker.record_usage(&usage, "llama3.2");
        tracker.record_cache_hit();

        assert_eq!(tracker.remaining(), 450);
        let totals = tracker.usage();
        assert_eq!(totals.llm_calls, 1);
        assert_eq!(totals.cache_hits, 1);
        assert_eq!(totals.total_tokens, 50);
        assert_eq!(totals.estimated_cost, 0.0);
    }

    #[test]
    fn test_cost_estimation() {
        let mut usage = LlmUsage::default();
        usage.add(
            &TokenUsage {
                prompt_tokens: 1_000_000,
                completion_tokens: 1_000_000,
            },
            "gpt-4o-mini",
        );
        assert!((usage.estimated_cost - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_exhausted_tracker_keeps_its_limit() {
        let tracker = BudgetTracker::new(100);
        tracker.record_usage(
            &TokenUsage {
                prompt_tokens: 90,
                completion_tokens: 10,
            },
            "llama3.2",
        );
        assert!(!tracker.can_afford(1));

        assert_eq!(tracker.remaining(), 0);
        assert_eq!(tracker.max_tokens(), 100);
        assert!(BudgetTracker::new(tracker.max_tokens()).can_afford(100));
    }
}
