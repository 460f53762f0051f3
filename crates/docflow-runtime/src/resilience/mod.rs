//! Resilience around completion calls.
//!
//! - Circuit breaker that stops calling a failing provider
//! - Token budget with usage and cost accounting
//!
//! Retry with backoff lives in [`crate::completion`], built on `backon`.

mod budget;
mod circuit_breaker;

pub use budget::{BudgetTracker, LlmUsage, TokenBudget};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
