//! Resilience patterns for fault tolerance and error handling
//!
//! This module provides **generic, reusable** retry logic: a bounded retry
//! executor driven by a pluggable [`RetryPolicy`] that classifies errors as
//! retryable or terminal. Callers supply the classification; the executor
//! owns the loop, the attempt counter, and the delays.
//!
//! The loop is explicit and bounded, so the retry budget is a visible,
//! testable parameter and call stacks never grow with the number of attempts.

pub mod retry;

// Re-export retry types
pub use retry::{
    policies, BackoffStrategy, RetryConfig, RetryDecision, RetryError, RetryExecutor,
    RetryPolicy, RetryResult,
};
