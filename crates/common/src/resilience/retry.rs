//! Generic retry strategy implementation with proper error handling and
//! extensibility
//!
//! This module provides a retry mechanism that can be used across the
//! workspace for any operation that might fail transiently. A
//! [`RetryPolicy`] decides whether a given error is worth another attempt;
//! the [`RetryExecutor`] enforces the retry budget and the backoff delays.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

/// Errors that can occur during retry operations
///
/// Both variants carry the error returned by the last attempt so callers can
/// surface the root cause instead of a generic "retries exhausted" message.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// All retry attempts have been exhausted
    #[error("All retry attempts exhausted after {attempts} tries: {source}")]
    Exhausted { attempts: u32, source: E },

    /// The operation failed with a non-retryable error
    #[error("Operation failed with non-retryable error: {source}")]
    NonRetryable { source: E },
}

impl<E> RetryError<E> {
    /// Consume the retry error and return the error of the last attempt.
    pub fn into_source(self) -> E {
        match self {
            Self::Exhausted { source, .. } | Self::NonRetryable { source } => source,
        }
    }

    /// Total number of attempts made before giving up.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Exhausted { attempts, .. } => *attempts,
            Self::NonRetryable { .. } => 1,
        }
    }
}

/// Result type for retry operations
pub type RetryResult<T, E> = Result<T, RetryError<E>>;

/// Trait for determining whether an error should be retried
pub trait RetryPolicy<E> {
    /// Determine if the error should be retried. `attempt` is the zero-based
    /// index of the attempt that failed.
    fn should_retry(&self, error: &E, attempt: u32) -> RetryDecision;
}

/// Decision for whether to retry an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the operation with the default backoff delay
    Retry,
    /// Don't retry the operation
    Stop,
}

/// Backoff strategy for calculating retry delays
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackoffStrategy {
    /// Fixed delay between retries
    Fixed(Duration),
    /// Exponential backoff: `initial_delay * 2^retry`, capped at `max_delay`
    Exponential { initial_delay: Duration, max_delay: Duration },
}

impl BackoffStrategy {
    /// Calculate the delay before retry number `retry` (zero-based)
    pub fn calculate_delay(&self, retry: u32) -> Duration {
        match self {
            Self::Fixed(delay) => *delay,
            Self::Exponential { initial_delay, max_delay } => {
                let multiplier = 1u32 << retry.min(16);
                initial_delay.saturating_mul(multiplier).min(*max_delay)
            }
        }
    }
}

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of retries after the initial attempt
    pub max_retries: u32,
    /// Backoff strategy for calculating delays
    pub backoff: BackoffStrategy,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: BackoffStrategy::Exponential {
                initial_delay: Duration::from_millis(200),
                max_delay: Duration::from_secs(5),
            },
        }
    }
}

impl RetryConfig {
    /// Fixed-delay configuration with `max_retries` retries.
    pub fn fixed(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, backoff: BackoffStrategy::Fixed(delay) }
    }

    /// Exponential configuration with `max_retries` retries.
    pub fn exponential(max_retries: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self { max_retries, backoff: BackoffStrategy::Exponential { initial_delay, max_delay } }
    }
}

/// The main retry executor
#[derive(Debug, Clone)]
pub struct RetryExecutor<P> {
    config: RetryConfig,
    policy: P,
}

impl<P> RetryExecutor<P> {
    /// Create a new retry executor with the given configuration and policy
    pub fn new(config: RetryConfig, policy: P) -> Self {
        Self { config, policy }
    }

    /// Execute an operation with retry logic
    ///
    /// The operation runs once, then at most `max_retries` more times while
    /// the policy keeps classifying its errors as retryable.
    pub async fn execute<F, Fut, T, E>(&self, mut operation: F) -> RetryResult<T, E>
    where
        P: RetryPolicy<E>,
        E: fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut retries: u32 = 0;

        loop {
            match operation().await {
                Ok(value) => {
                    if retries > 0 {
                        debug!(retries, "Operation succeeded after retries");
                    }
                    return Ok(value);
                }
                Err(error) => {
                    let delay = match self.policy.should_retry(&error, retries) {
                        RetryDecision::Stop => {
                            debug!(error = %error, "Retry policy determined not to retry");
                            return Err(RetryError::NonRetryable { source: error });
                        }
                        RetryDecision::Retry => self.config.backoff.calculate_delay(retries),
                    };

                    if retries >= self.config.max_retries {
                        warn!(
                            attempts = retries + 1,
                            error = %error,
                            "All retry attempts exhausted"
                        );
                        return Err(RetryError::Exhausted { attempts: retries + 1, source: error });
                    }

                    retries += 1;
                    warn!(
                        retry = retries,
                        max_retries = self.config.max_retries,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %error,
                        "Operation failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// Pre-defined retry policies for common scenarios
pub mod policies {
    use super::{RetryDecision, RetryPolicy};

    /// Predicate-based retry policy
    #[derive(Debug, Clone)]
    pub struct PredicateRetry<F> {
        predicate: F,
    }

    impl<F> PredicateRetry<F> {
        /// Retry whenever `predicate(error, attempt)` returns true.
        pub fn new(predicate: F) -> Self {
            Self { predicate }
        }
    }

    impl<F, E> RetryPolicy<E> for PredicateRetry<F>
    where
        F: Fn(&E, u32) -> bool,
    {
        fn should_retry(&self, error: &E, attempt: u32) -> RetryDecision {
            if (self.predicate)(error, attempt) {
                RetryDecision::Retry
            } else {
                RetryDecision::Stop
            }
        }
    }
}
