//! Exponential backoff retry for transient failures.
//!
//! Shared by the LLM providers and the search layer. Only errors that report
//! themselves as [`Transient`] are retried; everything else returns at once.

use crate::config::RetryConfig;
use crate::error::{LlmError, SearchError};
use std::future::Future;
use std::time::Duration;

/// An error that may succeed if the operation is attempted again.
pub trait Transient {
    /// Whether retrying could help.
    fn is_transient(&self) -> bool;

    /// Minimum delay requested by the remote side, if any.
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl Transient for LlmError {
    fn is_transient(&self) -> bool {
        matches!(
            self,
            LlmError::RateLimited { .. }
                | LlmError::Streaming { .. }
                | LlmError::Connection { .. }
                | LlmError::Timeout { .. }
        )
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            LlmError::RateLimited { retry_after_secs } => {
                Some(Duration::from_secs(*retry_after_secs))
            }
            _ => None,
        }
    }
}

impl Transient for SearchError {
    fn is_transient(&self) -> bool {
        match self {
            SearchError::Transport { .. } | SearchError::Timeout { .. } => true,
            SearchError::HttpStatus { status } => *status == 429 || *status >= 500,
            SearchError::Parse { .. } => false,
        }
    }
}

/// Execute an async operation with exponential backoff retry on transient errors.
///
/// The operation runs at most `max_retries + 1` times. A server-provided
/// retry-after is used as a floor for the computed delay.
pub async fn with_retry<F, Fut, T, E>(config: &RetryConfig, operation: F) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Transient + std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(val) => return Ok(val),
            Err(e) => {
                if !e.is_transient() || attempt >= config.max_retries {
                    return Err(e);
                }

                let backoff_ms = compute_backoff(config, attempt, &e);
                tracing::warn!(
                    attempt = attempt + 1,
                    max = config.max_retries,
                    backoff_ms = backoff_ms,
                    error = %e,
                    "Retrying after transient error"
                );
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                attempt += 1;
            }
        }
    }
}

/// Compute backoff delay, respecting rate limit retry-after hints.
fn compute_backoff<E: Transient>(config: &RetryConfig, attempt: u32, err: &E) -> u64 {
    let computed = compute_exponential_backoff(config, attempt);
    match err.retry_after() {
        Some(floor) => (floor.as_millis() as u64).max(computed),
        None => computed,
    }
}

/// Pure exponential backoff with optional jitter.
fn compute_exponential_backoff(config: &RetryConfig, attempt: u32) -> u64 {
    let base = config.initial_backoff_ms as f64 * config.backoff_multiplier.powi(attempt as i32);
    let capped = base.min(config.max_backoff_ms as f64) as u64;
    if config.jitter {
        // up to 25%
        let jitter = (capped as f64 * 0.25 * rand_simple()) as u64;
        capped + jitter
    } else {
        capped
    }
}

/// Cheap time-derived value in [0, 1) for jitter.
fn rand_simple() -> f64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    jitter_fraction(nanos)
}

/// Fold every digit group of a sub-second nanosecond reading into [0, 1).
///
/// Clocks with microsecond or millisecond resolution leave the low groups at
/// zero, so the higher groups must contribute too.
fn jitter_fraction(nanos: u32) -> f64 {
    let folded = (nanos % 1000) + (nanos / 1000 % 1000) + (nanos / 1_000_000 % 1000);
    (folded % 1000) as f64 / 1000.0
}
