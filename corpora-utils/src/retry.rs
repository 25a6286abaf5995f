//! Bounded retry with exponential backoff and full jitter.
//!
//! Every external call (embedding, LLM, storage, database) runs inside
//! [`retry`]. Classification decides whether an attempt is worth repeating;
//! the last error is always re-raised once the budget is spent.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use corpora_core::{CorporaError, Result};

/// Retry schedule for external calls.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first, at least 1.
    pub max_attempts: u32,
    /// Backoff base: the cap for attempt 1.
    pub base_delay: Duration,
    /// Upper bound for any computed delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Backoff ceiling for a 1-based attempt: `min(max, base * 2^(n-1))`.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        let scaled = self.base_delay.saturating_mul(1_u32 << shift);
        scaled.min(self.max_delay)
    }
}

/// Whether an error is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Transient,
    Permanent,
}

/// Message tokens that mark a poorly-typed provider error as transient.
const TRANSIENT_TOKENS: [&str; 9] = [
    "timeout",
    "timed out",
    "connection",
    "reset",
    "unavailable",
    "temporarily",
    "rate limit",
    "overloaded",
    "econn",
];

/// Classify an error for retry purposes.
///
/// Order: HTTP status carried by provider errors, then built-in
/// timeout/I-O kinds, then a message heuristic with a conservative
/// permanent default.
#[must_use]
pub fn classify(error: &CorporaError) -> ErrorClass {
    if let Some(status) = error.provider_status() {
        return match status {
            400 | 401 | 403 | 404 => ErrorClass::Permanent,
            408 | 429 | 500 | 502 | 503 | 504 => ErrorClass::Transient,
            _ => classify_by_message(error),
        };
    }

    match error {
        CorporaError::Timeout { .. } | CorporaError::Storage { .. } => ErrorClass::Transient,
        CorporaError::NotFound { .. }
        | CorporaError::Forbidden { .. }
        | CorporaError::Conflict { .. }
        | CorporaError::Validation { .. } => ErrorClass::Permanent,
        _ => classify_by_message(error),
    }
}

fn classify_by_message(error: &CorporaError) -> ErrorClass {
    let message = error.to_string().to_lowercase();
    if TRANSIENT_TOKENS.iter().any(|token| message.contains(token)) {
        ErrorClass::Transient
    } else {
        ErrorClass::Permanent
    }
}

/// Run `op` under `policy`, sleeping a uniformly jittered delay between
/// attempts. Permanent errors and the final attempt's error are re-raised
/// unchanged.
///
/// # Errors
///
/// Returns the last error produced by `op`.
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, request_id: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);

    for attempt in 1..=max_attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                let class = classify(&error);
                if class == ErrorClass::Permanent || attempt == max_attempts {
                    return Err(error);
                }

                let ceiling = policy.delay_for_attempt(attempt);
                let sleep = jittered(ceiling);
                warn!(
                    request_id,
                    attempt,
                    max_attempts,
                    delay_ms = u64::try_from(sleep.as_millis()).unwrap_or(u64::MAX),
                    classification = "transient",
                    error = %error,
                    "retrying external call"
                );
                tokio::time::sleep(sleep).await;
            }
        }
    }

    unreachable!("retry loop returns on the final attempt")
}

/// Uniform sample in `[0, ceiling]`.
fn jittered(ceiling: Duration) -> Duration {
    let max_ms = u64::try_from(ceiling.as_millis()).unwrap_or(u64::MAX);
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
}
