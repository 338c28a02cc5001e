//! Bounded exponential backoff for adapter calls.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::config::RetryConfig;
use crate::error::AdapterFailure;

/// Runs `op` up to `config.max_attempts` times, sleeping with exponential
/// backoff and jitter between attempts. Only retryable failures (transient,
/// rate-limited) are retried; an invalid request fails immediately.
///
/// When a rate-limited failure carries a `retry_after` hint, that hint is
/// honored instead of the computed backoff (still capped at `max_delay`).
pub async fn with_backoff<T, F, Fut>(
    config: &RetryConfig,
    op_name: &str,
    mut op: F,
) -> Result<T, AdapterFailure>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AdapterFailure>>,
{
    let attempts = config.max_attempts.max(1);
    let mut last_failure = None;

    for attempt in 1..=attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(failure) => {
                if !failure.is_retryable() || attempt == attempts {
                    tracing::warn!(
                        op = op_name,
                        attempt,
                        error = %failure,
                        "Adapter call failed, not retrying"
                    );
                    return Err(failure);
                }
                let delay = delay_for(config, attempt, &failure);
                tracing::debug!(
                    op = op_name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %failure,
                    "Adapter call failed, retrying"
                );
                last_failure = Some(failure);
                tokio::time::sleep(delay).await;
            }
        }
    }

    // Unreachable: the loop always returns on the final attempt.
    Err(last_failure.unwrap_or(AdapterFailure::Transient {
        service: op_name.to_string(),
        reason: "retry budget exhausted".to_string(),
    }))
}

fn delay_for(config: &RetryConfig, attempt: u32, failure: &AdapterFailure) -> Duration {
    if let AdapterFailure::RateLimited {
        retry_after: Some(hint),
        ..
    } = failure
    {
        return (*hint).min(config.max_delay);
    }
    let exp = config
        .base_delay
        .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
        .min(config.max_delay);
    // Full jitter keeps concurrent jobs from retrying in lockstep.
    let jittered = rand::thread_rng().gen_range(0..=exp.as_millis() as u64);
    Duration::from_millis(jittered.max(1))
}
