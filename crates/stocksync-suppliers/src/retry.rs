//! Retry with exponential back-off and jitter for supplier fetches.
//!
//! Only [`FetchError::TransientNetwork`] is retried. With `max_retries = 0`
//! (the default) a transient failure is returned immediately and the product
//! is picked up again on the next scheduled run.

use std::future::Future;
use std::time::Duration;

use crate::error::FetchError;

const MAX_DELAY_MS: u64 = 60_000;

/// Runs `operation` with up to `max_retries` additional attempts on transient
/// errors. The n-th retry sleeps `backoff_base_ms * 2^(n-1)` ± 25 % jitter,
/// capped at 60 s.
///
/// # Errors
///
/// Returns the last error once retries are exhausted, or the first
/// non-retriable error.
pub async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !err.is_retriable() || attempt >= max_retries {
                    return Err(err);
                }
                attempt += 1;
                let delay_ms = backoff_delay_ms(backoff_base_ms, attempt);
                tracing::warn!(
                    attempt,
                    max_retries,
                    delay_ms,
                    error = %err,
                    "supplier transient error, retrying after back-off"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}

fn backoff_delay_ms(backoff_base_ms: u64, attempt: u32) -> u64 {
    let computed = backoff_base_ms.saturating_mul(1u64 << attempt.saturating_sub(1).min(10));
    let capped = computed.min(MAX_DELAY_MS);
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let jittered = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
    jittered
}
