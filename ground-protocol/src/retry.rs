//! Single backoff helper reused by every reconnecting worker loop (broker
//! connects, DB pool acquisition, SMTP sends) instead of one bespoke retry
//! loop per call site.
use std::future::Future;
use std::time::Duration;

use rand::Rng;

/// Retry `operation` up to `max_attempts` times with exponential backoff
/// (`base_delay * 2^attempt`, plus up to 20% jitter). Returns the first
/// success, or the last error once attempts are exhausted.
pub async fn with_backoff<T, E, F, Fut>(
    operation_name: &str,
    max_attempts: u32,
    base_delay: Duration,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= max_attempts {
                    tracing::error!(operation = operation_name, attempt, %err, "giving up after final retry");
                    return Err(err);
                }
                let backoff = base_delay * 2u32.saturating_pow(attempt - 1);
                let jitter_frac: f64 = rand::rng().random_range(0.0..0.2);
                let jittered = backoff.mul_f64(1.0 + jitter_frac);
                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    delay_ms = jittered.as_millis() as u64,
                    %err,
                    "retrying after failure"
                );
                tokio::time::sleep(jittered).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_without_retry_when_first_attempt_works() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = with_backoff("noop", 3, Duration::from_millis(1), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(42) }
        })
        .await;
        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausts_attempts_and_returns_last_error() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = with_backoff("always_fails", 3, Duration::from_millis(1), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("boom") }
        })
        .await;
        assert_eq!(result, Err("boom"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
