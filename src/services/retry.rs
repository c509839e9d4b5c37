//! Fixed-count, fixed-delay retry.
//!
//! Deliberately does not classify errors, apply jitter or back off
//! exponentially; the circuit breaker above it provides the macro-scale
//! protection.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::GatewayError;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total number of calls, including the first one. Clamped to >= 1.
    pub attempts: u32,
    /// Fixed delay between attempts.
    pub delay: Duration,
}

/// Invoke `operation` up to `policy.attempts` times, sleeping `policy.delay`
/// between attempts. Intermediate errors are logged; the last error is
/// surfaced unchanged.
pub async fn run<T, F, Fut>(
    policy: &RetryPolicy,
    provider: &str,
    mut operation: F,
) -> Result<T, GatewayError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, GatewayError>>,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= attempts {
                    return Err(err);
                }
                warn!(
                    "[provider: {provider}] attempt {attempt}/{attempts} failed: {err}"
                );
                tokio::time::sleep(policy.delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn policy(attempts: u32) -> RetryPolicy {
        RetryPolicy {
            attempts,
            delay: Duration::from_secs(1),
        }
    }

    fn upstream_error() -> GatewayError {
        GatewayError::UpstreamStatus {
            provider: "Stripe".to_string(),
            status: 500,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn returns_first_success_without_retrying() {
        let calls = Arc::new(AtomicUsize::new(0));
        let result = run(&policy(3), "Stripe", || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(42)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_success() {
        let calls = Arc::new(AtomicUsize::new(0));
        let result = run(&policy(3), "Stripe", || {
            let calls = calls.clone();
            async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(upstream_error())
                } else {
                    Ok("ok")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn permanently_failing_operation_is_called_exactly_attempts_times() {
        let calls = Arc::new(AtomicUsize::new(0));
        let result: Result<(), _> = run(&policy(3), "Stripe", || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(upstream_error())
            }
        })
        .await;

        assert!(matches!(
            result.unwrap_err(),
            GatewayError::UpstreamStatus { status: 500, .. }
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_attempts_still_calls_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let result: Result<(), _> = run(&policy(0), "Stripe", || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(upstream_error())
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
