//! Polling with exponential backoff and cooperative cancellation.
//!
//! The readiness waits in this workspace are the only places that suspend.
//! They all go through [`poll_with_backoff`], which sleeps only between
//! checks and wakes immediately when the caller's [`CancellationToken`]
//! fires.
//!
//! # Example
//!
//! ```ignore
//! use vcluster_common::retry::{poll_with_backoff, RetryConfig};
//!
//! poll_with_backoff(&RetryConfig::crd_established(), "wait for crd", &cancel, || async {
//!     Ok(is_established(&store.get(name).await?))
//! })
//! .await?;
//! ```

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

use crate::Error;

/// Backoff configuration for polling loops.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of checks (0 = infinite)
    pub max_attempts: u32,
    /// Delay after the first unsuccessful check
    pub initial_delay: Duration,
    /// Maximum delay between checks
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 0,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Create a config with a maximum number of attempts
    pub fn with_max_attempts(attempts: u32) -> Self {
        Self {
            max_attempts: attempts,
            ..Default::default()
        }
    }

    /// Backoff used while waiting for a mirrored CRD to become Established:
    /// 1s, growing by 1.5x, capped at one minute, never giving up.
    pub fn crd_established() -> Self {
        Self {
            max_attempts: 0,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 1.5,
        }
    }

    /// Delay that follows `delay` under this config.
    pub fn next_delay(&self, delay: Duration) -> Duration {
        Duration::from_secs_f64(
            (delay.as_secs_f64() * self.backoff_multiplier).min(self.max_delay.as_secs_f64()),
        )
    }
}

/// Poll `check` until it reports `Ok(true)`.
///
/// - `Ok(false)` sleeps for the current backoff delay and checks again.
/// - A retryable `Err` is logged and treated like `Ok(false)`.
/// - A permanent `Err` is returned immediately.
/// - Cancellation is observed before every check and during every sleep
///   and yields [`Error::Cancelled`].
///
/// When `max_attempts` is exhausted the last error (or an internal
/// "condition not met" error) is returned.
pub async fn poll_with_backoff<F, Fut>(
    config: &RetryConfig,
    operation_name: &str,
    cancel: &CancellationToken,
    mut check: F,
) -> Result<(), Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, Error>>,
{
    let mut attempt = 0u32;
    let mut delay = config.initial_delay;

    loop {
        if cancel.is_cancelled() {
            return Err(Error::cancelled(operation_name));
        }
        attempt += 1;

        let last_error = match check().await {
            Ok(true) => return Ok(()),
            Ok(false) => {
                trace!(operation = %operation_name, attempt, "condition not yet met");
                None
            }
            Err(e) if e.is_retryable() => {
                warn!(
                    operation = %operation_name,
                    attempt,
                    error = %e,
                    delay_ms = delay.as_millis(),
                    "check failed, retrying"
                );
                Some(e)
            }
            Err(e) => return Err(e),
        };

        if config.max_attempts > 0 && attempt >= config.max_attempts {
            return Err(last_error.unwrap_or_else(|| {
                Error::internal_with_context(
                    operation_name,
                    format!("condition not met after {} attempts", attempt),
                )
            }));
        }

        tokio::select! {
            _ = cancel.cancelled() => return Err(Error::cancelled(operation_name)),
            _ = tokio::time::sleep(delay) => {}
        }

        delay = config.next_delay(delay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
            backoff_multiplier: 2.0,
        }
    }

    #[test]
    fn crd_established_backoff_grows_and_caps() {
        let config = RetryConfig::crd_established();
        let mut delay = config.initial_delay;
        let mut seen = vec![delay];
        for _ in 0..12 {
            delay = config.next_delay(delay);
            seen.push(delay);
        }
        assert_eq!(seen[0], Duration::from_secs(1));
        assert_eq!(seen[1], Duration::from_millis(1500));
        assert_eq!(seen[2], Duration::from_millis(2250));
        assert_eq!(*seen.last().unwrap(), Duration::from_secs(60));
        assert!(seen.iter().all(|d| *d <= Duration::from_secs(60)));
    }

    #[tokio::test]
    async fn test_succeeds_immediately() {
        let cancel = CancellationToken::new();
        let result = poll_with_backoff(&fast_config(3), "op", &cancel, || async { Ok(true) }).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_succeeds_after_unready_and_transient_failures() {
        let count = Arc::new(AtomicU32::new(0));
        let c = count.clone();
        let cancel = CancellationToken::new();

        let result = poll_with_backoff(&fast_config(5), "op", &cancel, || {
            let c = c.clone();
            async move {
                match c.fetch_add(1, Ordering::SeqCst) {
                    0 => Ok(false),
                    1 => Err(Error::internal("connection reset")),
                    _ => Ok(true),
                }
            }
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_aborts() {
        let count = Arc::new(AtomicU32::new(0));
        let c = count.clone();
        let cancel = CancellationToken::new();

        let result = poll_with_backoff(&fast_config(0), "op", &cancel, || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err(Error::config("bad"))
            }
        })
        .await;

        assert!(matches!(result, Err(Error::Config { .. })));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhausts_max_attempts() {
        let count = Arc::new(AtomicU32::new(0));
        let c = count.clone();
        let cancel = CancellationToken::new();

        let result = poll_with_backoff(&fast_config(3), "op", &cancel, || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(false)
            }
        })
        .await;

        assert!(matches!(result, Err(Error::Internal { .. })));
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_interrupts_sleep() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            trigger.cancel();
        });

        let result = poll_with_backoff(
            &RetryConfig::crd_established(),
            "wait",
            &cancel,
            || async { Ok(false) },
        )
        .await;

        assert!(matches!(result, Err(Error::Cancelled { .. })));
    }

    #[tokio::test]
    async fn test_already_cancelled_never_checks() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let count = Arc::new(AtomicU32::new(0));
        let c = count.clone();

        let result = poll_with_backoff(&fast_config(0), "op", &cancel, || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(true)
            }
        })
        .await;

        assert!(matches!(result, Err(Error::Cancelled { .. })));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
