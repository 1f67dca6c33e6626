//! Retry with exponential backoff for any fallible async call.

use std::future::Future;
use std::time::Duration;

use tokio_retry::RetryIf;
use tokio_retry::strategy::{ExponentialBackoff, jitter};

/// How many times to retry and how long to wait between attempts.
///
/// Attempt `n` (1-based) waits `base_delay × 2^(n-1)`, optionally jittered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_retries: usize,
    pub jitter: bool,
}

impl RetryPolicy {
    /// Policy for the language model: 1s, 2s, 4s.
    #[must_use]
    pub const fn llm() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_retries: 3,
            jitter: false,
        }
    }

    /// Policy for chat and work-management HTTP calls.
    #[must_use]
    pub const fn http() -> Self {
        Self {
            base_delay: Duration::from_millis(100),
            max_retries: 4,
            jitter: true,
        }
    }

    #[must_use]
    pub const fn immediate(max_retries: usize) -> Self {
        Self {
            base_delay: Duration::from_millis(1),
            max_retries,
            jitter: false,
        }
    }

    /// Delays between attempts, in order.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + use<> {
        let factor = u64::try_from(self.base_delay.as_millis())
            .unwrap_or(u64::MAX)
            .max(1);
        let with_jitter = self.jitter;
        // from_millis(2) yields 2, 4, 8 ... times the factor
        ExponentialBackoff::from_millis(2)
            .factor(factor.div_ceil(2))
            .take(self.max_retries)
            .map(move |d| if with_jitter { jitter(d) } else { d })
    }
}

/// Runs `operation` until it succeeds, fails with an error that
/// `is_retryable` rejects, or the policy's retries are used up.
///
/// # Errors
///
/// Returns the last error produced by `operation`.
pub async fn retry_with_backoff<T, E, F, Fut, C>(
    policy: RetryPolicy,
    operation: F,
    is_retryable: C,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: FnMut(&E) -> bool,
{
    RetryIf::spawn(policy.delays(), operation, is_retryable).await
}
