use std::time::Duration;

use rand::Rng;

use tablestore_core::storage::{Cancellation, StoreConfig};

/// Exponential backoff for re-sending unprocessed batch entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &StoreConfig) -> Self {
        Self {
            max_retries: config.batch_retry_attempts,
            base_delay: config.batch_retry_base_delay,
        }
    }

    /// Delay before `attempt`.
    ///
    /// Attempt 0 is the first request and is not delayed. Retry `n` waits
    /// `base * 2^(n-1)`, with up to half of it replaced by random jitter.
    pub fn delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let full = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt - 1));
        let half = full / 2;
        let half_nanos = u64::try_from(half.as_nanos()).unwrap_or(u64::MAX);
        let jitter = Duration::from_nanos(rand::rng().random_range(0..=half_nanos));

        full - half + jitter
    }

    /// Sleeps before `attempt`. Returns `false` if cancelled while waiting.
    pub async fn wait(&self, attempt: u32, cancellation: &Cancellation) -> bool {
        let delay = self.delay(attempt);
        tokio::select! {
            biased;
            _ = cancellation.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
        }
    }

    #[test]
    fn test_first_attempt_has_no_delay() {
        assert_eq!(policy().delay(0), Duration::ZERO);
    }

    #[test]
    fn test_delay_grows_exponentially_within_jitter_bounds() {
        let policy = policy();
        for (attempt, full_ms) in [(1, 100), (2, 200), (3, 400)] {
            let full = Duration::from_millis(full_ms);
            for _ in 0..50 {
                let delay = policy.delay(attempt);
                assert!(delay >= full / 2, "attempt {attempt}: {delay:?}");
                assert!(delay <= full, "attempt {attempt}: {delay:?}");
            }
        }
    }

    #[test]
    fn test_delay_saturates() {
        let delay = policy().delay(u32::MAX);
        assert!(delay > Duration::from_secs(1));
    }

    #[test]
    fn test_from_config() {
        let config = StoreConfig::default().with_batch_retry(7, Duration::from_millis(5));
        let policy = RetryPolicy::from_config(&config);
        assert_eq!(policy.max_retries, 7);
        assert_eq!(policy.base_delay, Duration::from_millis(5));
    }

    #[tokio::test]
    async fn test_wait_stops_on_cancellation() {
        let (handle, cancellation) = Cancellation::channel();
        handle.cancel();
        let slow = RetryPolicy {
            max_retries: 1,
            base_delay: Duration::from_secs(60),
        };
        assert!(!slow.wait(1, &cancellation).await);
    }

    #[tokio::test]
    async fn test_wait_completes() {
        let fast = RetryPolicy {
            max_retries: 1,
            base_delay: Duration::from_millis(1),
        };
        assert!(fast.wait(1, &Cancellation::never()).await);
    }
}
