use crate::llm::error::is_rate_limited;
use std::future::Future;
use std::time::Duration;

const DEFAULT_RETRIES: u32 = 3;
const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt (total runs = 1 + retries).
    pub retries: u32,
    pub initial_delay: Duration,
}

impl RetryPolicy {
    /// Wait before retry number `retry` (1-based); doubles every time.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let shift = retry.saturating_sub(1).min(16);
        self.initial_delay.saturating_mul(1 << shift)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: DEFAULT_RETRIES,
            initial_delay: DEFAULT_INITIAL_DELAY,
        }
    }
}

#[derive(Debug)]
pub enum RetryOutcome<T> {
    Done(T),
    /// Still rate limited after every retry.
    Exhausted(anyhow::Error),
    /// Failed for a reason other than rate limiting; not retried.
    Failed(anyhow::Error),
}

/// Runs `operation`, retrying with exponential backoff only while it fails with HTTP 429.
pub async fn retry_on_rate_limit<F, Fut, T>(policy: RetryPolicy, mut operation: F) -> RetryOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let mut retry: u32 = 0;
    loop {
        match operation().await {
            Ok(value) => return RetryOutcome::Done(value),
            Err(err) if !is_rate_limited(&err) => return RetryOutcome::Failed(err),
            Err(err) => {
                if retry >= policy.retries {
                    return RetryOutcome::Exhausted(err);
                }
                retry += 1;
                let backoff = policy.delay_for(retry);
                tracing::warn!(retry, ?backoff, error = %err, "LLM rate limited; backing off");
                tokio::time::sleep(backoff).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::error::LlmDiagnosticsError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn rate_limited() -> anyhow::Error {
        LlmDiagnosticsError {
            model: "m".to_string(),
            stage: "http",
            status: Some(429),
            detail: "status=429".to_string(),
            raw_output: None,
            raw_response_json: None,
        }
        .into()
    }

    #[test]
    fn delays_double_from_initial() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_rate_limit() {
        let calls = AtomicU32::new(0);
        let outcome = retry_on_rate_limit(RetryPolicy::default(), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(rate_limited())
                } else {
                    Ok("done")
                }
            }
        })
        .await;

        assert!(matches!(outcome, RetryOutcome::Done("done")));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_policy_retries() {
        let calls = AtomicU32::new(0);
        let outcome: RetryOutcome<()> = retry_on_rate_limit(RetryPolicy::default(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(rate_limited()) }
        })
        .await;

        assert!(matches!(outcome, RetryOutcome::Exhausted(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn other_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let outcome: RetryOutcome<()> = retry_on_rate_limit(RetryPolicy::default(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(anyhow::anyhow!("connection reset")) }
        })
        .await;

        assert!(matches!(outcome, RetryOutcome::Failed(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
