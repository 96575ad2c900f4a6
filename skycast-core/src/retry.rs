use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::error::WeatherError;

/// Backoff schedule for one class of external call.
///
/// Delay before retry `n` is `base_delay * growth^n`, capped at `max_delay`
/// when set, plus up to `jitter` of random noise.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub growth: f64,
    pub max_delay: Option<Duration>,
    pub jitter: Duration,
}

impl RetryPolicy {
    /// Conversational and analysis paths: 2 retries, 3 s doubling.
    pub fn bounded() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(3000),
            growth: 2.0,
            max_delay: None,
            jitter: Duration::ZERO,
        }
    }

    /// Weather-fetch path: 15 retries, min(30 s, 2 s * 1.5^n) + 0-1 s jitter.
    pub fn extended() -> Self {
        Self {
            max_retries: 15,
            base_delay: Duration::from_millis(2000),
            growth: 1.5,
            max_delay: Some(Duration::from_millis(30_000)),
            jitter: Duration::from_millis(1000),
        }
    }

    /// Delay before the retry with index `attempt` (0-based), without jitter.
    fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let ms = self.base_delay.as_millis() as f64 * self.growth.powi(attempt as i32);
        let ms = match self.max_delay {
            Some(cap) => ms.min(cap.as_millis() as f64),
            None => ms,
        };
        Duration::from_millis(ms as u64)
    }

    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let mut delay = self.backoff_for_attempt(attempt);
        let jitter_ms = self.jitter.as_millis() as u64;
        if jitter_ms > 0 {
            delay += Duration::from_millis(rand::thread_rng().gen_range(0..jitter_ms));
        }
        delay
    }
}

/// Run `op`, retrying transient failures per `policy`.
///
/// Budget exhaustion re-raises the last error unchanged, so the caller still
/// sees its classification. Non-transient errors propagate immediately.
pub async fn call_with_resilience<T, F, Fut>(
    policy: &RetryPolicy,
    op: F,
) -> Result<T, WeatherError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, WeatherError>>,
{
    let mut attempt = 0u32;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < policy.max_retries => {
                let delay = policy.delay_for_attempt(attempt);
                warn!(
                    attempt = attempt + 1,
                    max = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    %err,
                    "transient model failure, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
