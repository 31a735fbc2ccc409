use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// How many times to retry and how long to wait in between
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub retries: u32,
    /// Growth factor applied per attempt
    pub factor: f64,
    /// Delay before the first retry
    pub min_timeout: Duration,
    /// Cap on any single delay
    pub max_timeout: Duration,
}

/// Outcome of a failed attempt
#[derive(Debug)]
pub enum Attempt<E> {
    /// The failure is transient; try again if the policy allows
    Retry(E),
    /// The failure is permanent
    Abort(E),
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 10,
            factor: 2.0,
            min_timeout: Duration::from_secs(1),
            max_timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// A policy that tries exactly once
    pub fn none() -> Self {
        Self {
            retries: 0,
            ..Self::default()
        }
    }

    /// Delay to wait after the `attempt`-th failure (zero-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let min = self.min_timeout.as_secs_f64();
        let scaled = min * self.factor.powi(attempt.min(i32::MAX as u32) as i32);
        let capped = scaled.min(self.max_timeout.as_secs_f64());
        if capped.is_finite() {
            Duration::from_secs_f64(capped.max(0.0))
        } else {
            self.max_timeout
        }
    }

    /// Total number of attempts, including the first
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }
}

/// Run `op` until it succeeds, aborts, or the policy is exhausted.
///
/// `op` receives the zero-based attempt number.
pub async fn retry<T, E, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, Attempt<E>>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        match op(attempt).await {
            Ok(value) => {
                if attempt > 0 {
                    debug!("Succeeded after {} retries", attempt);
                }
                return Ok(value);
            }
            Err(Attempt::Abort(err)) => return Err(err),
            Err(Attempt::Retry(err)) => {
                if attempt >= policy.retries {
                    warn!("Giving up after {} attempts: {}", attempt + 1, err);
                    return Err(err);
                }
                let delay = policy.delay_for(attempt);
                warn!(
                    "Attempt {}/{} failed: {}; retrying in {:?}",
                    attempt + 1,
                    policy.max_attempts(),
                    err,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
