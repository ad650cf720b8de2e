use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

use crate::{Error, Result};

/// Fixed-interval, bounded polling schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl PollPolicy {
    pub const fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    pub const fn from_secs(secs: u64, max_attempts: u32) -> Self {
        Self::new(Duration::from_secs(secs), max_attempts)
    }

    /// Applies per-provider configuration overrides. A zero attempt count is
    /// ignored so a job is always polled at least once.
    pub fn with_overrides(self, interval_secs: Option<u64>, max_attempts: Option<u32>) -> Self {
        Self {
            interval: interval_secs.map(Duration::from_secs).unwrap_or(self.interval),
            max_attempts: max_attempts.filter(|n| *n > 0).unwrap_or(self.max_attempts),
        }
    }
}

/// Outcome of one status check.
#[derive(Debug)]
pub enum PollStatus<T> {
    /// Still processing; keep polling.
    Pending,
    Done(T),
    /// Terminal failure stated by the vendor.
    Failed(Error),
}

/// Suspends between polls. Tests swap in a recording clock.
#[async_trait]
pub trait Sleeper: Send + Sync + std::fmt::Debug {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Polls `check` until it reports a terminal state or attempts run out.
///
/// Each attempt first waits `policy.interval`, then calls `check` with the
/// 1-based attempt number. Errors returned by `check` end the loop at once.
/// Running out of attempts yields [`Error::Timeout`], never a vendor failure.
pub async fn poll_until<T, F, Fut>(policy: &PollPolicy, sleeper: &dyn Sleeper, mut check: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<PollStatus<T>>>,
{
    for attempt in 1..=policy.max_attempts {
        sleeper.sleep(policy.interval).await;
        match check(attempt).await? {
            PollStatus::Pending => {
                tracing::debug!(attempt, max_attempts = policy.max_attempts, "job still processing");
            }
            PollStatus::Done(value) => {
                tracing::debug!(attempt, "job finished");
                return Ok(value);
            }
            PollStatus::Failed(err) => return Err(err),
        }
    }
    Err(Error::Timeout {
        attempts: policy.max_attempts,
    })
}
