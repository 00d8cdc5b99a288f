use std::time::Duration;

use engine_logging::{engine_debug, engine_warn};
use harvester_core::WorkUnit;

use crate::{FailureKind, FetchError, Fetcher, Payload};

/// Suspension seam for backoff waits.
#[async_trait::async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait::async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("giving up on {unit} after {attempts} attempt(s): {last_error}")]
pub struct GivingUp {
    pub unit: WorkUnit,
    pub attempts: u32,
    pub last_error: FetchError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    pub payload: Payload,
    pub attempts: u32,
}

/// Bounded retries with exponential backoff: `min(2^attempt, cap)` seconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_cap: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_cap: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_cap: Duration) -> Self {
        Self {
            max_attempts,
            backoff_cap,
        }
    }

    /// Wait after the failed attempt `attempt_index` (0-based).
    pub fn backoff(&self, attempt_index: u32) -> Duration {
        let secs = 1u64.checked_shl(attempt_index).unwrap_or(u64::MAX);
        Duration::from_secs(secs).min(self.backoff_cap)
    }

    /// Like [`Self::backoff`], but a longer server `Retry-After` hint wins (still capped).
    pub fn delay_for(&self, attempt_index: u32, error: &FetchError) -> Duration {
        let backoff = self.backoff(attempt_index);
        match error.kind {
            FailureKind::ServerBusy {
                retry_after: Some(hint),
            } => hint.max(backoff).min(self.backoff_cap),
            _ => backoff,
        }
    }

    pub async fn execute(
        &self,
        unit: &WorkUnit,
        fetcher: &dyn Fetcher,
        sleeper: &dyn Sleeper,
    ) -> Result<Fetched, GivingUp> {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            match fetcher.fetch(unit).await {
                Ok(payload) => {
                    return Ok(Fetched {
                        payload,
                        attempts: attempt + 1,
                    })
                }
                Err(error) => {
                    let attempts = attempt + 1;
                    if !error.is_retryable() || attempts >= max_attempts {
                        engine_debug!("{unit}: stopping after attempt {attempts}: {error}");
                        return Err(GivingUp {
                            unit: unit.clone(),
                            attempts,
                            last_error: error,
                        });
                    }
                    let delay = self.delay_for(attempt, &error);
                    engine_warn!(
                        "{unit}: {error}; retry {attempts}/{} in {}s",
                        max_attempts - 1,
                        delay.as_secs_f32()
                    );
                    sleeper.sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
