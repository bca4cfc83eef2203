//! Bounded polling.
//!
//! [`poll`] keeps invoking an attempt at a fixed interval until it yields a value
//! or the budget runs out. The sleep between attempts is a tokio timer, so the
//! gateway keeps handling protocol traffic while a wait is in progress.

use crate::core::config::Config;
use crate::errors::{PilotError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub interval: Duration,
    /// Zero means a single attempt.
    pub timeout: Duration,
}

impl RetryPolicy {
    pub fn new(interval_ms: u64, timeout_ms: u64) -> Self {
        Self {
            interval: Duration::from_millis(interval_ms.max(1)),
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    pub fn once() -> Self {
        Self::new(1, 0)
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            interval: config.retry_interval().max(Duration::from_millis(1)),
            timeout: config.retry_timeout(),
        }
    }

    pub fn is_single_attempt(&self) -> bool {
        self.timeout.is_zero()
    }
}

/// Runs `attempt` until it returns `Some`. Errors that abort retries are raised
/// at once; any other error is kept and raised instead of the generic timeout
/// if the budget runs out.
pub async fn poll<T, F, Fut>(policy: RetryPolicy, message: &str, mut attempt: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    if policy.is_single_attempt() {
        return match attempt().await? {
            Some(value) => Ok(value),
            None => Err(PilotError::Timeout {
                message: message.to_string(),
                timeout_ms: 0,
            }),
        };
    }

    let started = Instant::now();
    let mut actual_error: Option<PilotError> = None;
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        match attempt().await {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => {}
            Err(err) if err.aborts_retry() => return Err(err),
            Err(err) => {
                debug!("attempt {} for '{}' failed: {}", attempts, message, err);
                actual_error = Some(err);
            }
        }

        if started.elapsed() >= policy.timeout {
            debug!("gave up on '{}' after {} attempts", message, attempts);
            return Err(actual_error.unwrap_or_else(|| PilotError::Timeout {
                message: message.to_string(),
                timeout_ms: policy.timeout.as_millis() as u64,
            }));
        }
        tokio::time::sleep(policy.interval).await;
    }
}

/// Waits for `condition` to hold.
pub async fn wait_until<F, Fut>(policy: RetryPolicy, message: &str, mut condition: F) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    poll(policy, message, || {
        let attempt = condition();
        async move { Ok(attempt.await?.then_some(())) }
    })
    .await
}
