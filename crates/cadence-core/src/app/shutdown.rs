//! Shutdown - 停止待ちのポーリング
//!
//! `ready_to_stop` が Ok になるまで一定間隔で問い合わせ、
//! 上限回数に達したら諦めて最後の理由を返します。

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::SchedulerError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownPolicy {
    pub retry_interval: Duration,
    pub max_attempts: u32,
    /// Polls after which each further "not ready" is logged at warn level.
    pub warn_after: u32,
}

impl Default for ShutdownPolicy {
    fn default() -> Self {
        Self {
            retry_interval: Duration::from_millis(500),
            max_attempts: 20,
            warn_after: 5,
        }
    }
}

/// Poll `check` until it succeeds or `policy.max_attempts` is exhausted.
pub async fn wait_until_ready<F>(policy: &ShutdownPolicy, mut check: F) -> Result<(), SchedulerError>
where
    F: FnMut() -> Result<(), SchedulerError>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        let err = match check() {
            Ok(()) => {
                debug!(attempt, "ready to stop");
                return Ok(());
            }
            Err(err) => err,
        };

        if attempt >= max_attempts {
            warn!(attempts = attempt, error = %err, "gave up waiting for in-flight work");
            return Err(err);
        }
        if attempt >= policy.warn_after {
            warn!(attempt, error = %err, "still waiting to stop");
        } else {
            info!(attempt, error = %err, "waiting to stop");
        }
        tokio::time::sleep(policy.retry_interval).await;
    }
}
