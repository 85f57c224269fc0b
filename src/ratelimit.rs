//! Fixed-interval gate between analyzer requests.
//!
//! A request may start only once `min_interval` has passed since the
//! previous request finished. The first request never waits. There is no
//! jitter and no adaptive backoff; retry delays inside the client are in
//! addition to this floor.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{PipelineError, Result};

pub struct RateLimiter {
    min_interval: Duration,
    last_release: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_release: Mutex::new(None),
        }
    }

    /// Time a call to [`acquire`](Self::acquire) made now would wait.
    pub async fn pending_delay(&self) -> Duration {
        match *self.last_release.lock().await {
            Some(last) => (last + self.min_interval).saturating_duration_since(Instant::now()),
            None => Duration::ZERO,
        }
    }

    /// Wait for the gate to open. Returns the time spent waiting.
    ///
    /// Fails with [`PipelineError::Cancelled`] if `cancel` fires first.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<Duration> {
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        let last_release = *self.last_release.lock().await;
        let Some(last) = last_release else {
            return Ok(Duration::ZERO);
        };

        let deadline = last + self.min_interval;
        let started = Instant::now();
        tokio::select! {
            _ = cancel.cancelled() => Err(PipelineError::Cancelled),
            _ = tokio::time::sleep_until(deadline) => Ok(started.elapsed()),
        }
    }

    /// Mark the end of a request; the next one waits from here.
    pub async fn release(&self) {
        *self.last_release.lock().await = Some(Instant::now());
    }
}
