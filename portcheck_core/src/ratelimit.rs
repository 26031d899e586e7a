//! Per-source rate limiting and request serialization
//!
//! Each external source gets one [`RateLimiter`], constructed at startup
//! and injected into that source's adapter. Concurrent callers queue on
//! the limiter's mutex and are released FIFO, paced at least
//! `min_interval` apart. Rate-limit responses are retried in-flight with
//! exponential backoff; every other failure is returned immediately so
//! the caller can decide fallback policy.

use crate::error::SourceError;
use log::{debug, warn};
use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

/// Pacing and retry parameters for one source.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Minimum interval between successive requests to this source.
    pub min_interval: Duration,
    /// First backoff delay after a rate-limit response; doubles per retry.
    pub initial_backoff: Duration,
    /// Retry attempts after the initial request.
    pub max_retries: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_millis(250),
            initial_backoff: Duration::from_millis(500),
            max_retries: 3,
        }
    }
}

/// Serializes and paces requests to one external source.
pub struct RateLimiter {
    /// When the previous request was dispatched. Held across the pacing
    /// sleep so queued callers are released in FIFO order (tokio mutex
    /// fairness supplies the ordering).
    last_dispatch: Mutex<Option<Instant>>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            last_dispatch: Mutex::new(None),
            config,
        }
    }

    /// Runs `request` under the pacing and retry policy.
    ///
    /// Rate-limit failures are retried up to `max_retries` times with
    /// doubling backoff; after exhaustion the rate-limit error surfaces
    /// to the caller. All other errors return immediately.
    pub async fn schedule<T, F, Fut>(&self, request: F) -> Result<T, SourceError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, SourceError>>,
    {
        let mut backoff = self.config.initial_backoff;
        let mut attempt: u32 = 0;
        loop {
            self.wait_turn().await;
            match request().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_rate_limit() && attempt < self.config.max_retries => {
                    attempt += 1;
                    debug!(
                        "rate limited, retry {attempt}/{} after {backoff:?}",
                        self.config.max_retries
                    );
                    sleep(backoff).await;
                    backoff *= 2;
                }
                Err(err) => {
                    if err.is_rate_limit() {
                        warn!("rate limit retries exhausted after {attempt} attempts");
                    }
                    return Err(err);
                }
            }
        }
    }

    /// Waits until this source may be queried again, then claims the slot.
    async fn wait_turn(&self) {
        let mut last = self.last_dispatch.lock().await;
        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.config.min_interval {
                sleep(self.config.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}
