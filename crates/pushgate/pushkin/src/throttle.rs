//! Outbound request throttle.
//!
//! The HTTP client's connection pool does not limit concurrency: under load it
//! opens more connections instead of queueing. Each pushkin owns one throttle
//! shared by every request it serves.

use color_eyre::eyre::WrapErr as _;
use tokio::sync::{Semaphore, SemaphorePermit};

/// Default number of concurrent outbound calls per pushkin.
pub const DEFAULT_MAX_CONNECTIONS: usize = 20;

/// Counting gate bounding concurrent outbound calls.
///
/// Waiters are admitted in FIFO order.
#[derive(Debug)]
pub struct OutboundThrottle {
    semaphore: Semaphore,
    max_permits: usize,
}

/// Admission to make one outbound call. Released on drop.
#[derive(Debug)]
pub struct OutboundPermit<'a> {
    _permit: SemaphorePermit<'a>,
}

impl OutboundThrottle {
    /// Create a throttle admitting at most `max_permits` holders (minimum 1).
    pub fn new(max_permits: usize) -> Self {
        let max_permits = max_permits.max(1);
        Self {
            semaphore: Semaphore::new(max_permits),
            max_permits,
        }
    }

    /// Wait until a permit is available.
    pub async fn acquire(&self) -> color_eyre::eyre::Result<OutboundPermit<'_>> {
        let permit = self
            .semaphore
            .acquire()
            .await
            .wrap_err("outbound throttle closed")?;

        Ok(OutboundPermit { _permit: permit })
    }

    /// Run `fut` while holding a permit.
    pub async fn run<F: Future>(&self, fut: F) -> color_eyre::eyre::Result<F::Output> {
        let _permit = self.acquire().await?;
        Ok(fut.await)
    }

    pub fn max_permits(&self) -> usize {
        self.max_permits
    }

    /// Number of permits currently held.
    pub fn in_flight(&self) -> usize {
        self.max_permits - self.semaphore.available_permits()
    }
}

impl Default for OutboundThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONNECTIONS)
    }
}
