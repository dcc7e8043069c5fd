//! Per-provider request throttling using governor and a Tokio semaphore.

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Limits how fast and how many requests reach one provider.
///
/// Cloning shares the underlying quota.
#[derive(Clone)]
pub struct ProviderThrottle {
    rpm_limiter: Option<Arc<DirectRateLimiter>>,
    concurrent: Option<Arc<Semaphore>>,
}

impl std::fmt::Debug for ProviderThrottle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderThrottle")
            .field("rpm_limited", &self.rpm_limiter.is_some())
            .field("concurrency_limited", &self.concurrent.is_some())
            .finish()
    }
}

impl ProviderThrottle {
    /// Creates a throttle. `None` or zero disables the respective limit.
    pub fn new(requests_per_minute: Option<u32>, max_concurrent: Option<u32>) -> Self {
        let rpm_limiter = requests_per_minute.and_then(|rpm| {
            NonZeroU32::new(rpm).map(|n| Arc::new(RateLimiter::direct(Quota::per_minute(n))))
        });

        let concurrent = max_concurrent
            .filter(|n| *n > 0)
            .map(|n| Arc::new(Semaphore::new(n as usize)));

        Self {
            rpm_limiter,
            concurrent,
        }
    }

    /// A throttle that never waits.
    pub fn unlimited() -> Self {
        Self::new(None, None)
    }

    /// Waits until a request may be sent.
    ///
    /// The returned guard holds the concurrency slot until dropped.
    pub async fn acquire(&self) -> ThrottleGuard {
        if let Some(limiter) = &self.rpm_limiter {
            limiter.until_ready().await;
        }

        let permit = match &self.concurrent {
            Some(semaphore) => semaphore.clone().acquire_owned().await.ok(),
            None => None,
        };

        ThrottleGuard { _permit: permit }
    }
}

impl Default for ProviderThrottle {
    fn default() -> Self {
        Self::unlimited()
    }
}

/// Holds a concurrency slot for the lifetime of one request.
#[derive(Debug)]
pub struct ThrottleGuard {
    _permit: Option<OwnedSemaphorePermit>,
}
