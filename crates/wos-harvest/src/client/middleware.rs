//! Request pacing shared by every page fetch of a client.
//!
//! Concurrent page fetches across organizations all draw from one
//! `governor` quota, so fan-out never exceeds the configured request rate.

use std::num::NonZeroU32;
use std::sync::Arc;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};

/// Client-wide request pacer.
#[derive(Clone)]
pub struct RequestPacer {
    limiter: Arc<DefaultDirectRateLimiter>,
    per_second: NonZeroU32,
}

impl RequestPacer {
    /// Allow `per_second` requests per second (at least one).
    #[must_use]
    pub fn per_second(per_second: u32) -> Self {
        let per_second = NonZeroU32::new(per_second).unwrap_or(NonZeroU32::MIN);
        Self { limiter: Arc::new(RateLimiter::direct(Quota::per_second(per_second))), per_second }
    }

    /// Wait until the next request may be sent.
    pub async fn ready(&self) {
        self.limiter.until_ready().await;
    }

    /// Configured rate.
    #[must_use]
    pub const fn rate(&self) -> u32 {
        self.per_second.get()
    }
}

impl std::fmt::Debug for RequestPacer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestPacer").field("per_second", &self.per_second).finish()
    }
}
