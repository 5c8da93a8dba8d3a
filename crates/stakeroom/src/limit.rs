//! Per-connection request limits.

use std::time::Duration;

use tokio::time::Instant;

/// At most `max` requests per `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub max: u32,
    pub window: Duration,
}

impl RateLimit {
    pub fn new(max: u32, window: Duration) -> Self {
        Self { max, window }
    }
}

impl Default for RateLimit {
    /// Ten session operations a minute.
    fn default() -> Self {
        Self::new(10, Duration::from_secs(60))
    }
}

/// Fixed-window counter for one connection.
#[derive(Debug)]
pub(crate) struct RequestWindow {
    limit: RateLimit,
    started: Instant,
    count: u32,
}

impl RequestWindow {
    pub(crate) fn new(limit: RateLimit) -> Self {
        Self {
            limit,
            started: Instant::now(),
            count: 0,
        }
    }

    /// Counts one request at `now`. Returns `false` once the window is full.
    pub(crate) fn admit(&mut self, now: Instant) -> bool {
        if now.duration_since(self.started) >= self.limit.window {
            self.started = now;
            self.count = 0;
        }
        if self.count >= self.limit.max {
            return false;
        }
        self.count += 1;
        true
    }
}
