//! Per-caller request rate limiting
//!
//! A fixed-window counter per caller identity. Each caller gets `limit`
//! requests per window; the window starts at the caller's first request and
//! the counter resets once it has elapsed.

mod middleware;

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

pub use middleware::{RateLimitState, rate_limit_middleware};

/// Outcome of a rate limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    /// Over the limit until the current window ends
    Limited { retry_after: Duration },
}

#[derive(Debug)]
struct Window {
    started: Instant,
    count: u32,
}

/// Fixed-window rate limiter keyed by caller identity
#[derive(Debug)]
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    windows: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Count one request from `identity` and decide whether it may proceed
    pub fn check(&self, identity: &str) -> Decision {
        let now = Instant::now();
        let mut windows = self.windows.lock();

        // Finished windows carry no information
        windows.retain(|_, w| now.duration_since(w.started) < self.window);

        let entry = windows.entry(identity.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });

        if entry.count >= self.limit {
            let elapsed = now.duration_since(entry.started);
            return Decision::Limited {
                retry_after: self.window.saturating_sub(elapsed),
            };
        }

        entry.count += 1;
        Decision::Allowed
    }
}
