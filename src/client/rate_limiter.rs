//! Per-API request throttling.
//!
//! Each API identity gets its own window: a bounded FIFO holding the
//! start times of the last `limit` requests. When the window is full,
//! `acquire` sleeps until one second has elapsed since the oldest entry,
//! then records the new request. A limit of 0 disables throttling for
//! that API. Windows are never shared across APIs.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::debug;

/// Sliding-window rate limiter keyed by API name.
#[derive(Debug)]
pub struct RateLimiter {
    limits: HashMap<String, u32>,
    // Held across the throttle sleep so concurrent acquires for the same
    // client serialize exactly like the sequential flow they model.
    windows: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    /// Create a limiter from a name → requests-per-second map.
    pub fn new(limits: HashMap<String, u32>) -> Self {
        for (api, limit) in &limits {
            debug!("Throttle for '{}': {} requests/second", api, limit);
        }
        Self {
            limits,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Requests-per-second limit for one API (0 = unthrottled).
    pub fn limit_for(&self, api: &str) -> u32 {
        self.limits.get(api).copied().unwrap_or(0)
    }

    /// Block until the window permits another request to `api`, then
    /// record the request start time.
    pub async fn acquire(&self, api: &str) {
        let limit = self.limit_for(api);
        if limit == 0 {
            return;
        }

        let mut windows = self.windows.lock().await;
        let window = windows.entry(api.to_string()).or_default();

        if window.len() >= limit as usize {
            let oldest = window[0];
            if let Some(wait) = Duration::from_secs(1).checked_sub(oldest.elapsed()) {
                if !wait.is_zero() {
                    debug!("Throttling '{}' for {}ms", api, wait.as_millis());
                    sleep(wait).await;
                }
            }
        }

        window.push_back(Instant::now());
        while window.len() > limit as usize {
            window.pop_front();
        }
    }
}
