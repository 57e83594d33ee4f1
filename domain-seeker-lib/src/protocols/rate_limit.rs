//! Per-route request spacing.
//!
//! Each route key remembers when its last physical request finished. A new
//! request to the same key waits until the configured interval has passed.
//! The timestamp is written by a guard on drop, so it is recorded once per
//! attempt whatever way the attempt ends.

use crate::types::RouteKey;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct RateLimitState {
    last_probe: HashMap<RouteKey, Instant>,
    default_interval: Duration,
    overrides: HashMap<RouteKey, Duration>,
}

impl RateLimitState {
    pub fn new(default_interval: Duration) -> Self {
        Self {
            last_probe: HashMap::new(),
            default_interval,
            overrides: HashMap::new(),
        }
    }

    pub fn with_overrides(mut self, overrides: HashMap<RouteKey, Duration>) -> Self {
        self.overrides = overrides;
        self
    }

    /// Minimum spacing for `key`.
    pub fn interval_for(&self, key: &RouteKey) -> Duration {
        self.overrides
            .get(key)
            .copied()
            .unwrap_or(self.default_interval)
    }

    /// When the last request to `key` finished.
    pub fn last_probe(&self, key: &RouteKey) -> Option<Instant> {
        self.last_probe.get(key).copied()
    }

    /// How long a request to `key` issued at `now` would have to wait.
    pub fn remaining(&self, key: &RouteKey, now: Instant) -> Duration {
        match self.last_probe.get(key) {
            Some(last) => (*last + self.interval_for(key)).saturating_duration_since(now),
            None => Duration::ZERO,
        }
    }

    /// Wait out the interval for `key` and hand back a guard for the attempt.
    ///
    /// Keep the guard alive for the duration of the request.
    pub async fn acquire(&mut self, key: RouteKey) -> ProbeGuard<'_> {
        let wait = self.remaining(&key, Instant::now());
        if !wait.is_zero() {
            debug!(route = %key, wait_ms = wait.as_millis() as u64, "Waiting before next request");
            tokio::time::sleep(wait).await;
        }

        ProbeGuard {
            state: self,
            key: Some(key),
        }
    }
}

/// Records the end of a request when dropped.
pub struct ProbeGuard<'a> {
    state: &'a mut RateLimitState,
    key: Option<RouteKey>,
}

impl Drop for ProbeGuard<'_> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.state.last_probe.insert(key, Instant::now());
        }
    }
}
