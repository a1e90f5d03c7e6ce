//! Per-host request spacing for PDF downloads.
//!
//! Enforces a minimum delay between requests to the same host, so a batch of
//! concurrent downloads doesn't hammer one PDF server. Requests to different
//! hosts proceed in parallel without waiting for each other.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, instrument};
use url::Url;

/// Per-host rate limiter for download requests.
///
/// Designed to be wrapped in `Arc` and shared across Tokio tasks. Uses
/// `DashMap` for concurrent access to per-host state and a `tokio` Mutex for
/// atomic read-update of the host's schedule. The DashMap shard lock is
/// released before awaiting on the inner Mutex.
#[derive(Debug)]
pub struct RateLimiter {
    /// Minimum delay between requests to the same host.
    min_delay: Duration,

    /// Whether spacing is disabled (`rate_limit_ms = 0`).
    disabled: bool,

    /// Per-host schedule state.
    hosts: DashMap<String, Arc<HostState>>,
}

#[derive(Debug)]
struct HostState {
    /// The time the next request to this host may start.
    /// `None` means the host has not been requested yet.
    next_slot: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Creates a rate limiter with the given minimum inter-request delay.
    #[must_use]
    #[instrument(skip_all, fields(delay_ms = min_delay.as_millis()))]
    pub fn new(min_delay: Duration) -> Self {
        debug!("creating rate limiter");
        Self {
            min_delay,
            disabled: false,
            hosts: DashMap::new(),
        }
    }

    /// Creates a disabled rate limiter that applies no delays.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            min_delay: Duration::ZERO,
            disabled: true,
            hosts: DashMap::new(),
        }
    }

    /// Returns the configured minimum delay.
    #[must_use]
    pub fn min_delay(&self) -> Duration {
        self.min_delay
    }

    /// True when spacing is disabled.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Waits until a request to `url`'s host is allowed to start.
    ///
    /// The first request per host proceeds immediately; later requests claim
    /// the next slot atomically, so N concurrent tasks to one host start at
    /// least `min_delay` apart.
    pub async fn acquire(&self, url: &str) {
        if self.disabled || self.min_delay.is_zero() {
            return;
        }

        let Some(host) = extract_host(url) else {
            return;
        };

        let state = Arc::clone(
            self.hosts
                .entry(host.clone())
                .or_insert_with(|| {
                    Arc::new(HostState {
                        next_slot: Mutex::new(None),
                    })
                })
                .value(),
        );

        // Claim a start slot under the mutex, then sleep outside it.
        let wait = {
            let mut next_slot = state.next_slot.lock().await;
            let now = Instant::now();
            let start = match *next_slot {
                Some(slot) if slot > now => slot,
                _ => now,
            };
            *next_slot = Some(start + self.min_delay);
            start.saturating_duration_since(now)
        };

        if !wait.is_zero() {
            debug!(host = %host, wait_ms = wait.as_millis(), "spacing request");
            tokio::time::sleep(wait).await;
        }
    }
}

/// Extracts the host from a URL string, lowercased.
#[must_use]
pub(crate) fn extract_host(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()?
        .host_str()
        .map(str::to_lowercase)
}
