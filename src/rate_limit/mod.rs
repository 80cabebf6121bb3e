//! Outbound request budget.
//!
//! The mirrors sit behind aggressive anti-abuse heuristics, so the relay
//! enforces a single global budget for every outbound call: at most
//! [`MAX_REQUESTS_PER_WINDOW`] requests per [`RATE_WINDOW`], with at least
//! [`MIN_REQUEST_INTERVAL`] between consecutive dispatches.
//!
//! [`RateLimiter::acquire_slot`] never fails, it only delays. The window
//! state lives behind a `tokio::sync::Mutex` that is held across the waits,
//! so concurrent callers serialize through the one budget instead of
//! racing the counters.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use crate::config::{MAX_REQUESTS_PER_WINDOW, MIN_REQUEST_INTERVAL, RATE_WINDOW};

/// Sliding-window counter plus last-dispatch timestamp.
struct BudgetWindow {
    window_start: Instant,
    count: u32,
    last_dispatch: Option<Instant>,
}

/// Global outbound rate limiter.
///
/// One instance per [`crate::DispatcherState`]; every dispatched call
/// acquires a slot before touching the network.
pub struct RateLimiter {
    window: Mutex<BudgetWindow>,
    max_per_window: u32,
    window_len: Duration,
    min_interval: Duration,
}

impl RateLimiter {
    /// Creates a limiter with the service-wide budget.
    pub fn new() -> Self {
        RateLimiter {
            window: Mutex::new(BudgetWindow {
                window_start: Instant::now(),
                count: 0,
                last_dispatch: None,
            }),
            max_per_window: MAX_REQUESTS_PER_WINDOW,
            window_len: RATE_WINDOW,
            min_interval: MIN_REQUEST_INTERVAL,
        }
    }

    /// Suspends the caller until one more outbound request is allowed.
    ///
    /// Applies two independent rules:
    /// - the per-window cap: once `max_per_window` slots were handed out in
    ///   the current window, waits until the window elapses and resets it;
    /// - the minimum spacing: waits out whatever remains of `min_interval`
    ///   since the previous dispatch.
    ///
    /// On release the current time is recorded as the last dispatch and the
    /// window counter is incremented, unconditionally.
    pub async fn acquire_slot(&self) {
        let mut window = self.window.lock().await;
        let now = Instant::now();

        if now.duration_since(window.window_start) > self.window_len {
            window.count = 0;
            window.window_start = now;
        }

        if window.count >= self.max_per_window {
            let wait = self
                .window_len
                .saturating_sub(now.duration_since(window.window_start));
            log::debug!("outbound request budget exhausted, waiting {wait:?}");
            sleep(wait).await;
            window.count = 0;
            window.window_start = Instant::now();
        }

        if let Some(last) = window.last_dispatch {
            let since_last = Instant::now().duration_since(last);
            if since_last < self.min_interval {
                sleep(self.min_interval - since_last).await;
            }
        }

        window.last_dispatch = Some(Instant::now());
        window.count += 1;
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
