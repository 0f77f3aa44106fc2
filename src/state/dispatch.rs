//! Debounce and Throttle Dispatchers - rate limiting for async actions.
//!
//! - **Debounce** - a burst of calls collapses into one run of the last call,
//!   once no newer call has arrived for a full interval
//! - **Throttle** - the first call runs immediately, calls arriving within the
//!   interval after it are dropped
//!
//! Both run on tokio's timer and must be awaited inside a tokio runtime.
//!
//! # Example
//!
//! ```ignore
//! use spark_params::DebounceDispatcher;
//!
//! let search = DebounceDispatcher::new(Duration::from_millis(300));
//!
//! // Only the last keystroke within 300ms triggers a query
//! if let Some(results) = search.debounce(|| run_query(text)).await {
//!     show(results);
//! }
//! ```

use std::cell::Cell;
use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, sleep};
use tracing::trace;

// =============================================================================
// DEBOUNCE
// =============================================================================

/// Runs only the most recent of a burst of actions.
#[derive(Debug)]
pub struct DebounceDispatcher {
    interval: Duration,
    /// Bumped by every call; a waiting call runs only if it is still current.
    generation: Cell<u64>,
}

impl DebounceDispatcher {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            generation: Cell::new(0),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait one interval, then run `action` unless a newer call superseded
    /// this one. Returns `None` when superseded.
    pub async fn debounce<F, Fut, R>(&self, action: F) -> Option<R>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = R>,
    {
        let ticket = self.generation.get().wrapping_add(1);
        self.generation.set(ticket);

        sleep(self.interval).await;

        if self.generation.get() != ticket {
            trace!(ticket, "debounced call superseded");
            return None;
        }
        Some(action().await)
    }

    /// Supersede every waiting call.
    pub fn cancel(&self) {
        self.generation.set(self.generation.get().wrapping_add(1));
    }
}

// =============================================================================
// THROTTLE
// =============================================================================

/// Runs at most one action per interval, dropping the rest.
#[derive(Debug)]
pub struct ThrottleDispatcher {
    interval: Duration,
    last_run: Cell<Option<Instant>>,
}

impl ThrottleDispatcher {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_run: Cell::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run `action` unless another run started less than one interval ago.
    /// Returns `None` when the call was dropped.
    pub async fn throttle<F, Fut, R>(&self, action: F) -> Option<R>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = R>,
    {
        let now = Instant::now();
        if let Some(last) = self.last_run.get() {
            if now.duration_since(last) < self.interval {
                trace!("throttled call dropped");
                return None;
            }
        }
        self.last_run.set(Some(now));
        Some(action().await)
    }

    /// Let the next call run immediately.
    pub fn reset(&self) {
        self.last_run.set(None);
    }
}

// =============================================================================
// TESTS
// =============================================================================
