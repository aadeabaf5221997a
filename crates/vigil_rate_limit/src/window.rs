//! Sliding-window admission counter.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::Arc;
use tracing::{debug, instrument};
use vigil_core::Clock;

/// Details of a refused admission.
#[derive(Debug, Clone, PartialEq, Eq, derive_getters::Getters)]
pub struct RateLimitExceeded {
    /// Configured limit
    limit: u32,
    /// Configured window
    window: Duration,
    /// Time until the oldest admission leaves the window
    retry_after: Duration,
}

impl RateLimitExceeded {
    /// Whole seconds until a slot frees, rounded up.
    pub fn retry_after_secs(&self) -> u64 {
        let millis = self.retry_after.num_milliseconds().max(0) as u64;
        millis.div_ceil(1000)
    }
}

/// Per-subject sliding-window limiter.
///
/// `admit` returns true iff fewer than `limit` admissions lie within
/// `[now - window, now]`; an admitted call is recorded at `now`. Expired
/// entries are purged on each call for the subject.
#[derive(Debug)]
pub struct SlidingWindowLimiter<K = (u64, u64)> {
    clock: Arc<dyn Clock>,
    windows: Mutex<HashMap<K, VecDeque<DateTime<Utc>>>>,
}

impl<K> SlidingWindowLimiter<K>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
{
    /// Limiter reading time from `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Record an admission for `subject` if the window has room.
    pub fn admit(&self, subject: &K, limit: u32, window: Duration) -> bool {
        self.try_admit(subject, limit, window).is_ok()
    }

    /// Like [`admit`](Self::admit) but reports when the next slot frees.
    #[instrument(skip(self), fields(limit, window_secs = window.num_seconds()))]
    pub fn try_admit(
        &self,
        subject: &K,
        limit: u32,
        window: Duration,
    ) -> Result<(), RateLimitExceeded> {
        let now = self.clock.now();
        let mut windows = self.windows.lock();
        let entries = windows.entry(subject.clone()).or_default();
        purge(entries, now, window);

        if entries.len() < limit as usize {
            entries.push_back(now);
            debug!(used = entries.len(), "Admitted");
            return Ok(());
        }

        let retry_after = entries
            .front()
            .map(|oldest| (*oldest + window) - now)
            .unwrap_or_else(Duration::zero);
        debug!(retry_after_secs = retry_after.num_seconds(), "Rate limited");
        Err(RateLimitExceeded {
            limit,
            window,
            retry_after,
        })
    }

    /// Admissions currently inside the window for `subject`.
    pub fn usage(&self, subject: &K, window: Duration) -> usize {
        let now = self.clock.now();
        let mut windows = self.windows.lock();
        match windows.get_mut(subject) {
            Some(entries) => {
                purge(entries, now, window);
                entries.len()
            }
            None => 0,
        }
    }

    /// Forget every subject whose newest admission is older than `window`.
    pub fn prune(&self, window: Duration) {
        let now = self.clock.now();
        self.windows.lock().retain(|_, entries| {
            purge(entries, now, window);
            !entries.is_empty()
        });
    }
}

fn purge(entries: &mut VecDeque<DateTime<Utc>>, now: DateTime<Utc>, window: Duration) {
    // An admission exactly `window` old is still inside `[now - window, now]`.
    while let Some(oldest) = entries.front() {
        if now - *oldest > window {
            entries.pop_front();
        } else {
            break;
        }
    }
}
