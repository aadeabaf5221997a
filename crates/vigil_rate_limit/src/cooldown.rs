//! Per-subject cooldowns.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use vigil_core::Clock;

/// Tracks the last time each subject performed a cooled-down action.
///
/// Entries are process scoped; a restart forgets them.
#[derive(Debug)]
pub struct CooldownTracker<K = (u64, u64)> {
    clock: Arc<dyn Clock>,
    last: Mutex<HashMap<K, DateTime<Utc>>>,
}

impl<K> CooldownTracker<K>
where
    K: Eq + Hash + Clone,
{
    /// Tracker reading time from `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            last: Mutex::new(HashMap::new()),
        }
    }

    /// Time left before `subject` may act again, or `None` if it may act now.
    pub fn remaining(&self, subject: &K, cooldown: Duration) -> Option<Duration> {
        let now = self.clock.now();
        let last = self.last.lock().get(subject).copied()?;
        let ready_at = last + cooldown;
        (ready_at > now).then(|| ready_at - now)
    }

    /// Record that `subject` acted now.
    pub fn record(&self, subject: K) {
        let now = self.clock.now();
        self.last.lock().insert(subject, now);
    }

    /// Forget `subject`.
    pub fn clear(&self, subject: &K) {
        self.last.lock().remove(subject);
    }
}
