//! Bounded waits on widget interactions keyed by correlation id.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, instrument};

/// Registry of pending interactions.
///
/// A handler that needs a follow-up from the user (a confirmation click, the
/// next upload) registers a correlation id and waits; the event router
/// resolves the id when the matching event arrives. A wait that times out
/// removes its entry, so a late event is simply ignored.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
/// use vigil_interface::InteractionWaiter;
///
/// let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
/// rt.block_on(async {
///     let waiter: Arc<InteractionWaiter<bool>> = Arc::new(InteractionWaiter::new());
///     let rx = waiter.register("confirm:1");
///     assert!(waiter.resolve("confirm:1", true));
///     assert_eq!(rx.await.ok(), Some(true));
///     assert_eq!(waiter.wait("confirm:2", Duration::from_millis(5)).await, None);
/// });
/// ```
#[derive(Debug)]
pub struct InteractionWaiter<T> {
    pending: Mutex<HashMap<String, oneshot::Sender<T>>>,
}

impl<T> Default for InteractionWaiter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> InteractionWaiter<T> {
    /// Empty registry.
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Register `key` and return the receiving half.
    ///
    /// Registering a key twice drops the earlier waiter.
    pub fn register(&self, key: impl Into<String>) -> oneshot::Receiver<T> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(key.into(), tx);
        rx
    }

    /// Deliver `value` to the waiter for `key`.
    ///
    /// Returns false when nobody is waiting.
    pub fn resolve(&self, key: &str, value: T) -> bool {
        let sender = self.pending.lock().remove(key);
        match sender {
            Some(tx) => tx.send(value).is_ok(),
            None => false,
        }
    }

    /// Forget `key` without delivering anything.
    pub fn cancel(&self, key: &str) {
        self.pending.lock().remove(key);
    }

    /// Whether `key` is being waited on.
    pub fn is_pending(&self, key: &str) -> bool {
        self.pending.lock().contains_key(key)
    }

    /// Register `key` and wait up to `timeout` for it to be resolved.
    pub async fn wait(&self, key: &str, timeout: Duration) -> Option<T> {
        let rx = self.register(key);
        self.wait_registered(key, rx, timeout).await
    }

    /// Wait on a receiver obtained from [`register`](Self::register).
    ///
    /// Registering first lets the caller show the widget before waiting
    /// without racing the user's click.
    #[instrument(skip(self, rx), fields(key = %key))]
    pub async fn wait_registered(
        &self,
        key: &str,
        rx: oneshot::Receiver<T>,
        timeout: Duration,
    ) -> Option<T> {
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(_)) => {
                debug!("Waiter replaced before resolution");
                None
            }
            Err(_) => {
                debug!("Interaction wait timed out");
                self.cancel(key);
                None
            }
        }
    }
}
