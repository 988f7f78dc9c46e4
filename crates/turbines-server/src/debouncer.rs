//! Keyed cancellable delayed actions.
//!
//! Each key holds at most one pending action. Scheduling again under the same
//! key cancels the pending action and restarts the delay, so an action only
//! runs after a quiet period with no reschedule.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;

/// Debouncer running one delayed action per coalescing scope.
#[derive(Debug)]
pub(crate) struct Debouncer<K> {
    delay: Duration,
    pending: Mutex<HashMap<K, JoinHandle<()>>>,
}

impl<K: Eq + Hash> Debouncer<K> {
    pub(crate) fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Mutex::new(HashMap::new()),
        }
    }

    fn pending(&self) -> MutexGuard<'_, HashMap<K, JoinHandle<()>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `action` after the delay unless `key` is rescheduled or cancelled
    /// first. Must be called from within a tokio runtime.
    pub(crate) fn schedule<F>(&self, key: K, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let delay = self.delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            action.await;
        });

        if let Some(previous) = self.pending().insert(key, handle) {
            previous.abort();
        }
    }

    /// Cancel the pending action for `key`. Returns whether one was pending.
    pub(crate) fn cancel(&self, key: &K) -> bool {
        self.pending()
            .remove(key)
            .is_some_and(|handle| {
                let was_pending = !handle.is_finished();
                handle.abort();
                was_pending
            })
    }

    /// Whether an action for `key` is waiting to run.
    #[cfg(test)]
    pub(crate) fn is_pending(&self, key: &K) -> bool {
        self.pending()
            .get(key)
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl<K> Drop for Debouncer<K> {
    fn drop(&mut self) {
        let pending = self
            .pending
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        for (_, handle) in pending.drain() {
            handle.abort();
        }
    }
}
