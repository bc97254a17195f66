//! Keyed async locks serializing channel creation per (user, calendar)

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockKey = (String, String);

/// One async mutex per (user, calendar), created on demand.
///
/// Entries are dropped when the last holder releases them, so the map only
/// ever contains calendars with a watch start in flight.
#[derive(Debug, Default, Clone)]
pub struct WatchLocks {
    inner: Arc<DashMap<LockKey, Arc<Mutex<()>>>>,
}

impl WatchLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to a (user, calendar) pair.
    pub async fn acquire(&self, user_id: &str, calendar_id: &str) -> WatchLockGuard {
        let key = (user_id.to_owned(), calendar_id.to_owned());
        let mutex = self.inner.entry(key.clone()).or_default().clone();
        let guard = mutex.lock_owned().await;

        WatchLockGuard { key, locks: Arc::clone(&self.inner), guard: Some(guard) }
    }

    /// Number of pairs currently locked or awaited.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Releases the pair on drop.
pub struct WatchLockGuard {
    key: LockKey,
    locks: Arc<DashMap<LockKey, Arc<Mutex<()>>>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for WatchLockGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only the map's own handle left: nobody holds or waits on it.
        self.locks.remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}
