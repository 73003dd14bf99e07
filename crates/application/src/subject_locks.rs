use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};
use warden_domain::RestrictionKey;

/// Per-subject exclusion for restriction transitions.
///
/// Apply, release, override and expiry for the same (group, subject) pair run one at a
/// time. Different subjects never wait on each other.
#[derive(Clone, Default)]
pub struct SubjectLocks {
    locks: Arc<Mutex<HashMap<RestrictionKey, Arc<Mutex<()>>>>>,
}

impl SubjectLocks {
    /// Creates an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to one subject. Access ends when the guard drops.
    pub async fn acquire(&self, key: &RestrictionKey) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            // Entries nobody holds or waits on are dropped here.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(key.clone()).or_default())
        };

        lock.lock_owned().await
    }

    /// Returns how many subjects currently have a lock entry.
    pub async fn tracked_subjects(&self) -> usize {
        self.locks.lock().await.len()
    }
}
