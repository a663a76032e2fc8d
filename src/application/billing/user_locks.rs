//! Per-user async mutual exclusion.
//!
//! Checkout, cancel, reconcile and revoke each read a user record, talk to the
//! provider, then write the record back. Holding the user's lock across that
//! sequence keeps two triggers for the same user from interleaving.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::domain::foundation::UserId;

/// Guard held for the duration of one user's read-modify-write sequence.
pub type UserLockGuard = OwnedMutexGuard<()>;

/// Registry of per-user locks.
///
/// Entries nobody holds or waits on are pruned whenever a lock is taken, so the
/// map only grows with the number of users in flight.
#[derive(Default)]
pub struct UserLocks {
    locks: Mutex<HashMap<UserId, Arc<AsyncMutex<()>>>>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `user_id`.
    pub async fn acquire(&self, user_id: &UserId) -> UserLockGuard {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            // The map's own handle is the only reference left once a lock is idle.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(user_id.clone()).or_default().clone()
        };

        lock.lock_owned().await
    }

    /// Number of tracked users.
    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
