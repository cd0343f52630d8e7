//! In-process keyed locks on `(owner_id, file_name)`.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use filevault_core::types::OwnerId;

type Key = (OwnerId, String);
type Table = DashMap<Key, Arc<Mutex<()>>>;

/// One async mutex per `(owner_id, file_name)` currently in use.
///
/// Entries are created on demand and removed when the last holder or
/// waiter lets go, including a waiter whose `acquire` is cancelled.
#[derive(Debug, Clone, Default)]
pub struct NameLocks {
    inner: Arc<Table>,
}

impl NameLocks {
    /// Create an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `(owner_id, file_name)`.
    pub async fn acquire(&self, owner_id: OwnerId, file_name: &str) -> NameGuard {
        let mut held = NameGuard {
            key: (owner_id, file_name.to_string()),
            guard: None,
            table: Arc::clone(&self.inner),
        };
        // Declared after `held`, so a cancelled wait drops this handle first
        // and `held` then removes the idle entry.
        let lock = Arc::clone(self.inner.entry(held.key.clone()).or_default().value());
        held.guard = Some(lock.lock_owned().await);
        held
    }

    /// Number of names with a holder or waiter.
    pub fn in_use(&self) -> usize {
        self.inner.len()
    }
}

/// Held access to one file name. Released on drop.
#[derive(Debug)]
pub struct NameGuard {
    key: Key,
    guard: Option<OwnedMutexGuard<()>>,
    table: Arc<Table>,
}

impl NameGuard {
    /// Whether this guard covers `(owner_id, file_name)`.
    pub fn covers(&self, owner_id: OwnerId, file_name: &str) -> bool {
        self.key.0 == owner_id && self.key.1 == file_name
    }
}

impl Drop for NameGuard {
    fn drop(&mut self) {
        self.guard.take();
        self.table
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_same_name_is_exclusive() {
        let locks = NameLocks::new();
        let owner = OwnerId::new();

        let held = locks.acquire(owner, "a.txt").await;
        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(owner, "a.txt").await;
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        drop(held);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("released")
            .unwrap();
        assert_eq!(locks.in_use(), 0);
    }

    #[tokio::test]
    async fn test_different_names_do_not_block() {
        let locks = NameLocks::new();
        let owner = OwnerId::new();

        let a = locks.acquire(owner, "a.txt").await;
        let _b = tokio::time::timeout(Duration::from_secs(1), locks.acquire(owner, "b.txt"))
            .await
            .expect("independent name");
        let _c = tokio::time::timeout(
            Duration::from_secs(1),
            locks.acquire(OwnerId::new(), "a.txt"),
        )
        .await
        .expect("independent owner");
        assert_eq!(locks.in_use(), 3);
        assert!(a.covers(owner, "a.txt"));
        assert!(!a.covers(owner, "b.txt"));
    }

    #[tokio::test]
    async fn test_cancelled_waiter_leaves_no_entry() {
        let locks = NameLocks::new();
        let owner = OwnerId::new();

        let held = locks.acquire(owner, "a.txt").await;
        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(owner, "a.txt").await;
                std::future::pending::<()>().await;
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        // Release and cancel without yielding, so the waiter never runs again.
        drop(held);
        waiter.abort();
        assert!(waiter.await.unwrap_err().is_cancelled());
        assert_eq!(locks.in_use(), 0);
    }

    #[tokio::test]
    async fn test_timed_out_acquire_leaves_no_entry() {
        let locks = NameLocks::new();
        let owner = OwnerId::new();

        let held = locks.acquire(owner, "a.txt").await;
        let attempt =
            tokio::time::timeout(Duration::from_millis(20), locks.acquire(owner, "a.txt")).await;
        assert!(attempt.is_err());

        drop(held);
        assert_eq!(locks.in_use(), 0);
    }
}
