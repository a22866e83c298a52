use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::{AppError, Result};
use crate::models::AccountId;

/// Lock shared by every holder and waiter of one account.
#[derive(Debug)]
struct LockSlot {
    mutex: Arc<Mutex<()>>,
    /// Holders plus waiters. The slot is removed when this reaches zero.
    refs: usize,
}

impl LockSlot {
    fn new() -> Self {
        Self {
            mutex: Arc::new(Mutex::new(())),
            refs: 0,
        }
    }
}

/// Per-account mutual exclusion for mutating ledger operations.
///
/// Slots are reference counted and dropped once nobody holds or waits on
/// them, so the registry only tracks accounts with in-flight mutations.
/// Waiters on one account are served in FIFO order; different accounts
/// never share a lock.
#[derive(Debug, Default)]
pub struct AccountLockRegistry {
    slots: Arc<DashMap<AccountId, LockSlot>>,
    timeout: Option<Duration>,
}

impl AccountLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bounds lock waits; `acquire` fails with `Busy` past the timeout.
    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self {
            slots: Arc::new(DashMap::new()),
            timeout,
        }
    }

    /// Waits until the caller exclusively owns `account_id`.
    /// The returned guard releases the account when dropped. It does not
    /// borrow the registry, so it can be moved into a spawned task.
    pub async fn acquire(&self, account_id: AccountId) -> Result<AccountLock> {
        let started = Instant::now();
        let (mutex, ticket) = self.checkout(account_id);

        let guard = match self.timeout {
            None => mutex.lock_owned().await,
            Some(timeout) => match tokio::time::timeout(timeout, mutex.lock_owned()).await {
                Ok(guard) => guard,
                Err(_) => {
                    let waited_ms = started.elapsed().as_millis() as u64;
                    tracing::warn!(account_id, waited_ms, "Timed out waiting for account lock");
                    return Err(AppError::Busy {
                        account_id,
                        waited_ms,
                    });
                }
            },
        };

        Ok(AccountLock {
            _guard: guard,
            _ticket: ticket,
            account_id,
            waited: started.elapsed(),
        })
    }

    /// Number of accounts currently locked or waited on.
    pub fn active_slots(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if some caller currently holds `account_id`.
    pub fn is_locked(&self, account_id: AccountId) -> bool {
        self.slots
            .get(&account_id)
            .map(|slot| slot.mutex.try_lock().is_err())
            .unwrap_or(false)
    }

    fn checkout(&self, account_id: AccountId) -> (Arc<Mutex<()>>, SlotTicket) {
        let mut slot = self.slots.entry(account_id).or_insert_with(LockSlot::new);
        slot.refs += 1;
        let mutex = slot.mutex.clone();
        drop(slot);
        (
            mutex,
            SlotTicket {
                slots: Arc::clone(&self.slots),
                account_id,
            },
        )
    }
}

/// Counts one holder or waiter against a slot until dropped. Covers timeouts
/// and cancelled `acquire` futures as well as normal release.
#[derive(Debug)]
struct SlotTicket {
    slots: Arc<DashMap<AccountId, LockSlot>>,
    account_id: AccountId,
}

impl Drop for SlotTicket {
    fn drop(&mut self) {
        if let Entry::Occupied(mut entry) = self.slots.entry(self.account_id) {
            let slot = entry.get_mut();
            slot.refs -= 1;
            if slot.refs == 0 {
                entry.remove();
            }
        }
    }
}

/// Exclusive ownership of one account's mutation path.
#[derive(Debug)]
pub struct AccountLock {
    // Field order matters: the mutex is unlocked before the slot is checked in.
    _guard: OwnedMutexGuard<()>,
    _ticket: SlotTicket,
    account_id: AccountId,
    waited: Duration,
}

impl AccountLock {
    pub fn account_id(&self) -> AccountId {
        self.account_id
    }

    /// Time spent waiting for the lock.
    pub fn waited(&self) -> Duration {
        self.waited
    }

    /// Hands the account to the next waiter, or frees the slot.
    pub fn release(self) {
        drop(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_acquire_and_release_frees_slot() {
        let registry = AccountLockRegistry::new();
        let lock = registry.acquire(1).await.unwrap();
        assert_eq!(lock.account_id(), 1);
        assert!(registry.is_locked(1));
        assert_eq!(registry.active_slots(), 1);

        lock.release();
        assert!(!registry.is_locked(1));
        assert_eq!(registry.active_slots(), 0);
    }

    #[tokio::test]
    async fn test_different_accounts_do_not_contend() {
        let registry = AccountLockRegistry::with_timeout(Some(Duration::from_millis(50)));
        let first = registry.acquire(1).await.unwrap();
        let second = registry.acquire(2).await.unwrap();
        assert_eq!(registry.active_slots(), 2);
        drop(first);
        drop(second);
        assert_eq!(registry.active_slots(), 0);
    }

    #[tokio::test]
    async fn test_timeout_reports_busy_and_keeps_bookkeeping_balanced() {
        let registry = AccountLockRegistry::with_timeout(Some(Duration::from_millis(20)));
        let held = registry.acquire(7).await.unwrap();

        let err = registry.acquire(7).await.unwrap_err();
        assert!(matches!(err, AppError::Busy { account_id: 7, .. }));
        assert_eq!(registry.active_slots(), 1);

        drop(held);
        assert_eq!(registry.active_slots(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_acquire_checks_in() {
        let registry = AccountLockRegistry::new();
        let held = registry.acquire(3).await.unwrap();

        let waiting = registry.acquire(3);
        let timed_out = tokio::time::timeout(Duration::from_millis(20), waiting).await;
        assert!(timed_out.is_err());

        drop(held);
        assert_eq!(registry.active_slots(), 0);
    }

    #[tokio::test]
    async fn test_lock_moved_into_task_holds_until_task_ends() {
        let registry = AccountLockRegistry::with_timeout(Some(Duration::from_millis(20)));
        let lock = registry.acquire(5).await.unwrap();

        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            release_rx.await.ok();
            lock.release();
        });

        assert!(matches!(registry.acquire(5).await, Err(AppError::Busy { .. })));
        assert_eq!(registry.active_slots(), 1);

        release_tx.send(()).unwrap();
        task.await.unwrap();
        assert_eq!(registry.active_slots(), 0);
        assert!(registry.acquire(5).await.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_mutual_exclusion_under_contention() {
        let registry = Arc::new(AccountLockRegistry::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..64 {
            let registry = registry.clone();
            let inside = inside.clone();
            let max_inside = max_inside.clone();
            handles.push(tokio::spawn(async move {
                let _lock = registry.acquire(1).await.unwrap();
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_inside.fetch_max(now, Ordering::SeqCst);
                tokio::task::yield_now().await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert_eq!(registry.active_slots(), 0);
    }
}
