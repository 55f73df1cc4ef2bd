//! # Worker registry and admission budget.
//!
//! The registry is the coordinator's only record of live workers. It combines:
//! - a concurrent map `WorkerId → WorkerSlot` (one entry per admitted worker);
//! - the **admission budget**: how many more workers may start right now;
//! - the id sequence.
//!
//! ## Admission protocol
//! ```text
//! try_reserve()        budget: CAS b → b-1, only while b > 0
//!    └─► next_id()     seq: 1, 2, ... MAX, 1, ... (skips ids still registered)
//!    └─► insert_pending(id, epoch)
//!    └─► spawn worker ─► mark_running(id, epoch)
//!
//! worker exits ──► remove(id, epoch) ──► budget += 1 (only if `epoch` is still live)
//!                                    └──► wake drain waiters
//!
//! start ──► reset(budget, epoch)   epoch becomes live
//! stop  ──► close(epoch)           no epoch is live, budget = 0
//! ```
//!
//! ## Rules
//! - An entry exists only after a successful `try_reserve`, so the map never
//!   outgrows the budget it was admitted under.
//! - The budget may go negative after a capacity decrease; excess workers see
//!   it and retire instead of looping again.
//! - Each entry carries the Start/Stop epoch that admitted it; a straggler from
//!   an abandoned cycle cannot remove a newer entry.
//! - Budget is returned only to the live epoch. An exit from a closed or
//!   replaced epoch drops its entry and leaves the budget alone.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::Notify;

use crate::workers::WorkerId;

/// Lifecycle of one registry entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SlotState {
    /// Admitted; the worker task has not been spawned yet.
    Pending,
    /// Worker task spawned.
    Running,
}

/// Registry entry for one admitted worker.
#[derive(Clone, Copy, Debug)]
pub(crate) struct WorkerSlot {
    pub epoch: u64,
    pub state: SlotState,
}

/// Concurrent worker registry with its admission budget.
pub(crate) struct Registry {
    workers: DashMap<WorkerId, WorkerSlot>,
    budget: AtomicI64,
    seq: AtomicU64,
    max_id: u64,
    /// Epoch whose exits return budget; 0 when none is.
    live: RwLock<u64>,
    departed: Notify,
}

impl Registry {
    pub fn new() -> Self {
        Self::with_max_id(u64::MAX)
    }

    /// Registry whose id sequence wraps after `max_id`.
    pub fn with_max_id(max_id: u64) -> Self {
        Self {
            workers: DashMap::new(),
            budget: AtomicI64::new(0),
            seq: AtomicU64::new(0),
            max_id: max_id.max(1),
            live: RwLock::new(0),
            departed: Notify::new(),
        }
    }

    /// Makes `epoch` live, restarts the id sequence and sets the budget.
    pub fn reset(&self, budget: i64, epoch: u64) {
        let mut live = self.live.write();
        *live = epoch;
        self.seq.store(0, Ordering::SeqCst);
        self.budget.store(budget, Ordering::SeqCst);
    }

    /// Closes `epoch` if it is still live and zeroes the budget.
    ///
    /// Returns `false` if another epoch replaced it in the meantime.
    pub fn close(&self, epoch: u64) -> bool {
        let mut live = self.live.write();
        if *live != epoch {
            return false;
        }
        *live = 0;
        self.budget.store(0, Ordering::SeqCst);
        true
    }

    pub fn live_epoch(&self) -> u64 {
        *self.live.read()
    }

    /// Atomically takes one unit of budget if it is positive.
    pub fn try_reserve(&self) -> bool {
        self.budget
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |b| (b > 0).then(|| b - 1))
            .is_ok()
    }

    /// Returns one unit of budget.
    pub fn release(&self) {
        self.budget.fetch_add(1, Ordering::AcqRel);
    }

    /// Adds `delta` to the budget and returns the new value.
    pub fn adjust(&self, delta: i64) -> i64 {
        self.budget.fetch_add(delta, Ordering::AcqRel) + delta
    }

    pub fn budget(&self) -> i64 {
        self.budget.load(Ordering::Acquire)
    }

    /// Allocates the next free id.
    pub fn next_id(&self) -> WorkerId {
        let max = self.max_id;
        loop {
            let prev = match self.seq.fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| {
                Some(if c >= max { 1 } else { c + 1 })
            }) {
                Ok(prev) | Err(prev) => prev,
            };
            let id = WorkerId::new(if prev >= max { 1 } else { prev + 1 });
            if !self.workers.contains_key(&id) {
                return id;
            }
        }
    }

    pub fn insert_pending(&self, id: WorkerId, epoch: u64) {
        self.workers.insert(
            id,
            WorkerSlot {
                epoch,
                state: SlotState::Pending,
            },
        );
    }

    /// Upgrades a pending entry; no-op if the worker already left.
    pub fn mark_running(&self, id: WorkerId, epoch: u64) {
        if let Some(mut slot) = self.workers.get_mut(&id) {
            if slot.epoch == epoch {
                slot.state = SlotState::Running;
            }
        }
    }

    /// Removes the entry admitted in `epoch`; its budget goes back only if
    /// `epoch` is still live.
    ///
    /// Returns `false` if the entry is gone or belongs to another epoch.
    pub fn remove(&self, id: WorkerId, epoch: u64) -> bool {
        let removed = self
            .workers
            .remove_if(&id, |_, slot| slot.epoch == epoch)
            .is_some();
        if removed {
            let live = self.live.read();
            if *live == epoch {
                self.release();
            }
            drop(live);
            self.departed.notify_waiters();
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Entries admitted in `epoch`.
    pub fn count_in(&self, epoch: u64) -> usize {
        self.workers.iter().filter(|e| e.epoch == epoch).count()
    }

    /// Sorted ids of entries admitted in `epoch`.
    pub fn ids_in(&self, epoch: u64) -> Vec<WorkerId> {
        let mut ids: Vec<WorkerId> = self
            .workers
            .iter()
            .filter(|e| e.epoch == epoch)
            .map(|e| *e.key())
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Entries of `epoch` that were admitted but never spawned.
    pub fn pending_in(&self, epoch: u64) -> usize {
        self.workers
            .iter()
            .filter(|e| e.epoch == epoch && e.state == SlotState::Pending)
            .count()
    }

    #[cfg(test)]
    pub fn slot(&self, id: WorkerId) -> Option<WorkerSlot> {
        self.workers.get(&id).map(|s| *s)
    }

    /// Drops the entries of `epoch` without returning their budget.
    pub fn clear_epoch(&self, epoch: u64) {
        self.workers.retain(|_, slot| slot.epoch != epoch);
        self.departed.notify_waiters();
    }

    /// Completes once no entry of `epoch` is left.
    pub async fn drained(&self, epoch: u64) {
        loop {
            let notified = self.departed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.count_in(epoch) == 0 {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_reserve_only_from_positive_budget() {
        let r = Registry::new();
        r.reset(2, 1);
        assert!(r.try_reserve());
        assert!(r.try_reserve());
        assert!(!r.try_reserve());
        assert_eq!(r.budget(), 0);

        r.adjust(-3);
        assert!(!r.try_reserve());
        assert_eq!(r.budget(), -3);
    }

    #[test]
    fn test_ids_wrap_and_skip_registered() {
        let r = Registry::with_max_id(3);
        r.reset(10, 1);
        let a = r.next_id();
        let b = r.next_id();
        r.insert_pending(a, 0);
        assert_eq!((a.get(), b.get()), (1, 2));
        assert_eq!(r.next_id().get(), 3);
        // wraps to 1, which is registered, so 2 is next
        assert_eq!(r.next_id().get(), 2);
    }

    #[test]
    fn test_remove_checks_epoch_and_returns_budget() {
        let r = Registry::new();
        r.reset(1, 7);
        assert!(r.try_reserve());
        let id = r.next_id();
        r.insert_pending(id, 7);
        r.mark_running(id, 7);
        assert_eq!(r.slot(id).map(|s| s.state), Some(SlotState::Running));

        assert!(!r.remove(id, 6));
        assert_eq!(r.budget(), 0);
        assert!(r.remove(id, 7));
        assert_eq!(r.budget(), 1);
        assert!(!r.remove(id, 7));
        assert_eq!(r.budget(), 1);
    }

    #[test]
    fn test_mark_running_after_remove_is_noop() {
        let r = Registry::new();
        let id = WorkerId::new(1);
        r.insert_pending(id, 0);
        r.remove(id, 0);
        r.mark_running(id, 0);
        assert!(r.is_empty());
    }

    #[test]
    fn test_concurrent_reserve_never_exceeds_budget() {
        let r = Arc::new(Registry::new());
        r.reset(5, 1);
        let admitted = Arc::new(AtomicUsize::new(0));

        let threads: Vec<_> = (0..16)
            .map(|_| {
                let r = Arc::clone(&r);
                let admitted = Arc::clone(&admitted);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        if r.try_reserve() {
                            admitted.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().expect("thread");
        }

        assert_eq!(admitted.load(Ordering::SeqCst), 5);
        assert_eq!(r.budget(), 0);
    }

    #[test]
    fn test_exit_from_replaced_epoch_keeps_budget() {
        let r = Registry::new();
        r.reset(1, 1);
        assert!(r.try_reserve());
        r.insert_pending(WorkerId::new(1), 1);

        // restarted while the old worker is still draining
        r.reset(1, 2);
        assert!(r.try_reserve());
        r.insert_pending(WorkerId::new(2), 2);

        assert!(r.remove(WorkerId::new(1), 1));
        assert_eq!(r.budget(), 0);
        assert!(!r.try_reserve());
        assert_eq!(r.len(), 1);
    }

    #[test]
    fn test_close_zeroes_budget_and_ignores_late_exits() {
        let r = Registry::new();
        r.reset(2, 3);
        assert!(r.try_reserve());
        r.insert_pending(WorkerId::new(1), 3);

        assert!(!r.close(2));
        assert_eq!(r.live_epoch(), 3);
        assert!(r.close(3));
        assert_eq!(r.live_epoch(), 0);
        assert_eq!(r.budget(), 0);

        assert!(r.remove(WorkerId::new(1), 3));
        assert_eq!(r.budget(), 0);
    }

    #[test]
    fn test_clear_epoch_keeps_newer_entries() {
        let r = Registry::new();
        r.insert_pending(WorkerId::new(1), 1);
        r.insert_pending(WorkerId::new(2), 2);
        r.clear_epoch(1);
        assert_eq!(r.ids_in(2), vec![WorkerId::new(2)]);
        assert_eq!(r.count_in(1), 0);
    }

    #[tokio::test]
    async fn test_drained_completes_when_last_entry_leaves() {
        let r = Arc::new(Registry::new());
        r.insert_pending(WorkerId::new(1), 0);
        r.insert_pending(WorkerId::new(2), 0);
        r.insert_pending(WorkerId::new(3), 1);

        let waiter = {
            let r = Arc::clone(&r);
            tokio::spawn(async move { r.drained(0).await })
        };
        r.remove(WorkerId::new(1), 0);
        assert!(!waiter.is_finished());
        r.remove(WorkerId::new(2), 0);

        tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .expect("drained in time")
            .expect("join");
    }
}
