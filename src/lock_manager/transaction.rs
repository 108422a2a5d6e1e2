use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::common::{Rid, TxnId};

/// Isolation level, set once at transaction start (§3, §4.4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
}

/// A transaction's position in the two-phase-locking protocol (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Growing,
    Shrinking,
    Committed,
    Aborted,
}

static NEXT_TXN_ID: AtomicU64 = AtomicU64::new(0);

/// The lock manager's view of a transaction (§3): an id, an isolation
/// level, a 2PL state, and the two lock sets it has acquired. Owned by
/// whatever runs the transaction (an executor, a test) and shared with
/// the lock manager as an `Arc` — the lock manager never looks a
/// transaction up by id through a global registry (§9).
pub struct Transaction {
    txn_id: TxnId,
    isolation_level: IsolationLevel,
    state: Mutex<TransactionState>,
    shared_lock_set: Mutex<HashSet<Rid>>,
    exclusive_lock_set: Mutex<HashSet<Rid>>,
}

impl Transaction {
    /// Starts a new transaction. `txn_id` is assigned from a process-wide
    /// monotonic counter; lower id means older, which is what wound-wait
    /// compares on (§4.4.3).
    pub fn new(isolation_level: IsolationLevel) -> Arc<Self> {
        let txn_id = NEXT_TXN_ID.fetch_add(1, Ordering::SeqCst);
        Arc::new(Self {
            txn_id,
            isolation_level,
            state: Mutex::new(TransactionState::Growing),
            shared_lock_set: Mutex::new(HashSet::new()),
            exclusive_lock_set: Mutex::new(HashSet::new()),
        })
    }

    pub fn txn_id(&self) -> TxnId {
        self.txn_id
    }

    pub fn isolation_level(&self) -> IsolationLevel {
        self.isolation_level
    }

    pub fn state(&self) -> TransactionState {
        *self.state.lock().unwrap()
    }

    pub fn set_state(&self, state: TransactionState) {
        *self.state.lock().unwrap() = state;
    }

    pub fn holds_shared(&self, rid: &Rid) -> bool {
        self.shared_lock_set.lock().unwrap().contains(rid)
    }

    pub fn holds_exclusive(&self, rid: &Rid) -> bool {
        self.exclusive_lock_set.lock().unwrap().contains(rid)
    }

    pub(super) fn add_shared(&self, rid: Rid) {
        self.shared_lock_set.lock().unwrap().insert(rid);
    }

    pub(super) fn add_exclusive(&self, rid: Rid) {
        self.exclusive_lock_set.lock().unwrap().insert(rid);
    }

    pub(super) fn remove_shared(&self, rid: &Rid) {
        self.shared_lock_set.lock().unwrap().remove(rid);
    }

    pub(super) fn remove_exclusive(&self, rid: &Rid) {
        self.exclusive_lock_set.lock().unwrap().remove(rid);
    }

    /// Drops every lock entry this transaction holds or is waiting on,
    /// for both sets. Used when the transaction is wounded or cycle-
    /// aborted: its RIDs no longer belong to it regardless of which set
    /// they were filed under.
    pub(super) fn clear_lock_sets(&self, rid: &Rid) {
        self.remove_shared(rid);
        self.remove_exclusive(rid);
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("txn_id", &self.txn_id)
            .field("isolation_level", &self.isolation_level)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_transactions_start_growing() {
        let txn = Transaction::new(IsolationLevel::ReadCommitted);
        assert_eq!(txn.state(), TransactionState::Growing);
    }

    #[test]
    fn lock_sets_track_what_was_added_and_removed() {
        let txn = Transaction::new(IsolationLevel::RepeatableRead);
        let rid = Rid::new(1, 0);
        txn.add_shared(rid);
        assert!(txn.holds_shared(&rid));
        txn.remove_shared(&rid);
        assert!(!txn.holds_shared(&rid));
    }

    #[test]
    fn ids_are_assigned_monotonically() {
        let a = Transaction::new(IsolationLevel::ReadCommitted);
        let b = Transaction::new(IsolationLevel::ReadCommitted);
        assert!(a.txn_id() < b.txn_id());
    }
}
