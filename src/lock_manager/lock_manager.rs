use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use log::{debug, info, warn};

use crate::common::{Rid, TxnId};
use crate::error::{StorageError, StorageResult};

use super::transaction::{IsolationLevel, Transaction, TransactionState};
use super::wait_for_graph::WaitForGraph;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

fn conflicts(requested: LockMode, held: LockMode) -> bool {
    !(requested == LockMode::Shared && held == LockMode::Shared)
}

struct LockRequest {
    txn: Arc<Transaction>,
    mode: LockMode,
    granted: bool,
}

#[derive(Default)]
struct LockRequestQueue {
    requests: VecDeque<LockRequest>,
    /// The txn_id of whichever transaction's `LockUpgrade` is in flight on
    /// this queue, if any; a second, different upgrader aborts rather than
    /// queueing (§4.4.4). Tracking the owner (not just a bool) lets the
    /// owning transaction retry its own loop — e.g. after wounding a
    /// younger holder — without mistaking its own in-flight upgrade for a
    /// conflicting one.
    upgrading: Option<TxnId>,
}

/// Per-RID shared/exclusive lock table with wound-wait deadlock
/// prevention and isolation-level-aware two-phase locking (§4.4). All
/// operations serialize on one global mutex and wait on one condition
/// variable shared across every RID; a woken waiter re-checks its own
/// RID's queue and goes back to sleep if it wasn't the one that changed,
/// which is simpler than a condvar per RID and no less correct at the
/// concurrency this crate targets.
pub struct LockManager {
    table: Mutex<HashMap<Rid, LockRequestQueue>>,
    cv: Condvar,
}

impl LockManager {
    pub fn new() -> Self {
        info!("lock manager starting");
        Self {
            table: Mutex::new(HashMap::new()),
            cv: Condvar::new(),
        }
    }

    pub fn lock_shared(&self, txn: &Arc<Transaction>, rid: Rid) -> StorageResult<bool> {
        self.acquire(txn, rid, LockMode::Shared, false)
    }

    pub fn lock_exclusive(&self, txn: &Arc<Transaction>, rid: Rid) -> StorageResult<bool> {
        self.acquire(txn, rid, LockMode::Exclusive, false)
    }

    /// Upgrades an already-held `Shared` lock to `Exclusive` on the same
    /// record (§4.4.1, §4.4.4). Only one upgrade may be in flight per RID.
    pub fn lock_upgrade(&self, txn: &Arc<Transaction>, rid: Rid) -> StorageResult<bool> {
        self.acquire(txn, rid, LockMode::Exclusive, true)
    }

    fn abort(&self, txn: &Arc<Transaction>, reason: &str) -> StorageError {
        txn.set_state(TransactionState::Aborted);
        warn!("txn {} aborted: {}", txn.txn_id(), reason);
        StorageError::Conflict(reason.to_string())
    }

    fn acquire(
        &self,
        txn: &Arc<Transaction>,
        rid: Rid,
        mode: LockMode,
        is_upgrade: bool,
    ) -> StorageResult<bool> {
        // §4.4.2 pre-checks.
        if txn.state() == TransactionState::Aborted {
            return Err(StorageError::Conflict(format!(
                "txn {} is already aborted",
                txn.txn_id()
            )));
        }
        if is_upgrade {
            if txn.holds_exclusive(&rid) {
                return Ok(true);
            }
        } else {
            if mode == LockMode::Shared && txn.isolation_level() == IsolationLevel::ReadUncommitted
            {
                return Err(self.abort(txn, "shared locks are disallowed under READ_UNCOMMITTED"));
            }
            let already_held = match mode {
                LockMode::Shared => txn.holds_shared(&rid) || txn.holds_exclusive(&rid),
                LockMode::Exclusive => txn.holds_exclusive(&rid),
            };
            if already_held {
                return Ok(true);
            }
        }
        if txn.state() == TransactionState::Shrinking
            && txn.isolation_level() == IsolationLevel::RepeatableRead
        {
            return Err(self.abort(txn, "2PL violation: acquire after SHRINKING under REPEATABLE_READ"));
        }

        let mut table = self.table.lock().unwrap();

        loop {
            let queue = table.entry(rid).or_default();

            if is_upgrade {
                match queue.upgrading {
                    Some(owner) if owner != txn.txn_id() => {
                        return Err(self.abort(txn, "another upgrade is already in flight on this rid"));
                    }
                    _ => queue.upgrading = Some(txn.txn_id()),
                }
            }

            // §4.4.3: scan granted, conflicting holders.
            let mut conflict_idx = None;
            for (i, req) in queue.requests.iter().enumerate() {
                if !req.granted || req.txn.txn_id() == txn.txn_id() {
                    continue;
                }
                if conflicts(mode, req.mode) {
                    conflict_idx = Some(i);
                    break;
                }
            }

            let i = match conflict_idx {
                Some(i) => i,
                None => {
                    // No conflicting holder left: grant.
                    if is_upgrade {
                        queue.requests.retain(|r| r.txn.txn_id() != txn.txn_id());
                        queue.requests.push_back(LockRequest {
                            txn: txn.clone(),
                            mode: LockMode::Exclusive,
                            granted: true,
                        });
                        queue.upgrading = None;
                        txn.remove_shared(&rid);
                        txn.add_exclusive(rid);
                        debug!("txn {} upgraded to X on {:?}", txn.txn_id(), rid);
                    } else {
                        match queue.requests.iter_mut().find(|r| r.txn.txn_id() == txn.txn_id()) {
                            Some(existing) => existing.granted = true,
                            None => queue.requests.push_back(LockRequest {
                                txn: txn.clone(),
                                mode,
                                granted: true,
                            }),
                        }
                        match mode {
                            LockMode::Shared => txn.add_shared(rid),
                            LockMode::Exclusive => txn.add_exclusive(rid),
                        }
                        debug!("txn {} granted {:?} on {:?}", txn.txn_id(), mode, rid);
                    }
                    txn.set_state(TransactionState::Growing);
                    drop(table);
                    self.cv.notify_all();
                    return Ok(true);
                }
            };

            let holder = queue.requests[i].txn.clone();

            if holder.txn_id() > txn.txn_id() {
                // Wound: remove the younger holder, abort it, continue scanning.
                queue.requests.remove(i);
                holder.clear_lock_sets(&rid);
                holder.set_state(TransactionState::Aborted);
                if queue.upgrading == Some(holder.txn_id()) {
                    queue.upgrading = None;
                }
                warn!(
                    "txn {} wounded txn {} for {:?} on {:?}",
                    txn.txn_id(),
                    holder.txn_id(),
                    mode,
                    rid
                );
                continue;
            }

            // Holder is older.
            if mode == LockMode::Shared && !is_upgrade {
                if !queue.requests.iter().any(|r| r.txn.txn_id() == txn.txn_id()) {
                    queue.requests.push_back(LockRequest {
                        txn: txn.clone(),
                        mode,
                        granted: false,
                    });
                }
                debug!(
                    "txn {} waits on older txn {} for S on {:?}",
                    txn.txn_id(),
                    holder.txn_id(),
                    rid
                );
                table = self.cv.wait(table).unwrap();
                continue;
            }

            if is_upgrade {
                if !queue.requests.iter().any(|r| r.txn.txn_id() == txn.txn_id() && !r.granted) {
                    queue.requests.push_back(LockRequest {
                        txn: txn.clone(),
                        mode: LockMode::Exclusive,
                        granted: false,
                    });
                }
                debug!(
                    "txn {} waits on older txn {} to upgrade on {:?}",
                    txn.txn_id(),
                    holder.txn_id(),
                    rid
                );
                table = self.cv.wait(table).unwrap();
                continue;
            }

            // Exclusive (non-upgrade) request finds an older holder: the
            // source's stricter-than-textbook policy aborts rather than
            // waits (§4.4.3, §9 open question). `is_upgrade` is always
            // false here: both upgrade branches above already looped back
            // to retry instead of falling through to this abort.
            queue.requests.retain(|r| r.txn.txn_id() != txn.txn_id());
            drop(table);
            return Err(self.abort(
                txn,
                "exclusive request found an older holder; aborting per wound-wait fidelity policy",
            ));
        }
    }

    /// Releases `txn`'s lock on `rid` (§4.4.5). Transitions a
    /// `REPEATABLE_READ` transaction to `SHRINKING` on its first unlock.
    pub fn unlock(&self, txn: &Arc<Transaction>, rid: Rid) -> StorageResult<bool> {
        let mut table = self.table.lock().unwrap();
        let queue = match table.get_mut(&rid) {
            Some(q) => q,
            None => return Ok(false),
        };

        let pos = match queue.requests.iter().position(|r| r.txn.txn_id() == txn.txn_id() && r.granted) {
            Some(p) => p,
            None => return Ok(false),
        };
        let released = queue.requests.remove(pos).unwrap();

        if txn.isolation_level() == IsolationLevel::RepeatableRead
            && txn.state() == TransactionState::Growing
        {
            txn.set_state(TransactionState::Shrinking);
        }
        match released.mode {
            LockMode::Shared => txn.remove_shared(&rid),
            LockMode::Exclusive => txn.remove_exclusive(&rid),
        }

        debug!("txn {} unlocked {:?} on {:?}", txn.txn_id(), released.mode, rid);
        drop(table);
        // The source notifies unconditionally on X release and only when
        // the queue is non-empty on S release; under the single shared
        // condvar here that distinction collapses to the same `notify_all`
        // (a woken waiter re-checks its own RID and sleeps again if
        // nothing changed for it), so always notifying is both correct
        // and simpler.
        self.cv.notify_all();
        Ok(true)
    }

    /// Builds the current wait-for graph and aborts transactions on
    /// cycles until the graph is acyclic (§4.4.6). Call this directly for
    /// a single deterministic sweep (as tests do), or via
    /// `spawn_cycle_detector` for a background thread.
    pub fn run_cycle_detection(&self) {
        loop {
            let victim = {
                let table = self.table.lock().unwrap();
                let mut graph = WaitForGraph::new();
                let mut by_id = HashMap::new();

                for queue in table.values() {
                    let granted: Vec<&LockRequest> = queue.requests.iter().filter(|r| r.granted).collect();
                    for waiter in queue.requests.iter().filter(|r| !r.granted) {
                        for holder in &granted {
                            if conflicts(waiter.mode, holder.mode) {
                                graph.add_edge(waiter.txn.txn_id(), holder.txn.txn_id());
                                by_id.entry(waiter.txn.txn_id()).or_insert_with(|| waiter.txn.clone());
                                by_id.entry(holder.txn.txn_id()).or_insert_with(|| holder.txn.clone());
                            }
                        }
                    }
                }

                graph
                    .find_cycle()
                    .and_then(|cycle| cycle.into_iter().max())
                    .and_then(|youngest| by_id.get(&youngest).cloned())
            };

            match victim {
                Some(txn) => {
                    warn!("cycle detector aborting youngest transaction {}", txn.txn_id());
                    txn.set_state(TransactionState::Aborted);
                    self.purge_txn(txn.txn_id());
                    self.cv.notify_all();
                }
                None => break,
            }
        }
    }

    /// Removes every entry belonging to `txn_id` from every queue. Called
    /// after the cycle detector aborts a transaction, so the next sweep
    /// doesn't keep finding the same cycle through a now-dead waiter.
    fn purge_txn(&self, txn_id: TxnId) {
        let mut table = self.table.lock().unwrap();
        for queue in table.values_mut() {
            queue.requests.retain(|r| r.txn.txn_id() != txn_id);
            if queue.upgrading == Some(txn_id) {
                queue.upgrading = None;
            }
        }
    }

    /// Spawns the opt-in cycle-detection background thread described in
    /// §4.4.6: the embedding application starts and stops it explicitly,
    /// so unit tests can drive the lock manager without racing a timer.
    pub fn spawn_cycle_detector(self: &Arc<Self>, interval: Duration) -> std::thread::JoinHandle<()> {
        let lock_manager = Arc::clone(self);
        std::thread::spawn(move || loop {
            std::thread::sleep(interval);
            lock_manager.run_cycle_detection();
        })
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}
