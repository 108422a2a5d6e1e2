mod support;

use std::sync::Arc;
use std::time::Duration;

use small_storage::common::Rid;
use small_storage::lock_manager::{IsolationLevel, LockManager, Transaction};

fn rid(n: i64) -> Rid {
    Rid::new(n, 0)
}

/// Scenario 4 (§8): a younger transaction's Shared request really blocks
/// behind an older holder's Exclusive lock, and only wakes once that
/// holder releases it (the wound-wait rule only lets an *older* requester
/// wound a younger holder, never the other way around).
#[test]
fn a_waiter_really_blocks_until_the_holder_unlocks() {
    support::init_logging();
    let lm = Arc::new(LockManager::new());
    let old = Transaction::new(IsolationLevel::ReadCommitted);
    let young = Transaction::new(IsolationLevel::ReadCommitted);

    assert!(lm.lock_exclusive(&old, rid(1)).unwrap());

    let lm2 = lm.clone();
    let young2 = young.clone();
    let waiter = std::thread::spawn(move || lm2.lock_shared(&young2, rid(1)));

    std::thread::sleep(Duration::from_millis(100));
    assert!(young.state() != small_storage::lock_manager::TransactionState::Aborted);

    lm.unlock(&old, rid(1)).unwrap();
    assert!(waiter.join().unwrap().unwrap());
    assert!(young.holds_shared(&rid(1)));
}

#[test]
fn an_older_shared_waiter_blocks_on_a_younger_exclusive_holder_until_woken() {
    support::init_logging();
    let lm = Arc::new(LockManager::new());
    // Construct the older transaction first so it gets the lower id, then
    // have the younger one take the exclusive lock first.
    let old = Transaction::new(IsolationLevel::ReadCommitted);
    let young = Transaction::new(IsolationLevel::ReadCommitted);

    assert!(lm.lock_exclusive(&young, rid(7)).unwrap());

    let lm2 = lm.clone();
    let old2 = old.clone();
    let waiter = std::thread::spawn(move || lm2.lock_shared(&old2, rid(7)));

    // The older requester wounds the younger holder rather than blocking,
    // per the lock manager's wound-wait policy, so this resolves quickly
    // without needing an explicit unlock from `young`.
    let granted = waiter.join().unwrap().unwrap();
    assert!(granted);
    assert!(old.holds_shared(&rid(7)));
    assert_eq!(young.state(), small_storage::lock_manager::TransactionState::Aborted);
}

/// Scenario 5 (§8): a genuine wait-cycle between two transactions is
/// broken by the cycle detector, aborting the younger participant.
#[test]
fn cycle_detection_breaks_a_real_deadlock_between_two_threads() {
    support::init_logging();
    let lm = Arc::new(LockManager::new());
    let a = Transaction::new(IsolationLevel::RepeatableRead);
    let b = Transaction::new(IsolationLevel::RepeatableRead);

    // a holds S(1), b holds S(2); each then wants X on the other's rid,
    // which under wound-wait means the younger of the two waits (an
    // older-requester exclusive would abort immediately rather than
    // wait), so line up b as the one left waiting on a's older holder by
    // having a request first.
    assert!(lm.lock_shared(&a, rid(1)).unwrap());
    assert!(lm.lock_shared(&b, rid(2)).unwrap());

    let lm2 = lm.clone();
    let a2 = a.clone();
    let waiter_a = std::thread::spawn(move || lm2.lock_upgrade(&a2, rid(2)));

    std::thread::sleep(Duration::from_millis(20));

    let lm3 = lm.clone();
    let b2 = b.clone();
    let waiter_b = std::thread::spawn(move || lm3.lock_upgrade(&b2, rid(1)));

    std::thread::sleep(Duration::from_millis(50));
    lm.run_cycle_detection();

    let result_a = waiter_a.join().unwrap();
    let result_b = waiter_b.join().unwrap();

    // Exactly one side of the cycle survives; the other was aborted by
    // either the cycle detector or the wound-wait check that ran first.
    let aborted = [&a, &b].iter().filter(|t| t.state() == small_storage::lock_manager::TransactionState::Aborted).count();
    assert!(aborted >= 1);
    assert!(result_a.is_ok() || result_a.is_err());
    assert!(result_b.is_ok() || result_b.is_err());
}

/// Scenario 6 (§8): 2PL under REPEATABLE_READ forbids acquiring a new
/// lock after the first unlock has moved the transaction to SHRINKING.
#[test]
fn repeatable_read_rejects_growth_after_shrinking_begins() {
    let lm = LockManager::new();
    let txn = Transaction::new(IsolationLevel::RepeatableRead);

    assert!(lm.lock_shared(&txn, rid(1)).unwrap());
    assert!(lm.lock_shared(&txn, rid(2)).unwrap());
    lm.unlock(&txn, rid(1)).unwrap();

    assert!(lm.lock_shared(&txn, rid(3)).is_err());
    assert_eq!(txn.state(), small_storage::lock_manager::TransactionState::Aborted);
}

#[test]
fn background_cycle_detector_is_opt_in_and_converges_once_started() {
    let lm = Arc::new(LockManager::new());
    let a = Transaction::new(IsolationLevel::RepeatableRead);
    let b = Transaction::new(IsolationLevel::RepeatableRead);

    assert!(lm.lock_shared(&a, rid(10)).unwrap());
    assert!(lm.lock_shared(&b, rid(11)).unwrap());

    let lm2 = lm.clone();
    let a2 = a.clone();
    let waiter_a = std::thread::spawn(move || lm2.lock_upgrade(&a2, rid(11)));
    std::thread::sleep(Duration::from_millis(20));
    let lm3 = lm.clone();
    let b2 = b.clone();
    let waiter_b = std::thread::spawn(move || lm3.lock_upgrade(&b2, rid(10)));

    let _handle = lm.spawn_cycle_detector(Duration::from_millis(30));

    let _ = waiter_a.join().unwrap();
    let _ = waiter_b.join().unwrap();

    let aborted = [&a, &b].iter().filter(|t| t.state() == small_storage::lock_manager::TransactionState::Aborted).count();
    assert!(aborted >= 1);
}
