//! End-to-end ledger scenarios against the public API.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use stakelock_core::{
    AccountId, Amount, Deposit, DepositQueue, InMemoryCustody, ManagerConfig, ManualClock,
    RoleGate, StakeError, StakeEvent, StakeManager, Timestamp,
};
use std::sync::Arc;

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

type Manager = StakeManager<Arc<ManualClock>, Arc<InMemoryCustody>, Arc<RoleGate>>;

struct World {
    clock: Arc<ManualClock>,
    custody: Arc<InMemoryCustody>,
    manager: Manager,
    admin: AccountId,
}

fn amount(s: &str) -> Amount {
    s.parse().unwrap()
}

fn world(lock_days: u32) -> World {
    let clock = Arc::new(ManualClock::new(Timestamp::from_days(0)));
    let custody = Arc::new(InMemoryCustody::new());
    let admin = AccountId::new("admin");
    let manager = StakeManager::new(
        ManagerConfig {
            lock_period_days: lock_days,
        },
        Arc::clone(&clock),
        Arc::clone(&custody),
        Arc::new(RoleGate::with_admin(&admin)),
    )
    .unwrap();
    World {
        clock,
        custody,
        manager,
        admin,
    }
}

fn queue_contents(queue: &DepositQueue) -> Vec<(Amount, Timestamp)> {
    queue.iter().map(|d| (d.amount, d.maturity)).collect()
}

// =============================================================================
// SCENARIO A: deposit, mature, withdraw max
// =============================================================================

#[test]
fn scenario_a_daily_lock_and_withdraw_max() {
    let w = world(1);
    let alice = AccountId::new("alice");
    w.custody.fund(&alice, amount("10")).unwrap();

    w.manager.deposit(&alice, amount("1")).unwrap();
    assert_eq!(w.manager.balance(&alice), amount("1"));
    assert_eq!(w.manager.unlocked_balance(&alice), Amount::zero());

    w.clock.advance_days(1);
    w.manager.deposit(&alice, amount("1")).unwrap();
    assert_eq!(w.manager.balance(&alice), amount("2"));
    assert_eq!(w.manager.unlocked_balance(&alice), amount("1"));

    let event = w.manager.withdraw_max(&alice).unwrap();
    assert_eq!(
        event,
        Some(StakeEvent::Withdrawn {
            account: alice.clone(),
            amount: amount("1"),
        })
    );
    assert_eq!(w.manager.balance(&alice), amount("1"));
    assert_eq!(w.custody.wallet(&alice), amount("9"));
}

// =============================================================================
// SCENARIO B / C: queue ordering and partial consumption
// =============================================================================

#[test]
fn scenario_b_out_of_order_push_is_rejected() {
    let mut queue = DepositQueue::new();
    queue.push_back(amount("1"), Timestamp(1)).unwrap();
    queue.push_back(amount("3"), Timestamp(3)).unwrap();

    let err = queue.push_back(amount("2"), Timestamp(2)).unwrap_err();
    assert_eq!(
        err,
        StakeError::OrderingViolation {
            maturity: Timestamp(2),
            back: Timestamp(3),
        }
    );
    assert_eq!(queue.balance(), amount("4"));
}

#[test]
fn scenario_b_ordered_insert_reads_back_sorted() {
    let mut queue = DepositQueue::new();
    queue.insert(amount("1"), Timestamp(1)).unwrap();
    queue.insert(amount("3"), Timestamp(3)).unwrap();
    queue.insert(amount("2"), Timestamp(2)).unwrap();

    assert_eq!(
        queue_contents(&queue),
        vec![
            (amount("1"), Timestamp(1)),
            (amount("2"), Timestamp(2)),
            (amount("3"), Timestamp(3)),
        ]
    );
    assert_eq!(queue.balance(), amount("6"));
}

#[test]
fn scenario_c_partial_take_from_front() {
    let mut queue = DepositQueue::from_deposits([
        Deposit::new(amount("1"), Timestamp(1)),
        Deposit::new(amount("2"), Timestamp(2)),
        Deposit::new(amount("3"), Timestamp(3)),
    ])
    .unwrap();

    queue.take_until(amount("0.5"), Timestamp(2)).unwrap();

    assert_eq!(
        queue_contents(&queue),
        vec![
            (amount("0.5"), Timestamp(1)),
            (amount("2"), Timestamp(2)),
            (amount("3"), Timestamp(3)),
        ]
    );
    assert_eq!(queue.balance(), amount("5.5"));
}

// =============================================================================
// SCENARIO D: operator top-up with nothing unlocked
// =============================================================================

#[test]
fn scenario_d_shortfall_is_pulled_from_custody() {
    let w = world(1);
    let bob = AccountId::new("bob");
    w.custody.fund(&bob, amount("5")).unwrap();
    w.manager.deposit(&bob, amount("0.5")).unwrap();
    let future = Timestamp::from_days(30);

    let event = w
        .manager
        .restake_or_deposit_at_for(&w.admin, &bob, amount("1"), future)
        .unwrap();

    assert_eq!(
        event,
        StakeEvent::RestakedOrDeposited {
            operator: w.admin.clone(),
            account: bob.clone(),
            restaked: Amount::zero(),
            deposited: amount("1"),
            maturity: future,
        }
    );
    assert_eq!(
        w.manager.deposits(&bob),
        vec![
            Deposit::new(amount("0.5"), Timestamp::from_days(1)),
            Deposit::new(amount("1"), future),
        ]
    );
    assert_eq!(w.custody.wallet(&bob), amount("3.5"));
    assert_eq!(w.custody.reserve(), amount("1.5"));
}

#[test]
fn scenario_d_repeat_merges_at_same_maturity() {
    let w = world(1);
    let bob = AccountId::new("bob");
    w.custody.fund(&bob, amount("5")).unwrap();
    let future = Timestamp::from_days(30);

    w.manager
        .restake_or_deposit_at_for(&w.admin, &bob, amount("1"), future)
        .unwrap();
    w.manager
        .restake_or_deposit_at_for(&w.admin, &bob, amount("1"), future)
        .unwrap();

    assert_eq!(
        w.manager.deposits(&bob),
        vec![Deposit::new(amount("2"), future)]
    );
}

#[test]
fn operator_maturity_in_the_past_is_allowed_on_empty_ledger() {
    let w = world(1);
    let carol = AccountId::new("carol");
    w.custody.fund(&carol, amount("1")).unwrap();
    w.clock.advance_days(10);

    w.manager
        .restake_or_deposit_at_for(&w.admin, &carol, amount("1"), Timestamp::from_days(2))
        .unwrap();

    assert_eq!(w.manager.unlocked_balance(&carol), amount("1"));
}

#[test]
fn operator_push_before_back_is_ordering_violation() {
    let w = world(5);
    let dave = AccountId::new("dave");
    w.custody.fund(&dave, amount("3")).unwrap();
    w.manager.deposit(&dave, amount("1")).unwrap();
    let before = w.manager.snapshot();

    let err = w
        .manager
        .restake_or_deposit_at_for(&w.admin, &dave, amount("1"), Timestamp::from_days(2))
        .unwrap_err();

    assert!(matches!(err, StakeError::OrderingViolation { .. }));
    assert_eq!(w.manager.snapshot(), before);
    assert_eq!(w.custody.wallet(&dave), amount("2"));
}

// =============================================================================
// CONCURRENCY
// =============================================================================

#[test]
fn concurrent_accounts_do_not_interfere() {
    let w = world(1);
    let accounts: Vec<AccountId> = (0..8).map(|i| AccountId::new(format!("acct-{i}"))).collect();
    let shared = AccountId::new("shared");
    for account in accounts.iter().chain(std::iter::once(&shared)) {
        w.custody.fund(account, amount("1000")).unwrap();
    }

    std::thread::scope(|scope| {
        for account in &accounts {
            let manager = &w.manager;
            let shared = &shared;
            scope.spawn(move || {
                for _ in 0..50 {
                    manager.deposit(account, amount("1")).unwrap();
                    manager.deposit(shared, amount("0.5")).unwrap();
                }
            });
        }
    });

    for account in &accounts {
        assert_eq!(w.manager.balance(account), amount("50"));
    }
    assert_eq!(w.manager.balance(&shared), amount("200"));
    assert_eq!(w.manager.deposits(&shared).len(), 1);
    assert_eq!(w.custody.reserve(), amount("600"));
}
