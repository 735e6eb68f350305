//! # Stake Manager
//!
//! Service layer over per-account [`StakeLedger`]s.
//!
//! The manager owns the lock-period policy, drives custody transfers and
//! exposes the deposit / withdraw / restake operations. Every mutation runs
//! in three steps while the account's ledger mutex is held:
//!
//! 1. validate the change against the current ledger
//! 2. perform the custody transfer, if any
//! 3. apply the change in place
//!
//! A failure in step 1 or 2 leaves the ledger untouched, and validation
//! mirrors the queue's own checks so step 3 does not fail. Different
//! accounts never contend on the same mutex.

use crate::collaborators::{AuthorizationGate, Clock, Custody, Operation};
use crate::formats::StakeSnapshot;
use crate::queue::{Deposit, DepositQueue};
use crate::{
    AccountId, Amount, CustodyError, MAX_LOCK_PERIOD_DAYS, StakeError, StakeEvent, StakeLedger,
    StakeResult, Timestamp,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tracing::{debug, error, warn};

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Default lock period applied to fresh deposits and restakes.
pub const DEFAULT_LOCK_PERIOD_DAYS: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerConfig {
    pub lock_period_days: u32,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            lock_period_days: DEFAULT_LOCK_PERIOD_DAYS,
        }
    }
}

fn validate_lock_period(days: u32) -> StakeResult<u32> {
    if days > MAX_LOCK_PERIOD_DAYS {
        return Err(StakeError::InvalidLockPeriod { days });
    }
    Ok(days)
}

// =============================================================================
// STAKE MANAGER
// =============================================================================

type LedgerHandle = Arc<Mutex<StakeLedger>>;

pub struct StakeManager<C, K, A> {
    clock: C,
    custody: K,
    gate: A,
    lock_period_days: AtomicU32,
    ledgers: RwLock<BTreeMap<AccountId, LedgerHandle>>,
}

impl<C, K, A> StakeManager<C, K, A>
where
    C: Clock,
    K: Custody,
    A: AuthorizationGate,
{
    pub fn new(config: ManagerConfig, clock: C, custody: K, gate: A) -> StakeResult<Self> {
        let days = validate_lock_period(config.lock_period_days)?;
        Ok(Self {
            clock,
            custody,
            gate,
            lock_period_days: AtomicU32::new(days),
            ledgers: RwLock::new(BTreeMap::new()),
        })
    }

    /// Rebuild a manager, replaying every deposit through the queue checks.
    pub fn from_snapshot(
        snapshot: StakeSnapshot,
        clock: C,
        custody: K,
        gate: A,
    ) -> StakeResult<Self> {
        let config = ManagerConfig {
            lock_period_days: snapshot.lock_period_days,
        };
        let manager = Self::new(config, clock, custody, gate)?;
        {
            let mut ledgers = manager.write_ledgers();
            for (account, deposits) in snapshot.accounts {
                let queue = DepositQueue::from_deposits(deposits)?;
                ledgers.insert(account, Arc::new(Mutex::new(StakeLedger::from_queue(queue))));
            }
        }
        Ok(manager)
    }

    /// Plain-data image of the current state. Empty ledgers are left out.
    pub fn snapshot(&self) -> StakeSnapshot {
        let accounts = self
            .read_ledgers()
            .iter()
            .filter_map(|(account, handle)| {
                let deposits = lock(handle).deposits();
                (!deposits.is_empty()).then(|| (account.clone(), deposits))
            })
            .collect();
        StakeSnapshot {
            lock_period_days: self.lock_period_days(),
            accounts,
        }
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn custody(&self) -> &K {
        &self.custody
    }

    pub fn gate(&self) -> &A {
        &self.gate
    }

    pub fn lock_period_days(&self) -> u32 {
        self.lock_period_days.load(Ordering::SeqCst)
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    pub fn balance(&self, account: &AccountId) -> Amount {
        self.view(account, |l| l.balance())
    }

    pub fn balance_until(&self, account: &AccountId, t: Timestamp) -> Amount {
        self.view(account, |l| l.balance_until(t))
    }

    pub fn balance_from(&self, account: &AccountId, t: Timestamp) -> Amount {
        self.view(account, |l| l.balance_from(t))
    }

    pub fn unlocked_balance(&self, account: &AccountId) -> Amount {
        let now = self.clock.now();
        self.view(account, |l| l.unlocked_at(now))
    }

    pub fn locked_balance(&self, account: &AccountId) -> Amount {
        let now = self.clock.now();
        self.view(account, |l| l.locked_at(now))
    }

    pub fn next_maturity(&self, account: &AccountId) -> Option<Timestamp> {
        let now = self.clock.now();
        self.read_ledgers()
            .get(account)
            .and_then(|handle| lock(handle).next_maturity(now))
    }

    /// Deposits front to back; empty for unknown accounts.
    pub fn deposits(&self, account: &AccountId) -> Vec<Deposit> {
        self.read_ledgers()
            .get(account)
            .map(|handle| lock(handle).deposits())
            .unwrap_or_default()
    }

    /// Accounts with a committed ledger, in order. An entry appears with the
    /// first successful mutation and stays after the ledger drains.
    pub fn accounts(&self) -> Vec<AccountId> {
        self.read_ledgers().keys().cloned().collect()
    }

    // -------------------------------------------------------------------------
    // Mutations
    // -------------------------------------------------------------------------

    /// Pull `amount` into custody and lock it for the current lock period.
    pub fn deposit(&self, account: &AccountId, amount: Amount) -> StakeResult<StakeEvent> {
        if amount.is_zero() {
            return Err(StakeError::InvalidAmount);
        }
        let maturity = self.maturity_from_now()?;

        self.transact(
            account,
            |ledger| ledger.check_push(amount, maturity),
            |_| self.custody.transfer_in(account, amount),
            |ledger, _| ledger.push(amount, maturity),
        )?;

        debug!(%account, %amount, %maturity, "deposit committed");
        Ok(StakeEvent::Deposited {
            account: account.clone(),
            amount,
            maturity,
        })
    }

    /// Release exactly `amount` of matured stake.
    pub fn withdraw(&self, account: &AccountId, amount: Amount) -> StakeResult<StakeEvent> {
        if amount.is_zero() {
            return Err(StakeError::InvalidAmount);
        }
        let now = self.clock.now();

        self.transact(
            account,
            |ledger| ledger.check_take_until(amount, now),
            |_| self.custody.transfer_out(account, amount),
            |ledger, _| ledger.take_until(amount, now),
        )?;

        debug!(%account, %amount, "withdraw committed");
        Ok(StakeEvent::Withdrawn {
            account: account.clone(),
            amount,
        })
    }

    /// Release all matured stake. `None` when nothing has matured.
    pub fn withdraw_max(&self, account: &AccountId) -> StakeResult<Option<StakeEvent>> {
        let now = self.clock.now();

        let taken = self.transact(
            account,
            |ledger| Ok(ledger.unlocked_at(now)),
            |taken| {
                if taken.is_zero() {
                    Ok(())
                } else {
                    self.custody.transfer_out(account, *taken)
                }
            },
            |ledger, _| {
                ledger.take_max_until(now);
                Ok(())
            },
        )?;

        if taken.is_zero() {
            return Ok(None);
        }
        debug!(%account, amount = %taken, "withdraw_max committed");
        Ok(Some(StakeEvent::Withdrawn {
            account: account.clone(),
            amount: taken,
        }))
    }

    /// Re-lock `amount` of matured stake for a fresh lock period.
    pub fn restake(&self, account: &AccountId, amount: Amount) -> StakeResult<StakeEvent> {
        if amount.is_zero() {
            return Err(StakeError::InvalidAmount);
        }
        let now = self.clock.now();
        let maturity = self.maturity_from_now()?;

        self.transact(
            account,
            |ledger| ledger.check_take_then_push(amount, now, amount, maturity),
            |_| Ok(()),
            |ledger, _| {
                ledger.take_until(amount, now)?;
                ledger.push(amount, maturity)
            },
        )?;

        debug!(%account, %amount, %maturity, "restake committed");
        Ok(StakeEvent::Restaked {
            account: account.clone(),
            amount,
            maturity,
        })
    }

    /// Re-lock all matured stake. `None` when nothing has matured.
    pub fn restake_max(&self, account: &AccountId) -> StakeResult<Option<StakeEvent>> {
        let now = self.clock.now();
        let maturity = self.maturity_from_now()?;

        let taken = self.transact(
            account,
            |ledger| {
                let taken = ledger.unlocked_at(now);
                if !taken.is_zero() {
                    ledger.check_take_then_push(taken, now, taken, maturity)?;
                }
                Ok(taken)
            },
            |_| Ok(()),
            |ledger, taken| {
                ledger.take_max_until(now);
                if taken.is_zero() {
                    Ok(())
                } else {
                    ledger.push(*taken, maturity)
                }
            },
        )?;

        if taken.is_zero() {
            return Ok(None);
        }
        debug!(%account, amount = %taken, %maturity, "restake_max committed");
        Ok(Some(StakeEvent::Restaked {
            account: account.clone(),
            amount: taken,
            maturity,
        }))
    }

    /// Lock `amount` for `account` until `maturity` on behalf of `operator`.
    ///
    /// Matured stake is consumed first, oldest first; only the shortfall is
    /// pulled from the account's external holdings. `maturity` may lie in
    /// the past but must not precede the queue's back after consumption.
    pub fn restake_or_deposit_at_for(
        &self,
        operator: &AccountId,
        account: &AccountId,
        amount: Amount,
        maturity: Timestamp,
    ) -> StakeResult<StakeEvent> {
        self.authorize(operator, Operation::RestakeOrDepositAtFor)?;
        if amount.is_zero() {
            return Err(StakeError::InvalidAmount);
        }
        let now = self.clock.now();

        let (restaked, deposited) = self.transact(
            account,
            |ledger| {
                let restaked = ledger.unlocked_at(now).min(amount);
                ledger.check_take_then_push(restaked, now, amount, maturity)?;
                Ok((restaked, amount.saturating_sub(restaked)))
            },
            |(_, deposited)| {
                if deposited.is_zero() {
                    Ok(())
                } else {
                    self.custody.transfer_in(account, *deposited)
                }
            },
            |ledger, (restaked, _)| {
                if !restaked.is_zero() {
                    ledger.take_until(*restaked, now)?;
                }
                ledger.push(amount, maturity)
            },
        )?;

        debug!(
            %operator,
            %account,
            %restaked,
            %deposited,
            %maturity,
            "restake_or_deposit_at_for committed"
        );
        Ok(StakeEvent::RestakedOrDeposited {
            operator: operator.clone(),
            account: account.clone(),
            restaked,
            deposited,
            maturity,
        })
    }

    /// Change the lock period applied to later deposits and restakes.
    pub fn set_lock_period_days(&self, caller: &AccountId, days: u32) -> StakeResult<StakeEvent> {
        self.authorize(caller, Operation::SetLockPeriod)?;
        let days = validate_lock_period(days)?;
        let previous_days = self.lock_period_days.swap(days, Ordering::SeqCst);

        debug!(%caller, previous_days, days, "lock period changed");
        Ok(StakeEvent::LockPeriodChanged {
            previous_days,
            days,
        })
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn authorize(&self, caller: &AccountId, operation: Operation) -> StakeResult<()> {
        if self.gate.is_authorized(caller, operation) {
            return Ok(());
        }
        warn!(%caller, %operation, "unauthorized privileged call");
        Err(StakeError::Unauthorized {
            caller: caller.clone(),
            operation,
        })
    }

    fn maturity_from_now(&self) -> StakeResult<Timestamp> {
        self.clock
            .now()
            .checked_add_days(self.lock_period_days())
            .ok_or(StakeError::Overflow)
    }

    /// Validate, settle custody, then apply the change in place.
    ///
    /// An account without a ledger is validated against an empty one, and
    /// its entry is only created once a non-empty ledger is committed. The
    /// map write lock is held for that first write so concurrent first
    /// writers to one account serialize.
    fn transact<T>(
        &self,
        account: &AccountId,
        check: impl FnOnce(&StakeLedger) -> StakeResult<T>,
        settle: impl FnOnce(&T) -> Result<(), CustodyError>,
        apply: impl FnOnce(&mut StakeLedger, &T) -> StakeResult<()>,
    ) -> StakeResult<T> {
        if let Some(handle) = self.ledger(account) {
            return commit(&mut lock(&handle), check, settle, apply);
        }

        let mut ledgers = self.write_ledgers();
        let raced = ledgers.get(account).cloned();
        if let Some(handle) = raced {
            drop(ledgers);
            return commit(&mut lock(&handle), check, settle, apply);
        }
        let mut ledger = StakeLedger::new();
        let outcome = commit(&mut ledger, check, settle, apply)?;
        if !ledger.is_empty() {
            ledgers.insert(account.clone(), Arc::new(Mutex::new(ledger)));
        }
        Ok(outcome)
    }

    fn view<T: Default>(&self, account: &AccountId, f: impl FnOnce(&StakeLedger) -> T) -> T {
        self.read_ledgers()
            .get(account)
            .map(|handle| f(&*lock(handle)))
            .unwrap_or_default()
    }

    fn ledger(&self, account: &AccountId) -> Option<LedgerHandle> {
        self.read_ledgers().get(account).cloned()
    }

    fn read_ledgers(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<AccountId, LedgerHandle>> {
        self.ledgers.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_ledgers(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<AccountId, LedgerHandle>> {
        self.ledgers.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Check against the ledger, move custody, then mutate. Nothing is
/// touched unless the first two steps succeed.
fn commit<T>(
    ledger: &mut StakeLedger,
    check: impl FnOnce(&StakeLedger) -> StakeResult<T>,
    settle: impl FnOnce(&T) -> Result<(), CustodyError>,
    apply: impl FnOnce(&mut StakeLedger, &T) -> StakeResult<()>,
) -> StakeResult<T> {
    let outcome = check(ledger)?;
    if let Err(err) = settle(&outcome) {
        warn!(error = %err, "custody transfer failed, ledger unchanged");
        return Err(err.into());
    }
    if let Err(err) = apply(ledger, &outcome) {
        error!(error = %err, "ledger rejected a validated change after custody settled");
        return Err(err);
    }
    Ok(outcome)
}

/// Ledgers are only mutated after validation and settlement, so a poisoned
/// mutex still guards a consistent ledger.
fn lock(handle: &Mutex<StakeLedger>) -> MutexGuard<'_, StakeLedger> {
    handle.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// TESTS
// =============================================================================
