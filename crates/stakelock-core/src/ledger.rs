//! # Stake Ledger
//!
//! Per-account view over a [`DepositQueue`].
//!
//! The ledger adds the time-relative vocabulary (locked, unlocked, next
//! maturity) on top of the raw queue primitives and delegates every
//! mutation to the queue. An empty ledger is a valid terminal state.

use crate::queue::{Deposit, DepositQueue};
use crate::{Amount, StakeResult, Timestamp};
use serde::{Deserialize, Serialize};

/// Stake held by one account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StakeLedger {
    queue: DepositQueue,
}

impl StakeLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an already validated queue.
    #[must_use]
    pub fn from_queue(queue: DepositQueue) -> Self {
        Self { queue }
    }

    #[must_use]
    pub fn queue(&self) -> &DepositQueue {
        &self.queue
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn balance(&self) -> Amount {
        self.queue.balance()
    }

    #[must_use]
    pub fn balance_until(&self, t: Timestamp) -> Amount {
        self.queue.balance_until(t)
    }

    #[must_use]
    pub fn balance_from(&self, t: Timestamp) -> Amount {
        self.queue.balance_from(t)
    }

    /// Matured stake as of `now`.
    #[must_use]
    pub fn unlocked_at(&self, now: Timestamp) -> Amount {
        self.queue.balance_until(now)
    }

    /// Stake still locked as of `now`.
    #[must_use]
    pub fn locked_at(&self, now: Timestamp) -> Amount {
        self.queue.balance_from(now)
    }

    /// Earliest maturity still in the future as of `now`.
    #[must_use]
    pub fn next_maturity(&self, now: Timestamp) -> Option<Timestamp> {
        self.queue
            .iter()
            .map(|d| d.maturity)
            .find(|maturity| *maturity > now)
    }

    /// Front-to-back copy of the deposits.
    #[must_use]
    pub fn deposits(&self) -> Vec<Deposit> {
        self.queue.iter().copied().collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    // -------------------------------------------------------------------------
    // Mutations
    // -------------------------------------------------------------------------

    pub fn push(&mut self, amount: Amount, maturity: Timestamp) -> StakeResult<()> {
        self.queue.push_back(amount, maturity)
    }

    pub fn take_until(&mut self, amount: Amount, cutoff: Timestamp) -> StakeResult<()> {
        self.queue.take_until(amount, cutoff)
    }

    pub fn take_max_until(&mut self, cutoff: Timestamp) -> Amount {
        self.queue.take_max_until(cutoff)
    }

    // -------------------------------------------------------------------------
    // Validation
    // -------------------------------------------------------------------------

    pub fn check_push(&self, amount: Amount, maturity: Timestamp) -> StakeResult<()> {
        self.queue.check_push(amount, maturity)
    }

    pub fn check_take_until(&self, amount: Amount, cutoff: Timestamp) -> StakeResult<()> {
        self.queue.check_take_until(amount, cutoff)
    }

    /// Validate a take from matured stake followed by a push at `maturity`.
    pub fn check_take_then_push(
        &self,
        take: Amount,
        cutoff: Timestamp,
        amount: Amount,
        maturity: Timestamp,
    ) -> StakeResult<()> {
        self.queue.check_take_then_push(take, cutoff, amount, maturity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StakeError;

    #[test]
    fn locked_and_unlocked_views() -> Result<(), StakeError> {
        let mut ledger = StakeLedger::new();
        ledger.push(Amount::new(5), Timestamp(10))?;
        ledger.push(Amount::new(7), Timestamp(20))?;

        assert_eq!(ledger.unlocked_at(Timestamp(9)), Amount::zero());
        assert_eq!(ledger.unlocked_at(Timestamp(10)), Amount::new(5));
        assert_eq!(ledger.locked_at(Timestamp(10)), Amount::new(7));
        assert_eq!(ledger.balance(), Amount::new(12));
        Ok(())
    }

    #[test]
    fn next_maturity_skips_matured_entries() -> Result<(), StakeError> {
        let mut ledger = StakeLedger::new();
        assert_eq!(ledger.next_maturity(Timestamp(0)), None);

        ledger.push(Amount::new(1), Timestamp(10))?;
        ledger.push(Amount::new(1), Timestamp(20))?;

        assert_eq!(ledger.next_maturity(Timestamp(0)), Some(Timestamp(10)));
        assert_eq!(ledger.next_maturity(Timestamp(10)), Some(Timestamp(20)));
        assert_eq!(ledger.next_maturity(Timestamp(20)), None);
        Ok(())
    }

    #[test]
    fn drained_ledger_is_empty_not_gone() -> Result<(), StakeError> {
        let mut ledger = StakeLedger::new();
        ledger.push(Amount::new(3), Timestamp(1))?;
        assert_eq!(ledger.take_max_until(Timestamp(1)), Amount::new(3));

        assert!(ledger.is_empty());
        assert_eq!(ledger.balance(), Amount::zero());
        assert!(ledger.deposits().is_empty());
        Ok(())
    }
}
