//! # Deposit Queue
//!
//! FIFO sequence of `(amount, maturity)` entries for one account.
//!
//! Invariants held by every method:
//! - maturities are non-decreasing front to back
//! - at most one entry per maturity (a push at the back maturity merges)
//! - every retained entry has a non-zero amount
//! - the cached total equals the sum of all entry amounts
//!
//! Pushes go to the back, consumption comes from the front. Backed by a
//! `VecDeque`, so `push_back` and `pop_front` are amortized O(1).

use crate::{Amount, StakeError, StakeResult, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

// =============================================================================
// DEPOSIT
// =============================================================================

/// A single maturity-dated deposit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deposit {
    pub amount: Amount,
    /// Time at which this amount becomes unlocked.
    pub maturity: Timestamp,
}

impl Deposit {
    #[must_use]
    pub fn new(amount: Amount, maturity: Timestamp) -> Self {
        Self { amount, maturity }
    }

    /// Unlocked as of `at` (maturity has been reached).
    #[must_use]
    pub fn is_unlocked_at(&self, at: Timestamp) -> bool {
        self.maturity <= at
    }
}

// =============================================================================
// DEPOSIT QUEUE
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DepositQueue {
    entries: VecDeque<Deposit>,
    total: Amount,
}

impl DepositQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a queue by pushing `deposits` in order.
    ///
    /// Rejects zero amounts and out-of-order maturities exactly like
    /// [`DepositQueue::push_back`]; adjacent equal maturities are merged.
    pub fn from_deposits<I>(deposits: I) -> StakeResult<Self>
    where
        I: IntoIterator<Item = Deposit>,
    {
        let mut queue = Self::new();
        for deposit in deposits {
            queue.push_back(deposit.amount, deposit.maturity)?;
        }
        Ok(queue)
    }

    /// Append `amount` maturing at `maturity`.
    ///
    /// Merges into the back entry when the maturities are equal.
    pub fn push_back(&mut self, amount: Amount, maturity: Timestamp) -> StakeResult<()> {
        self.check_push(amount, maturity)?;

        // Cannot overflow: checked above.
        self.total = self.total.saturating_add(amount);
        match self.entries.back_mut() {
            Some(back) if maturity == back.maturity => {
                back.amount = back.amount.saturating_add(amount);
            }
            _ => self.entries.push_back(Deposit::new(amount, maturity)),
        }
        Ok(())
    }

    /// Validate a [`DepositQueue::push_back`] without mutating.
    pub fn check_push(&self, amount: Amount, maturity: Timestamp) -> StakeResult<()> {
        if amount.is_zero() {
            return Err(StakeError::InvalidAmount);
        }
        self.total.checked_add(amount).ok_or(StakeError::Overflow)?;
        match self.entries.back() {
            Some(back) if maturity < back.maturity => Err(StakeError::OrderingViolation {
                maturity,
                back: back.maturity,
            }),
            _ => Ok(()),
        }
    }

    /// Place `amount` at its maturity-ordered position.
    ///
    /// Merges with an existing entry of equal maturity anywhere in the
    /// queue. O(n); the manager flows only ever use [`DepositQueue::push_back`].
    pub fn insert(&mut self, amount: Amount, maturity: Timestamp) -> StakeResult<()> {
        if amount.is_zero() {
            return Err(StakeError::InvalidAmount);
        }
        let total = self
            .total
            .checked_add(amount)
            .ok_or(StakeError::Overflow)?;

        let idx = self.entries.partition_point(|d| d.maturity < maturity);
        match self.entries.get_mut(idx) {
            Some(existing) if existing.maturity == maturity => {
                existing.amount = existing.amount.saturating_add(amount);
            }
            _ => self.entries.insert(idx, Deposit::new(amount, maturity)),
        }

        self.total = total;
        Ok(())
    }

    /// Remove and return the front entry.
    pub fn pop_front(&mut self) -> StakeResult<Deposit> {
        let front = self.entries.pop_front().ok_or(StakeError::EmptyQueue)?;
        self.total = self.total.saturating_sub(front.amount);
        Ok(front)
    }

    /// Consume exactly `amount` from entries maturing at or before `cutoff`,
    /// oldest first.
    ///
    /// Entries maturing after `cutoff` are never touched. Fails without
    /// mutating when the matured sum is short, even if the total would
    /// cover `amount`.
    pub fn take_until(&mut self, amount: Amount, cutoff: Timestamp) -> StakeResult<()> {
        self.check_take_until(amount, cutoff)?;
        self.consume_front(amount);
        Ok(())
    }

    /// Validate a [`DepositQueue::take_until`] without mutating.
    pub fn check_take_until(&self, amount: Amount, cutoff: Timestamp) -> StakeResult<()> {
        if amount.is_zero() {
            return Err(StakeError::InvalidAmount);
        }
        if amount > self.total {
            return Err(StakeError::InsufficientBalance {
                requested: amount,
                available: self.total,
            });
        }
        let unlocked = self.balance_until(cutoff);
        if amount > unlocked {
            return Err(StakeError::InsufficientUnlockedBalance {
                requested: amount,
                unlocked,
            });
        }
        Ok(())
    }

    /// Validate `take_until(take, cutoff)` followed by `push_back(amount, maturity)`.
    ///
    /// A zero `take` is skipped. Taking only shortens the queue from the
    /// front, so the back entry stays in place unless the queue drains.
    pub fn check_take_then_push(
        &self,
        take: Amount,
        cutoff: Timestamp,
        amount: Amount,
        maturity: Timestamp,
    ) -> StakeResult<()> {
        if take.is_zero() {
            return self.check_push(amount, maturity);
        }
        self.check_take_until(take, cutoff)?;
        if amount.is_zero() {
            return Err(StakeError::InvalidAmount);
        }
        let remaining = self.total.saturating_sub(take);
        remaining.checked_add(amount).ok_or(StakeError::Overflow)?;
        match self.entries.back() {
            Some(back) if !remaining.is_zero() && maturity < back.maturity => {
                Err(StakeError::OrderingViolation {
                    maturity,
                    back: back.maturity,
                })
            }
            _ => Ok(()),
        }
    }

    /// Consume everything maturing at or before `cutoff`.
    ///
    /// Returns the amount taken, zero when nothing has matured.
    pub fn take_max_until(&mut self, cutoff: Timestamp) -> Amount {
        let mut taken = Amount::zero();
        while let Some(front) = self.entries.front() {
            if !front.is_unlocked_at(cutoff) {
                break;
            }
            taken = taken.saturating_add(front.amount);
            self.entries.pop_front();
        }
        self.total = self.total.saturating_sub(taken);
        taken
    }

    /// Take `amount` from the front. Caller has checked the matured sum.
    fn consume_front(&mut self, amount: Amount) {
        let mut remaining = amount;
        while !remaining.is_zero() {
            let Some(front) = self.entries.front_mut() else {
                break;
            };
            if front.amount <= remaining {
                remaining = remaining.saturating_sub(front.amount);
                self.entries.pop_front();
            } else {
                front.amount = front.amount.saturating_sub(remaining);
                remaining = Amount::zero();
            }
        }
        self.total = self.total.saturating_sub(amount);
    }

    /// Sum of all entries.
    #[must_use]
    pub fn balance(&self) -> Amount {
        self.total
    }

    /// Sum of entries with `maturity <= cutoff`.
    #[must_use]
    pub fn balance_until(&self, cutoff: Timestamp) -> Amount {
        self.entries
            .iter()
            .take_while(|d| d.is_unlocked_at(cutoff))
            .fold(Amount::zero(), |acc, d| acc.saturating_add(d.amount))
    }

    /// Sum of entries with `maturity > cutoff`.
    #[must_use]
    pub fn balance_from(&self, cutoff: Timestamp) -> Amount {
        self.total.saturating_sub(self.balance_until(cutoff))
    }

    #[must_use]
    pub fn front(&self) -> Option<&Deposit> {
        self.entries.front()
    }

    #[must_use]
    pub fn back(&self) -> Option<&Deposit> {
        self.entries.back()
    }

    /// Entries front to back.
    pub fn iter(&self) -> impl Iterator<Item = &Deposit> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for DepositQueue {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.entries.iter())
    }
}

impl<'de> Deserialize<'de> for DepositQueue {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let deposits = Vec::<Deposit>::deserialize(deserializer)?;
        Self::from_deposits(deposits).map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn amt(raw: u128) -> Amount {
        Amount::new(raw)
    }

    fn ts(secs: u64) -> Timestamp {
        Timestamp(secs)
    }

    fn contents(queue: &DepositQueue) -> Vec<(u128, u64)> {
        queue
            .iter()
            .map(|d| (d.amount.raw(), d.maturity.secs()))
            .collect()
    }

    #[test]
    fn push_appends_in_order() -> StakeResult<()> {
        let mut q = DepositQueue::new();
        q.push_back(amt(1), ts(1))?;
        q.push_back(amt(2), ts(2))?;
        q.push_back(amt(3), ts(3))?;

        assert_eq!(contents(&q), vec![(1, 1), (2, 2), (3, 3)]);
        assert_eq!(q.balance(), amt(6));
        Ok(())
    }

    #[test]
    fn push_same_maturity_merges() -> StakeResult<()> {
        let mut q = DepositQueue::new();
        q.push_back(amt(1), ts(5))?;
        q.push_back(amt(4), ts(5))?;

        assert_eq!(q.len(), 1);
        assert_eq!(contents(&q), vec![(5, 5)]);
        Ok(())
    }

    #[test]
    fn push_earlier_maturity_is_rejected() -> StakeResult<()> {
        let mut q = DepositQueue::new();
        q.push_back(amt(3), ts(3))?;

        let err = q.push_back(amt(2), ts(2));
        assert_eq!(
            err,
            Err(StakeError::OrderingViolation {
                maturity: ts(2),
                back: ts(3)
            })
        );
        assert_eq!(contents(&q), vec![(3, 3)]);
        Ok(())
    }

    #[test]
    fn insert_places_out_of_order_maturity() -> StakeResult<()> {
        let mut q = DepositQueue::new();
        q.insert(amt(1), ts(1))?;
        q.insert(amt(3), ts(3))?;
        q.insert(amt(2), ts(2))?;
        q.insert(amt(4), ts(2))?;

        assert_eq!(contents(&q), vec![(1, 1), (6, 2), (3, 3)]);
        assert_eq!(q.balance(), amt(10));
        Ok(())
    }

    #[test]
    fn push_zero_is_invalid() {
        let mut q = DepositQueue::new();
        assert_eq!(q.push_back(Amount::zero(), ts(1)), Err(StakeError::InvalidAmount));
        assert!(q.is_empty());
    }

    #[test]
    fn push_overflow_leaves_queue_untouched() -> StakeResult<()> {
        let mut q = DepositQueue::new();
        q.push_back(amt(u128::MAX), ts(1))?;
        assert_eq!(q.push_back(amt(1), ts(2)), Err(StakeError::Overflow));
        assert_eq!(q.len(), 1);
        Ok(())
    }

    #[test]
    fn pop_front_returns_oldest() -> StakeResult<()> {
        let mut q = DepositQueue::new();
        q.push_back(amt(1), ts(1))?;
        q.push_back(amt(2), ts(2))?;

        assert_eq!(q.pop_front()?, Deposit::new(amt(1), ts(1)));
        assert_eq!(q.balance(), amt(2));
        assert_eq!(q.pop_front()?, Deposit::new(amt(2), ts(2)));
        assert_eq!(q.pop_front(), Err(StakeError::EmptyQueue));
        Ok(())
    }

    #[test]
    fn take_until_splits_front_entry() -> StakeResult<()> {
        let mut q = DepositQueue::new();
        q.push_back(amt(10), ts(1))?;
        q.push_back(amt(20), ts(2))?;
        q.push_back(amt(30), ts(3))?;

        q.take_until(amt(5), ts(2))?;
        assert_eq!(contents(&q), vec![(5, 1), (20, 2), (30, 3)]);

        q.take_until(amt(15), ts(2))?;
        assert_eq!(contents(&q), vec![(10, 2), (30, 3)]);
        assert_eq!(q.balance(), amt(40));
        Ok(())
    }

    #[test]
    fn take_until_ignores_locked_entries() -> StakeResult<()> {
        let mut q = DepositQueue::new();
        q.push_back(amt(1), ts(1))?;
        q.push_back(amt(100), ts(10))?;

        let err = q.take_until(amt(2), ts(5));
        assert_eq!(
            err,
            Err(StakeError::InsufficientUnlockedBalance {
                requested: amt(2),
                unlocked: amt(1)
            })
        );
        assert_eq!(contents(&q), vec![(1, 1), (100, 10)]);
        Ok(())
    }

    #[test]
    fn take_until_beyond_total_is_insufficient_balance() -> StakeResult<()> {
        let mut q = DepositQueue::new();
        q.push_back(amt(3), ts(1))?;

        assert_eq!(
            q.take_until(amt(4), ts(100)),
            Err(StakeError::InsufficientBalance {
                requested: amt(4),
                available: amt(3)
            })
        );
        assert_eq!(q.take_until(Amount::zero(), ts(100)), Err(StakeError::InvalidAmount));
        Ok(())
    }

    #[test]
    fn take_max_until_drains_matured_prefix() -> StakeResult<()> {
        let mut q = DepositQueue::new();
        q.push_back(amt(1), ts(1))?;
        q.push_back(amt(2), ts(2))?;
        q.push_back(amt(3), ts(3))?;

        assert_eq!(q.take_max_until(ts(2)), amt(3));
        assert_eq!(contents(&q), vec![(3, 3)]);
        assert_eq!(q.take_max_until(ts(2)), Amount::zero());
        assert_eq!(q.balance(), amt(3));
        Ok(())
    }

    #[test]
    fn balance_views_split_at_cutoff() -> StakeResult<()> {
        let mut q = DepositQueue::new();
        q.push_back(amt(1), ts(1))?;
        q.push_back(amt(2), ts(2))?;
        q.push_back(amt(3), ts(3))?;

        assert_eq!(q.balance_until(ts(0)), Amount::zero());
        assert_eq!(q.balance_until(ts(2)), amt(3));
        assert_eq!(q.balance_from(ts(2)), amt(3));
        assert_eq!(q.balance_until(ts(3)), amt(6));
        assert_eq!(q.balance_from(ts(3)), Amount::zero());
        Ok(())
    }

    #[test]
    fn check_take_then_push_matches_applying_both() -> StakeResult<()> {
        let mut q = DepositQueue::new();
        q.push_back(amt(2), ts(1))?;
        q.push_back(amt(3), ts(5))?;

        // Back survives a partial take.
        assert_eq!(
            q.check_take_then_push(amt(2), ts(1), amt(2), ts(4)),
            Err(StakeError::OrderingViolation {
                maturity: ts(4),
                back: ts(5)
            })
        );
        assert_eq!(q.check_take_then_push(amt(2), ts(1), amt(2), ts(5)), Ok(()));

        // A drained queue accepts any maturity.
        assert_eq!(q.check_take_then_push(amt(5), ts(5), amt(1), ts(0)), Ok(()));
        let mut drained = q.clone();
        drained.take_until(amt(5), ts(5))?;
        drained.push_back(amt(1), ts(0))?;
        assert_eq!(contents(&drained), vec![(1, 0)]);

        assert_eq!(
            q.check_take_then_push(amt(3), ts(1), amt(1), ts(9)),
            Err(StakeError::InsufficientUnlockedBalance {
                requested: amt(3),
                unlocked: amt(2)
            })
        );
        assert_eq!(contents(&q), vec![(2, 1), (3, 5)]);
        Ok(())
    }

    #[test]
    fn deserialize_validates_order() {
        let bad = vec![Deposit::new(amt(1), ts(5)), Deposit::new(amt(1), ts(4))];
        let bytes = postcard::to_allocvec(&bad).unwrap_or_default();
        let decoded: Result<DepositQueue, _> = postcard::from_bytes(&bytes);
        assert!(decoded.is_err());
    }
}
