//! # Events
//!
//! Outcome records returned by committed manager mutations.
//!
//! A mutation that changes nothing (for example `withdraw_max` with no
//! matured stake) produces no event.

use crate::{AccountId, Amount, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StakeEvent {
    /// Fresh stake pulled into custody and locked.
    Deposited {
        account: AccountId,
        amount: Amount,
        maturity: Timestamp,
    },

    /// Matured stake released from custody.
    Withdrawn { account: AccountId, amount: Amount },

    /// Matured stake re-locked without moving custody.
    Restaked {
        account: AccountId,
        amount: Amount,
        maturity: Timestamp,
    },

    /// Operator top-up: `restaked` came from matured stake, `deposited`
    /// was pulled from the account's external holdings.
    RestakedOrDeposited {
        operator: AccountId,
        account: AccountId,
        restaked: Amount,
        deposited: Amount,
        maturity: Timestamp,
    },

    LockPeriodChanged { previous_days: u32, days: u32 },
}

impl StakeEvent {
    /// Account whose stake changed, if any.
    #[must_use]
    pub fn account(&self) -> Option<&AccountId> {
        match self {
            StakeEvent::Deposited { account, .. }
            | StakeEvent::Withdrawn { account, .. }
            | StakeEvent::Restaked { account, .. }
            | StakeEvent::RestakedOrDeposited { account, .. } => Some(account),
            StakeEvent::LockPeriodChanged { .. } => None,
        }
    }
}

impl fmt::Display for StakeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StakeEvent::Deposited {
                account,
                amount,
                maturity,
            } => write!(f, "{account} deposited {amount} until {maturity}"),
            StakeEvent::Withdrawn { account, amount } => {
                write!(f, "{account} withdrew {amount}")
            }
            StakeEvent::Restaked {
                account,
                amount,
                maturity,
            } => write!(f, "{account} restaked {amount} until {maturity}"),
            StakeEvent::RestakedOrDeposited {
                operator,
                account,
                restaked,
                deposited,
                maturity,
            } => write!(
                f,
                "{operator} locked {account}: restaked {restaked}, deposited {deposited} until {maturity}"
            ),
            StakeEvent::LockPeriodChanged {
                previous_days,
                days,
            } => write!(f, "lock period changed from {previous_days} to {days} days"),
        }
    }
}
