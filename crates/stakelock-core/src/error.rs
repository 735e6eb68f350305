//! # Errors
//!
//! Every failure is synchronous and leaves ledger state unchanged.

use crate::collaborators::Operation;
use crate::{AccountId, Amount, Timestamp};
use thiserror::Error;

/// Errors raised by the deposit queue, the stake ledger and the manager.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StakeError {
    /// Zero amount where a positive one is required.
    #[error("amount must be greater than zero")]
    InvalidAmount,

    /// Requested more than the total stake, locked and unlocked.
    #[error("insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: Amount, available: Amount },

    /// Requested more than has matured as of the reference time.
    #[error("insufficient unlocked balance: requested {requested}, unlocked {unlocked}")]
    InsufficientUnlockedBalance { requested: Amount, unlocked: Amount },

    /// Privileged operation attempted by a caller without the grant.
    #[error("{caller} is not authorized to {operation}")]
    Unauthorized {
        caller: AccountId,
        operation: Operation,
    },

    /// Push with a maturity earlier than the current back of the queue.
    #[error("maturity {maturity} is earlier than queue back {back}")]
    OrderingViolation { maturity: Timestamp, back: Timestamp },

    /// Pop from an empty queue.
    #[error("deposit queue is empty")]
    EmptyQueue,

    #[error("lock period of {days} days is out of range")]
    InvalidLockPeriod { days: u32 },

    /// Arithmetic overflow on amounts or timestamps.
    #[error("arithmetic overflow")]
    Overflow,

    #[error("custody transfer failed: {0}")]
    Custody(#[from] CustodyError),
}

/// Errors raised by a custody collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CustodyError {
    /// The external wallet cannot cover a transfer into custody.
    #[error("{account} holds {available}, cannot transfer {requested}")]
    InsufficientFunds {
        account: AccountId,
        requested: Amount,
        available: Amount,
    },

    /// The custody reserve cannot cover a transfer out.
    #[error("custody reserve holds {available}, cannot release {requested}")]
    InsufficientReserve { requested: Amount, available: Amount },

    #[error("custody arithmetic overflow")]
    Overflow,
}

/// Result alias for ledger operations.
pub type StakeResult<T> = Result<T, StakeError>;
