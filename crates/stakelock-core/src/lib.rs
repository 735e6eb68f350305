//! # Stakelock Core
//!
//! Maturity-dated stake ledger.
//!
//! Each account owns a FIFO [`DepositQueue`] of `(amount, maturity)` entries.
//! The [`StakeManager`] locks fresh deposits for a configurable number of
//! days, releases matured stake, and re-locks it without moving custody.
//!
//! ## Layers
//!
//! ```text
//! StakeManager   lock-period policy, custody coupling, authorization
//!      │
//! StakeLedger    balance / locked / unlocked views per account
//!      │
//! DepositQueue   push_back, pop_front, take_until, take_max_until
//! ```
//!
//! Time, custody and authorization are injected through the traits in
//! [`collaborators`]. All amounts are exact fixed-point integers.

pub mod collaborators;
pub mod error;
pub mod event;
pub mod formats;
pub mod ledger;
pub mod manager;
pub mod primitives;
pub mod queue;
pub mod storage;

pub use collaborators::{
    AuthorizationGate, Clock, Custody, CustodyState, InMemoryCustody, ManualClock, Operation,
    RoleGate, SystemClock,
};
pub use error::{CustodyError, StakeError, StakeResult};
pub use event::StakeEvent;
pub use formats::{StakeSnapshot, decode_snapshot, encode_snapshot};
pub use ledger::StakeLedger;
pub use manager::{DEFAULT_LOCK_PERIOD_DAYS, ManagerConfig, StakeManager};
pub use primitives::{
    AMOUNT_DECIMALS, AccountId, Amount, MAX_LOCK_PERIOD_DAYS, ParseAmountError, SECONDS_PER_DAY,
    Timestamp,
};
pub use queue::{Deposit, DepositQueue};
pub use storage::{RedbStore, StoreError};
