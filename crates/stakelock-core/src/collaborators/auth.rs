use crate::AccountId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::sync::{PoisonError, RwLock};

/// Operations that require an authorization grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operation {
    RestakeOrDepositAtFor,
    SetLockPeriod,
}

impl Operation {
    pub const ALL: [Operation; 2] = [Operation::RestakeOrDepositAtFor, Operation::SetLockPeriod];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::RestakeOrDepositAtFor => "restake-or-deposit-at-for",
            Operation::SetLockPeriod => "set-lock-period",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| format!("unknown operation: {s}"))
    }
}

/// Decides whether `caller` may run a privileged `operation`.
pub trait AuthorizationGate: Send + Sync {
    fn is_authorized(&self, caller: &AccountId, operation: Operation) -> bool;
}

impl<A: AuthorizationGate + ?Sized> AuthorizationGate for std::sync::Arc<A> {
    fn is_authorized(&self, caller: &AccountId, operation: Operation) -> bool {
        (**self).is_authorized(caller, operation)
    }
}

/// Per-operation grant sets.
#[derive(Debug, Default)]
pub struct RoleGate {
    grants: RwLock<BTreeMap<Operation, BTreeSet<AccountId>>>,
}

impl RoleGate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Gate with every operation granted to `admin`.
    #[must_use]
    pub fn with_admin(admin: &AccountId) -> Self {
        let gate = Self::new();
        gate.grant_all(admin);
        gate
    }

    #[must_use]
    pub fn from_grants(grants: BTreeMap<Operation, BTreeSet<AccountId>>) -> Self {
        Self {
            grants: RwLock::new(grants),
        }
    }

    pub fn grant(&self, account: &AccountId, operation: Operation) {
        self.grants
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(operation)
            .or_default()
            .insert(account.clone());
    }

    pub fn grant_all(&self, account: &AccountId) {
        for op in Operation::ALL {
            self.grant(account, op);
        }
    }

    /// Returns whether a grant was removed.
    pub fn revoke(&self, account: &AccountId, operation: Operation) -> bool {
        self.grants
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(&operation)
            .is_some_and(|set| set.remove(account))
    }

    #[must_use]
    pub fn grants(&self) -> BTreeMap<Operation, BTreeSet<AccountId>> {
        self.grants
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl AuthorizationGate for RoleGate {
    fn is_authorized(&self, caller: &AccountId, operation: Operation) -> bool {
        self.grants
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&operation)
            .is_some_and(|set| set.contains(caller))
    }
}
