use crate::{AccountId, Amount, CustodyError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

/// The fungible asset held on behalf of all stakers.
///
/// A failed transfer must leave both sides untouched.
pub trait Custody: Send + Sync {
    /// Move `amount` from `from`'s external holdings into custody.
    fn transfer_in(&self, from: &AccountId, amount: Amount) -> Result<(), CustodyError>;

    /// Release `amount` from custody to `to`.
    fn transfer_out(&self, to: &AccountId, amount: Amount) -> Result<(), CustodyError>;
}

impl<K: Custody + ?Sized> Custody for std::sync::Arc<K> {
    fn transfer_in(&self, from: &AccountId, amount: Amount) -> Result<(), CustodyError> {
        (**self).transfer_in(from, amount)
    }

    fn transfer_out(&self, to: &AccountId, amount: Amount) -> Result<(), CustodyError> {
        (**self).transfer_out(to, amount)
    }
}

/// Serializable state of an [`InMemoryCustody`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustodyState {
    /// External balances per account.
    pub wallets: BTreeMap<AccountId, Amount>,
    /// Amount held in custody.
    pub reserve: Amount,
}

/// Custody simulated with in-process wallets.
#[derive(Debug, Default)]
pub struct InMemoryCustody {
    state: Mutex<CustodyState>,
}

impl InMemoryCustody {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_state(state: CustodyState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    /// Credit `amount` to `account`'s external wallet.
    pub fn fund(&self, account: &AccountId, amount: Amount) -> Result<(), CustodyError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let wallet = state.wallets.entry(account.clone()).or_default();
        *wallet = wallet.checked_add(amount).ok_or(CustodyError::Overflow)?;
        Ok(())
    }

    #[must_use]
    pub fn wallet(&self, account: &AccountId) -> Amount {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.wallets.get(account).copied().unwrap_or_default()
    }

    #[must_use]
    pub fn reserve(&self) -> Amount {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .reserve
    }

    #[must_use]
    pub fn state(&self) -> CustodyState {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Custody for InMemoryCustody {
    fn transfer_in(&self, from: &AccountId, amount: Amount) -> Result<(), CustodyError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let available = state.wallets.get(from).copied().unwrap_or_default();
        let remaining = available
            .checked_sub(amount)
            .ok_or_else(|| CustodyError::InsufficientFunds {
                account: from.clone(),
                requested: amount,
                available,
            })?;
        let reserve = state
            .reserve
            .checked_add(amount)
            .ok_or(CustodyError::Overflow)?;

        state.wallets.insert(from.clone(), remaining);
        state.reserve = reserve;
        Ok(())
    }

    fn transfer_out(&self, to: &AccountId, amount: Amount) -> Result<(), CustodyError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let reserve =
            state
                .reserve
                .checked_sub(amount)
                .ok_or(CustodyError::InsufficientReserve {
                    requested: amount,
                    available: state.reserve,
                })?;
        let current = state.wallets.get(to).copied().unwrap_or_default();
        let credited = current.checked_add(amount).ok_or(CustodyError::Overflow)?;

        state.wallets.insert(to.clone(), credited);
        state.reserve = reserve;
        Ok(())
    }
}
