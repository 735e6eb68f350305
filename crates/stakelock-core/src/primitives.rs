//! # Primitives
//!
//! Value types shared by every layer of the ledger.
//!
//! - `Amount`: 18-decimal fixed-point quantity over `u128`
//! - `Timestamp`: seconds since the Unix epoch
//! - `AccountId`: opaque account identifier
//!
//! No floating-point arithmetic anywhere. All arithmetic is checked or
//! saturating so nothing in this module can panic.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// =============================================================================
// CONSTANTS
// =============================================================================

/// Number of decimal places carried by [`Amount`].
pub const AMOUNT_DECIMALS: u32 = 18;

/// Seconds in one lock-period day.
pub const SECONDS_PER_DAY: u64 = 86_400;

/// Upper bound for the configurable lock period (100 years).
pub const MAX_LOCK_PERIOD_DAYS: u32 = 36_500;

// =============================================================================
// AMOUNT
// =============================================================================

/// Fixed-point token quantity.
///
/// The raw value counts the smallest unit; `Amount::UNIT` raw units make one
/// whole token.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(u128);

impl Amount {
    /// One whole token.
    pub const UNIT: u128 = 1_000_000_000_000_000_000;

    /// Create an amount from raw smallest units.
    #[must_use]
    pub const fn new(raw: u128) -> Self {
        Self(raw)
    }

    /// Create an amount of `whole` tokens, `None` on overflow.
    #[must_use]
    pub const fn from_whole(whole: u64) -> Option<Self> {
        match (whole as u128).checked_mul(Self::UNIT) {
            Some(raw) => Some(Self(raw)),
            None => None,
        }
    }

    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }

    /// Raw smallest-unit value.
    #[must_use]
    pub const fn raw(self) -> u128 {
        self.0
    }

    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    #[must_use]
    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    #[must_use]
    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    #[must_use]
    pub fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }
}

impl fmt::Display for Amount {
    /// Shortest exact decimal form: `1`, `0.5`, `12.000000000000000001`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / Self::UNIT;
        let frac = self.0 % Self::UNIT;
        if frac == 0 {
            return write!(f, "{whole}");
        }
        let digits = format!("{frac:018}");
        write!(f, "{whole}.{}", digits.trim_end_matches('0'))
    }
}

/// Errors from parsing a decimal amount string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseAmountError {
    #[error("empty amount")]
    Empty,

    #[error("invalid character in amount: {0:?}")]
    InvalidDigit(char),

    #[error("amount has more than 18 fractional digits")]
    TooPrecise,

    #[error("amount out of range")]
    Overflow,
}

impl FromStr for Amount {
    type Err = ParseAmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ParseAmountError::Empty);
        }

        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        if whole.is_empty() && frac.is_empty() {
            return Err(ParseAmountError::Empty);
        }
        if frac.len() > AMOUNT_DECIMALS as usize {
            return Err(ParseAmountError::TooPrecise);
        }

        let mut raw: u128 = 0;
        for c in whole.chars().chain(frac.chars()) {
            let digit = c.to_digit(10).ok_or(ParseAmountError::InvalidDigit(c))?;
            raw = raw
                .checked_mul(10)
                .and_then(|r| r.checked_add(u128::from(digit)))
                .ok_or(ParseAmountError::Overflow)?;
        }

        // Scale up the fraction digits that were not written.
        let missing = AMOUNT_DECIMALS.saturating_sub(frac.len() as u32);
        let scale = 10u128.pow(missing);
        raw.checked_mul(scale)
            .map(Self)
            .ok_or(ParseAmountError::Overflow)
    }
}

// =============================================================================
// TIMESTAMP
// =============================================================================

/// Seconds since the Unix epoch.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(pub u64);

impl Timestamp {
    #[must_use]
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs)
    }

    /// Timestamp at the start of `day` (day 0 is the epoch).
    #[must_use]
    pub const fn from_days(day: u64) -> Self {
        Self(day.saturating_mul(SECONDS_PER_DAY))
    }

    #[must_use]
    pub const fn secs(self) -> u64 {
        self.0
    }

    /// `self + days`, `None` on overflow.
    #[must_use]
    pub fn checked_add_days(self, days: u32) -> Option<Self> {
        u64::from(days)
            .checked_mul(SECONDS_PER_DAY)
            .and_then(|delta| self.0.checked_add(delta))
            .map(Self)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// ACCOUNT
// =============================================================================

/// Identifier of a stake holder or privileged operator.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

// =============================================================================
// TESTS
// =============================================================================
