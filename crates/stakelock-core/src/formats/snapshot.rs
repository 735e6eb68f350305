use crate::queue::Deposit;
use crate::{AccountId, Amount};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

// =============================================================================
// SNAPSHOT
// =============================================================================

/// Plain-data image of a stake manager.
///
/// Deposits are listed front to back per account. Rebuilding a manager
/// from a snapshot re-validates ordering and amounts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeSnapshot {
    pub lock_period_days: u32,
    pub accounts: BTreeMap<AccountId, Vec<Deposit>>,
}

impl StakeSnapshot {
    /// Sum of every account's deposits (saturating).
    #[must_use]
    pub fn total_staked(&self) -> Amount {
        self.accounts
            .values()
            .flatten()
            .fold(Amount::zero(), |acc, d| acc.saturating_add(d.amount))
    }
}

// =============================================================================
// BINARY FORMAT
// =============================================================================

/// Magic bytes opening every encoded snapshot.
pub const SNAPSHOT_MAGIC: [u8; 4] = *b"STKL";

/// Current binary format version.
pub const SNAPSHOT_VERSION: u32 = 1;

const HEADER_LEN: usize = 8;

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("input shorter than snapshot header")]
    Truncated,

    #[error("bad snapshot magic")]
    BadMagic,

    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u32),

    #[error("snapshot body: {0}")]
    Body(#[from] postcard::Error),
}

/// Encode as `magic | version (u32 LE) | postcard body`.
pub fn encode_snapshot(snapshot: &StakeSnapshot) -> Result<Vec<u8>, FormatError> {
    let mut out = Vec::with_capacity(HEADER_LEN);
    out.extend_from_slice(&SNAPSHOT_MAGIC);
    out.extend_from_slice(&SNAPSHOT_VERSION.to_le_bytes());
    postcard::to_extend(snapshot, out).map_err(FormatError::from)
}

pub fn decode_snapshot(bytes: &[u8]) -> Result<StakeSnapshot, FormatError> {
    let (header, body) = bytes
        .split_at_checked(HEADER_LEN)
        .ok_or(FormatError::Truncated)?;
    let (magic, version) = header.split_at(4);
    if magic != SNAPSHOT_MAGIC {
        return Err(FormatError::BadMagic);
    }
    let mut version_bytes = [0u8; 4];
    version_bytes.copy_from_slice(version);
    let version = u32::from_le_bytes(version_bytes);
    if version != SNAPSHOT_VERSION {
        return Err(FormatError::UnsupportedVersion(version));
    }
    Ok(postcard::from_bytes(body)?)
}
