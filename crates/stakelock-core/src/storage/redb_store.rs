use crate::formats::StakeSnapshot;
use crate::queue::Deposit;
use crate::AccountId;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition, WriteTransaction};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

// =============================================================================
// TABLES
// =============================================================================

/// account -> postcard `Vec<Deposit>`, front to back.
const LEDGERS: TableDefinition<&str, &[u8]> = TableDefinition::new("ledgers");

/// Scalar settings.
const META: TableDefinition<&str, u64> = TableDefinition::new("meta");

/// Opaque postcard values owned by the host (custody, grants).
const BLOBS: TableDefinition<&str, &[u8]> = TableDefinition::new("blobs");

const LOCK_PERIOD_KEY: &str = "lock_period_days";

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("transaction: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("table: {0}")]
    Table(#[from] redb::TableError),

    #[error("storage: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("commit: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("encoding: {0}")]
    Encoding(#[from] postcard::Error),

    #[error("stored lock period {0} does not fit in u32")]
    CorruptLockPeriod(u64),
}

// =============================================================================
// STORE
// =============================================================================

/// Stake state persisted in a single redb file.
pub struct RedbStore {
    db: Database,
}

impl RedbStore {
    /// Create (or open) the database at `path` and ensure all tables exist.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = Database::create(path)?;
        let store = Self { db };
        store.ensure_tables()?;
        Ok(store)
    }

    /// Open an existing database.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = Database::open(path)?;
        let store = Self { db };
        store.ensure_tables()?;
        Ok(store)
    }

    fn ensure_tables(&self) -> Result<(), StoreError> {
        let txn = self.db.begin_write()?;
        {
            txn.open_table(LEDGERS)?;
            txn.open_table(META)?;
            txn.open_table(BLOBS)?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Replace every stored ledger and the lock period in one transaction.
    ///
    /// Accounts absent from `snapshot` are removed.
    pub fn save_snapshot(&self, snapshot: &StakeSnapshot) -> Result<(), StoreError> {
        let txn = self.db.begin_write()?;
        write_snapshot(&txn, snapshot)?;
        txn.commit()?;
        Ok(())
    }

    /// Save `snapshot` and one blob atomically.
    pub fn save_snapshot_with_blob<T: Serialize>(
        &self,
        snapshot: &StakeSnapshot,
        key: &str,
        value: &T,
    ) -> Result<(), StoreError> {
        let bytes = postcard::to_allocvec(value)?;
        let txn = self.db.begin_write()?;
        write_snapshot(&txn, snapshot)?;
        {
            let mut blobs = txn.open_table(BLOBS)?;
            blobs.insert(key, bytes.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Load every ledger and the lock period.
    ///
    /// A fresh database yields an empty snapshot with a zero lock period.
    pub fn load_snapshot(&self) -> Result<StakeSnapshot, StoreError> {
        let txn = self.db.begin_read()?;

        let meta = txn.open_table(META)?;
        let raw_days = meta
            .get(LOCK_PERIOD_KEY)?
            .map(|guard| guard.value())
            .unwrap_or_default();
        let lock_period_days =
            u32::try_from(raw_days).map_err(|_| StoreError::CorruptLockPeriod(raw_days))?;

        let ledgers = txn.open_table(LEDGERS)?;
        let mut accounts = BTreeMap::new();
        for entry in ledgers.iter()? {
            let (key, value) = entry?;
            let deposits: Vec<Deposit> = postcard::from_bytes(value.value())?;
            accounts.insert(AccountId::new(key.value()), deposits);
        }

        Ok(StakeSnapshot {
            lock_period_days,
            accounts,
        })
    }

    /// Whether a lock period has ever been saved.
    pub fn is_initialized(&self) -> Result<bool, StoreError> {
        let txn = self.db.begin_read()?;
        let meta = txn.open_table(META)?;
        Ok(meta.get(LOCK_PERIOD_KEY)?.is_some())
    }

    pub fn save_blob<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let bytes = postcard::to_allocvec(value)?;
        let txn = self.db.begin_write()?;
        {
            let mut blobs = txn.open_table(BLOBS)?;
            blobs.insert(key, bytes.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    pub fn load_blob<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        let txn = self.db.begin_read()?;
        let blobs = txn.open_table(BLOBS)?;
        match blobs.get(key)? {
            Some(guard) => Ok(Some(postcard::from_bytes(guard.value())?)),
            None => Ok(None),
        }
    }
}

fn write_snapshot(txn: &WriteTransaction, snapshot: &StakeSnapshot) -> Result<(), StoreError> {
    let mut ledgers = txn.open_table(LEDGERS)?;
    let stale: Vec<String> = ledgers
        .iter()?
        .map(|entry| entry.map(|(k, _)| k.value().to_string()))
        .collect::<Result<_, _>>()?;
    for key in stale {
        if !snapshot.accounts.contains_key(&AccountId::new(key.as_str())) {
            ledgers.remove(key.as_str())?;
        }
    }
    for (account, deposits) in &snapshot.accounts {
        let bytes = postcard::to_allocvec(deposits)?;
        ledgers.insert(account.as_str(), bytes.as_slice())?;
    }

    let mut meta = txn.open_table(META)?;
    meta.insert(LOCK_PERIOD_KEY, u64::from(snapshot.lock_period_days))?;
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
