//! # Storage Module
//!
//! Durable stake state using redb.
//!
//! Uses redb embedded database for:
//! - ACID transactions (a snapshot save is one write transaction)
//! - Crash safety (copy-on-write B-trees)
//! - MVCC (concurrent readers, single writer)

mod redb_store;

pub use redb_store::{RedbStore, StoreError};
