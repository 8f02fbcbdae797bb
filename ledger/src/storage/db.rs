//! # LedgerDb — Persistent Storage Engine
//!
//! Opens the sled database and hands out typed views over its trees.
//!
//! ## Tree Layout
//!
//! | Tree                | Key                                 | Value                    |
//! |---------------------|-------------------------------------|--------------------------|
//! | `wallets`           | wallet id (16B)                     | `bincode(WalletRecord)`  |
//! | `history`           | commit sequence (8B BE)             | `bincode(HistoryRecord)` |
//! | `history_by_wallet` | wallet id (16B) ‖ sequence (8B BE)  | empty                    |
//!
//! ## Atomicity
//!
//! sled transactions span several trees and are serializable: they run
//! optimistically and are re-executed on conflict, and a transaction that
//! aborts leaves no trace in any tree. The transfer engine relies on this
//! to move value and append history as one unit.
//!
//! ## Durability
//!
//! sled buffers writes. With `flush_on_commit` set (the default), every
//! mutating store operation flushes after its transaction commits and
//! before returning.
//!
//! The commit, not the flush, decides the outcome. Once a transaction has
//! committed its writes are visible to every reader, so a failed flush
//! after that point is logged and the operation still reports success.
//! Reporting an error for a committed write would invite a retry that
//! applies it twice. Every error a mutation returns therefore means
//! nothing was committed.

use std::path::Path;
#[cfg(test)]
use std::sync::atomic::{AtomicBool, Ordering};
#[cfg(test)]
use std::sync::Arc;

use sled::transaction::TransactionError;
use sled::{Db, Tree};

use super::history::HistoryStore;
use super::wallets::WalletStore;
use crate::types::WalletId;

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors raised by the storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("wallet not found: {0}")]
    WalletNotFound(WalletId),

    /// The conditional update refused to take the balance below zero.
    #[error("insufficient funds in {wallet}: available {available}, requested {requested}")]
    InsufficientFunds {
        wallet: WalletId,
        /// Balance before the rejected debit, in minor units.
        available: u64,
        /// Size of the rejected debit, in minor units.
        requested: u64,
    },

    /// A credit would push the balance past `u64::MAX` minor units.
    #[error("balance overflow in {wallet}: current {current}, credit {credit}")]
    Overflow {
        wallet: WalletId,
        current: u64,
        credit: u64,
    },

    /// On-disk data does not match the expected layout.
    #[error("corrupt store: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

// ---------------------------------------------------------------------------
// LedgerDb
// ---------------------------------------------------------------------------

/// Handle to the ledger's sled database.
///
/// Cheap to clone: sled handles are reference counted, and all clones share
/// one underlying database. Safe to share across threads.
#[derive(Debug, Clone)]
pub struct LedgerDb {
    db: Db,
    pub(crate) wallets: Tree,
    pub(crate) history: Tree,
    pub(crate) history_by_wallet: Tree,
    flush_on_commit: bool,
    #[cfg(test)]
    fail_flush: Arc<AtomicBool>,
}

impl LedgerDb {
    /// Open or create a database at the given filesystem path.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// A throwaway database, removed when the last handle is dropped.
    pub fn open_temporary() -> StoreResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> StoreResult<Self> {
        let wallets = db.open_tree("wallets")?;
        let history = db.open_tree("history")?;
        let history_by_wallet = db.open_tree("history_by_wallet")?;

        Ok(Self {
            db,
            wallets,
            history,
            history_by_wallet,
            flush_on_commit: true,
            #[cfg(test)]
            fail_flush: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Enables or disables the flush after every mutation.
    pub fn with_flush_on_commit(mut self, flush: bool) -> Self {
        self.flush_on_commit = flush;
        self
    }

    pub fn flush_on_commit(&self) -> bool {
        self.flush_on_commit
    }

    /// View over the wallet balances.
    pub fn wallets(&self) -> WalletStore<'_> {
        WalletStore::new(self)
    }

    /// View over the transfer history.
    pub fn history(&self) -> HistoryStore<'_> {
        HistoryStore::new(self)
    }

    /// Makes every write so far durable, if this database is configured to
    /// flush on commit. Called after each committed mutation; a failure is
    /// logged, not returned, because the mutation has already happened.
    pub(crate) fn persist(&self) {
        if !self.flush_on_commit {
            return;
        }
        if let Err(e) = self.flush_db() {
            tracing::error!(
                error = %e,
                "flush after commit failed, committed writes may not survive a crash"
            );
        }
    }

    /// Force a flush of all pending writes, regardless of configuration.
    pub fn flush(&self) -> StoreResult<()> {
        self.flush_db()?;
        Ok(())
    }

    fn flush_db(&self) -> sled::Result<usize> {
        #[cfg(test)]
        {
            if self.fail_flush.load(Ordering::SeqCst) {
                return Err(sled::Error::Unsupported("flush disabled by test".into()));
            }
        }
        self.db.flush()
    }

    /// Makes every flush on this database (and its clones) fail.
    #[cfg(test)]
    pub(crate) fn fail_flushes(&self, fail: bool) {
        self.fail_flush.store(fail, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Encoding helpers
// ---------------------------------------------------------------------------

pub(crate) fn encode<T: serde::Serialize>(value: &T) -> StoreResult<Vec<u8>> {
    bincode::serialize(value).map_err(|e| StoreError::Serialization(e.to_string()))
}

/// Collapses a finished transaction's error back into a [`StoreError`].
pub(crate) fn flatten_tx_error(err: TransactionError<StoreError>) -> StoreError {
    match err {
        TransactionError::Abort(e) => e,
        TransactionError::Storage(e) => StoreError::Sled(e),
    }
}

pub(crate) fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> StoreResult<T> {
    bincode::deserialize(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::Amount;
    use crate::types::HistoryRecord;

    #[test]
    fn open_temporary_database() {
        let db = LedgerDb::open_temporary().expect("should create temp db");
        assert_eq!(db.wallets().count(), 0);
        assert_eq!(db.history().count(), 0);
        assert!(db.flush_on_commit());
    }

    #[test]
    fn persisted_state_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");

        let (a, b) = {
            let db = LedgerDb::open(dir.path()).expect("should open db");
            let a = db.wallets().create(Amount::from_minor(10_000)).unwrap();
            let b = db.wallets().create(Amount::from_minor(500)).unwrap();
            (a, b)
        };

        let db = LedgerDb::open(dir.path()).expect("should reopen db");
        assert_eq!(db.wallets().count(), 2);
        assert_eq!(db.wallets().balance(&a).unwrap(), Amount::from_minor(10_000));
        assert_eq!(db.wallets().balance(&b).unwrap(), Amount::from_minor(500));
    }

    #[test]
    fn flush_can_be_disabled() {
        let db = LedgerDb::open_temporary()
            .unwrap()
            .with_flush_on_commit(false);
        assert!(!db.flush_on_commit());
        db.wallets().create(Amount::from_minor(1)).unwrap();
        db.flush().expect("explicit flush still works");
    }

    #[test]
    fn failed_flush_is_reported_by_explicit_flush_only() {
        let db = LedgerDb::open_temporary().unwrap();
        db.fail_flushes(true);

        let id = db.wallets().create(Amount::from_minor(700)).unwrap();
        assert_eq!(db.wallets().balance(&id).unwrap(), Amount::from_minor(700));
        assert!(matches!(db.flush(), Err(StoreError::Sled(_))));

        db.fail_flushes(false);
        db.flush().unwrap();
    }

    #[test]
    fn encode_decode_history_record() {
        let record = HistoryRecord::new(
            crate::types::WalletId::new(),
            crate::types::WalletId::new(),
            Amount::from_minor(123),
        );
        let bytes = encode(&record).unwrap();
        let back: HistoryRecord = decode(&bytes).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn decode_garbage_is_serialization_error() {
        let err = decode::<HistoryRecord>(&[0xFF, 0x01]).unwrap_err();
        assert!(matches!(err, StoreError::Serialization(_)));
    }
}
