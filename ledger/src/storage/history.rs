//! # History Store
//!
//! Append-only log of committed transfers. Each record is written once,
//! keyed by a monotonically increasing commit sequence, together with one
//! index entry per participant so a wallet's history is a single prefix
//! scan. Records are never updated or removed.

use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionResult,
    TransactionalTree,
};
use sled::Transactional;

use super::db::{decode, encode, flatten_tx_error, LedgerDb, StoreError, StoreResult};
use crate::types::{HistoryRecord, WalletId};

/// Width of a `history_by_wallet` key: wallet id followed by the sequence.
const INDEX_KEY_LEN: usize = WalletId::LEN + 8;

fn index_key(wallet: &WalletId, seq: u64) -> [u8; INDEX_KEY_LEN] {
    let mut key = [0u8; INDEX_KEY_LEN];
    key[..WalletId::LEN].copy_from_slice(wallet.as_bytes());
    key[WalletId::LEN..].copy_from_slice(&seq.to_be_bytes());
    key
}

/// View over the `history` and `history_by_wallet` trees of a [`LedgerDb`].
#[derive(Debug, Clone, Copy)]
pub struct HistoryStore<'a> {
    db: &'a LedgerDb,
}

impl<'a> HistoryStore<'a> {
    pub(crate) fn new(db: &'a LedgerDb) -> Self {
        Self { db }
    }

    /// Persists one record and its participant index entries atomically.
    /// Returns the commit sequence assigned to it.
    pub fn append(&self, record: &HistoryRecord) -> StoreResult<u64> {
        let result: TransactionResult<u64, StoreError> =
            (&self.db.history, &self.db.history_by_wallet)
                .transaction(|(records, index)| append_in(records, index, record));
        let seq = result.map_err(flatten_tx_error)?;
        self.db.persist();
        Ok(seq)
    }

    /// Every record where `wallet` is the sender or the recipient, oldest
    /// commit first. An empty vector means the wallet has no history yet.
    pub fn query_by_wallet(&self, wallet: &WalletId) -> StoreResult<Vec<HistoryRecord>> {
        let mut records = Vec::new();

        for entry in self.db.history_by_wallet.scan_prefix(wallet.as_bytes()) {
            let (key, _) = entry?;
            if key.len() != INDEX_KEY_LEN {
                return Err(StoreError::Corrupt(format!(
                    "history index key has length {}",
                    key.len()
                )));
            }

            let seq_key = &key[WalletId::LEN..];
            let bytes = self.db.history.get(seq_key)?.ok_or_else(|| {
                StoreError::Corrupt(format!("dangling history index entry for {wallet}"))
            })?;
            records.push(decode(&bytes)?);
        }

        Ok(records)
    }

    /// Total number of records across all wallets.
    pub fn count(&self) -> usize {
        self.db.history.len()
    }
}

/// Appends inside an open transaction spanning the `history` and
/// `history_by_wallet` trees.
pub(crate) fn append_in<E: From<StoreError>>(
    records: &TransactionalTree,
    index: &TransactionalTree,
    record: &HistoryRecord,
) -> ConflictableTransactionResult<u64, E> {
    let seq = records
        .generate_id()
        .map_err(ConflictableTransactionError::Storage)?;

    let bytes = match encode(record) {
        Ok(bytes) => bytes,
        Err(e) => return Err(ConflictableTransactionError::Abort(E::from(e))),
    };

    records.insert(&seq.to_be_bytes()[..], bytes)?;
    index.insert(&index_key(&record.from, seq)[..], Vec::<u8>::new())?;
    index.insert(&index_key(&record.to, seq)[..], Vec::<u8>::new())?;

    Ok(seq)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
