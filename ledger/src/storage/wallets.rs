//! # Wallet Store
//!
//! Durable keyed storage of wallet balances. Its one mutation primitive is
//! a *conditional* delta: add a signed number of minor units to a balance
//! if, and only if, the result stays non-negative. The check and the write
//! happen inside one sled transaction, so two concurrent debits can never
//! both pass the check against the same starting balance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sled::transaction::{abort, ConflictableTransactionResult, TransactionalTree};
use sled::CompareAndSwapError;

use super::db::{decode, encode, flatten_tx_error, LedgerDb, StoreError, StoreResult};
use crate::amount::Amount;
use crate::types::WalletId;

/// What is persisted per wallet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletRecord {
    pub balance: Amount,
    pub created_at: DateTime<Utc>,
}

/// View over the `wallets` tree of a [`LedgerDb`].
#[derive(Debug, Clone, Copy)]
pub struct WalletStore<'a> {
    db: &'a LedgerDb,
}

impl<'a> WalletStore<'a> {
    pub(crate) fn new(db: &'a LedgerDb) -> Self {
        Self { db }
    }

    /// Creates a wallet holding `initial_balance` and returns its fresh id.
    ///
    /// The insert is a compare-and-swap against an absent key, so an id
    /// collision can never overwrite an existing wallet; it just draws a
    /// new id.
    pub fn create(&self, initial_balance: Amount) -> StoreResult<WalletId> {
        let record = WalletRecord {
            balance: initial_balance,
            created_at: Utc::now(),
        };
        let bytes = encode(&record)?;

        loop {
            let id = WalletId::new();
            let swapped = self.db.wallets.compare_and_swap(
                &id.as_bytes()[..],
                None as Option<&[u8]>,
                Some(bytes.clone()),
            )?;

            match swapped {
                Ok(()) => {
                    self.db.persist();
                    tracing::info!(wallet = %id, balance = %initial_balance, "wallet created");
                    return Ok(id);
                }
                Err(CompareAndSwapError { .. }) => {
                    tracing::warn!(wallet = %id, "wallet id collision, drawing a new id");
                }
            }
        }
    }

    /// Full stored record, or `None` for an unknown id.
    pub fn get(&self, id: &WalletId) -> StoreResult<Option<WalletRecord>> {
        match self.db.wallets.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn exists(&self, id: &WalletId) -> StoreResult<bool> {
        Ok(self.db.wallets.contains_key(id.as_bytes())?)
    }

    /// Current balance of a wallet.
    pub fn balance(&self, id: &WalletId) -> StoreResult<Amount> {
        self.get(id)?
            .map(|record| record.balance)
            .ok_or(StoreError::WalletNotFound(*id))
    }

    /// Atomically adds `delta` minor units (negative for a debit) to a
    /// balance, provided the result is `>= 0`. Returns the new balance.
    ///
    /// # Errors
    ///
    /// [`StoreError::InsufficientFunds`] if the debit exceeds the balance,
    /// [`StoreError::WalletNotFound`] for an unknown id, and
    /// [`StoreError::Overflow`] if a credit would exceed `u64::MAX`. On any
    /// error the stored balance is untouched.
    pub fn apply_delta(&self, id: &WalletId, delta: i64) -> StoreResult<Amount> {
        let new_balance = self
            .db
            .wallets
            .transaction(|tx| apply_delta_in::<StoreError>(tx, id, delta))
            .map_err(flatten_tx_error)?;
        self.db.persist();
        Ok(new_balance)
    }

    /// Number of wallets.
    pub fn count(&self) -> usize {
        self.db.wallets.len()
    }

    /// Sum of all balances. Scans every wallet.
    pub fn total_balance(&self) -> StoreResult<Amount> {
        let mut total = Amount::ZERO;
        for entry in self.db.wallets.iter() {
            let (_key, bytes) = entry?;
            let record: WalletRecord = decode(&bytes)?;
            total = total
                .checked_add(record.balance)
                .ok_or_else(|| StoreError::Corrupt("total balance exceeds u64".into()))?;
        }
        Ok(total)
    }
}

// ---------------------------------------------------------------------------
// Transactional primitives
// ---------------------------------------------------------------------------

/// Reads a wallet inside an open transaction on the `wallets` tree.
pub(crate) fn read_in<E: From<StoreError>>(
    tx: &TransactionalTree,
    id: &WalletId,
) -> ConflictableTransactionResult<Option<WalletRecord>, E> {
    match tx.get(id.as_bytes())? {
        Some(bytes) => match decode(&bytes) {
            Ok(record) => Ok(Some(record)),
            Err(e) => abort(E::from(e)),
        },
        None => Ok(None),
    }
}

/// Conditional delta inside an open transaction on the `wallets` tree.
///
/// Aborts the whole transaction on a missing wallet, an insufficient
/// balance, or overflow; nothing written earlier in the same transaction
/// survives the abort.
pub(crate) fn apply_delta_in<E: From<StoreError>>(
    tx: &TransactionalTree,
    id: &WalletId,
    delta: i64,
) -> ConflictableTransactionResult<Amount, E> {
    let mut record = match read_in::<E>(tx, id)? {
        Some(record) => record,
        None => return abort(E::from(StoreError::WalletNotFound(*id))),
    };

    let current = record.balance.minor();
    let next = if delta >= 0 {
        let credit = delta as u64;
        match current.checked_add(credit) {
            Some(next) => next,
            None => {
                return abort(E::from(StoreError::Overflow {
                    wallet: *id,
                    current,
                    credit,
                }))
            }
        }
    } else {
        let debit = delta.unsigned_abs();
        match current.checked_sub(debit) {
            Some(next) => next,
            None => {
                return abort(E::from(StoreError::InsufficientFunds {
                    wallet: *id,
                    available: current,
                    requested: debit,
                }))
            }
        }
    };

    record.balance = Amount::from_minor(next);
    let bytes = match encode(&record) {
        Ok(bytes) => bytes,
        Err(e) => return abort(E::from(e)),
    };
    tx.insert(&id.as_bytes()[..], bytes)?;

    Ok(record.balance)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
