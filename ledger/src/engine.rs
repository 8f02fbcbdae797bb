//! # Transfer Engine
//!
//! Moves value between two wallets as one all-or-nothing unit of work.
//!
//! ## Protocol
//!
//! 1. Validate the request without touching storage: the amount must be
//!    positive and fit a signed delta, and sender and recipient must
//!    differ.
//! 2. Open one sled transaction over `wallets`, `history` and
//!    `history_by_wallet`. Inside it:
//!    - confirm both wallets exist (sender first),
//!    - debit the sender with the conditional delta,
//!    - credit the recipient,
//!    - stamp and append the history record.
//! 3. Commit, flush, and only then hand the record back. The commit is the
//!    point of no return: a flush that fails after it is logged and the
//!    record is still returned, so an error always means nothing moved.
//!
//! Any abort inside step 2 discards every write made in it. sled runs
//! transactions optimistically and re-executes them on conflict, so two
//! transfers racing on a shared wallet behave as if one ran entirely before
//! the other, while transfers on disjoint wallets never touch the same keys
//! and never wait on each other. There are no locks to order, so there is
//! nothing to deadlock on.
//!
//! Retried client requests are not deduplicated here: every successful
//! call is a new transfer.

use sled::transaction::{abort, TransactionError, TransactionResult};
use sled::Transactional;
use thiserror::Error;

use crate::amount::Amount;
use crate::storage::{history, wallets, LedgerDb, StoreError};
use crate::types::{HistoryRecord, WalletId};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why a transfer did not happen. In every case nothing was written.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Zero, or too large to express as a signed delta.
    #[error("invalid transfer amount: {0}")]
    InvalidAmount(Amount),

    #[error("sender and recipient are the same wallet")]
    SelfTransfer,

    #[error("sender wallet not found: {0}")]
    SenderNotFound(WalletId),

    #[error("recipient wallet not found: {0}")]
    RecipientNotFound(WalletId),

    /// Raised by the stores, including a refused debit
    /// ([`StoreError::InsufficientFunds`]).
    #[error(transparent)]
    Store(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// TransferEngine
// ---------------------------------------------------------------------------

/// Executes transfers against a [`LedgerDb`]. Holds no state of its own.
#[derive(Debug, Clone)]
pub struct TransferEngine {
    db: LedgerDb,
}

impl TransferEngine {
    pub fn new(db: LedgerDb) -> Self {
        Self { db }
    }

    /// Moves `amount` from `from` to `to` and returns the committed record.
    ///
    /// # Errors
    ///
    /// Checked in this order: [`TransferError::InvalidAmount`],
    /// [`TransferError::SelfTransfer`], [`TransferError::SenderNotFound`],
    /// [`TransferError::RecipientNotFound`], then
    /// [`StoreError::InsufficientFunds`] from the conditional debit. Store
    /// failures can only surface before the commit, so every error leaves
    /// the ledger untouched and the whole call is safe to retry.
    pub fn transfer(
        &self,
        from: &WalletId,
        to: &WalletId,
        amount: Amount,
    ) -> Result<HistoryRecord, TransferError> {
        let delta = validate(from, to, amount)?;

        let result: TransactionResult<HistoryRecord, TransferError> = (
            &self.db.wallets,
            &self.db.history,
            &self.db.history_by_wallet,
        )
            .transaction(|(wallet_tx, record_tx, index_tx)| {
                if wallets::read_in::<TransferError>(wallet_tx, from)?.is_none() {
                    return abort(TransferError::SenderNotFound(*from));
                }
                if wallets::read_in::<TransferError>(wallet_tx, to)?.is_none() {
                    return abort(TransferError::RecipientNotFound(*to));
                }

                wallets::apply_delta_in::<TransferError>(wallet_tx, from, -delta)?;
                wallets::apply_delta_in::<TransferError>(wallet_tx, to, delta)?;

                let record = HistoryRecord::new(*from, *to, amount);
                history::append_in::<TransferError>(record_tx, index_tx, &record)?;
                Ok(record)
            });

        let record = match result {
            Ok(record) => record,
            Err(TransactionError::Abort(err)) => {
                tracing::debug!(%from, %to, %amount, error = %err, "transfer rejected");
                return Err(err);
            }
            Err(TransactionError::Storage(err)) => {
                tracing::error!(%from, %to, %amount, error = %err, "transfer transaction failed");
                return Err(StoreError::Sled(err).into());
            }
        };

        // Committed: from here on the transfer is reported as done.
        self.db.persist();

        tracing::info!(
            record = %record.id,
            %from,
            %to,
            %amount,
            "transfer committed"
        );
        Ok(record)
    }
}

/// Storage-free preconditions. Returns the amount as a signed delta.
fn validate(from: &WalletId, to: &WalletId, amount: Amount) -> Result<i64, TransferError> {
    if amount.is_zero() {
        return Err(TransferError::InvalidAmount(amount));
    }
    let delta = i64::try_from(amount.minor()).map_err(|_| TransferError::InvalidAmount(amount))?;
    if from == to {
        return Err(TransferError::SelfTransfer);
    }
    Ok(delta)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
