//! # Ledger Facade
//!
//! The API the outside world calls. It owns the store handle and the
//! transfer engine, applies the wallet-creation policy from
//! [`LedgerConfig`], and collapses every lower-level failure into the
//! stable [`LedgerError`] taxonomy. There is no business logic here beyond
//! that mapping.
//!
//! Storage error text never leaves this module: it is logged, and callers
//! only ever see [`LedgerError::StorageFailure`].

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::amount::{Amount, AmountError};
use crate::config::LedgerConfig;
use crate::engine::{TransferEngine, TransferError};
use crate::storage::{LedgerDb, StoreError};
use crate::types::{HistoryRecord, Wallet, WalletId};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Which side of an operation referred to a missing wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Party {
    Sender,
    Recipient,
    /// The single wallet of a non-transfer operation.
    Wallet,
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sender => write!(f, "the sender's wallet"),
            Self::Recipient => write!(f, "the recipient's wallet"),
            Self::Wallet => write!(f, "the wallet"),
        }
    }
}

/// Public failure taxonomy. Display strings are stable and safe to return
/// to clients verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Non-positive or malformed amount.
    #[error("invalid amount")]
    InvalidAmount,

    /// Structurally disallowed transfer, e.g. to the sending wallet itself.
    #[error("invalid transfer")]
    InvalidTransfer,

    #[error("{0} was not found")]
    NotFound(Party),

    #[error("insufficient funds")]
    InsufficientFunds,

    /// The store could not complete the operation. Nothing was committed.
    #[error("internal storage failure")]
    StorageFailure,
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::WalletNotFound(_) => LedgerError::NotFound(Party::Wallet),
            StoreError::InsufficientFunds { .. } => LedgerError::InsufficientFunds,
            other => {
                tracing::error!(error = %other, "storage failure");
                LedgerError::StorageFailure
            }
        }
    }
}

impl From<TransferError> for LedgerError {
    fn from(err: TransferError) -> Self {
        match err {
            TransferError::InvalidAmount(_) => LedgerError::InvalidAmount,
            TransferError::SelfTransfer => LedgerError::InvalidTransfer,
            TransferError::SenderNotFound(_) => LedgerError::NotFound(Party::Sender),
            TransferError::RecipientNotFound(_) => LedgerError::NotFound(Party::Recipient),
            TransferError::Store(e) => e.into(),
        }
    }
}

impl From<AmountError> for LedgerError {
    fn from(_: AmountError) -> Self {
        LedgerError::InvalidAmount
    }
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// Aggregate figures over the whole ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerStats {
    pub wallets: usize,
    pub history_records: usize,
    pub total_balance: Amount,
}

/// Entry point for every wallet operation.
///
/// Construct once and share (`Arc<Ledger>`); all methods take `&self` and
/// are safe to call from many threads at once.
#[derive(Debug, Clone)]
pub struct Ledger {
    db: LedgerDb,
    engine: TransferEngine,
    config: LedgerConfig,
}

impl Ledger {
    /// Wraps an open database. The config's flush policy overrides the
    /// database's.
    pub fn new(db: LedgerDb, config: LedgerConfig) -> Self {
        let db = db.with_flush_on_commit(config.flush_on_commit);
        let engine = TransferEngine::new(db.clone());
        Self { db, engine, config }
    }

    /// A ledger over a throwaway database.
    pub fn open_temporary(config: LedgerConfig) -> Result<Self, LedgerError> {
        Ok(Self::new(LedgerDb::open_temporary()?, config))
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Creates a wallet holding the configured initial balance.
    pub fn create_wallet(&self) -> Result<Wallet, LedgerError> {
        let balance = self.config.initial_balance;
        let id = self.db.wallets().create(balance)?;
        Ok(Wallet { id, balance })
    }

    pub fn get_balance(&self, id: &WalletId) -> Result<Amount, LedgerError> {
        let balance = self.db.wallets().balance(id)?;
        tracing::debug!(wallet = %id, %balance, "balance read");
        Ok(balance)
    }

    pub fn get_wallet(&self, id: &WalletId) -> Result<Wallet, LedgerError> {
        let balance = self.get_balance(id)?;
        Ok(Wallet { id: *id, balance })
    }

    /// Moves `amount` from `from` to `to`. See
    /// [`TransferEngine::transfer`] for the exact check order.
    pub fn transfer(
        &self,
        from: &WalletId,
        to: &WalletId,
        amount: Amount,
    ) -> Result<HistoryRecord, LedgerError> {
        Ok(self.engine.transfer(from, to, amount)?)
    }

    /// A wallet's transfers, oldest first. Unknown wallets are
    /// [`LedgerError::NotFound`]; a known wallet without transfers yields
    /// an empty vector.
    pub fn get_history(&self, id: &WalletId) -> Result<Vec<HistoryRecord>, LedgerError> {
        if !self.db.wallets().exists(id)? {
            return Err(LedgerError::NotFound(Party::Wallet));
        }
        let records = self.db.history().query_by_wallet(id)?;
        tracing::debug!(wallet = %id, count = records.len(), "history read");
        Ok(records)
    }

    pub fn stats(&self) -> Result<LedgerStats, LedgerError> {
        Ok(LedgerStats {
            wallets: self.db.wallets().count(),
            history_records: self.db.history().count(),
            total_balance: self.db.wallets().total_balance()?,
        })
    }

    /// Flushes pending writes to disk, whatever the flush policy. Used on
    /// shutdown when `flush_on_commit` is off.
    pub fn flush(&self) -> Result<(), LedgerError> {
        Ok(self.db.flush()?)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
