//! Core value types: wallet identifiers, wallets, and history records.
//!
//! These cross every layer, from the on-disk encoding up to the JSON the
//! service returns, so all of them derive `Serialize`/`Deserialize`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::amount::Amount;

// ---------------------------------------------------------------------------
// WalletId
// ---------------------------------------------------------------------------

/// Returned when a string is not a canonical wallet identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid wallet id: {0:?}")]
pub struct InvalidWalletId(pub String);

/// A 128-bit random wallet identifier, rendered as a hyphenated UUID.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WalletId(Uuid);

impl WalletId {
    /// Length of the on-disk key encoding.
    pub const LEN: usize = 16;

    /// A fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl Default for WalletId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WalletId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.hyphenated().fmt(f)
    }
}

impl FromStr for WalletId {
    type Err = InvalidWalletId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| InvalidWalletId(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Wallet
// ---------------------------------------------------------------------------

/// A wallet as seen by callers: its id and current balance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub id: WalletId,
    pub balance: Amount,
}

// ---------------------------------------------------------------------------
// HistoryRecord
// ---------------------------------------------------------------------------

/// Immutable audit entry for one committed transfer.
///
/// Written in the same storage transaction as the two balance changes it
/// describes, so a record exists if and only if the transfer committed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// Unique record id, generated at commit time.
    pub id: Uuid,
    /// Commit time (not request time).
    pub timestamp: DateTime<Utc>,
    /// Debited wallet.
    pub from: WalletId,
    /// Credited wallet.
    pub to: WalletId,
    /// Amount actually moved.
    pub amount: Amount,
}

impl HistoryRecord {
    /// Stamps a new record with a fresh id and the current time.
    pub fn new(from: WalletId, to: WalletId, amount: Amount) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            from,
            to,
            amount,
        }
    }
}
