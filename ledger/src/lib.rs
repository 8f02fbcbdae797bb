// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Wallet Ledger — Core Library
//!
//! Per-wallet balances and point-to-point transfers between them. Value is
//! never created or destroyed by a transfer, balances never go negative, and
//! every committed transfer leaves exactly one history record behind.
//!
//! ## Architecture
//!
//! ```text
//! amount   — fixed-point money in integer minor units
//! types    — wallet ids, wallets, history records
//! storage  — sled-backed wallet store and append-only history store
//! engine   — the transfer engine: one transaction per transfer
//! ledger   — the facade callers use, with the public error taxonomy
//! config   — defaults and constants
//! ```
//!
//! Control flow is strictly top-down: `Ledger` → `TransferEngine` →
//! (`WalletStore` + `HistoryStore`). The engine is the only component that
//! touches two wallets at once, and it does so inside a single storage
//! transaction, so there is no observable moment where a sender has been
//! debited but the recipient not yet credited.

pub mod amount;
pub mod config;
pub mod engine;
pub mod ledger;
pub mod storage;
pub mod types;

pub use amount::{Amount, AmountError};
pub use config::LedgerConfig;
pub use engine::{TransferEngine, TransferError};
pub use ledger::{Ledger, LedgerError, LedgerStats, Party};
pub use storage::{HistoryStore, LedgerDb, StoreError, WalletStore};
pub use types::{HistoryRecord, InvalidWalletId, Wallet, WalletId};
