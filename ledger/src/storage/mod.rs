//! # Storage Module
//!
//! Durable state for the ledger, on top of sled's embedded, transactional
//! key-value store.
//!
//! ## Architecture
//!
//! ```text
//! db.rs       — LedgerDb: opens the sled database and its trees
//! wallets.rs  — WalletStore: creation, lookup, conditional balance update
//! history.rs  — HistoryStore: append-only transfer log + participant index
//! ```
//!
//! ## Ownership
//!
//! The wallet store exclusively owns balances; the history store
//! exclusively owns the log. Neither calls the other. Each exposes its
//! write primitive in two shapes: a standalone operation that runs its own
//! transaction, and a `*_in` function that takes an open
//! [`sled::transaction::TransactionalTree`] so the transfer engine can
//! compose both stores into one atomic unit.
//!
//! ## Design Decisions
//!
//! 1. **Integers on disk.** Balances are bincode-encoded `u64` minor units.
//! 2. **UUID bytes as keys.** Wallet keys are the raw 16 bytes, so the
//!    history index can use them as a fixed-width prefix.
//! 3. **Big-endian sequence numbers.** History keys sort numerically under
//!    sled's lexicographic ordering, which makes a prefix scan return a
//!    wallet's records in commit order.

pub mod db;
pub mod history;
pub mod wallets;

pub use db::{LedgerDb, StoreError, StoreResult};
pub use history::HistoryStore;
pub use wallets::{WalletRecord, WalletStore};
