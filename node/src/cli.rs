//! # CLI Interface
//!
//! Defines the command-line argument structure for `wallet-node` using
//! `clap` derive. Every `run` flag can also be set through a `WALLET_*`
//! environment variable.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use wallet_ledger::config::{
    DEFAULT_API_PORT, DEFAULT_DATA_DIR, DEFAULT_INITIAL_BALANCE, DEFAULT_METRICS_PORT,
    DEFAULT_REQUEST_TIMEOUT,
};
use wallet_ledger::{Amount, LedgerConfig};

use crate::logging::LogFormat;

/// Wallet ledger service.
///
/// Keeps per-wallet balances in a local database and moves money between
/// wallets over a small JSON API. Exposes Prometheus metrics on a separate
/// port.
#[derive(Parser, Debug)]
#[command(
    name = "wallet-node",
    about = "Wallet ledger HTTP service",
    version,
    propagate_version = true
)]
pub struct WalletNodeCli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the service.
    Run(RunArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Directory holding the ledger database. Created on first run.
    #[arg(long, short = 'd', env = "WALLET_DATA_DIR", default_value = DEFAULT_DATA_DIR)]
    pub data_dir: PathBuf,

    /// Port for the wallet API.
    #[arg(long, env = "WALLET_API_PORT", default_value_t = DEFAULT_API_PORT)]
    pub api_port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "WALLET_METRICS_PORT", default_value_t = DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,

    /// Balance credited to every new wallet, as a decimal amount.
    #[arg(long, env = "WALLET_INITIAL_BALANCE", default_value_t = DEFAULT_INITIAL_BALANCE)]
    pub initial_balance: Amount,

    /// Requests running longer than this many seconds are aborted.
    #[arg(
        long,
        env = "WALLET_REQUEST_TIMEOUT_SECS",
        default_value_t = DEFAULT_REQUEST_TIMEOUT.as_secs()
    )]
    pub request_timeout_secs: u64,

    /// Log output format.
    #[arg(long, env = "WALLET_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Skip the disk flush after each commit. Faster, but a crash can lose
    /// transfers that were already acknowledged.
    #[arg(long, env = "WALLET_NO_FLUSH")]
    pub no_flush: bool,
}

impl RunArgs {
    pub fn ledger_config(&self) -> LedgerConfig {
        LedgerConfig {
            initial_balance: self.initial_balance,
            flush_on_commit: !self.no_flush,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
