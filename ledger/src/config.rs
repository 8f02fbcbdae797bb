//! # Ledger Configuration & Constants
//!
//! Every magic number the ledger and its service use lives here. Amounts
//! are expressed in minor units (cents); see [`crate::amount`].

use std::time::Duration;

use crate::amount::Amount;

// ---------------------------------------------------------------------------
// Money
// ---------------------------------------------------------------------------

/// Number of fractional decimal digits carried by an [`Amount`].
pub const AMOUNT_DECIMALS: u32 = 2;

/// Minor units per major unit (`10^AMOUNT_DECIMALS`).
pub const MINOR_UNITS_PER_MAJOR: u64 = 100;

/// Balance every new wallet starts with: 100.00.
pub const DEFAULT_INITIAL_BALANCE: Amount = Amount::from_minor(10_000);

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// Default port for the wallet HTTP API.
pub const DEFAULT_API_PORT: u16 = 8080;

/// Default port for the Prometheus metrics endpoint.
pub const DEFAULT_METRICS_PORT: u16 = 9090;

/// Requests that take longer than this are cut off by the HTTP layer.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Default on-disk location of the ledger database.
pub const DEFAULT_DATA_DIR: &str = "./wallet-data";

// ---------------------------------------------------------------------------
// LedgerConfig
// ---------------------------------------------------------------------------

/// Runtime policy for a [`Ledger`](crate::ledger::Ledger).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Balance assigned to every newly created wallet.
    pub initial_balance: Amount,
    /// Flush the store to disk after every mutation, before reporting
    /// success. Turning this off trades crash durability for throughput.
    pub flush_on_commit: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            initial_balance: DEFAULT_INITIAL_BALANCE,
            flush_on_commit: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minor_units_match_decimals() {
        assert_eq!(MINOR_UNITS_PER_MAJOR, 10u64.pow(AMOUNT_DECIMALS));
    }

    #[test]
    fn default_initial_balance_is_one_hundred() {
        assert_eq!(LedgerConfig::default().initial_balance.to_string(), "100.00");
    }
}
