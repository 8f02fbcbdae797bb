//! Property and scenario tests for the wallet ledger.
//!
//! These drive the public `Ledger` facade only, the way the HTTP layer does,
//! and check the ledger-wide guarantees: value is conserved, balances never
//! go negative, history is written exactly once per committed transfer, and
//! concurrent transfers on a shared wallet behave serially.
//!
//! Each test gets its own temporary database.

use std::collections::HashMap;
use std::sync::{Arc, Barrier};
use std::thread;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use wallet_ledger::{Amount, Ledger, LedgerConfig, LedgerError, Party, WalletId};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

fn ledger() -> Ledger {
    Ledger::open_temporary(LedgerConfig {
        flush_on_commit: false,
        ..LedgerConfig::default()
    })
    .expect("temp ledger")
}

fn amount(text: &str) -> Amount {
    text.parse().expect("valid amount literal")
}

fn total(ledger: &Ledger, wallets: &[WalletId]) -> u64 {
    wallets
        .iter()
        .map(|id| ledger.get_balance(id).unwrap().minor())
        .sum()
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn transfer_between_two_fresh_wallets() {
    let ledger = ledger();
    let a = ledger.create_wallet().unwrap();
    let b = ledger.create_wallet().unwrap();
    assert_eq!(a.balance, amount("100"));
    assert_eq!(b.balance, amount("100"));

    ledger.transfer(&a.id, &b.id, amount("30")).unwrap();

    assert_eq!(ledger.get_balance(&a.id).unwrap(), amount("70"));
    assert_eq!(ledger.get_balance(&b.id).unwrap(), amount("130"));

    for side in [a.id, b.id] {
        let history = ledger.get_history(&side).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].from, a.id);
        assert_eq!(history[0].to, b.id);
        assert_eq!(history[0].amount, amount("30"));
    }
}

#[test]
fn negative_amount_is_invalid_and_changes_nothing() {
    let ledger = ledger();
    let a = ledger.create_wallet().unwrap().id;
    let b = ledger.create_wallet().unwrap().id;

    let result = "-5"
        .parse::<Amount>()
        .map_err(LedgerError::from)
        .and_then(|amt| ledger.transfer(&a, &b, amt));

    assert_eq!(result, Err(LedgerError::InvalidAmount));
    assert_eq!(ledger.get_balance(&a).unwrap(), amount("100"));
    assert_eq!(ledger.get_balance(&b).unwrap(), amount("100"));
    assert!(ledger.get_history(&a).unwrap().is_empty());
}

#[test]
fn transfer_from_unknown_wallet_is_not_found() {
    let ledger = ledger();
    let b = ledger.create_wallet().unwrap().id;

    let result = ledger.transfer(&WalletId::new(), &b, amount("10"));
    assert_eq!(result, Err(LedgerError::NotFound(Party::Sender)));
    assert_eq!(ledger.get_balance(&b).unwrap(), amount("100"));
}

#[test]
fn self_transfer_is_rejected_and_balance_unchanged() {
    let ledger = ledger();
    let x = ledger.create_wallet().unwrap().id;

    assert_eq!(
        ledger.transfer(&x, &x, amount("10")),
        Err(LedgerError::InvalidTransfer)
    );
    assert_eq!(ledger.get_balance(&x).unwrap(), amount("100"));
    assert!(ledger.get_history(&x).unwrap().is_empty());
}

#[test]
fn fractional_amounts_are_exact() {
    let ledger = ledger();
    let a = ledger.create_wallet().unwrap().id;
    let b = ledger.create_wallet().unwrap().id;

    // Ten transfers of 0.10 is exactly 1.00, with no float drift.
    for _ in 0..10 {
        ledger.transfer(&a, &b, amount("0.1")).unwrap();
    }
    assert_eq!(ledger.get_balance(&a).unwrap(), amount("99"));
    assert_eq!(ledger.get_balance(&b).unwrap(), amount("101.00"));
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

#[test]
fn creation_adds_exactly_the_initial_balance() {
    let ledger = ledger();
    let before = ledger.stats().unwrap().total_balance;
    ledger.create_wallet().unwrap();
    let after = ledger.stats().unwrap().total_balance;
    assert_eq!(after.minor() - before.minor(), amount("100").minor());
}

#[test]
fn conservation_and_exactly_once_history_over_random_sequence() {
    let ledger = ledger();
    let wallets: Vec<WalletId> = (0..6).map(|_| ledger.create_wallet().unwrap().id).collect();
    let initial_total = total(&ledger, &wallets);

    let mut rng = StdRng::seed_from_u64(42);
    let mut committed = 0usize;
    let mut expected_per_wallet: HashMap<WalletId, usize> = HashMap::new();

    for _ in 0..300 {
        let from = wallets[rng.gen_range(0..wallets.len())];
        let to = wallets[rng.gen_range(0..wallets.len())];
        let amt = Amount::from_minor(rng.gen_range(0..8_000));

        match ledger.transfer(&from, &to, amt) {
            Ok(record) => {
                assert_eq!((record.from, record.to, record.amount), (from, to, amt));
                committed += 1;
                *expected_per_wallet.entry(from).or_default() += 1;
                *expected_per_wallet.entry(to).or_default() += 1;
            }
            Err(LedgerError::InvalidAmount)
            | Err(LedgerError::InvalidTransfer)
            | Err(LedgerError::InsufficientFunds) => {}
            Err(other) => panic!("unexpected failure: {other:?}"),
        }

        assert_eq!(total(&ledger, &wallets), initial_total);
    }

    assert!(committed > 0);
    assert_eq!(ledger.stats().unwrap().history_records, committed);
    for id in &wallets {
        let history = ledger.get_history(id).unwrap();
        assert_eq!(history.len(), expected_per_wallet.get(id).copied().unwrap_or(0));
        assert!(history.iter().all(|r| r.from == *id || r.to == *id));
        assert!(history.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }
}

#[test]
fn reads_are_pure() {
    let ledger = ledger();
    let a = ledger.create_wallet().unwrap().id;
    let b = ledger.create_wallet().unwrap().id;
    ledger.transfer(&a, &b, amount("12.34")).unwrap();

    let balance = ledger.get_balance(&a).unwrap();
    let history = ledger.get_history(&a).unwrap();
    for _ in 0..5 {
        assert_eq!(ledger.get_balance(&a).unwrap(), balance);
        assert_eq!(ledger.get_history(&a).unwrap(), history);
    }
}

#[test]
fn no_lost_update_on_concurrent_overdraft() {
    // Repeat to give the race a fair chance to show up.
    for _ in 0..20 {
        let ledger = Arc::new(ledger());
        let source = ledger.create_wallet().unwrap().id;
        let sinks = [
            ledger.create_wallet().unwrap().id,
            ledger.create_wallet().unwrap().id,
        ];

        let barrier = Arc::new(Barrier::new(2));
        let handles: Vec<_> = sinks
            .into_iter()
            .map(|to| {
                let ledger = Arc::clone(&ledger);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    ledger.transfer(&source, &to, amount("60"))
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(
            results
                .iter()
                .filter(|r| **r == Err(LedgerError::InsufficientFunds))
                .count(),
            1
        );
        assert_eq!(ledger.get_balance(&source).unwrap(), amount("40"));
        assert_eq!(ledger.get_history(&source).unwrap().len(), 1);
    }
}

#[test]
fn concurrent_mesh_conserves_value_and_stays_non_negative() {
    let ledger = Arc::new(ledger());
    let wallets: Arc<Vec<WalletId>> =
        Arc::new((0..5).map(|_| ledger.create_wallet().unwrap().id).collect());
    let initial_total = total(&ledger, &wallets);

    let threads = 6;
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let ledger = Arc::clone(&ledger);
            let wallets = Arc::clone(&wallets);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let mut rng = StdRng::seed_from_u64(t as u64 + 1);
                let mut committed = 0usize;
                barrier.wait();
                for _ in 0..150 {
                    let from = wallets[rng.gen_range(0..wallets.len())];
                    let to = wallets[rng.gen_range(0..wallets.len())];
                    let amt = Amount::from_minor(rng.gen_range(1..=5_000));
                    match ledger.transfer(&from, &to, amt) {
                        Ok(_) => committed += 1,
                        Err(LedgerError::InvalidTransfer) | Err(LedgerError::InsufficientFunds) => {}
                        Err(other) => panic!("unexpected failure: {other:?}"),
                    }
                }
                committed
            })
        })
        .collect();

    let committed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

    assert_eq!(total(&ledger, &wallets), initial_total);
    assert_eq!(ledger.stats().unwrap().history_records, committed);

    // Replaying the history from the initial balances reproduces every
    // final balance.
    let mut all: Vec<_> = wallets
        .iter()
        .flat_map(|id| ledger.get_history(id).unwrap())
        .collect();
    all.sort_by_key(|r| (r.timestamp, r.id));
    all.dedup_by_key(|r| r.id);
    assert_eq!(all.len(), committed);

    let mut replay: HashMap<WalletId, i128> = wallets
        .iter()
        .map(|id| (*id, amount("100").minor() as i128))
        .collect();
    for record in &all {
        *replay.get_mut(&record.from).unwrap() -= record.amount.minor() as i128;
        *replay.get_mut(&record.to).unwrap() += record.amount.minor() as i128;
    }
    for id in wallets.iter() {
        assert_eq!(
            replay[id],
            ledger.get_balance(id).unwrap().minor() as i128
        );
    }
}

#[test]
fn state_survives_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (a, b) = {
        let db = wallet_ledger::LedgerDb::open(dir.path()).unwrap();
        let ledger = Ledger::new(db, LedgerConfig::default());
        let a = ledger.create_wallet().unwrap().id;
        let b = ledger.create_wallet().unwrap().id;
        ledger.transfer(&a, &b, amount("25.50")).unwrap();
        (a, b)
    };

    let db = wallet_ledger::LedgerDb::open(dir.path()).unwrap();
    let ledger = Ledger::new(db, LedgerConfig::default());
    assert_eq!(ledger.get_balance(&a).unwrap(), amount("74.50"));
    assert_eq!(ledger.get_balance(&b).unwrap(), amount("125.50"));
    assert_eq!(ledger.get_history(&b).unwrap().len(), 1);
}
