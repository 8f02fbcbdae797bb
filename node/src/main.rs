// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Wallet Node
//!
//! Entry point for the `wallet-node` binary. Parses CLI arguments, opens the
//! ledger database, initializes logging and metrics, and serves the wallet
//! API until interrupted.
//!
//! Subcommands:
//!
//! - `run`     — start the service
//! - `version` — print build version information

mod api;
mod cli;
mod logging;
mod metrics;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;

use wallet_ledger::{Ledger, LedgerDb};

use cli::{Commands, WalletNodeCli};
use metrics::LedgerMetrics;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = WalletNodeCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Opens the ledger and serves the API and metrics endpoints until a
/// shutdown signal arrives.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(logging::DEFAULT_FILTER, args.log_format);

    let config = args.ledger_config();
    tracing::info!(
        api_port = args.api_port,
        metrics_port = args.metrics_port,
        data_dir = %args.data_dir.display(),
        initial_balance = %config.initial_balance,
        flush_on_commit = config.flush_on_commit,
        "starting wallet-node"
    );

    // --- Persistent storage ---
    let db_path = args.data_dir.join("db");
    std::fs::create_dir_all(&db_path)
        .with_context(|| format!("failed to create database directory: {}", db_path.display()))?;

    let db = LedgerDb::open(&db_path)
        .with_context(|| format!("failed to open database at {}", db_path.display()))?;
    let ledger = Arc::new(Ledger::new(db, config));
    tracing::info!(path = %db_path.display(), "database opened");

    // --- Metrics ---
    let ledger_metrics =
        Arc::new(LedgerMetrics::new().context("failed to register prometheus metrics")?);

    // --- Application state ---
    let app_state = api::AppState {
        version: env!("CARGO_PKG_VERSION").to_string(),
        ledger: Arc::clone(&ledger),
        metrics: Arc::clone(&ledger_metrics),
    };

    // --- API server ---
    let api_router = api::create_router(app_state, args.request_timeout());
    let api_addr = format!("0.0.0.0:{}", args.api_port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind API listener on {}", api_addr))?;
    tracing::info!("API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&ledger_metrics));
    let metrics_addr = format!("0.0.0.0:{}", args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("Metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received");
        }
    }

    if let Err(e) = ledger.flush() {
        tracing::error!(error = %e, "final flush failed");
    }
    tracing::info!("wallet-node stopped");
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("wallet-node {}", env!("CARGO_PKG_VERSION"));
    println!("rustc       {}", option_env!("RUSTC_VERSION").unwrap_or("unknown"));
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported. If a handler cannot be
/// installed, that signal is simply never observed.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
