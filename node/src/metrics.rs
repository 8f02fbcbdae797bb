//! # Prometheus Metrics
//!
//! Operational metrics for the wallet service, scraped by Prometheus at
//! `/metrics` on the metrics port.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] with
//! the `wallet` prefix, so they do not collide with the default global
//! registry.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use wallet_ledger::{LedgerError, Party};

/// Holds all Prometheus metric handles for the service.
#[derive(Clone)]
pub struct LedgerMetrics {
    registry: Registry,
    /// Wallets created since startup.
    pub wallets_created_total: IntCounter,
    /// Transfers that committed.
    pub transfers_committed_total: IntCounter,
    /// Transfers refused, labelled by `reason`.
    pub transfers_rejected_total: IntCounterVec,
    /// Time spent inside the transfer call, committed or not.
    pub transfer_latency_seconds: Histogram,
}

impl LedgerMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("wallet".into()), None)?;

        let wallets_created_total =
            IntCounter::new("wallets_created_total", "Total number of wallets created")?;
        registry.register(Box::new(wallets_created_total.clone()))?;

        let transfers_committed_total = IntCounter::new(
            "transfers_committed_total",
            "Total number of transfers committed",
        )?;
        registry.register(Box::new(transfers_committed_total.clone()))?;

        let transfers_rejected_total = IntCounterVec::new(
            Opts::new(
                "transfers_rejected_total",
                "Total number of transfers rejected, by reason",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(transfers_rejected_total.clone()))?;

        let transfer_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "transfer_latency_seconds",
                "Transfer processing latency in seconds",
            )
            .buckets(vec![
                0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
            ]),
        )?;
        registry.register(Box::new(transfer_latency_seconds.clone()))?;

        Ok(Self {
            registry,
            wallets_created_total,
            transfers_committed_total,
            transfers_rejected_total,
            transfer_latency_seconds,
        })
    }

    /// Counts a refused transfer under its failure kind.
    pub fn record_rejection(&self, err: &LedgerError) {
        self.transfers_rejected_total
            .with_label_values(&[rejection_reason(err)])
            .inc();
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

fn rejection_reason(err: &LedgerError) -> &'static str {
    match err {
        LedgerError::InvalidAmount => "invalid_amount",
        LedgerError::InvalidTransfer => "invalid_transfer",
        LedgerError::NotFound(Party::Sender) => "sender_not_found",
        LedgerError::NotFound(Party::Recipient) => "recipient_not_found",
        LedgerError::NotFound(Party::Wallet) => "not_found",
        LedgerError::InsufficientFunds => "insufficient_funds",
        LedgerError::StorageFailure => "storage_failure",
    }
}

/// Shared metrics handle passed to axum handlers.
pub type SharedMetrics = Arc<LedgerMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}
