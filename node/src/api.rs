//! # Wallet REST API
//!
//! Builds the axum router that exposes the ledger over HTTP. Handlers only
//! translate between JSON and [`Ledger`] calls; every rule about money lives
//! in the ledger crate.
//!
//! ## Endpoints
//!
//! | Method | Path                          | Description                       |
//! |--------|-------------------------------|-----------------------------------|
//! | GET    | `/health`                     | Liveness probe                    |
//! | GET    | `/status`                     | Ledger totals and version         |
//! | POST   | `/api/v1/wallet`              | Create a wallet                   |
//! | GET    | `/api/v1/wallet/:id`          | Wallet id and balance             |
//! | GET    | `/api/v1/wallet/:id/history`  | Transfers involving the wallet    |
//! | POST   | `/api/v1/wallet/:id/send`     | Transfer to another wallet        |
//!
//! Errors are `{"error": "<message>"}` with the message taken verbatim from
//! [`LedgerError`]'s `Display`.
//!
//! The request timeout covers the read routes only. Wallet creation and
//! transfers always answer with the outcome of their commit: a timeout
//! there could report failure for a write that then commits.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{Path, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use wallet_ledger::{
    Amount, HistoryRecord, Ledger, LedgerError, LedgerStats, Party, Wallet, WalletId,
};

use crate::metrics::SharedMetrics;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
///
/// Cheap to clone, everything is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The service's reported version string.
    pub version: String,
    pub ledger: Arc<Ledger>,
    pub metrics: SharedMetrics,
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all routes, CORS and tracing.
/// `request_timeout` bounds the read routes.
pub fn create_router(state: AppState, request_timeout: Duration) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    let reads = Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/api/v1/wallet/:id", get(wallet_handler))
        .route("/api/v1/wallet/:id/history", get(history_handler))
        .layer(TimeoutLayer::new(request_timeout));

    let writes = Router::new()
        .route("/api/v1/wallet", post(create_wallet_handler))
        .route("/api/v1/wallet/", post(create_wallet_handler))
        .route("/api/v1/wallet/:id/send", post(send_handler));

    reads
        .merge(writes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / Response Types
// ---------------------------------------------------------------------------

/// Body of `POST /api/v1/wallet/:id/send`.
///
/// `amount` may be a JSON string or number. Either way it is parsed from
/// its decimal text, so `30.1` means exactly 30.10.
#[derive(Debug, Deserialize)]
pub struct SendRequest {
    pub to: String,
    pub amount: serde_json::Value,
}

/// `GET /status` body.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub version: String,
    pub wallets: usize,
    pub history_records: usize,
    pub total_balance: Amount,
    /// Server time, RFC 3339.
    pub timestamp: String,
}

/// Generic error body returned by every endpoint on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// A [`LedgerError`] on its way out as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub LedgerError);

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self.0 {
            LedgerError::InvalidAmount
            | LedgerError::InvalidTransfer
            | LedgerError::InsufficientFunds => StatusCode::BAD_REQUEST,
            LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
            LedgerError::StorageFailure => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.0.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Request Parsing
// ---------------------------------------------------------------------------

fn parse_wallet_id(raw: &str, party: Party) -> Result<WalletId, LedgerError> {
    raw.parse().map_err(|_| LedgerError::NotFound(party))
}

fn parse_amount(raw: &serde_json::Value) -> Result<Amount, LedgerError> {
    let text = match raw {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        _ => return Err(LedgerError::InvalidAmount),
    };
    Ok(text.parse::<Amount>()?)
}

/// Runs a ledger call on the blocking pool, off the async workers. Once
/// started, the call finishes even if the client goes away.
async fn run_blocking<T, F>(f: F) -> Result<T, LedgerError>
where
    F: FnOnce() -> Result<T, LedgerError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!(error = %e, "ledger task failed");
            Err(LedgerError::StorageFailure)
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health` — returns 200 while the process is up.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// `GET /status` — wallet and record counts plus the ledger-wide balance.
async fn status_handler(State(state): State<AppState>) -> Result<Json<StatusResponse>, ApiError> {
    let ledger = Arc::clone(&state.ledger);
    let LedgerStats {
        wallets,
        history_records,
        total_balance,
    } = run_blocking(move || ledger.stats()).await?;

    Ok(Json(StatusResponse {
        version: state.version.clone(),
        wallets,
        history_records,
        total_balance,
        timestamp: chrono::Utc::now().to_rfc3339(),
    }))
}

/// `POST /api/v1/wallet` — creates a wallet with the configured balance.
async fn create_wallet_handler(State(state): State<AppState>) -> Result<Json<Wallet>, ApiError> {
    let ledger = Arc::clone(&state.ledger);
    let wallet = run_blocking(move || ledger.create_wallet()).await?;
    state.metrics.wallets_created_total.inc();
    Ok(Json(wallet))
}

/// `GET /api/v1/wallet/:id`
async fn wallet_handler(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Wallet>, ApiError> {
    let id = parse_wallet_id(&id, Party::Wallet)?;
    let ledger = Arc::clone(&state.ledger);
    Ok(Json(run_blocking(move || ledger.get_wallet(&id)).await?))
}

/// `GET /api/v1/wallet/:id/history` — oldest first; an empty list for a
/// wallet that never transferred.
async fn history_handler(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Vec<HistoryRecord>>, ApiError> {
    let id = parse_wallet_id(&id, Party::Wallet)?;
    let ledger = Arc::clone(&state.ledger);
    Ok(Json(run_blocking(move || ledger.get_history(&id)).await?))
}

/// `POST /api/v1/wallet/:id/send` — moves `amount` from `:id` to `to`.
async fn send_handler(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(req): Json<SendRequest>,
) -> Result<Json<HistoryRecord>, ApiError> {
    let started = Instant::now();
    let result = send(&state, &id, &req).await;
    state
        .metrics
        .transfer_latency_seconds
        .observe(started.elapsed().as_secs_f64());

    match result {
        Ok(record) => {
            state.metrics.transfers_committed_total.inc();
            Ok(Json(record))
        }
        Err(err) => {
            state.metrics.record_rejection(&err);
            Err(err.into())
        }
    }
}

async fn send(state: &AppState, from: &str, req: &SendRequest) -> Result<HistoryRecord, LedgerError> {
    let from = parse_wallet_id(from, Party::Sender)?;
    let to: WalletId = req.to.parse().map_err(|_| LedgerError::InvalidTransfer)?;
    let amount = parse_amount(&req.amount)?;

    let ledger = Arc::clone(&state.ledger);
    run_blocking(move || ledger.transfer(&from, &to, amount)).await
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
