//! REST API server example for the storefront engine.
//!
//! Run with: `cargo run --example server`
//!
//! ## Endpoints
//!
//! - `POST /commands` - Run any engine command (register, deposit, purchase, ...)
//! - `GET /accounts` - List all accounts
//! - `GET /accounts/{id}` - Get an account by uid
//! - `GET /accounts/{id}/transactions` - Account journal, newest first
//! - `GET /accounts/{id}/requests` - Account purchase requests, oldest first
//! - `GET /products` - List all products
//! - `GET /products/{id}` - Get a product by id
//! - `GET /journal` - Drain committed transactions not yet exported
//!
//! ## Example Usage
//!
//! ```bash
//! # Register
//! curl -X POST http://localhost:3000/commands \
//!   -H "Content-Type: application/json" \
//!   -d '{"op": "register", "identity": {"uid": "ada", "display_name": "Ada", "email": "ada@example.com"}}'
//!
//! # Deposit
//! curl -X POST http://localhost:3000/commands \
//!   -H "Content-Type: application/json" \
//!   -d '{"op": "deposit", "account": "ada", "amount": 1000}'
//!
//! # Upgrade with the configured plan
//! curl -X POST http://localhost:3000/commands \
//!   -H "Content-Type: application/json" \
//!   -d '{"op": "upgrade_to_pro", "account": "ada"}'
//!
//! # Get account
//! curl http://localhost:3000/accounts/ada
//! ```

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use storefront_ledger::{
    Account, AccountId, Command, Engine, EngineContext, LedgerError, Outcome, ProductId, ProductSnapshot,
    PurchaseRequest, TransactionRecord,
};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// === Request/Response DTOs ===

/// Response body for account information.
#[derive(Debug, Serialize, Deserialize)]
pub struct AccountResponse {
    pub account: AccountId,
    pub display_name: String,
    /// Minor currency units.
    pub balance: u64,
    pub pro: bool,
    pub pro_active: bool,
    pub pro_expiry: Option<DateTime<Utc>>,
    pub wishlist: Vec<ProductId>,
}

impl AccountResponse {
    fn from_account(account: &Account, now: DateTime<Utc>) -> Self {
        Self {
            account: account.id(),
            display_name: account.display_name(),
            balance: account.balance(),
            pro: account.is_pro(),
            pro_active: account.pro_active_at(now),
            pro_expiry: account.pro_expiry(),
            wishlist: account.wishlist(),
        }
    }
}

/// Response body for errors.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

// === Application State ===

/// Shared application state containing the engine.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
}

// === Error Handling ===

/// Wrapper for converting `LedgerError` into HTTP responses.
pub struct AppError(LedgerError);

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        AppError(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            LedgerError::InsufficientFunds { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            LedgerError::EntityNotFound(_) => StatusCode::NOT_FOUND,
            LedgerError::DuplicateAcquisition { .. } => StatusCode::CONFLICT,
            LedgerError::InvalidStateTransition { .. } => StatusCode::CONFLICT,
            LedgerError::ConcurrencyConflict { .. } => StatusCode::SERVICE_UNAVAILABLE,
            LedgerError::Validation(_) => StatusCode::BAD_REQUEST,
        };

        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
                code: self.0.code().to_string(),
            }),
        )
            .into_response()
    }
}

// === Handlers ===

/// POST /commands - Run one command.
async fn run_command(
    State(state): State<AppState>,
    Json(command): Json<Command>,
) -> Result<Json<Outcome>, AppError> {
    Ok(Json(state.engine.execute(command)?))
}

/// GET /accounts/{id} - Get account by uid.
async fn get_account(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AccountResponse>, AppError> {
    let account = state
        .engine
        .get_account(&AccountId::new(id))
        .ok_or(LedgerError::EntityNotFound(storefront_ledger::Entity::Account))?;
    Ok(Json(AccountResponse::from_account(&account, Utc::now())))
}

/// GET /accounts - List all accounts.
async fn list_accounts(State(state): State<AppState>) -> Json<Vec<AccountResponse>> {
    let now = Utc::now();
    let accounts = state
        .engine
        .accounts()
        .iter()
        .map(|account| AccountResponse::from_account(account, now))
        .collect();
    Json(accounts)
}

/// GET /accounts/{id}/transactions - Account journal.
async fn list_transactions(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<TransactionRecord>>, AppError> {
    Ok(Json(state.engine.transactions(&AccountId::new(id))?))
}

/// GET /accounts/{id}/requests - Account purchase requests.
async fn list_requests(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<PurchaseRequest>>, AppError> {
    Ok(Json(state.engine.requests_for(&AccountId::new(id))?))
}

/// GET /products - List all products.
async fn list_products(State(state): State<AppState>) -> Json<Vec<ProductSnapshot>> {
    Json(state.engine.products())
}

/// GET /products/{id} - Get product by id.
async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<ProductSnapshot>, AppError> {
    Ok(Json(state.engine.product(&id)?))
}

/// GET /journal - Export and drain the transaction feed.
///
/// Each record is returned once; the feed is empty afterwards.
async fn drain_journal(State(state): State<AppState>) -> Json<Vec<TransactionRecord>> {
    let records = state.engine.transaction_log().drain_feed();
    info!(records = records.len(), "journal exported");
    Json(records)
}

// === Router ===

fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/commands", post(run_command))
        .route("/accounts", get(list_accounts))
        .route("/accounts/{id}", get(get_account))
        .route("/accounts/{id}/transactions", get(list_transactions))
        .route("/accounts/{id}/requests", get(list_requests))
        .route("/products", get(list_products))
        .route("/products/{id}", get(get_product))
        .route("/journal", get(drain_journal))
        .with_state(state)
}

// === Main ===

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let state = AppState {
        engine: Arc::new(Engine::new(EngineContext::default())),
    };

    let app = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:3000").await?;
    info!("storefront API listening on http://127.0.0.1:3000");

    axum::serve(listener, app).await?;
    Ok(())
}
