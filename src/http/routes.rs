//! Request handlers for the checkout server

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::http::AppState;
use crate::types::{CheckoutError, LineItem, PendingEntry, UserAccount};

/// Header carrying the shared hardware secret
const API_KEY_HEADER: &str = "x-api-key";

#[derive(Deserialize)]
pub struct LoginRequest {
    /// Optional display name supplied by some clients; lookup is by UID only
    #[serde(default)]
    #[allow(dead_code)]
    pub name: Option<String>,
    pub rfid_uid: String,
}

#[derive(Serialize)]
pub struct UserResponse {
    pub user_id: String,
    pub name: String,
    pub balance: Decimal,
}

impl From<UserAccount> for UserResponse {
    fn from(user: UserAccount) -> Self {
        UserResponse {
            user_id: user.id,
            name: user.name,
            balance: user.balance,
        }
    }
}

#[derive(Deserialize)]
pub struct CheckoutRequest {
    /// Accepted for client compatibility; the UID is authoritative
    #[serde(default)]
    #[allow(dead_code)]
    pub user_id: Option<String>,
    pub rfid_uid: String,
    pub cart_items: Vec<LineItem>,
}

#[derive(Deserialize)]
pub struct AddPendingRequest {
    pub rfid_uid: String,
    pub items: Vec<LineItem>,
    /// Client-computed total; dropped in favor of the server recomputation
    #[serde(default)]
    #[allow(dead_code)]
    pub total: Option<Decimal>,
}

#[derive(Serialize)]
pub struct StageResponse {
    pub total: Decimal,
    pub pending_id: Uuid,
}

#[derive(Deserialize)]
pub struct PendingQuery {
    pub rfid_uid: String,
}

#[derive(Deserialize)]
pub struct ScanRequest {
    pub rfid_uid: String,
}

#[derive(Deserialize)]
pub struct TransactionRequest {
    pub rfid_uid: String,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Serialize)]
pub struct SettlementResponse {
    pub message: String,
    pub transaction_id: Uuid,
    pub total: Decimal,
    pub new_balance: Decimal,
}

/// `GET /` - liveness probe
pub async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// `POST /login` - resolve a tag to its account
pub async fn login_handler(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<UserResponse>, CheckoutError> {
    let user = state.resolver.resolve(&payload.rfid_uid).await?;
    Ok(Json(user.into()))
}

/// `GET /user/:rfid_uid` - latest account record for a tag
pub async fn user_handler(
    State(state): State<AppState>,
    Path(rfid_uid): Path<String>,
) -> Result<Json<UserResponse>, CheckoutError> {
    let user = state.resolver.resolve(&rfid_uid).await?;
    Ok(Json(user.into()))
}

/// `GET /product/:barcode` - proxied catalog lookup
pub async fn product_handler(
    State(state): State<AppState>,
    Path(barcode): Path<String>,
) -> Result<Json<serde_json::Value>, CheckoutError> {
    let product = state.catalog.lookup(&barcode).await?;
    Ok(Json(product))
}

/// `POST /checkout` - stage a cart as a pending entry
pub async fn checkout_handler(
    State(state): State<AppState>,
    Json(payload): Json<CheckoutRequest>,
) -> Result<Json<StageResponse>, CheckoutError> {
    let entry = state
        .ledger
        .stage(&payload.rfid_uid, payload.cart_items)
        .await?;
    Ok(Json(StageResponse {
        total: entry.total,
        pending_id: entry.id,
    }))
}

/// `POST /addPending` - staging variant used by older clients
///
/// Any client-supplied total is ignored; the response carries the
/// server-recomputed one.
pub async fn add_pending_handler(
    State(state): State<AppState>,
    Json(payload): Json<AddPendingRequest>,
) -> Result<Json<StageResponse>, CheckoutError> {
    let entry = state.ledger.stage(&payload.rfid_uid, payload.items).await?;
    Ok(Json(StageResponse {
        total: entry.total,
        pending_id: entry.id,
    }))
}

/// `DELETE /clearPending/:rfid_uid` - administrative reset
pub async fn clear_pending_handler(
    State(state): State<AppState>,
    Path(rfid_uid): Path<String>,
) -> Result<Json<MessageResponse>, CheckoutError> {
    let removed = state.ledger.clear(&rfid_uid).await?;
    Ok(Json(MessageResponse {
        message: format!("cleared {removed} pending entries"),
    }))
}

/// `GET /pendingTest?rfid_uid=` - debug listing of a tag's entries
pub async fn pending_debug_handler(
    State(state): State<AppState>,
    Query(query): Query<PendingQuery>,
) -> Result<Json<Vec<PendingEntry>>, CheckoutError> {
    let entries = state.ledger.entries_for(&query.rfid_uid).await?;
    Ok(Json(entries))
}

/// `POST /rfidScan` - hardware scan notification
///
/// Updates the scan tracker only; no settlement side effects.
pub async fn rfid_scan_handler(
    State(state): State<AppState>,
    Json(payload): Json<ScanRequest>,
) -> Result<Json<MessageResponse>, CheckoutError> {
    let scan = state.scans.record_scan(&payload.rfid_uid).await?;
    Ok(Json(MessageResponse {
        message: format!("scan recorded for {}", scan.rfid_uid),
    }))
}

/// `POST /transaction` - hardware-initiated settlement
///
/// Requires the shared `x-api-key` secret. Runs the settlement engine end
/// to end and, on success, flips the scan tracker to completed.
pub async fn transaction_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<TransactionRequest>,
) -> Result<Json<SettlementResponse>, CheckoutError> {
    check_api_key(&state, &headers)?;

    let outcome = state.engine.settle(&payload.rfid_uid).await?;

    // Polling UX only; a failure here must not fail the settlement.
    if let Err(err) = state.scans.mark_completed(&payload.rfid_uid).await {
        warn!(error = %err, "failed to update scan state after settlement");
    }

    Ok(Json(SettlementResponse {
        message: "transaction completed".to_string(),
        transaction_id: outcome.transaction_id,
        total: outcome.total,
        new_balance: outcome.new_balance,
    }))
}

/// Compare the request's `x-api-key` against the configured secret
///
/// An unconfigured secret rejects everything; the server never runs
/// hardware settlements without one.
fn check_api_key(state: &AppState, headers: &HeaderMap) -> Result<(), CheckoutError> {
    let expected = state.api_key.as_deref().ok_or(CheckoutError::InvalidApiKey)?;
    let supplied = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or(CheckoutError::InvalidApiKey)?;

    if supplied != expected {
        return Err(CheckoutError::InvalidApiKey);
    }
    Ok(())
}
