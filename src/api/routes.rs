use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use crate::chain::{AccountProvider, WalletSession};
use crate::error::VaultError;
use crate::models::{Address, TxKind};
use crate::orchestrator::{OperationStatus, Submission};
use crate::presenter::{FormInput, FormMode, PositionView, StatusBoard, StatusLine};
use crate::teller::{DepositPlan, Quote, VaultTeller};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub teller: Arc<VaultTeller>,
    pub session: Arc<WalletSession>,
}

impl AppState {
    pub fn new(teller: Arc<VaultTeller>, session: Arc<WalletSession>) -> Self {
        Self { teller, session }
    }
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/position", get(get_position))
        .route("/api/status", get(get_status))
        .route("/api/quote", get(get_quote))
        .route("/api/plan", get(get_deposit_plan))
        .route("/api/session", post(post_session))
        .route("/api/approve", post(post_approve))
        .route("/api/deposit", post(post_deposit))
        .route("/api/withdraw", post(post_withdraw))
        .with_state(state)
}

// ===== Route Handlers =====

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Balances, position value, status lines and button state for a form.
async fn get_position(
    State(state): State<AppState>,
    Query(form): Query<FormInput>,
) -> Json<PositionView> {
    Json(state.teller.view(&form).await)
}

async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let statuses = state.teller.statuses();
    Json(StatusResponse {
        latest: statuses.latest_message(),
        errors: statuses.error_lines(),
        statuses,
    })
}

async fn get_quote(
    State(state): State<AppState>,
    Query(params): Query<AmountQuery>,
) -> Result<Json<Quote>, ApiError> {
    let quote = state
        .teller
        .quote(params.mode.unwrap_or_default(), &params.amount)
        .await?;
    Ok(Json(quote))
}

async fn get_deposit_plan(
    State(state): State<AppState>,
    Query(params): Query<AmountQuery>,
) -> Result<Json<DepositPlan>, ApiError> {
    Ok(Json(state.teller.plan_deposit(&params.amount).await?))
}

/// Connect (`{"account": "0x..."}`) or disconnect (`{"account": null}`).
async fn post_session(
    State(state): State<AppState>,
    Json(body): Json<SessionRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    match body.account.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => {
            let account: Address = raw
                .parse()
                .map_err(|e: crate::models::AddressParseError| ApiError::BadRequest(e.to_string()))?;
            state.session.connect(account);
        }
        None => state.session.disconnect(),
    }
    Ok(Json(SessionResponse {
        account: state.session.current_account(),
        connected: state.session.is_connected(),
    }))
}

async fn post_approve(
    State(state): State<AppState>,
    Json(body): Json<AmountRequest>,
) -> Result<(StatusCode, Json<OperationStatus>), ApiError> {
    let submission = state.teller.approve(&body.amount)?;
    Ok(accepted(&state, submission))
}

/// Forwards the amount as-is; clients check `/api/plan` for approval first.
async fn post_deposit(
    State(state): State<AppState>,
    Json(body): Json<AmountRequest>,
) -> Result<(StatusCode, Json<OperationStatus>), ApiError> {
    let submission = state.teller.deposit(&body.amount)?;
    Ok(accepted(&state, submission))
}

async fn post_withdraw(
    State(state): State<AppState>,
    Json(body): Json<AmountRequest>,
) -> Result<(StatusCode, Json<OperationStatus>), ApiError> {
    let submission = state.teller.withdraw(&body.amount)?;
    Ok(accepted(&state, submission))
}

// The write keeps running on its own task; clients poll /api/status.
fn accepted(state: &AppState, submission: Submission) -> (StatusCode, Json<OperationStatus>) {
    let status = current_status(state, submission.kind);
    (StatusCode::ACCEPTED, Json(status))
}

fn current_status(state: &AppState, kind: TxKind) -> OperationStatus {
    state.teller.statuses().get(kind).clone()
}

// ===== Request/Response Types =====

#[derive(Deserialize)]
struct AmountQuery {
    mode: Option<FormMode>,
    #[serde(default)]
    amount: String,
}

#[derive(Deserialize)]
struct AmountRequest {
    amount: String,
}

#[derive(Deserialize)]
struct SessionRequest {
    account: Option<String>,
}

#[derive(Serialize)]
struct SessionResponse {
    account: Option<Address>,
    connected: bool,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Serialize)]
struct StatusResponse {
    statuses: StatusBoard,
    latest: Option<StatusLine>,
    errors: Vec<String>,
}

// ===== Error Handling =====

#[derive(Debug)]
pub enum ApiError {
    Vault(VaultError),
    BadRequest(String),
}

impl From<VaultError> for ApiError {
    fn from(err: VaultError) -> Self {
        ApiError::Vault(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Vault(VaultError::InvalidAmount(_)) => StatusCode::BAD_REQUEST,
            ApiError::Vault(VaultError::NotConnected | VaultError::Busy { .. }) => {
                StatusCode::CONFLICT
            }
            ApiError::Vault(e) => {
                tracing::warn!("Upstream error: {}", e);
                StatusCode::BAD_GATEWAY
            }
        };
        let message = match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::Vault(e) => e.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        let cases = [
            (VaultError::invalid_amount("bad"), StatusCode::BAD_REQUEST),
            (VaultError::NotConnected, StatusCode::CONFLICT),
            (VaultError::Busy { kind: TxKind::Deposit }, StatusCode::CONFLICT),
            (VaultError::NetworkError("down".into()), StatusCode::BAD_GATEWAY),
            (VaultError::rejected(TxKind::Approve, "nope"), StatusCode::BAD_GATEWAY),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), expected);
        }
        assert_eq!(
            ApiError::BadRequest("x".into()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
    }
}
