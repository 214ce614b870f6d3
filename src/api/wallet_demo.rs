//! Wallet demo sandbox routes under `/demo/wallet`
//!
//! Every route answers 404 while the demo is disabled. Live wallet calls
//! (`connect`, `transfer`, `balance`) always answer 501.

use axum::{
    extract::{Path, Request, State},
    http::StatusCode,
    middleware::{self as axum_middleware, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

use crate::api::middleware::{ApiError, AppState, ClientIp};
use crate::services::wallet_demo::{
    Attestation, AttestationRequest, DemoStats, TipRequest, TipTotals,
};

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/demo/wallet/tips", post(tip))
        .route("/demo/wallet/tips/{slug}", get(tip_totals))
        .route("/demo/wallet/attestations", post(attest))
        .route("/demo/wallet/attestations/{uid}", get(get_attestation))
        .route("/demo/wallet/stats", get(stats))
        .route("/demo/wallet/connect", post(connect))
        .route("/demo/wallet/transfer", post(transfer))
        .route("/demo/wallet/balance/{address}", get(balance))
        .route_layer(axum_middleware::from_fn_with_state(state, require_enabled))
}

/// Answer 404 before any body is parsed while the demo is off
async fn require_enabled(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    state.wallet_demo.ensure_enabled()?;
    Ok(next.run(request).await)
}

async fn tip(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Json(request): Json<TipRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let receipt = state.wallet_demo.tip(request, ip.as_deref()).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

async fn tip_totals(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<TipTotals>, ApiError> {
    Ok(Json(state.wallet_demo.tip_totals(&slug).await?))
}

async fn attest(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Json(request): Json<AttestationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let attestation = state.wallet_demo.attest(request, ip.as_deref()).await?;
    Ok((StatusCode::CREATED, Json(attestation)))
}

async fn get_attestation(
    State(state): State<AppState>,
    Path(uid): Path<String>,
) -> Result<Json<Attestation>, ApiError> {
    Ok(Json(state.wallet_demo.get_attestation(&uid).await?))
}

async fn stats(State(state): State<AppState>) -> Result<Json<DemoStats>, ApiError> {
    Ok(Json(state.wallet_demo.stats().await?))
}

async fn connect(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state.wallet_demo.live_only("Wallet connection")?;
    Ok(StatusCode::NO_CONTENT)
}

async fn transfer(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state.wallet_demo.live_only("Token transfer")?;
    Ok(StatusCode::NO_CONTENT)
}

async fn balance(
    State(state): State<AppState>,
    Path(_address): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.wallet_demo.live_only("Balance lookup")?;
    Ok(StatusCode::NO_CONTENT)
}
