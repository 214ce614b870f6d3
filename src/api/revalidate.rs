//! POST /api/v1/revalidate - Cache revalidation webhook
//!
//! Accepts either a signed call (`X-Folio-Signature` + `X-Folio-Timestamp`)
//! or a principal holding `cache:revalidate`.

use axum::{body::Bytes, extract::State, http::HeaderMap, routing::post, Json, Router};
use chrono::Utc;

use crate::api::middleware::{resolve_principal, ApiError, AppState};
use crate::models::Permission;
use crate::services::revalidate::{SIGNATURE_HEADER, TIMESTAMP_HEADER};
use crate::services::{RevalidateRequest, RevalidateResponse};

pub fn router() -> Router<AppState> {
    Router::new().route("/revalidate", post(revalidate))
}

async fn revalidate(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<RevalidateResponse>, ApiError> {
    let actor = match header_str(&headers, SIGNATURE_HEADER) {
        Some(signature) => {
            let timestamp = header_str(&headers, TIMESTAMP_HEADER)
                .ok_or_else(|| ApiError::unauthorized("Missing X-Folio-Timestamp header"))?;
            state
                .revalidate_service
                .verify_signature(timestamp, signature, &body, Utc::now())
                .inspect_err(|e| tracing::warn!("Rejected revalidation webhook: {}", e))?;
            None
        }
        None => {
            let principal = resolve_principal(&state, &headers)
                .await?
                .ok_or_else(|| ApiError::unauthorized("Missing signature or credentials"))?;
            if !principal.can(Permission::CacheRevalidate) {
                return Err(ApiError::forbidden("cache:revalidate required"));
            }
            Some(principal.actor())
        }
    };

    let request = if body.iter().all(u8::is_ascii_whitespace) {
        RevalidateRequest::default()
    } else {
        serde_json::from_slice::<RevalidateRequest>(&body)
            .map_err(|e| ApiError::validation_error(format!("Invalid request body: {}", e)))?
    };

    Ok(Json(state.revalidate_service.revalidate(&request, actor).await?))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|h| h.to_str().ok())
}
