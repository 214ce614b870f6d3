//! Admin API endpoints
//!
//! - GET /api/v1/admin/audit - Audit log (`action`, `target_type`, `page`, `per_page`)
//! - GET|POST /api/v1/admin/media, PUT|DELETE /api/v1/admin/media/{id}
//! - GET|POST /api/v1/admin/tokens, DELETE /api/v1/admin/tokens/{id}

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, put},
    Extension, Json, Router,
};
use serde::Deserialize;

use crate::api::common::{default_page, default_per_page};
use crate::api::middleware::{permission_gate, ApiError, AppState, AuthenticatedPrincipal};
use crate::models::{
    ApiToken, AuditFilter, AuditLog, ListParams, MediaAsset, MediaAssetInput, PagedResult,
    Permission, Role,
};

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub action: Option<String>,
    pub target_type: Option<String>,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

/// Request body for issuing an API token
#[derive(Debug, Deserialize)]
pub struct IssueTokenRequest {
    pub name: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub expires_in_days: Option<i64>,
}

pub fn router() -> Router<AppState> {
    let audit = Router::new().route("/admin/audit", get(list_audit));
    let media = Router::new()
        .route("/admin/media", get(list_media).post(create_media))
        .route("/admin/media/{id}", put(update_media).delete(delete_media));
    let tokens = Router::new()
        .route("/admin/tokens", get(list_tokens).post(issue_token))
        .route("/admin/tokens/{id}", delete(revoke_token));

    Router::new()
        .merge(permission_gate(audit, Permission::AuditRead))
        .merge(permission_gate(media, Permission::MediaWrite))
        .merge(permission_gate(tokens, Permission::TokensManage))
}

/// GET /api/v1/admin/audit
async fn list_audit(
    State(state): State<AppState>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<PagedResult<AuditLog>>, ApiError> {
    let filter = AuditFilter {
        action: query.action.filter(|a| !a.is_empty()),
        target_type: query.target_type.filter(|t| !t.is_empty()),
    };
    let params = ListParams::new(query.page, query.per_page);
    Ok(Json(state.audit_service.list(&filter, &params).await?))
}

async fn list_media(State(state): State<AppState>) -> Result<Json<Vec<MediaAsset>>, ApiError> {
    Ok(Json(state.media_service.list().await?))
}

async fn create_media(
    State(state): State<AppState>,
    Extension(AuthenticatedPrincipal(principal)): Extension<AuthenticatedPrincipal>,
    Json(input): Json<MediaAssetInput>,
) -> Result<impl IntoResponse, ApiError> {
    let asset = state.media_service.create(input, &principal).await?;
    Ok((StatusCode::CREATED, Json(asset)))
}

async fn update_media(
    State(state): State<AppState>,
    Extension(AuthenticatedPrincipal(principal)): Extension<AuthenticatedPrincipal>,
    Path(id): Path<i64>,
    Json(input): Json<MediaAssetInput>,
) -> Result<Json<MediaAsset>, ApiError> {
    Ok(Json(state.media_service.update(id, input, &principal).await?))
}

async fn delete_media(
    State(state): State<AppState>,
    Extension(AuthenticatedPrincipal(principal)): Extension<AuthenticatedPrincipal>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.media_service.delete(id, &principal).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_tokens(State(state): State<AppState>) -> Result<Json<Vec<ApiToken>>, ApiError> {
    Ok(Json(state.token_service.list().await?))
}

/// POST /api/v1/admin/tokens
///
/// The plaintext token is only part of this response.
async fn issue_token(
    State(state): State<AppState>,
    Extension(AuthenticatedPrincipal(principal)): Extension<AuthenticatedPrincipal>,
    Json(body): Json<IssueTokenRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let issued = state
        .token_service
        .issue(&body.name, body.role, body.expires_in_days, &principal)
        .await?;
    Ok((StatusCode::CREATED, Json(issued)))
}

async fn revoke_token(
    State(state): State<AppState>,
    Extension(AuthenticatedPrincipal(principal)): Extension<AuthenticatedPrincipal>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.token_service.revoke(id, &principal).await?;
    Ok(StatusCode::NO_CONTENT)
}
