//! Comment API endpoints
//!
//! Public:
//! - GET /api/v1/posts/{slug}/comments - Approved comments as threads
//! - POST /api/v1/posts/{slug}/comments - Submit a comment
//!
//! Moderation:
//! - GET /api/v1/admin/comments - Moderation queue (`status`, `page`, `per_page`)
//! - POST /api/v1/admin/comments/{id}/{approve|reject|spam}
//! - DELETE /api/v1/admin/comments/{id}

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::common::{default_page, default_per_page, parse_filter};
use crate::api::middleware::{
    permission_gate, user_agent, ApiError, AppState, AuthenticatedPrincipal, ClientIp,
};
use crate::models::{
    Comment, CommentStatus, CommentThread, ListParams, ModerationAction, ModerationItem,
    PagedResult, Permission, SubmitCommentInput,
};

#[derive(Debug, Deserialize)]
pub struct ModerationQuery {
    pub status: Option<String>,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

#[derive(Debug, Default, Deserialize)]
pub struct ModerateRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

/// Response after a submission; the status tells the client whether the
/// comment is visible yet
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub id: i64,
    pub status: CommentStatus,
}

pub fn public_router() -> Router<AppState> {
    Router::new().route(
        "/posts/{slug}/comments",
        get(list_comments).post(submit_comment),
    )
}

pub fn admin_router() -> Router<AppState> {
    let moderate = Router::new()
        .route("/admin/comments", get(moderation_queue))
        .route("/admin/comments/{id}/{action}", post(moderate_comment));
    let remove = Router::new().route("/admin/comments/{id}", delete(delete_comment));

    Router::new()
        .merge(permission_gate(moderate, Permission::CommentsModerate))
        .merge(permission_gate(remove, Permission::CommentsDelete))
}

/// GET /api/v1/posts/{slug}/comments
async fn list_comments(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Vec<CommentThread>>, ApiError> {
    Ok(Json(state.comment_service.list_approved(&slug).await?))
}

/// POST /api/v1/posts/{slug}/comments
async fn submit_comment(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    ClientIp(ip): ClientIp,
    headers: HeaderMap,
    Json(input): Json<SubmitCommentInput>,
) -> Result<impl IntoResponse, ApiError> {
    let ua = user_agent(&headers);
    let comment = state
        .comment_service
        .submit(&slug, input, ip.as_deref(), ua.as_deref())
        .await?;

    // Spam is reported like a pending comment
    let status = match comment.status {
        CommentStatus::Spam => CommentStatus::Pending,
        other => other,
    };
    Ok((
        StatusCode::CREATED,
        Json(SubmitResponse {
            id: comment.id,
            status,
        }),
    ))
}

/// GET /api/v1/admin/comments
async fn moderation_queue(
    State(state): State<AppState>,
    Query(query): Query<ModerationQuery>,
) -> Result<Json<PagedResult<ModerationItem>>, ApiError> {
    let status = parse_filter::<CommentStatus>(query.status.as_deref())?;
    let params = ListParams::new(query.page, query.per_page);
    Ok(Json(
        state.comment_service.list_for_moderation(status, &params).await?,
    ))
}

/// POST /api/v1/admin/comments/{id}/{action}
async fn moderate_comment(
    State(state): State<AppState>,
    Extension(AuthenticatedPrincipal(principal)): Extension<AuthenticatedPrincipal>,
    Path((id, action)): Path<(i64, String)>,
    body: Option<Json<ModerateRequest>>,
) -> Result<Json<Comment>, ApiError> {
    let action = action
        .parse::<ModerationAction>()
        .map_err(|_| ApiError::not_found(format!("Unknown moderation action: {}", action)))?;
    let reason = body.and_then(|Json(b)| b.reason);

    let comment = state
        .comment_service
        .moderate(id, action, &principal, reason)
        .await?;
    tracing::info!(comment_id = id, action = action.as_str(), actor = %principal.actor(), "Comment moderated");
    Ok(Json(comment))
}

/// DELETE /api/v1/admin/comments/{id}
async fn delete_comment(
    State(state): State<AppState>,
    Extension(AuthenticatedPrincipal(principal)): Extension<AuthenticatedPrincipal>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.comment_service.delete(id, &principal).await?;
    Ok(StatusCode::NO_CONTENT)
}
