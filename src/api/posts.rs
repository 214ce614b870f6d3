//! Post API endpoints
//!
//! Public:
//! - GET /api/v1/posts - Cursor-paginated feed (`kind`, `tag`, `cursor`, `limit`)
//! - GET /api/v1/posts/{slug} - Published post by slug
//!
//! Admin:
//! - GET /api/v1/admin/posts - Any-status listing (`status`, `page`, `per_page`)
//! - POST /api/v1/admin/posts - Create
//! - GET|PUT|DELETE /api/v1/admin/posts/{id}

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Extension, Json, Router,
};
use serde::Deserialize;

use crate::api::common::{default_page, default_per_page, parse_filter};
use crate::api::middleware::{permission_gate, ApiError, AppState, AuthenticatedPrincipal};
use crate::models::{
    CreatePostInput, CursorPage, FeedFilter, ListParams, PagedResult, Permission, Post, PostKind,
    PostStatus, PostSummary, UpdatePostInput,
};

#[derive(Debug, Default, Deserialize)]
pub struct FeedQuery {
    pub kind: Option<String>,
    pub tag: Option<String>,
    pub cursor: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct AdminListQuery {
    pub status: Option<String>,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

impl AdminListQuery {
    fn list_params(&self) -> ListParams {
        ListParams::new(self.page, self.per_page)
    }
}

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/posts", get(list_posts))
        .route("/posts/{slug}", get(get_post))
}

pub fn admin_router() -> Router<AppState> {
    let read = Router::new()
        .route("/admin/posts", get(list_admin))
        .route("/admin/posts/{id}", get(get_admin));
    let write = Router::new()
        .route("/admin/posts", post(create_post))
        .route("/admin/posts/{id}", axum::routing::put(update_post));
    let remove = Router::new().route("/admin/posts/{id}", delete(delete_post));

    Router::new()
        .merge(permission_gate(read, Permission::PostsReadDrafts))
        .merge(permission_gate(write, Permission::PostsWrite))
        .merge(permission_gate(remove, Permission::PostsDelete))
}

/// GET /api/v1/posts
async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<FeedQuery>,
) -> Result<Json<CursorPage<PostSummary>>, ApiError> {
    let filter = FeedFilter {
        kind: parse_filter::<PostKind>(query.kind.as_deref())?,
        tag: query
            .tag
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty()),
    };
    let page = state
        .post_service
        .list_public(&filter, query.cursor.as_deref(), query.limit)
        .await?;
    Ok(Json(page))
}

/// GET /api/v1/posts/{slug}
async fn get_post(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Post>, ApiError> {
    Ok(Json(state.post_service.get_by_slug_public(&slug).await?))
}

/// GET /api/v1/admin/posts
async fn list_admin(
    State(state): State<AppState>,
    Query(query): Query<AdminListQuery>,
) -> Result<Json<PagedResult<Post>>, ApiError> {
    let status = parse_filter::<PostStatus>(query.status.as_deref())?;
    let page = state
        .post_service
        .list_admin(status, &query.list_params())
        .await?;
    Ok(Json(page))
}

/// GET /api/v1/admin/posts/{id}
async fn get_admin(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Post>, ApiError> {
    Ok(Json(state.post_service.get_by_id(id).await?))
}

/// POST /api/v1/admin/posts
async fn create_post(
    State(state): State<AppState>,
    Extension(AuthenticatedPrincipal(principal)): Extension<AuthenticatedPrincipal>,
    Json(input): Json<CreatePostInput>,
) -> Result<impl IntoResponse, ApiError> {
    let post = state.post_service.create(input, &principal).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

/// PUT /api/v1/admin/posts/{id}
async fn update_post(
    State(state): State<AppState>,
    Extension(AuthenticatedPrincipal(principal)): Extension<AuthenticatedPrincipal>,
    Path(id): Path<i64>,
    Json(input): Json<UpdatePostInput>,
) -> Result<Json<Post>, ApiError> {
    Ok(Json(state.post_service.update(id, input, &principal).await?))
}

/// DELETE /api/v1/admin/posts/{id}
async fn delete_post(
    State(state): State<AppState>,
    Extension(AuthenticatedPrincipal(principal)): Extension<AuthenticatedPrincipal>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.post_service.delete(id, &principal).await?;
    Ok(StatusCode::NO_CONTENT)
}
