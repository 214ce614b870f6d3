//! Library API endpoints
//!
//! - GET /api/v1/library - Public shelf, newest first (`kind`)
//! - GET|POST /api/v1/admin/library
//! - PUT|DELETE /api/v1/admin/library/{id}

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
    Extension, Json, Router,
};
use serde::Deserialize;

use crate::api::common::parse_filter;
use crate::api::middleware::{permission_gate, ApiError, AppState, AuthenticatedPrincipal};
use crate::models::{LibraryItem, LibraryItemInput, LibraryKind, Permission};

#[derive(Debug, Default, Deserialize)]
pub struct LibraryQuery {
    pub kind: Option<String>,
}

pub fn public_router() -> Router<AppState> {
    Router::new().route("/library", get(list_items))
}

pub fn admin_router() -> Router<AppState> {
    let routes = Router::new()
        .route("/admin/library", get(list_items).post(create_item))
        .route("/admin/library/{id}", put(update_item).delete(delete_item));
    permission_gate(routes, Permission::LibraryWrite)
}

/// GET /api/v1/library
async fn list_items(
    State(state): State<AppState>,
    Query(query): Query<LibraryQuery>,
) -> Result<Json<Vec<LibraryItem>>, ApiError> {
    let kind = parse_filter::<LibraryKind>(query.kind.as_deref())?;
    Ok(Json(state.library_service.list(kind).await?))
}

async fn create_item(
    State(state): State<AppState>,
    Extension(AuthenticatedPrincipal(principal)): Extension<AuthenticatedPrincipal>,
    Json(input): Json<LibraryItemInput>,
) -> Result<impl IntoResponse, ApiError> {
    let item = state.library_service.create(input, &principal).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

async fn update_item(
    State(state): State<AppState>,
    Extension(AuthenticatedPrincipal(principal)): Extension<AuthenticatedPrincipal>,
    Path(id): Path<i64>,
    Json(input): Json<LibraryItemInput>,
) -> Result<Json<LibraryItem>, ApiError> {
    Ok(Json(state.library_service.update(id, input, &principal).await?))
}

async fn delete_item(
    State(state): State<AppState>,
    Extension(AuthenticatedPrincipal(principal)): Extension<AuthenticatedPrincipal>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.library_service.delete(id, &principal).await?;
    Ok(StatusCode::NO_CONTENT)
}
