//! Health and public site information

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;

use crate::api::middleware::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct SiteFeatures {
    pub wallet_demo: bool,
    pub comment_moderation: bool,
}

/// Response for public site info
#[derive(Debug, Serialize)]
pub struct SiteInfoResponse {
    pub name: String,
    pub base_url: String,
    pub description: String,
    pub version: &'static str,
    pub features: SiteFeatures,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/site", get(site_info))
}

/// GET /api/v1/health
async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let version = env!("CARGO_PKG_VERSION");
    match state.pool.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok",
                version,
            }),
        ),
        Err(e) => {
            tracing::error!("Health check failed: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(HealthResponse {
                    status: "unavailable",
                    version,
                }),
            )
        }
    }
}

/// GET /api/v1/site
async fn site_info(State(state): State<AppState>) -> Json<SiteInfoResponse> {
    let site = &state.config.site;
    Json(SiteInfoResponse {
        name: site.name.clone(),
        base_url: site.base().to_string(),
        description: site.description.clone(),
        version: env!("CARGO_PKG_VERSION"),
        features: SiteFeatures {
            wallet_demo: state.wallet_demo.enabled(),
            comment_moderation: state.config.comments.require_moderation,
        },
    })
}
