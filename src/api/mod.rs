//! API layer - HTTP handlers and routing
//!
//! All JSON endpoints live under `/api/v1`:
//! - Health and site info
//! - Posts feed and post lookups
//! - Comments (public submission and moderation)
//! - Library shelf
//! - Auth (login, logout, current principal)
//! - Admin (posts, comments, library, media, audit log, API tokens)
//! - Revalidation webhook
//!
//! `/sitemap.xml` and the `/demo/wallet` sandbox sit at the root.

pub mod admin;
pub mod auth;
pub mod comments;
pub mod common;
pub mod library;
pub mod middleware;
pub mod posts;
pub mod revalidate;
pub mod site;
pub mod sitemap;
pub mod wallet_demo;

use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use middleware::{ApiError, AppState, AuthenticatedPrincipal};

/// Build the `/api/v1` router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // Admin routes: authenticated, then gated per permission inside each module
    let admin_routes = Router::new()
        .merge(posts::admin_router())
        .merge(comments::admin_router())
        .merge(library::admin_router())
        .merge(admin::router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Protected routes (need auth, no specific permission)
    let protected_routes = Router::new()
        .nest("/auth", auth::protected_router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Public routes
    Router::new()
        .merge(site::router())
        .merge(posts::public_router())
        .merge(comments::public_router())
        .merge(library::public_router())
        .merge(revalidate::router())
        .nest("/auth", auth::public_router())
        .merge(admin_routes)
        .merge(protected_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.server.cors_origin);

    Router::new()
        .nest("/api/v1", build_api_router(state.clone()))
        .merge(sitemap::router())
        .merge(wallet_demo::router(state.clone()))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// CORS with credentials for the configured frontend origin
fn cors_layer(origin: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::COOKIE,
            header::HeaderName::from_static("x-folio-signature"),
            header::HeaderName::from_static("x-folio-timestamp"),
        ])
        .allow_credentials(true);

    match origin.parse::<HeaderValue>() {
        Ok(origin) => cors.allow_origin(origin),
        Err(_) => {
            tracing::warn!("Invalid CORS origin {:?}, cross-origin requests disabled", origin);
            cors
        }
    }
}
