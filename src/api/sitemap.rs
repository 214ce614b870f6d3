//! GET /sitemap.xml

use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    routing::get,
    Router,
};

use crate::api::middleware::{ApiError, AppState};

pub fn router() -> Router<AppState> {
    Router::new().route("/sitemap.xml", get(sitemap))
}

async fn sitemap(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let xml = state.post_service.sitemap().await?;
    Ok((
        [
            (header::CONTENT_TYPE, "application/xml; charset=utf-8"),
            (header::CACHE_CONTROL, "public, max-age=3600"),
        ],
        xml,
    ))
}
