//! Authentication API endpoints
//!
//! - POST /api/v1/auth/login - Login, sets the session cookie
//! - POST /api/v1/auth/logout - Logout
//! - GET /api/v1/auth/me - Current principal and its permissions

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{
    extract_credential, ApiError, AppState, AuthenticatedPrincipal, Credential,
};
use crate::models::{CredentialKind, Permission, Role, User};
use crate::services::UserServiceError;

/// Request body for login
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(alias = "username", alias = "email")]
    pub username_or_email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: UserResponse,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user_id: Option<i64>,
    pub name: String,
    pub role: Role,
    pub via: CredentialKind,
    pub permissions: Vec<Permission>,
}

/// Build public auth routes (no auth required)
pub fn public_router() -> Router<AppState> {
    Router::new().route("/login", post(login))
}

/// Build protected auth routes (requires auth middleware)
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/logout", post(logout))
        .route("/me", get(me))
}

/// POST /api/v1/auth/login
///
/// Failed attempts are counted per username; five failures in fifteen
/// minutes lock the username out until the window passes.
async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = body.username_or_email.trim().to_string();

    if state.login_limiter.is_username_limited(&username).await {
        tracing::warn!(username = %username, "Login rate limited");
        return Err(ApiError::rate_limited(
            "Too many failed login attempts, try again in 15 minutes",
            900,
        ));
    }

    let (user, session) = match state.user_service.login(&username, &body.password).await {
        Ok(result) => result,
        Err(UserServiceError::AuthenticationError(msg)) => {
            state.login_limiter.record_failed_attempt(&username).await;
            tracing::warn!(username = %username, "Failed login attempt");
            return Err(ApiError::unauthorized(msg));
        }
        Err(e) => return Err(e.into()),
    };

    state.login_limiter.clear_username_attempts(&username).await;
    tracing::info!(user_id = user.id, username = %user.username, "User logged in");

    let cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        state.config.auth.cookie_name,
        session.id,
        state.user_service.session_lifetime().num_seconds()
    );
    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_str(&cookie)
            .map_err(|_| ApiError::internal_error("Invalid session cookie"))?,
    );

    Ok((
        headers,
        Json(LoginResponse {
            user: user.into(),
            token: session.id,
            expires_at: session.expires_at,
        }),
    ))
}

/// POST /api/v1/auth/logout
///
/// Deletes the session behind the request credential and clears the cookie.
/// API tokens stay valid; they are revoked through the admin API.
async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(Credential::Session(session_id)) =
        extract_credential(&headers, &state.config.auth.cookie_name)
    {
        state.user_service.logout(&session_id).await?;
    }

    let cookie = format!(
        "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0",
        state.config.auth.cookie_name
    );
    let mut response_headers = HeaderMap::new();
    response_headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_str(&cookie)
            .map_err(|_| ApiError::internal_error("Invalid session cookie"))?,
    );

    Ok((response_headers, Json(serde_json::json!({ "success": true }))))
}

/// GET /api/v1/auth/me
async fn me(Extension(AuthenticatedPrincipal(principal)): Extension<AuthenticatedPrincipal>) -> Json<MeResponse> {
    Json(MeResponse {
        user_id: principal.user_id,
        permissions: principal.role.permissions().to_vec(),
        name: principal.name,
        role: principal.role,
        via: principal.via,
    })
}
