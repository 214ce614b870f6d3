//! API middleware
//!
//! Contains:
//! - `AppState`, the shared services handed to every handler
//! - `ApiError`, the JSON error envelope and its status mapping
//! - Authentication (session cookie or bearer credential)
//! - Authorization (role permission checks)

use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::{self as axum_middleware, Next},
    response::{IntoResponse, Response},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::cache::{create_cache, MemoryCache};
use crate::config::Config;
use crate::db::repositories::{
    SqlxApiTokenRepository, SqlxAuditLogRepository, SqlxCommentRepository, SqlxLibraryRepository,
    SqlxMediaRepository, SqlxPostRepository, SqlxSessionRepository, SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::models::{CredentialKind, Permission, Principal};
use crate::services::{
    AuditService, AuditServiceError, CommentService, CommentServiceError, LibraryService,
    LibraryServiceError, LoginRateLimiter, MediaService, MediaServiceError, PostService,
    PostServiceError, RevalidateError, RevalidateService, TokenService, TokenServiceError,
    UserService, UserServiceError, WalletDemoError, WalletDemoService, TOKEN_PREFIX,
};

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: DynDatabasePool,
    pub config: Arc<Config>,
    pub cache: Arc<MemoryCache>,
    pub user_service: Arc<UserService>,
    pub token_service: Arc<TokenService>,
    pub post_service: Arc<PostService>,
    pub comment_service: Arc<CommentService>,
    pub audit_service: Arc<AuditService>,
    pub library_service: Arc<LibraryService>,
    pub media_service: Arc<MediaService>,
    pub revalidate_service: Arc<RevalidateService>,
    pub wallet_demo: Arc<WalletDemoService>,
    pub login_limiter: LoginRateLimiter,
}

impl AppState {
    /// Wire repositories and services on top of a migrated pool
    pub fn new(pool: DynDatabasePool, config: Config) -> Self {
        let cache = create_cache(&config.cache);
        let audit_service = Arc::new(AuditService::new(SqlxAuditLogRepository::boxed(pool.clone())));
        let post_repo = SqlxPostRepository::boxed(pool.clone());

        let user_service = Arc::new(UserService::with_session_expiration(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool.clone()),
            config.auth.session_days,
        ));
        let token_service = Arc::new(TokenService::new(
            SqlxApiTokenRepository::boxed(pool.clone()),
            audit_service.clone(),
        ));
        let post_service = Arc::new(PostService::new(
            post_repo.clone(),
            cache.clone(),
            audit_service.clone(),
            config.site.clone(),
        ));
        let comment_service = Arc::new(CommentService::new(
            SqlxCommentRepository::boxed(pool.clone()),
            post_repo.clone(),
            audit_service.clone(),
            config.comments.clone(),
        ));
        let library_service = Arc::new(LibraryService::new(
            SqlxLibraryRepository::boxed(pool.clone()),
            audit_service.clone(),
        ));
        let media_service = Arc::new(MediaService::new(
            SqlxMediaRepository::boxed(pool.clone()),
            audit_service.clone(),
        ));
        let revalidate_service = Arc::new(RevalidateService::new(
            cache.clone(),
            audit_service.clone(),
            config.revalidate.clone(),
        ));
        let wallet_demo = Arc::new(WalletDemoService::new(post_repo, &config.wallet_demo));

        Self {
            pool,
            config: Arc::new(config),
            cache,
            user_service,
            token_service,
            post_service,
            comment_service,
            audit_service,
            library_service,
            media_service,
            revalidate_service,
            wallet_demo,
            login_limiter: LoginRateLimiter::new(),
        }
    }
}

/// Principal extracted from request
#[derive(Debug, Clone)]
pub struct AuthenticatedPrincipal(pub Principal);

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    pub fn gone(message: impl Into<String>) -> Self {
        Self::new("GONE", message)
    }

    pub fn rate_limited(message: impl Into<String>, retry_after_secs: u64) -> Self {
        Self::with_details(
            "RATE_LIMITED",
            message,
            serde_json::json!({ "retry_after": retry_after_secs }),
        )
    }

    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self::new("NOT_IMPLEMENTED", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }

    pub fn status(&self) -> StatusCode {
        match self.error.code.as_str() {
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "CONFLICT" => StatusCode::CONFLICT,
            "GONE" => StatusCode::GONE,
            "RATE_LIMITED" => StatusCode::TOO_MANY_REQUESTS,
            "NOT_IMPLEMENTED" => StatusCode::NOT_IMPLEMENTED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

/// Internal errors are logged here and hidden from the client
fn internal(e: anyhow::Error) -> ApiError {
    tracing::error!("Internal error: {:#}", e);
    ApiError::internal_error("Internal server error")
}

impl From<PostServiceError> for ApiError {
    fn from(e: PostServiceError) -> Self {
        match e {
            PostServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            PostServiceError::NotFound(slug) => ApiError::not_found(format!("Post not found: {}", slug)),
            PostServiceError::Gone(slug) => ApiError::gone(format!("Post is no longer available: {}", slug)),
            PostServiceError::SlugConflict(slug) => ApiError::conflict(format!("Slug already exists: {}", slug)),
            PostServiceError::Forbidden(msg) => ApiError::forbidden(msg),
            PostServiceError::InternalError(e) => internal(e),
        }
    }
}

impl From<CommentServiceError> for ApiError {
    fn from(e: CommentServiceError) -> Self {
        match e {
            CommentServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            CommentServiceError::NotFound(what) => ApiError::not_found(format!("Not found: {}", what)),
            CommentServiceError::RateLimited => {
                ApiError::rate_limited("Too many comments, try again later", 60)
            }
            CommentServiceError::Forbidden(msg) => ApiError::forbidden(msg),
            CommentServiceError::InternalError(e) => internal(e),
        }
    }
}

impl From<UserServiceError> for ApiError {
    fn from(e: UserServiceError) -> Self {
        match e {
            UserServiceError::AuthenticationError(msg) => ApiError::unauthorized(msg),
            UserServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            UserServiceError::UserExists(msg) => ApiError::conflict(msg),
            UserServiceError::InternalError(e) => internal(e),
        }
    }
}

impl From<TokenServiceError> for ApiError {
    fn from(e: TokenServiceError) -> Self {
        match e {
            TokenServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            TokenServiceError::NotFound(id) => ApiError::not_found(format!("Token not found: {}", id)),
            TokenServiceError::InternalError(e) => internal(e),
        }
    }
}

impl From<AuditServiceError> for ApiError {
    fn from(e: AuditServiceError) -> Self {
        match e {
            AuditServiceError::InternalError(e) => internal(e),
        }
    }
}

impl From<LibraryServiceError> for ApiError {
    fn from(e: LibraryServiceError) -> Self {
        match e {
            LibraryServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            LibraryServiceError::NotFound(id) => {
                ApiError::not_found(format!("Library item not found: {}", id))
            }
            LibraryServiceError::InternalError(e) => internal(e),
        }
    }
}

impl From<MediaServiceError> for ApiError {
    fn from(e: MediaServiceError) -> Self {
        match e {
            MediaServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            MediaServiceError::NotFound(id) => ApiError::not_found(format!("Media asset not found: {}", id)),
            MediaServiceError::InternalError(e) => internal(e),
        }
    }
}

impl From<RevalidateError> for ApiError {
    fn from(e: RevalidateError) -> Self {
        match e {
            RevalidateError::Unauthorized(msg) => ApiError::unauthorized(msg),
            RevalidateError::ValidationError(msg) => ApiError::validation_error(msg),
            RevalidateError::InternalError(e) => internal(e),
        }
    }
}

impl From<WalletDemoError> for ApiError {
    fn from(e: WalletDemoError) -> Self {
        match e {
            WalletDemoError::Disabled => ApiError::not_found("Not found"),
            WalletDemoError::ValidationError(msg) => ApiError::validation_error(msg),
            WalletDemoError::NotFound(what) => ApiError::not_found(format!("Not found: {}", what)),
            WalletDemoError::RateLimited => {
                ApiError::rate_limited("Too many demo requests, try again later", 60)
            }
            e @ WalletDemoError::NotImplemented(_) => ApiError::not_implemented(e.to_string()),
            WalletDemoError::InternalError(e) => internal(e),
        }
    }
}

/// A credential presented with a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    Session(String),
    ApiToken(String),
}

/// Extract the credential from request headers.
///
/// A bearer header wins over the session cookie. Bearer values carrying the
/// API token prefix are API tokens, anything else is a session id.
pub fn extract_credential(headers: &HeaderMap, cookie_name: &str) -> Option<Credential> {
    if let Some(token) = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
    {
        return Some(if token.starts_with(TOKEN_PREFIX) {
            Credential::ApiToken(token.to_string())
        } else {
            Credential::Session(token.to_string())
        });
    }

    session_cookie(headers, cookie_name).map(Credential::Session)
}

/// Value of the session cookie, if present
pub fn session_cookie(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    for value in headers.get_all(header::COOKIE) {
        let Ok(cookie_str) = value.to_str() else {
            continue;
        };
        for cookie in cookie_str.split(';') {
            if let Some((name, token)) = cookie.trim().split_once('=') {
                if name == cookie_name && !token.is_empty() {
                    return Some(token.to_string());
                }
            }
        }
    }
    None
}

/// Resolve the request credential to a principal, if any is valid
pub async fn resolve_principal(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<Option<Principal>, ApiError> {
    let Some(credential) = extract_credential(headers, &state.config.auth.cookie_name) else {
        return Ok(None);
    };

    match credential {
        Credential::ApiToken(token) => {
            let token = state.token_service.resolve(&token).await?;
            Ok(token.map(|t| Principal {
                user_id: None,
                name: t.name,
                role: t.role,
                via: CredentialKind::ApiToken,
            }))
        }
        Credential::Session(session_id) => {
            let user = state.user_service.validate_session(&session_id).await?;
            Ok(user.map(|u| Principal {
                user_id: Some(u.id),
                name: u.username,
                role: u.role,
                via: CredentialKind::Session,
            }))
        }
    }
}

/// Authentication middleware
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let principal = resolve_principal(&state, request.headers())
        .await?
        .ok_or_else(|| {
            tracing::debug!(path = %request.uri().path(), "Rejected unauthenticated request");
            ApiError::unauthorized("Missing or invalid credentials")
        })?;

    request.extensions_mut().insert(AuthenticatedPrincipal(principal));
    Ok(next.run(request).await)
}

/// Authorization middleware; runs after `require_auth`
pub async fn require_permission(
    permission: Permission,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let principal = request
        .extensions()
        .get::<AuthenticatedPrincipal>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    if !principal.0.can(permission) {
        tracing::warn!(
            actor = %principal.0.actor(),
            role = %principal.0.role,
            permission = %permission,
            "Permission denied"
        );
        return Err(ApiError::forbidden(format!("{} required", permission)));
    }

    Ok(next.run(request).await)
}

/// Gate every route of `router` behind `permission`
pub fn permission_gate(router: Router<AppState>, permission: Permission) -> Router<AppState> {
    router.route_layer(axum_middleware::from_fn(
        move |request: Request, next: Next| require_permission(permission, request, next),
    ))
}

/// Client IP from proxy headers
pub fn client_ip(headers: &HeaderMap) -> Option<String> {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|h| h.to_str().ok()) {
        if let Some(ip) = forwarded.split(',').next().map(str::trim).filter(|ip| !ip.is_empty()) {
            return Some(ip.to_string());
        }
    }
    headers
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Client address of a request: proxy headers first, then the socket peer
/// when the server runs with connect info
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientIp(pub Option<String>);

impl<S: Send + Sync> FromRequestParts<S> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ip = client_ip(&parts.headers).or_else(|| {
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        });
        Ok(Self(ip))
    }
}

pub fn user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::USER_AGENT)
        .and_then(|h| h.to_str().ok())
        .map(String::from)
}
