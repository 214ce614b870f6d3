//! Folio - publishing backend for a personal portfolio site

use anyhow::Result;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::time::{interval, Duration};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use folio::{
    api::{self, AppState},
    config::Config,
    db,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "folio=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Folio...");

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.yml"));
    let config = Config::load_with_env(&config_path)?;
    tracing::info!("Configuration loaded from {}", config_path.display());

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {}", config.database.url);

    let applied = db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed ({} applied)", applied);

    let bootstrap_admin = config.auth.bootstrap_admin.clone();
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(pool, config);

    if let Some(admin) = bootstrap_admin {
        match state.user_service.ensure_bootstrap_admin(&admin).await {
            Ok(Some(user)) => tracing::info!("Created bootstrap admin '{}'", user.username),
            Ok(None) => tracing::debug!("Users exist, skipping bootstrap admin"),
            Err(e) => tracing::warn!("Failed to create bootstrap admin: {}", e),
        }
    }

    spawn_cleanup_tasks(&state);

    let app = api::build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Periodic pruning of rate-limit windows and expired sessions
fn spawn_cleanup_tasks(state: &AppState) {
    let login_limiter = state.login_limiter.clone();
    let comment_limiter = state.comment_service.limiter().clone();
    let demo_limiter = state.wallet_demo.limiter().clone();
    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(300));
        loop {
            ticker.tick().await;
            login_limiter.cleanup().await;
            comment_limiter.cleanup().await;
            demo_limiter.cleanup().await;
        }
    });

    let user_service = state.user_service.clone();
    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(3600));
        loop {
            ticker.tick().await;
            match user_service.cleanup_expired_sessions().await {
                Ok(0) => {}
                Ok(removed) => tracing::info!("Removed {} expired sessions", removed),
                Err(e) => tracing::warn!("Session cleanup failed: {}", e),
            }
        }
    });
}
