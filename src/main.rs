use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::CorsLayer;

mod auth;
mod config;
mod db;
pub mod error;
mod extract;
mod handlers;
mod models;
mod schema;

use auth::SessionManager;
use config::AppConfig;

/// Shared application state, built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub pool: db::DbPool,
    pub config: Arc<AppConfig>,
    pub sessions: SessionManager,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    dotenvy::dotenv().ok();

    let config = AppConfig::from_env()?;
    let pool = db::establish_connection_pool(&config.database_url)?;
    let sessions = SessionManager::new(config.session_secret.clone(), config.production);

    let cors = build_cors_layer(&config)?;
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    let state = AppState {
        pool,
        config: Arc::new(config),
        sessions,
    };

    let app = Router::new()
        .route("/health", get(health_check))
        // Auth routes
        .route("/auth/google", get(auth::handlers::auth_google))
        .route("/auth/google/callback", get(auth::handlers::auth_callback))
        .route("/auth/logout", get(auth::handlers::auth_logout))
        .route("/api/auth/user", get(auth::handlers::auth_me))
        // Listing routes
        .route("/api/listings", get(handlers::listings::list_listings))
        .route("/api/listings", post(handlers::listings::create_listing))
        .route("/api/listings/:id", get(handlers::listings::get_listing))
        .route("/api/listings/:id", put(handlers::listings::update_listing))
        .route(
            "/api/listings/:id",
            delete(handlers::listings::delete_listing),
        )
        // User routes
        .route("/api/users/me", put(handlers::users::update_me))
        .route(
            "/api/users/me/favorites",
            get(handlers::users::list_favorites),
        )
        .route(
            "/api/users/me/favorites/:listing_id",
            post(handlers::users::add_favorite),
        )
        .route(
            "/api/users/me/favorites/:listing_id",
            delete(handlers::users::remove_favorite),
        )
        .route("/api/users/:id", get(handlers::users::get_profile))
        // Message routes
        .route(
            "/api/messages/conversations",
            get(handlers::messages::list_conversations),
        )
        .route("/api/messages", get(handlers::messages::get_thread))
        .route("/api/messages", post(handlers::messages::send_message))
        // Review routes
        .route("/api/reviews", get(handlers::reviews::list_reviews))
        .route("/api/reviews", post(handlers::reviews::create_review))
        // Report routes
        .route("/api/reports", post(handlers::reports::create_report))
        // Notification routes
        .route(
            "/api/notifications",
            get(handlers::notifications::list_notifications),
        )
        .route(
            "/api/notifications/:id/read",
            put(handlers::notifications::mark_notification_read),
        )
        // Leaderboard
        .route(
            "/api/leaderboard",
            get(handlers::leaderboard::get_leaderboard),
        )
        // Admin routes
        .route("/api/admin/users", get(handlers::admin::list_users))
        .route("/api/admin/listings", get(handlers::admin::list_listings))
        .route("/api/admin/users/:id/ban", put(handlers::admin::ban_user))
        .route(
            "/api/admin/listings/:id/feature",
            put(handlers::admin::feature_listing),
        )
        .route("/api/admin/reports", get(handlers::admin::list_reports))
        .route(
            "/api/admin/reports/:id/resolve",
            put(handlers::admin::resolve_report),
        )
        .layer(cors)
        .with_state(state);

    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> StatusCode {
    StatusCode::OK
}

/// CORS for the client application. The session cookie crosses origins, so
/// credentials are allowed and the origin list is exact, never permissive.
fn build_cors_layer(config: &AppConfig) -> anyhow::Result<CorsLayer> {
    let origin: HeaderValue = config
        .client_url
        .parse()
        .context("CLIENT_URL must be a valid origin")?;

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true))
}
