// src/main.rs
use axum::{extract::Extension, Router};
use dotenv::dotenv;
use reqwest::Client;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::env;
use std::path::PathBuf;
use std::{net::SocketAddr, str::FromStr, sync::Arc};
use tokio::{net::TcpListener, sync::RwLock};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

// ============================================================================
// MODULE IMPORTS
// ============================================================================

mod auth;
mod common;
mod services;
mod users;

use auth::pending::PendingGoogleService;
use auth::service::AuthService;
use auth::session::SessionService;
use auth::store::{OtpCodeRepository, RefreshTokenRepository};
use common::{AppState, AuthConfig};
use services::{EmailService, GoogleOAuthService};
use users::repo::UserRepository;

// ============================================================================
// MAIN APPLICATION ENTRY POINT
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    // ========================================================================
    // ENVIRONMENT CONFIGURATION
    // ========================================================================

    let database_url =
        env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://portfolio_api.db".to_string());
    let config = AuthConfig::from_env();

    let google_client_id = env::var("GOOGLE_CLIENT_ID").unwrap_or_default();
    let google_client_secret = env::var("GOOGLE_CLIENT_SECRET").unwrap_or_default();
    let google_redirect_uri = env::var("GOOGLE_OAUTH_REDIRECT_URI")
        .unwrap_or_else(|_| "http://localhost:8080/auth/google/callback".to_string());
    if google_client_id.is_empty() {
        warn!("GOOGLE_CLIENT_ID not set, Google sign-in will fail");
    }

    let from_email = env::var("AWS_SES_FROM_EMAIL").ok();
    if from_email.is_none() {
        warn!("AWS_SES_FROM_EMAIL not set, verification emails will not be sent");
    }

    // ========================================================================
    // DATABASE SETUP
    // ========================================================================

    if let Some(path_part) = database_url.strip_prefix("sqlite://") {
        let path_without_params = path_part.split('?').next().unwrap_or("");
        if !path_without_params.is_empty() && !path_without_params.starts_with(':') {
            let db_path = PathBuf::from(path_without_params);
            if let Some(parent) = db_path.parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await?;
                }
            }
        }
    }

    let connect_options = SqliteConnectOptions::from_str(&database_url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .connect_with(connect_options)
        .await?;

    // Run database migrations
    common::migrations::run_migrations(&pool).await?;

    // ========================================================================
    // SERVICE INITIALIZATION
    // ========================================================================

    let http_client = Client::builder().no_proxy().build()?;

    let user_repository = Arc::new(UserRepository::new(pool.clone()));
    let refresh_tokens = Arc::new(RefreshTokenRepository::new(pool.clone()));
    let otp_codes = Arc::new(OtpCodeRepository::new(pool.clone()));

    // Opportunistic sweep of stale refresh tokens.
    match refresh_tokens.delete_expired().await {
        Ok(swept) if swept > 0 => info!(swept, "Deleted expired refresh tokens"),
        Ok(_) => {}
        Err(e) => warn!(error = %e, "Expired refresh token sweep failed"),
    }

    let email_service = Arc::new(EmailService::new(from_email, config.frontend_url.clone()));
    info!("EmailService initialized");

    let google_service = Arc::new(GoogleOAuthService::new(
        google_client_id,
        google_client_secret,
        google_redirect_uri,
        http_client,
    ));
    info!("GoogleOAuthService initialized");

    let pending_service = Arc::new(PendingGoogleService::new(
        config.jwt_secret.clone(),
        config.secure_cookies,
    ));

    let session_service = Arc::new(SessionService::new(
        refresh_tokens.clone(),
        user_repository.clone(),
        config.clone(),
    ));
    info!("SessionService initialized");

    let auth_service = Arc::new(AuthService::new(
        pool,
        user_repository.clone(),
        refresh_tokens.clone(),
        otp_codes.clone(),
        session_service.clone(),
        pending_service.clone(),
        email_service.clone(),
        config.clone(),
    ));
    info!("AuthService initialized");

    // ========================================================================
    // APPLICATION STATE
    // ========================================================================

    let app_state = AppState {
        config,
        user_repository,
        email_service,
        google_service,
        pending_service,
        session_service,
        auth_service,
    };

    let shared = Arc::new(RwLock::new(app_state));

    // ========================================================================
    // ROUTER COMPOSITION
    // ========================================================================

    let app = Router::new()
        .merge(auth::auth_routes())
        .merge(users::users_routes())
        .layer(Extension(shared.clone()))
        .layer({
            let cors_origins = std::env::var("CORS_ORIGINS").unwrap_or_else(|_| {
                "http://localhost:3000,http://localhost:3001,http://localhost:5173".to_string()
            });

            let origins: Vec<axum::http::HeaderValue> = cors_origins
                .split(',')
                .filter_map(|origin| origin.trim().parse().ok())
                .collect();

            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::PUT,
                    axum::http::Method::DELETE,
                    axum::http::Method::PATCH,
                    axum::http::Method::OPTIONS,
                ])
                .allow_headers([
                    axum::http::header::CONTENT_TYPE,
                    axum::http::header::AUTHORIZATION,
                ])
                .allow_credentials(true)
        })
        .layer(TraceLayer::new_for_http());

    // ========================================================================
    // SERVER STARTUP
    // ========================================================================

    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
