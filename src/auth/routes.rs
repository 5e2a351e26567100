//! Authentication routes

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers;

/// Creates and returns the authentication router
///
/// # Routes
/// - `POST /api/auth/sign-up` / `sign-in` / `sign-out` / `sign-out-all`
/// - `POST /api/auth/refresh` - reissue the access token
/// - `POST /api/auth/email/verify` / `email/resend` + cooldown lookup
/// - `POST /api/auth/password/forgot` / `verify-code` / `reset` + cooldown
/// - `GET  /auth/google` + `/auth/google/callback` - OAuth browser flow
/// - `POST /api/auth/google/complete-sign-up` / `link` + pending-cookie
///   introspection and clearing
pub fn auth_routes() -> Router {
    Router::new()
        .route("/api/auth/sign-up", post(handlers::sign_up_handler))
        .route("/api/auth/sign-in", post(handlers::sign_in_handler))
        .route("/api/auth/sign-out", post(handlers::sign_out_handler))
        .route("/api/auth/sign-out-all", post(handlers::sign_out_all_handler))
        .route("/api/auth/refresh", post(handlers::refresh_handler))
        .route("/api/auth/email/verify", post(handlers::verify_email_handler))
        .route("/api/auth/email/resend", post(handlers::resend_verification_handler))
        .route(
            "/api/auth/email/resend-cooldown",
            get(handlers::resend_cooldown_handler),
        )
        .route(
            "/api/auth/password/forgot",
            post(handlers::forgot_password_handler),
        )
        .route(
            "/api/auth/password/verify-code",
            post(handlers::verify_reset_code_handler),
        )
        .route(
            "/api/auth/password/reset",
            post(handlers::reset_password_handler),
        )
        .route(
            "/api/auth/password/reset-cooldown",
            get(handlers::reset_cooldown_handler),
        )
        .route("/auth/google", get(handlers::google_auth_handler))
        .route("/auth/google/callback", get(handlers::google_callback_handler))
        .route(
            "/api/auth/google/complete-sign-up",
            post(handlers::complete_google_sign_up_handler),
        )
        .route(
            "/api/auth/google/link",
            post(handlers::complete_google_link_handler),
        )
        .route(
            "/api/auth/google/pending-signup",
            get(handlers::pending_signup_handler),
        )
        .route(
            "/api/auth/google/pending-link",
            get(handlers::pending_link_handler),
        )
        .route(
            "/api/auth/google/clear-pending-signup",
            get(handlers::clear_pending_signup_handler),
        )
        .route(
            "/api/auth/google/clear-pending-link",
            get(handlers::clear_pending_link_handler),
        )
}
