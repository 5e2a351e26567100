//! User routes

use axum::{routing::get, Router};

use super::handlers;

/// Creates and returns the user router
///
/// # Routes
/// - `GET /api/me` - Current user information
/// - `DELETE /api/me` - Soft-delete the current account
pub fn users_routes() -> Router {
    Router::new().route(
        "/api/me",
        get(handlers::me_handler).delete(handlers::delete_me_handler),
    )
}
