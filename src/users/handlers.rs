//! Current-user handlers

use axum::extract::Extension;
use axum::Json;
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use crate::auth::cookies;
use crate::auth::extractors::AuthedUser;
use crate::common::{safe_email_log, ApiError, AppState};

/// GET /api/me
/// Returns the current authenticated user's information
pub async fn me_handler(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    authed: AuthedUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let state = state_lock.read().await.clone();

    let user = state
        .user_repository
        .find_by_id(authed.id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("user not found".to_string()))?;

    Ok(Json(serde_json::json!({ "user": user })))
}

/// DELETE /api/me
/// Soft-deletes the account, revokes every refresh token and clears cookies.
/// The email and username stay reserved.
pub async fn delete_me_handler(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    authed: AuthedUser,
    jar: CookieJar,
) -> Result<(CookieJar, Json<serde_json::Value>), ApiError> {
    let state = state_lock.read().await.clone();

    state.user_repository.soft_delete(authed.id).await?;
    let jar = state.session_service.sign_out_all(jar, authed.id).await?;
    let jar = cookies::clear_pending_cookies(jar);

    info!(
        user_id = authed.id,
        email = %safe_email_log(&authed.email),
        "User account soft-deleted"
    );

    Ok((jar, Json(serde_json::json!({ "ok": true }))))
}
