//! Authentication handlers

use axum::extract::{Extension, Json, Query};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::CookieJar;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::extractors::AuthedUser;
use super::models::{
    EmailQuery, ForgotPasswordRequest, GoogleCallbackQuery, GoogleSignUpCompleteRequest,
    ResendVerificationRequest, ResetPasswordRequest, SignInRequest, SignUpRequest,
    VerifyEmailRequest, VerifyResetCodeRequest,
};
use super::pending::PendingPurpose;
use super::service::GoogleCallbackOutcome;
use super::validators;
use crate::common::{safe_email_log, ApiError, AppState};

/// POST /api/auth/sign-up
///
/// Creates a password account, persists its email-verification code, sends
/// the code and starts a session.
pub async fn sign_up_handler(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    jar: CookieJar,
    Json(payload): Json<SignUpRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validators::validate_sign_up(&payload).into_result()?;

    let state = state_lock.read().await.clone();
    let (jar, user) = state.auth_service.sign_up(jar, payload).await?;

    Ok((StatusCode::CREATED, jar, Json(json!({ "user": user }))))
}

/// POST /api/auth/sign-in
pub async fn sign_in_handler(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    jar: CookieJar,
    Json(payload): Json<SignInRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let state = state_lock.read().await.clone();
    let (jar, user) = state
        .auth_service
        .sign_in(jar, &payload.email, &payload.password)
        .await?;

    Ok((jar, Json(json!({ "user": user }))))
}

/// POST /api/auth/sign-out
///
/// Deletes the stored refresh token if the cookie carries one; clears the
/// session cookies either way.
pub async fn sign_out_handler(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    let state = state_lock.read().await.clone();
    let jar = state.session_service.sign_out(jar).await?;

    Ok((jar, Json(json!({ "ok": true }))))
}

/// POST /api/auth/sign-out-all
pub async fn sign_out_all_handler(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    user: AuthedUser,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    let state = state_lock.read().await.clone();
    let jar = state.session_service.sign_out_all(jar, user.id).await?;

    Ok((jar, Json(json!({ "ok": true }))))
}

/// POST /api/auth/refresh
///
/// Exchanges the refresh-token cookie for a fresh access token. Failure
/// responses may carry cleared cookies, so both arms build a full response.
pub async fn refresh_handler(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    jar: CookieJar,
) -> Response {
    let state = state_lock.read().await.clone();

    match state.session_service.refresh(jar).await {
        Ok((jar, user)) => (jar, Json(json!({ "user": user }))).into_response(),
        Err((jar, error)) => (jar, error).into_response(),
    }
}

/// POST /api/auth/email/verify
pub async fn verify_email_handler(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    user: AuthedUser,
    Json(payload): Json<VerifyEmailRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let state = state_lock.read().await.clone();
    let user = state.auth_service.verify_email(user.id, &payload.code).await?;

    Ok(Json(json!({ "user": user })))
}

/// POST /api/auth/email/resend
pub async fn resend_verification_handler(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Json(payload): Json<ResendVerificationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let state = state_lock.read().await.clone();
    state
        .auth_service
        .resend_verification_email(&payload.email)
        .await?;

    Ok(Json(json!({ "ok": true })))
}

/// GET /api/auth/email/resend-cooldown?email=...
pub async fn resend_cooldown_handler(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Query(query): Query<EmailQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let state = state_lock.read().await.clone();
    let cooldown = state.auth_service.resend_cooldown(&query.email).await?;

    Ok(Json(cooldown))
}

/// POST /api/auth/password/forgot
///
/// Unknown emails get the same success response as known ones.
pub async fn forgot_password_handler(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let state = state_lock.read().await.clone();
    state
        .auth_service
        .send_password_reset_email(&payload.email)
        .await?;

    Ok(Json(json!({ "ok": true })))
}

/// POST /api/auth/password/verify-code
pub async fn verify_reset_code_handler(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Json(payload): Json<VerifyResetCodeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let state = state_lock.read().await.clone();
    state
        .auth_service
        .verify_password_reset_code(&payload.email, &payload.code)
        .await?;

    Ok(Json(json!({ "ok": true })))
}

/// POST /api/auth/password/reset
pub async fn reset_password_handler(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validators::validate_reset_password(&payload).into_result()?;

    let state = state_lock.read().await.clone();
    state
        .auth_service
        .reset_password(&payload.email, &payload.code, &payload.password)
        .await?;

    Ok(Json(json!({ "ok": true })))
}

/// GET /api/auth/password/reset-cooldown?email=...
pub async fn reset_cooldown_handler(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Query(query): Query<EmailQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let state = state_lock.read().await.clone();
    let cooldown = state.auth_service.reset_cooldown(&query.email).await?;

    Ok(Json(cooldown))
}

/// GET /auth/google
///
/// Redirects the browser to Google's consent screen.
pub async fn google_auth_handler(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
) -> Redirect {
    let state = state_lock.read().await.clone();
    Redirect::temporary(&state.google_service.authorization_url())
}

/// GET /auth/google/callback
///
/// Exchanges the authorization code and routes the identity to one of the
/// three callback outcomes, redirecting the browser accordingly.
pub async fn google_callback_handler(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    jar: CookieJar,
    Query(query): Query<GoogleCallbackQuery>,
) -> Response {
    let state = state_lock.read().await.clone();
    let failure_redirect = format!("{}/sign-in?error=google", state.config.frontend_url);

    let code = match (query.code, query.error) {
        (Some(code), None) => code,
        (_, error) => {
            warn!(error = ?error, "Google callback without authorization code");
            return Redirect::temporary(&failure_redirect).into_response();
        }
    };

    let profile = match state.google_service.exchange_code_for_profile(&code).await {
        Ok(profile) => profile,
        Err(e) => {
            warn!(error = %e, "Google code exchange failed");
            return Redirect::temporary(&failure_redirect).into_response();
        }
    };

    info!(
        email = %safe_email_log(&profile.email),
        "Google callback profile verified"
    );

    match state.auth_service.handle_google_callback(jar, profile).await {
        Ok(GoogleCallbackOutcome::SignedIn { jar, .. }) => {
            (jar, Redirect::temporary(&state.config.frontend_url)).into_response()
        }
        Ok(GoogleCallbackOutcome::PendingLink { jar, redirect })
        | Ok(GoogleCallbackOutcome::PendingSignUp { jar, redirect }) => {
            (jar, Redirect::temporary(&redirect)).into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// POST /api/auth/google/complete-sign-up
pub async fn complete_google_sign_up_handler(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    jar: CookieJar,
    Json(payload): Json<GoogleSignUpCompleteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validators::validate_google_sign_up_complete(&payload).into_result()?;

    let state = state_lock.read().await.clone();
    let (jar, user) = state
        .auth_service
        .complete_google_sign_up(jar, &payload.name, &payload.username)
        .await?;

    Ok((StatusCode::CREATED, jar, Json(json!({ "user": user }))))
}

/// POST /api/auth/google/link
pub async fn complete_google_link_handler(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    let state = state_lock.read().await.clone();
    let (jar, user) = state.auth_service.complete_google_link(jar).await?;

    Ok((jar, Json(json!({ "user": user }))))
}

/// GET /api/auth/google/pending-signup
pub async fn pending_signup_handler(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    let state = state_lock.read().await.clone();
    let profile = state.pending_service.read(&jar, PendingPurpose::SignUp);

    Ok(Json(json!({ "profile": profile })))
}

/// GET /api/auth/google/pending-link
pub async fn pending_link_handler(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    let state = state_lock.read().await.clone();
    let profile = state.pending_service.read(&jar, PendingPurpose::Link);

    Ok(Json(json!({ "profile": profile })))
}

/// GET /api/auth/google/clear-pending-signup
pub async fn clear_pending_signup_handler(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    let state = state_lock.read().await.clone();
    let jar = state.pending_service.clear_cookie(jar, PendingPurpose::SignUp);

    Ok((jar, Json(json!({ "ok": true }))))
}

/// GET /api/auth/google/clear-pending-link
pub async fn clear_pending_link_handler(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    let state = state_lock.read().await.clone();
    let jar = state.pending_service.clear_cookie(jar, PendingPurpose::Link);

    Ok((jar, Json(json!({ "ok": true }))))
}
