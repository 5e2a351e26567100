//! Session manager
//!
//! Issues and rotates the short-lived access credential and the long-lived
//! refresh token, and owns the session cookie lifecycle. Refresh tokens are
//! not rotated on access-token refresh; they live until sign-out, bulk
//! revocation or expiry.

use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::common::{safe_email_log, safe_token_log, ApiError, AuthConfig};
use crate::users::models::User;
use crate::users::repo::UserRepository;

use super::cookies::{
    self, clear_auth_cookies, set_access_token_cookie, set_refresh_token_cookie,
    ACCESS_TOKEN_MAX_AGE_MINUTES, REFRESH_TOKEN_MAX_AGE_DAYS,
};
use super::models::Claims;
use super::store::RefreshTokenRepository;
use super::tokens::{expires_in_days, expires_in_minutes, generate_hex_token, REFRESH_TOKEN_BYTES};

pub struct SessionService {
    refresh_tokens: Arc<RefreshTokenRepository>,
    users: Arc<UserRepository>,
    config: AuthConfig,
}

impl SessionService {
    pub fn new(
        refresh_tokens: Arc<RefreshTokenRepository>,
        users: Arc<UserRepository>,
        config: AuthConfig,
    ) -> Self {
        Self {
            refresh_tokens,
            users,
            config,
        }
    }

    /// Sign a short-lived access credential embedding {userId, email}.
    pub fn sign_access_token(&self, user_id: i64, email: &str) -> Result<String, ApiError> {
        let claims = Claims {
            sub: user_id,
            email: email.to_string(),
            exp: expires_in_minutes(ACCESS_TOKEN_MAX_AGE_MINUTES).timestamp() as usize,
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| {
            error!(error = %e, user_id, "JWT encoding error");
            ApiError::InternalServer("jwt error".to_string())
        })
    }

    /// Start a session: persist a fresh 30-day refresh token, then set both
    /// session cookies. Cookies are only set after the row is durably stored.
    pub async fn create_session(&self, jar: CookieJar, user: &User) -> Result<CookieJar, ApiError> {
        let access_token = self.sign_access_token(user.id, &user.email)?;
        let refresh_token = generate_hex_token(REFRESH_TOKEN_BYTES);

        self.refresh_tokens
            .create(user.id, &refresh_token, expires_in_days(REFRESH_TOKEN_MAX_AGE_DAYS))
            .await?;

        info!(
            user_id = user.id,
            email = %safe_email_log(&user.email),
            "Session created"
        );

        let jar = set_access_token_cookie(jar, access_token, self.config.secure_cookies);
        let jar = set_refresh_token_cookie(jar, refresh_token, self.config.secure_cookies);
        Ok(jar)
    }

    /// Exchange the refresh-token cookie for a new access credential.
    ///
    /// An expired stored token is deleted on sight; a second call with the
    /// same token then fails identically with Unauthorized.
    pub async fn refresh(
        &self,
        jar: CookieJar,
    ) -> Result<(CookieJar, User), (CookieJar, ApiError)> {
        let Some(refresh_token) = cookies::get_refresh_token(&jar) else {
            let jar = clear_auth_cookies(jar);
            return Err((jar, ApiError::Unauthorized("No refresh token.".to_string())));
        };

        let stored = match self.refresh_tokens.find_by_token(&refresh_token).await {
            Ok(row) => row,
            Err(e) => return Err((jar, ApiError::DatabaseError(e))),
        };

        let Some(stored) = stored else {
            debug!(
                token = %safe_token_log(&refresh_token),
                "Refresh failed: token not found"
            );
            return Err((
                jar,
                ApiError::Unauthorized("Invalid refresh token.".to_string()),
            ));
        };

        if stored.is_expired(Utc::now()) {
            // Opportunistic cleanup of the stale row.
            if let Err(e) = self.refresh_tokens.delete_by_token(&refresh_token).await {
                warn!(error = %e, "Failed to delete expired refresh token");
            }
            let jar = clear_auth_cookies(jar);
            return Err((
                jar,
                ApiError::Unauthorized("Refresh token expired.".to_string()),
            ));
        }

        let user = match self.users.find_by_id(stored.user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                return Err((jar, ApiError::Unauthorized("Invalid refresh token.".to_string())))
            }
            Err(e) => return Err((jar, ApiError::DatabaseError(e))),
        };

        let access_token = match self.sign_access_token(user.id, &user.email) {
            Ok(token) => token,
            Err(e) => return Err((jar, e)),
        };

        let jar = set_access_token_cookie(jar, access_token, self.config.secure_cookies);
        Ok((jar, user))
    }

    /// End the current session. The stored token, if any, is deleted; the
    /// cookies are cleared regardless.
    pub async fn sign_out(&self, jar: CookieJar) -> Result<CookieJar, ApiError> {
        if let Some(refresh_token) = cookies::get_refresh_token(&jar) {
            self.refresh_tokens.delete_by_token(&refresh_token).await?;
        }

        Ok(clear_auth_cookies(jar))
    }

    /// Revoke every refresh token for the user and clear the cookies.
    pub async fn sign_out_all(&self, jar: CookieJar, user_id: i64) -> Result<CookieJar, ApiError> {
        let revoked = self.refresh_tokens.delete_by_user(user_id).await?;
        info!(user_id, revoked, "Signed out of all devices");

        Ok(clear_auth_cookies(jar))
    }
}
