//! Authentication extractors for Axum

use async_trait::async_trait;
use axum::{
    extract::{Extension, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, warn};

use super::cookies;
use super::models::Claims;
use crate::common::{safe_email_log, ApiError, AppState};

/// Authenticated user extractor
///
/// Resolves the access-token cookie (or a bearer Authorization header) to a
/// live user row. Soft-deleted accounts do not authenticate.
#[derive(Debug)]
pub struct AuthedUser {
    pub id: i64,
    pub email: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Extension(state_lock): Extension<Arc<RwLock<AppState>>> =
            Extension::from_request_parts(parts, state)
                .await
                .map_err(|_| ApiError::InternalServer("missing app state".to_string()))?;

        let app_state = state_lock.read().await.clone();

        // Cookie first, Authorization header as a fallback for API clients.
        let jar = CookieJar::from_headers(&parts.headers);
        let token = cookies::get_access_token(&jar).or_else(|| {
            parts
                .headers
                .get(AUTHORIZATION)
                .and_then(|h| h.to_str().ok())
                .map(|s| s.strip_prefix("Bearer ").unwrap_or(s).to_string())
        });

        let token = match token {
            Some(t) => t,
            None => {
                warn!("Authentication failed: no access token");
                return Err(ApiError::Unauthorized("Not authenticated.".into()));
            }
        };

        let decoded = match decode::<Claims>(
            &token,
            &DecodingKey::from_secret(app_state.config.jwt_secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        ) {
            Ok(d) => d,
            Err(e) => {
                warn!(error = %e, "Access token validation failed");
                return Err(ApiError::Unauthorized("Not authenticated.".into()));
            }
        };

        let user_id = decoded.claims.sub;

        let user = app_state
            .user_repository
            .find_by_id(user_id)
            .await
            .map_err(|e| {
                error!(
                    error = %e,
                    user_id,
                    "Database error during user lookup in authentication"
                );
                ApiError::DatabaseError(e)
            })?;

        match user {
            Some(u) => {
                debug!(
                    user_id = u.id,
                    email = %safe_email_log(&u.email),
                    "Request authenticated"
                );
                Ok(AuthedUser {
                    id: u.id,
                    email: u.email,
                })
            }
            None => {
                warn!(user_id, "Access token for unknown or deleted user");
                Err(ApiError::Unauthorized("Not authenticated.".into()))
            }
        }
    }
}
