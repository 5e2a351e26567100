// src/services/google.rs
//! Google OAuth 2.0 client
//!
//! Handles the authorization-code exchange and userinfo fetch. The rest of
//! the auth flow only ever sees a [`GoogleProfile`]; no Google tokens leave
//! this module.

use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error};

use crate::auth::models::GoogleProfile;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

#[derive(Debug, Error)]
pub enum GoogleError {
    #[error("Google token exchange failed: {0}")]
    TokenExchange(String),

    #[error("Google userinfo fetch failed: {0}")]
    UserInfo(String),

    #[error("Google profile incomplete: {0}")]
    IncompleteProfile(String),
}

#[derive(Deserialize, Debug)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize, Debug)]
struct UserInfoResponse {
    sub: String,
    email: Option<String>,
    name: Option<String>,
    picture: Option<String>,
}

pub struct GoogleOAuthService {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    http: Client,
}

impl GoogleOAuthService {
    pub fn new(client_id: String, client_secret: String, redirect_uri: String, http: Client) -> Self {
        Self {
            client_id,
            client_secret,
            redirect_uri,
            http,
        }
    }

    /// The consent-screen URL the browser is redirected to.
    pub fn authorization_url(&self) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=online&prompt=select_account",
            GOOGLE_AUTH_URL,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode("openid email profile"),
        )
    }

    /// Exchange the callback's authorization code for the user's profile.
    pub async fn exchange_code_for_profile(&self, code: &str) -> Result<GoogleProfile, GoogleError> {
        let token_response = self
            .http
            .post(GOOGLE_TOKEN_URL)
            .form(&[
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Google token request failed");
                GoogleError::TokenExchange(e.to_string())
            })?;

        if !token_response.status().is_success() {
            let status = token_response.status();
            let body = token_response.text().await.unwrap_or_default();
            error!(%status, "Google token exchange rejected");
            debug!(%body, "Google token error body");
            return Err(GoogleError::TokenExchange(format!("status {}", status)));
        }

        let token: TokenResponse = token_response
            .json()
            .await
            .map_err(|e| GoogleError::TokenExchange(e.to_string()))?;

        let userinfo_response = self
            .http
            .get(GOOGLE_USERINFO_URL)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Google userinfo request failed");
                GoogleError::UserInfo(e.to_string())
            })?;

        if !userinfo_response.status().is_success() {
            return Err(GoogleError::UserInfo(format!(
                "status {}",
                userinfo_response.status()
            )));
        }

        let info: UserInfoResponse = userinfo_response
            .json()
            .await
            .map_err(|e| GoogleError::UserInfo(e.to_string()))?;

        let email = info
            .email
            .ok_or_else(|| GoogleError::IncompleteProfile("missing email".to_string()))?;
        let name = info.name.unwrap_or_else(|| email.clone());

        Ok(GoogleProfile {
            email,
            name,
            google_id: info.sub,
            avatar_url: info.picture,
        })
    }
}
