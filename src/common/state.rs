// Application state shared across all modules

use std::env;
use std::sync::Arc;

use crate::auth::pending::PendingGoogleService;
use crate::auth::service::AuthService;
use crate::auth::session::SessionService;
use crate::services::{EmailService, GoogleOAuthService};
use crate::users::repo::UserRepository;

/// Authentication configuration loaded from the environment at startup.
///
/// Nothing here is read from ambient process state at call time; the values
/// are captured once in `main` and passed to the services that need them.
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub bcrypt_cost: u32,
    pub frontend_url: String,
    pub secure_cookies: bool,
    pub otp_expiration_minutes: i64,
    pub otp_resend_cooldown_seconds: i64,
}

impl AuthConfig {
    pub fn from_env() -> Self {
        let jwt_secret = env::var("JWT_SECRET")
            .unwrap_or_else(|_| "replace_with_strong_secret".to_string());
        let bcrypt_cost = env::var("BCRYPT_COST")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(crate::auth::passwords::DEFAULT_BCRYPT_COST);
        let frontend_url =
            env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:3001".to_string());
        let secure_cookies = env::var("APP_ENV")
            .map(|v| v == "production")
            .unwrap_or(false);
        let otp_expiration_minutes = env::var("OTP_CODE_EXPIRATION_MINUTES")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(60);
        let otp_resend_cooldown_seconds = env::var("OTP_RESEND_COOLDOWN_SECONDS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(60);

        Self {
            jwt_secret,
            bcrypt_cost,
            frontend_url,
            secure_cookies,
            otp_expiration_minutes,
            otp_resend_cooldown_seconds,
        }
    }
}

/// Application state containing services and configuration
#[derive(Clone)]
pub struct AppState {
    pub config: AuthConfig,
    pub user_repository: Arc<UserRepository>,
    pub email_service: Arc<EmailService>,
    pub google_service: Arc<GoogleOAuthService>,
    pub pending_service: Arc<PendingGoogleService>,
    pub session_service: Arc<SessionService>,
    pub auth_service: Arc<AuthService>,
}
