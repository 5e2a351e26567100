//! Authentication data models

use serde::{Deserialize, Serialize};

/// Access-credential JWT claims: short-lived proof of identity.
#[derive(Serialize, Deserialize, Debug)]
pub struct Claims {
    pub sub: i64,
    pub email: String,
    pub exp: usize,
}

/// Purpose tag for one-time codes. Exactly one live code may exist per
/// (user, purpose) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpPurpose {
    EmailVerification,
    PasswordReset,
}

impl OtpPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            OtpPurpose::EmailVerification => "EMAIL_VERIFICATION",
            OtpPurpose::PasswordReset => "PASSWORD_RESET",
        }
    }
}

/// Google identity as returned by the OAuth verifier.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct GoogleProfile {
    pub email: String,
    pub name: String,
    #[serde(rename = "googleId")]
    pub google_id: String,
    #[serde(rename = "avatarUrl")]
    pub avatar_url: Option<String>,
}

// ---- Request bodies ----

#[derive(Deserialize, Debug)]
pub struct SignUpRequest {
    pub name: String,
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, Debug)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, Debug)]
pub struct VerifyEmailRequest {
    pub code: String,
}

#[derive(Deserialize, Debug)]
pub struct ResendVerificationRequest {
    pub email: String,
}

#[derive(Deserialize, Debug)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Deserialize, Debug)]
pub struct VerifyResetCodeRequest {
    pub email: String,
    pub code: String,
}

#[derive(Deserialize, Debug)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub code: String,
    pub password: String,
}

#[derive(Deserialize, Debug)]
pub struct GoogleSignUpCompleteRequest {
    pub name: String,
    pub username: String,
}

// ---- Query parameters ----

#[derive(Deserialize, Debug)]
pub struct EmailQuery {
    pub email: String,
}

#[derive(Deserialize, Debug)]
pub struct GoogleCallbackQuery {
    pub code: Option<String>,
    pub error: Option<String>,
}

/// Cooldown report for one-time code reissue.
#[derive(Serialize, Debug, PartialEq, Eq)]
pub struct ResendCooldown {
    #[serde(rename = "retryAfterSeconds")]
    pub retry_after_seconds: i64,
}
