//! Auth orchestrator
//!
//! The state machine tying hashing, token issuance, the token store, the
//! pending-identity broker and the session manager together. Handlers call
//! into this service after request validation; every method returns the
//! mutated cookie jar alongside its result so cookie side effects land on
//! the response.

use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::common::{safe_email_log, ApiError, AuthConfig};
use crate::services::{EmailService, EmailTemplate, EmailVariables};
use crate::users::models::{NewUser, User};
use crate::users::repo::UserRepository;

use super::models::{GoogleProfile, OtpPurpose, ResendCooldown, SignUpRequest};
use super::passwords::{hash_secret, verify_secret};
use super::pending::{PendingGoogleService, PendingPurpose};
use super::session::SessionService;
use super::store::{OtpCodeRepository, RefreshTokenRepository, StoredOtpCode};
use super::tokens::{expires_in_minutes, generate_otp_code, OTP_CODE_DIGITS};

/// Outcome of the Google OAuth callback: exactly one branch applies.
pub enum GoogleCallbackOutcome {
    /// Account already linked to this Google identity; session started.
    SignedIn { jar: CookieJar, user: User },
    /// Email matches an unlinked local account; LINK cookie issued.
    PendingLink { jar: CookieJar, redirect: String },
    /// No matching account; SIGNUP cookie issued.
    PendingSignUp { jar: CookieJar, redirect: String },
}

pub struct AuthService {
    pool: SqlitePool,
    users: Arc<UserRepository>,
    refresh_tokens: Arc<RefreshTokenRepository>,
    otp_codes: Arc<OtpCodeRepository>,
    sessions: Arc<SessionService>,
    pending: Arc<PendingGoogleService>,
    email: Arc<EmailService>,
    config: AuthConfig,
}

impl AuthService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pool: SqlitePool,
        users: Arc<UserRepository>,
        refresh_tokens: Arc<RefreshTokenRepository>,
        otp_codes: Arc<OtpCodeRepository>,
        sessions: Arc<SessionService>,
        pending: Arc<PendingGoogleService>,
        email: Arc<EmailService>,
        config: AuthConfig,
    ) -> Self {
        Self {
            pool,
            users,
            refresh_tokens,
            otp_codes,
            sessions,
            pending,
            email,
            config,
        }
    }

    // ---- Sign-up / sign-in ----

    /// Create a password account. The user row and its EMAIL_VERIFICATION
    /// code are written in one transaction; a failure rolls both back and
    /// surfaces a generic creation error. The verification email is sent
    /// best-effort after commit.
    pub async fn sign_up(
        &self,
        jar: CookieJar,
        data: SignUpRequest,
    ) -> Result<(CookieJar, User), ApiError> {
        let jar = self.pending.clear_all(jar);

        if self.users.email_taken_with_deleted(&data.email).await? {
            return Err(ApiError::Conflict(
                "An account with this email already exists.".to_string(),
            ));
        }
        if self.users.username_taken_with_deleted(&data.username).await? {
            return Err(ApiError::Conflict(
                "This username is already taken.".to_string(),
            ));
        }

        let password_hash = hash_secret(&data.password, self.config.bcrypt_cost)
            .map_err(|e| {
                error!(error = %e, "Password hashing failed");
                ApiError::InternalServer("Failed to create account.".to_string())
            })?;

        let code = generate_otp_code(OTP_CODE_DIGITS);
        let code_hash = hash_secret(&code, self.config.bcrypt_cost).map_err(|e| {
            error!(error = %e, "Code hashing failed");
            ApiError::InternalServer("Failed to create account.".to_string())
        })?;
        let code_expires_at = expires_in_minutes(self.config.otp_expiration_minutes);

        let new_user = NewUser {
            name: data.name.trim().to_string(),
            username: data.username,
            email: data.email,
            password_hash: Some(password_hash),
            google_id: None,
            avatar_url: None,
            email_verified: false,
        };

        let user = {
            let mut tx = self.pool.begin().await.map_err(|e| {
                error!(error = %e, "Failed to open sign-up transaction");
                ApiError::InternalServer("Failed to create account.".to_string())
            })?;

            let created = async {
                let user = UserRepository::insert(&mut *tx, new_user).await?;
                OtpCodeRepository::replace_on(
                    &mut *tx,
                    user.id,
                    OtpPurpose::EmailVerification,
                    &code_hash,
                    code_expires_at,
                )
                .await?;
                Ok::<User, sqlx::Error>(user)
            }
            .await;

            match created {
                Ok(user) => {
                    tx.commit().await.map_err(|e| {
                        error!(error = %e, "Sign-up transaction commit failed");
                        ApiError::InternalServer("Failed to create account.".to_string())
                    })?;
                    user
                }
                Err(e) => {
                    error!(error = %e, "Sign-up transaction failed, rolling back");
                    return Err(ApiError::InternalServer(
                        "Failed to create account.".to_string(),
                    ));
                }
            }
        };

        info!(
            user_id = user.id,
            email = %safe_email_log(&user.email),
            "User account created"
        );

        self.send_code_email(&user, &code, EmailTemplate::VerificationCode)
            .await;

        let jar = self.sessions.create_session(jar, &user).await?;
        Ok((jar, user))
    }

    /// Password sign-in. Missing account, missing password hash and wrong
    /// password all fail with the same Unauthorized response.
    pub async fn sign_in(
        &self,
        jar: CookieJar,
        email: &str,
        password: &str,
    ) -> Result<(CookieJar, User), ApiError> {
        let jar = self.pending.clear_all(jar);

        let invalid = || ApiError::Unauthorized("Invalid credentials.".to_string());

        let user = self.users.find_by_email(email).await?.ok_or_else(invalid)?;
        let password_hash = user.password_hash.as_deref().ok_or_else(invalid)?;

        if !verify_secret(password, password_hash) {
            return Err(invalid());
        }

        if !user.email_verified && user.google_id.is_none() {
            // Best-effort reissue; the sign-in itself never blocks on it.
            if let Err(e) = self.issue_verification_code(&user).await {
                warn!(
                    user_id = user.id,
                    error = %e,
                    "Failed to reissue verification code on sign-in"
                );
            }
        }

        let jar = self.sessions.create_session(jar, &user).await?;
        info!(user_id = user.id, "User signed in");
        Ok((jar, user))
    }

    // ---- Google OAuth ----

    /// Route a verified Google profile to exactly one of the three callback
    /// outcomes.
    pub async fn handle_google_callback(
        &self,
        jar: CookieJar,
        profile: GoogleProfile,
    ) -> Result<GoogleCallbackOutcome, ApiError> {
        if let Some(user) = self.users.find_by_google_id(&profile.google_id).await? {
            info!(user_id = user.id, "Google sign-in for linked account");
            let jar = self.pending.clear_all(jar);
            let jar = self.sessions.create_session(jar, &user).await?;
            return Ok(GoogleCallbackOutcome::SignedIn { jar, user });
        }

        if let Some(user) = self.users.find_by_email(&profile.email).await? {
            if user.google_id.is_none() {
                info!(
                    user_id = user.id,
                    "Google callback matched unlinked account, pending link"
                );
                let token = self.pending_token(&profile, PendingPurpose::Link)?;
                let jar = self.pending.clear_cookie(jar, PendingPurpose::SignUp);
                let jar = self.pending.set_cookie(jar, PendingPurpose::Link, token);
                return Ok(GoogleCallbackOutcome::PendingLink {
                    jar,
                    redirect: format!("{}/link-google-account", self.config.frontend_url),
                });
            }
        }

        info!(
            email = %safe_email_log(&profile.email),
            "Google callback for new identity, pending sign-up"
        );
        let token = self.pending_token(&profile, PendingPurpose::SignUp)?;
        let jar = self.pending.clear_cookie(jar, PendingPurpose::Link);
        let jar = self.pending.set_cookie(jar, PendingPurpose::SignUp, token);
        Ok(GoogleCallbackOutcome::PendingSignUp {
            jar,
            redirect: format!("{}/complete-google-sign-up", self.config.frontend_url),
        })
    }

    /// Finish a Google sign-up: requires a live pending-signup cookie and
    /// re-checks identifier collisions at completion time.
    pub async fn complete_google_sign_up(
        &self,
        jar: CookieJar,
        name: &str,
        username: &str,
    ) -> Result<(CookieJar, User), ApiError> {
        let profile = self
            .pending
            .read(&jar, PendingPurpose::SignUp)
            .ok_or_else(|| {
                ApiError::BadRequest("Invalid or expired pending signup.".to_string())
            })?;

        if self.users.email_taken_with_deleted(&profile.email).await? {
            return Err(ApiError::Conflict(
                "An account with this email already exists.".to_string(),
            ));
        }
        if self.users.username_taken_with_deleted(username).await? {
            return Err(ApiError::Conflict(
                "This username is already taken.".to_string(),
            ));
        }

        let user = self
            .users
            .create(NewUser {
                name: name.trim().to_string(),
                username: username.to_string(),
                email: profile.email,
                password_hash: None,
                google_id: Some(profile.google_id),
                avatar_url: profile.avatar_url,
                email_verified: true,
            })
            .await?;

        info!(user_id = user.id, "Google sign-up completed");

        let jar = self.pending.clear_cookie(jar, PendingPurpose::SignUp);
        let jar = self.sessions.create_session(jar, &user).await?;
        Ok((jar, user))
    }

    /// Finish linking a Google identity to an existing password account.
    pub async fn complete_google_link(
        &self,
        jar: CookieJar,
    ) -> Result<(CookieJar, User), ApiError> {
        let profile = self.pending.read(&jar, PendingPurpose::Link).ok_or_else(|| {
            ApiError::BadRequest("Invalid or expired pending link.".to_string())
        })?;

        let user = self
            .users
            .find_by_email(&profile.email)
            .await?
            .filter(|u| u.google_id.is_none())
            .ok_or_else(|| ApiError::BadRequest("Account cannot be linked.".to_string()))?;

        let user = self
            .users
            .link_google(user.id, &profile.google_id, profile.avatar_url.as_deref())
            .await?;

        // Linking verifies the email, so any outstanding code is moot.
        self.otp_codes
            .delete_by_user_and_purpose(user.id, OtpPurpose::EmailVerification)
            .await?;

        info!(user_id = user.id, "Google account linked");

        let jar = self.pending.clear_cookie(jar, PendingPurpose::Link);
        let jar = self.sessions.create_session(jar, &user).await?;
        Ok((jar, user))
    }

    // ---- Email verification ----

    /// Verify the signed-in user's email with a one-time code.
    /// Already-verified accounts succeed without consulting the store.
    pub async fn verify_email(&self, user_id: i64, code: &str) -> Result<User, ApiError> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| ApiError::Unauthorized("Invalid credentials.".to_string()))?;

        if user.email_verified {
            return Ok(user);
        }

        let invalid =
            || ApiError::BadRequest("Invalid email verification code.".to_string());

        let stored = self
            .otp_codes
            .find_by_user_and_purpose(user.id, OtpPurpose::EmailVerification)
            .await?
            .ok_or_else(invalid)?;

        if stored.is_expired(Utc::now()) {
            self.otp_codes
                .delete_by_user_and_purpose(user.id, OtpPurpose::EmailVerification)
                .await?;
            return Err(ApiError::BadRequest(
                "Email verification code expired.".to_string(),
            ));
        }

        if !verify_secret(code, &stored.code_hash) {
            return Err(invalid());
        }

        self.otp_codes
            .delete_by_user_and_purpose(user.id, OtpPurpose::EmailVerification)
            .await?;
        self.users.set_email_verified(user.id).await?;

        info!(user_id = user.id, "Email verified");

        self.users
            .find_by_id(user.id)
            .await?
            .ok_or_else(|| ApiError::InternalServer("User disappeared".to_string()))
    }

    /// Resend the verification email, subject to the resend cooldown.
    pub async fn resend_verification_email(&self, email: &str) -> Result<(), ApiError> {
        let user = self
            .users
            .find_by_email(email)
            .await?
            .ok_or_else(|| ApiError::BadRequest("No account for this email.".to_string()))?;

        if user.email_verified {
            return Err(ApiError::BadRequest(
                "Email is already verified.".to_string(),
            ));
        }
        if user.password_hash.is_none() && user.google_id.is_some() {
            return Err(ApiError::BadRequest(
                "This account does not use email verification.".to_string(),
            ));
        }

        self.enforce_cooldown(user.id, OtpPurpose::EmailVerification)
            .await?;
        self.issue_verification_code(&user).await
    }

    /// Seconds until the verification code may be resent; 0 when no live
    /// code exists or the window has elapsed. Read-only.
    pub async fn resend_cooldown(&self, email: &str) -> Result<ResendCooldown, ApiError> {
        self.cooldown_for(email, OtpPurpose::EmailVerification).await
    }

    // ---- Password reset ----

    /// Start a password reset. Unknown emails succeed silently; accounts
    /// without a password are directed back to Google.
    pub async fn send_password_reset_email(&self, email: &str) -> Result<(), ApiError> {
        let Some(user) = self.users.find_by_email(email).await? else {
            info!(
                email = %safe_email_log(email),
                "Password reset requested for unknown email"
            );
            return Ok(());
        };

        if user.password_hash.is_none() {
            return Err(ApiError::BadRequest(
                "This account was created using Google. Please sign in with Google instead."
                    .to_string(),
            ));
        }

        self.enforce_cooldown(user.id, OtpPurpose::PasswordReset)
            .await?;

        let code = generate_otp_code(OTP_CODE_DIGITS);
        let code_hash = self.hash_code(&code)?;
        self.otp_codes
            .replace(
                user.id,
                OtpPurpose::PasswordReset,
                &code_hash,
                expires_in_minutes(self.config.otp_expiration_minutes),
            )
            .await?;

        info!(user_id = user.id, "Password reset code issued");
        self.send_code_email(&user, &code, EmailTemplate::PasswordResetCode)
            .await;
        Ok(())
    }

    /// Check a reset code without consuming it.
    pub async fn verify_password_reset_code(
        &self,
        email: &str,
        code: &str,
    ) -> Result<(), ApiError> {
        let user = self
            .users
            .find_by_email(email)
            .await?
            .ok_or_else(|| ApiError::BadRequest("Invalid password reset code.".to_string()))?;

        self.check_reset_code(user.id, code).await.map(|_| ())
    }

    /// Apply a password reset: consumes the code, replaces the hash and
    /// revokes every refresh token so stolen sessions die with the old
    /// password.
    pub async fn reset_password(&self, email: &str, code: &str, password: &str) -> Result<(), ApiError> {
        let user = self
            .users
            .find_by_email(email)
            .await?
            .ok_or_else(|| ApiError::BadRequest("Invalid password reset code.".to_string()))?;

        self.check_reset_code(user.id, code).await?;

        let password_hash = hash_secret(password, self.config.bcrypt_cost).map_err(|e| {
            error!(error = %e, "Password hashing failed");
            ApiError::InternalServer("Failed to reset password.".to_string())
        })?;

        self.otp_codes
            .delete_by_user_and_purpose(user.id, OtpPurpose::PasswordReset)
            .await?;
        self.users
            .update_password_hash(user.id, &password_hash)
            .await?;
        let revoked = self.refresh_tokens.delete_by_user(user.id).await?;

        info!(user_id = user.id, revoked, "Password reset completed");
        Ok(())
    }

    /// Seconds until a new reset code may be requested. Read-only.
    pub async fn reset_cooldown(&self, email: &str) -> Result<ResendCooldown, ApiError> {
        self.cooldown_for(email, OtpPurpose::PasswordReset).await
    }

    // ---- Internals ----

    async fn check_reset_code(&self, user_id: i64, code: &str) -> Result<StoredOtpCode, ApiError> {
        let invalid = || ApiError::BadRequest("Invalid password reset code.".to_string());

        let stored = self
            .otp_codes
            .find_by_user_and_purpose(user_id, OtpPurpose::PasswordReset)
            .await?
            .ok_or_else(invalid)?;

        if stored.is_expired(Utc::now()) {
            self.otp_codes
                .delete_by_user_and_purpose(user_id, OtpPurpose::PasswordReset)
                .await?;
            return Err(ApiError::BadRequest(
                "Password reset code expired.".to_string(),
            ));
        }

        if !verify_secret(code, &stored.code_hash) {
            return Err(invalid());
        }

        Ok(stored)
    }

    /// Replace the live verification code and send it.
    async fn issue_verification_code(&self, user: &User) -> Result<(), ApiError> {
        let code = generate_otp_code(OTP_CODE_DIGITS);
        let code_hash = self.hash_code(&code)?;

        self.otp_codes
            .replace(
                user.id,
                OtpPurpose::EmailVerification,
                &code_hash,
                expires_in_minutes(self.config.otp_expiration_minutes),
            )
            .await?;

        self.send_code_email(user, &code, EmailTemplate::VerificationCode)
            .await;
        Ok(())
    }

    fn hash_code(&self, code: &str) -> Result<String, ApiError> {
        hash_secret(code, self.config.bcrypt_cost).map_err(|e| {
            error!(error = %e, "Code hashing failed");
            ApiError::InternalServer("Failed to issue code.".to_string())
        })
    }

    fn pending_token(
        &self,
        profile: &GoogleProfile,
        purpose: PendingPurpose,
    ) -> Result<String, ApiError> {
        self.pending.create_token(profile, purpose).map_err(|e| {
            error!(error = %e, "Failed to sign pending token");
            ApiError::InternalServer("OAuth flow failed.".to_string())
        })
    }

    /// Reject with TooManyRequests while the live code for (user, purpose)
    /// is younger than the cooldown window.
    async fn enforce_cooldown(&self, user_id: i64, purpose: OtpPurpose) -> Result<(), ApiError> {
        let Some(stored) = self
            .otp_codes
            .find_by_user_and_purpose(user_id, purpose)
            .await?
        else {
            return Ok(());
        };

        let remaining = self.cooldown_remaining(&stored);
        if remaining > 0 {
            return Err(ApiError::TooManyRequests {
                message: "Please wait before requesting a new code.".to_string(),
                retry_after_seconds: remaining,
            });
        }
        Ok(())
    }

    async fn cooldown_for(
        &self,
        email: &str,
        purpose: OtpPurpose,
    ) -> Result<ResendCooldown, ApiError> {
        let Some(user) = self.users.find_by_email(email).await? else {
            return Ok(ResendCooldown {
                retry_after_seconds: 0,
            });
        };

        let remaining = match self
            .otp_codes
            .find_by_user_and_purpose(user.id, purpose)
            .await?
        {
            Some(stored) => self.cooldown_remaining(&stored),
            None => 0,
        };

        Ok(ResendCooldown {
            retry_after_seconds: remaining,
        })
    }

    fn cooldown_remaining(&self, stored: &StoredOtpCode) -> i64 {
        let elapsed = (Utc::now() - stored.created_at).num_seconds();
        (self.config.otp_resend_cooldown_seconds - elapsed).max(0)
    }

    async fn send_code_email(&self, user: &User, code: &str, template: EmailTemplate) {
        let variables = EmailVariables {
            name: user.name.clone(),
            code: code.to_string(),
        };
        if let Err(e) = self
            .email
            .send_templated_email(&user.email, template, &variables)
            .await
        {
            warn!(
                user_id = user.id,
                error = %e,
                "Failed to send code email"
            );
        }
    }
}
