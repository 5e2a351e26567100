//! Tests for the auth module
//!
//! Exercises the orchestrator state machine against in-memory SQLite:
//! sign-up atomicity, session refresh, revocation, the three-way OAuth
//! callback and the one-time-code lifecycle.

#[cfg(test)]
mod tests {
    use axum_extra::extract::cookie::CookieJar;
    use chrono::{Duration, Utc};
    use sqlx::SqlitePool;
    use std::sync::Arc;

    use crate::auth::cookies::{self, COOKIE_PENDING_GOOGLE_LINK, COOKIE_PENDING_GOOGLE_SIGNUP};
    use crate::auth::models::{GoogleProfile, OtpPurpose, SignUpRequest};
    use crate::auth::passwords::hash_secret;
    use crate::auth::pending::{PendingGoogleService, PendingPurpose};
    use crate::auth::service::{AuthService, GoogleCallbackOutcome};
    use crate::auth::session::SessionService;
    use crate::auth::store::{OtpCodeRepository, RefreshTokenRepository};
    use crate::common::migrations::run_migrations;
    use crate::common::{ApiError, AuthConfig};
    use crate::services::EmailService;
    use crate::users::models::NewUser;
    use crate::users::repo::UserRepository;

    const TEST_COST: u32 = 4;

    struct TestApp {
        pool: SqlitePool,
        users: Arc<UserRepository>,
        refresh_tokens: Arc<RefreshTokenRepository>,
        otp_codes: Arc<OtpCodeRepository>,
        sessions: Arc<SessionService>,
        pending: Arc<PendingGoogleService>,
        auth: AuthService,
    }

    async fn setup() -> TestApp {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();

        let config = AuthConfig {
            jwt_secret: "test_secret".to_string(),
            bcrypt_cost: TEST_COST,
            frontend_url: "http://localhost:3001".to_string(),
            secure_cookies: false,
            otp_expiration_minutes: 60,
            otp_resend_cooldown_seconds: 60,
        };

        let users = Arc::new(UserRepository::new(pool.clone()));
        let refresh_tokens = Arc::new(RefreshTokenRepository::new(pool.clone()));
        let otp_codes = Arc::new(OtpCodeRepository::new(pool.clone()));
        let sessions = Arc::new(SessionService::new(
            refresh_tokens.clone(),
            users.clone(),
            config.clone(),
        ));
        let pending = Arc::new(PendingGoogleService::new(
            config.jwt_secret.clone(),
            config.secure_cookies,
        ));
        let email = Arc::new(EmailService::new(None, config.frontend_url.clone()));

        let auth = AuthService::new(
            pool.clone(),
            users.clone(),
            refresh_tokens.clone(),
            otp_codes.clone(),
            sessions.clone(),
            pending.clone(),
            email,
            config,
        );

        TestApp {
            pool,
            users,
            refresh_tokens,
            otp_codes,
            sessions,
            pending,
            auth,
        }
    }

    fn ana_sign_up() -> SignUpRequest {
        SignUpRequest {
            name: "Ana".to_string(),
            username: "ana1".to_string(),
            email: "ana@x.com".to_string(),
            password: "Str0ng!Pass#1".to_string(),
        }
    }

    fn google_profile(google_id: &str, email: &str) -> GoogleProfile {
        GoogleProfile {
            email: email.to_string(),
            name: "Ana".to_string(),
            google_id: google_id.to_string(),
            avatar_url: None,
        }
    }

    async fn count(pool: &SqlitePool, sql: &str) -> i64 {
        sqlx::query_scalar(sql).fetch_one(pool).await.unwrap()
    }

    /// Plant a known code for (user, purpose) and return its plaintext.
    async fn plant_code(app: &TestApp, user_id: i64, purpose: OtpPurpose, code: &str) {
        let hash = hash_secret(code, TEST_COST).unwrap();
        app.otp_codes
            .replace(user_id, purpose, &hash, Utc::now() + Duration::minutes(60))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_sign_up_creates_user_code_and_session() {
        let app = setup().await;

        let (jar, user) = app.auth.sign_up(CookieJar::new(), ana_sign_up()).await.unwrap();

        assert_eq!(user.email, "ana@x.com");
        assert!(!user.email_verified);
        assert!(user.password_hash.is_some());

        assert!(cookies::get_access_token(&jar).is_some());
        assert!(cookies::get_refresh_token(&jar).is_some());

        let codes = count(
            &app.pool,
            "SELECT COUNT(*) FROM otp_codes WHERE purpose = 'EMAIL_VERIFICATION'",
        )
        .await;
        assert_eq!(codes, 1);
        assert_eq!(count(&app.pool, "SELECT COUNT(*) FROM refresh_tokens").await, 1);
    }

    #[tokio::test]
    async fn test_sign_up_and_sign_in_accept_multibyte_email() {
        let app = setup().await;

        let request = SignUpRequest {
            name: "Über".to_string(),
            username: "ueber1".to_string(),
            email: "über@x.com".to_string(),
            password: "Str0ng!Pass#1".to_string(),
        };

        // Masked logging along this path must not split multi-byte chars.
        let (jar, user) = app.auth.sign_up(CookieJar::new(), request).await.unwrap();
        assert_eq!(user.email, "über@x.com");
        assert!(cookies::get_refresh_token(&jar).is_some());

        let (jar, _) = app
            .auth
            .sign_in(CookieJar::new(), "über@x.com", "Str0ng!Pass#1")
            .await
            .unwrap();
        assert!(cookies::get_access_token(&jar).is_some());
    }

    #[tokio::test]
    async fn test_sign_up_rejects_taken_identifiers_including_deleted() {
        let app = setup().await;
        let (_, user) = app.auth.sign_up(CookieJar::new(), ana_sign_up()).await.unwrap();
        app.users.soft_delete(user.id).await.unwrap();

        // Deleted account's identifiers stay reserved.
        let err = app
            .auth
            .sign_up(CookieJar::new(), ana_sign_up())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));

        let mut other_email = ana_sign_up();
        other_email.email = "ana2@x.com".to_string();
        let err = app
            .auth
            .sign_up(CookieJar::new(), other_email)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_sign_up_transaction_rolls_back_user_row() {
        let app = setup().await;

        // Force the second write of the transaction to fail.
        sqlx::query("DROP TABLE otp_codes")
            .execute(&app.pool)
            .await
            .unwrap();

        let err = app
            .auth
            .sign_up(CookieJar::new(), ana_sign_up())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InternalServer(_)));

        assert_eq!(count(&app.pool, "SELECT COUNT(*) FROM users").await, 0);
    }

    #[tokio::test]
    async fn test_sign_in_credential_failures_are_indistinguishable() {
        let app = setup().await;
        app.auth.sign_up(CookieJar::new(), ana_sign_up()).await.unwrap();

        // Wrong password.
        let err = app
            .auth
            .sign_in(CookieJar::new(), "ana@x.com", "WrongPass1!")
            .await
            .unwrap_err();
        let wrong_password = format!("{}", err);

        // Unknown user.
        let err = app
            .auth
            .sign_in(CookieJar::new(), "nobody@x.com", "WrongPass1!")
            .await
            .unwrap_err();
        assert_eq!(format!("{}", err), wrong_password);

        // Google-only account has no password hash.
        app.users
            .create(NewUser {
                name: "Bo".to_string(),
                username: "bo".to_string(),
                email: "bo@x.com".to_string(),
                password_hash: None,
                google_id: Some("g-bo".to_string()),
                avatar_url: None,
                email_verified: true,
            })
            .await
            .unwrap();
        let err = app
            .auth
            .sign_in(CookieJar::new(), "bo@x.com", "Anything1!")
            .await
            .unwrap_err();
        assert_eq!(format!("{}", err), wrong_password);
    }

    #[tokio::test]
    async fn test_sign_in_succeeds_with_correct_password() {
        let app = setup().await;
        app.auth.sign_up(CookieJar::new(), ana_sign_up()).await.unwrap();

        let (jar, user) = app
            .auth
            .sign_in(CookieJar::new(), "ana@x.com", "Str0ng!Pass#1")
            .await
            .unwrap();
        assert_eq!(user.username, "ana1");
        assert!(cookies::get_refresh_token(&jar).is_some());
    }

    #[tokio::test]
    async fn test_expired_refresh_token_is_deleted_and_fails_idempotently() {
        let app = setup().await;
        let (_, user) = app.auth.sign_up(CookieJar::new(), ana_sign_up()).await.unwrap();

        app.refresh_tokens
            .create(user.id, "stale-token", Utc::now() - Duration::hours(1))
            .await
            .unwrap();

        let jar = cookies::set_refresh_token_cookie(
            CookieJar::new(),
            "stale-token".to_string(),
            false,
        );

        let (_, err) = app.sessions.refresh(jar.clone()).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
        assert_eq!(
            count(
                &app.pool,
                "SELECT COUNT(*) FROM refresh_tokens WHERE token = 'stale-token'"
            )
            .await,
            0
        );

        // Second identical call fails the same way.
        let (_, err) = app.sessions.refresh(jar).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_sign_out_all_revokes_every_session() {
        let app = setup().await;
        let (jar_a, user) = app.auth.sign_up(CookieJar::new(), ana_sign_up()).await.unwrap();
        let jar_b = app
            .sessions
            .create_session(CookieJar::new(), &user)
            .await
            .unwrap();

        app.sessions
            .sign_out_all(CookieJar::new(), user.id)
            .await
            .unwrap();

        for jar in [jar_a, jar_b] {
            let token = cookies::get_refresh_token(&jar).unwrap();
            let jar = cookies::set_refresh_token_cookie(CookieJar::new(), token, false);
            let (_, err) = app.sessions.refresh(jar).await.unwrap_err();
            assert!(matches!(err, ApiError::Unauthorized(_)));
        }
    }

    #[tokio::test]
    async fn test_google_callback_routes_linked_account_to_session() {
        let app = setup().await;
        app.users
            .create(NewUser {
                name: "Ana".to_string(),
                username: "ana1".to_string(),
                email: "ana@x.com".to_string(),
                password_hash: None,
                google_id: Some("g-1".to_string()),
                avatar_url: None,
                email_verified: true,
            })
            .await
            .unwrap();

        let outcome = app
            .auth
            .handle_google_callback(CookieJar::new(), google_profile("g-1", "ana@x.com"))
            .await
            .unwrap();

        match outcome {
            GoogleCallbackOutcome::SignedIn { jar, user } => {
                assert_eq!(user.google_id.as_deref(), Some("g-1"));
                assert!(cookies::get_refresh_token(&jar).is_some());
                assert!(jar.get(COOKIE_PENDING_GOOGLE_SIGNUP).map_or(true, |c| c.value().is_empty()));
            }
            _ => panic!("expected SignedIn"),
        }
    }

    #[tokio::test]
    async fn test_google_callback_routes_email_match_to_pending_link() {
        let app = setup().await;
        app.auth.sign_up(CookieJar::new(), ana_sign_up()).await.unwrap();

        let outcome = app
            .auth
            .handle_google_callback(CookieJar::new(), google_profile("g-2", "ana@x.com"))
            .await
            .unwrap();

        match outcome {
            GoogleCallbackOutcome::PendingLink { jar, redirect } => {
                assert!(redirect.ends_with("/link-google-account"));
                assert!(app.pending.read(&jar, PendingPurpose::Link).is_some());
                assert!(app.pending.read(&jar, PendingPurpose::SignUp).is_none());
            }
            _ => panic!("expected PendingLink"),
        }

        // No session was started.
        assert_eq!(count(&app.pool, "SELECT COUNT(*) FROM refresh_tokens").await, 1);
    }

    #[tokio::test]
    async fn test_google_callback_routes_new_identity_to_pending_signup() {
        let app = setup().await;

        let outcome = app
            .auth
            .handle_google_callback(CookieJar::new(), google_profile("g-3", "new@x.com"))
            .await
            .unwrap();

        match outcome {
            GoogleCallbackOutcome::PendingSignUp { jar, redirect } => {
                assert!(redirect.ends_with("/complete-google-sign-up"));
                assert!(app.pending.read(&jar, PendingPurpose::SignUp).is_some());
                assert!(app.pending.read(&jar, PendingPurpose::Link).is_none());
            }
            _ => panic!("expected PendingSignUp"),
        }
        assert_eq!(count(&app.pool, "SELECT COUNT(*) FROM users").await, 0);
    }

    #[tokio::test]
    async fn test_complete_google_sign_up_requires_pending_cookie() {
        let app = setup().await;

        let err = app
            .auth
            .complete_google_sign_up(CookieJar::new(), "Ana", "ana1")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));

        let token = app
            .pending
            .create_token(&google_profile("g-4", "new@x.com"), PendingPurpose::SignUp)
            .unwrap();
        let jar = app.pending.set_cookie(CookieJar::new(), PendingPurpose::SignUp, token);

        let (jar, user) = app
            .auth
            .complete_google_sign_up(jar, "Ana", "ana1")
            .await
            .unwrap();
        assert!(user.email_verified);
        assert_eq!(user.google_id.as_deref(), Some("g-4"));
        assert!(user.password_hash.is_none());
        assert!(app.pending.read(&jar, PendingPurpose::SignUp).is_none());
        assert!(cookies::get_refresh_token(&jar).is_some());
    }

    #[tokio::test]
    async fn test_complete_google_link_attaches_identity_and_drops_code() {
        let app = setup().await;
        let (_, user) = app.auth.sign_up(CookieJar::new(), ana_sign_up()).await.unwrap();
        assert!(!user.email_verified);

        let token = app
            .pending
            .create_token(&google_profile("g-5", "ana@x.com"), PendingPurpose::Link)
            .unwrap();
        let jar = app.pending.set_cookie(CookieJar::new(), PendingPurpose::Link, token);

        let (_, linked) = app.auth.complete_google_link(jar).await.unwrap();
        assert_eq!(linked.google_id.as_deref(), Some("g-5"));
        assert!(linked.email_verified);
        assert!(linked.password_hash.is_some());

        let codes = app
            .otp_codes
            .find_by_user_and_purpose(linked.id, OtpPurpose::EmailVerification)
            .await
            .unwrap();
        assert!(codes.is_none());
    }

    #[tokio::test]
    async fn test_complete_google_link_rejects_already_linked_account() {
        let app = setup().await;
        let (_, user) = app.auth.sign_up(CookieJar::new(), ana_sign_up()).await.unwrap();
        app.users.link_google(user.id, "g-6", None).await.unwrap();

        let token = app
            .pending
            .create_token(&google_profile("g-7", "ana@x.com"), PendingPurpose::Link)
            .unwrap();
        let jar = app.pending.set_cookie(CookieJar::new(), PendingPurpose::Link, token);

        let err = app.auth.complete_google_link(jar).await.unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_verify_email_wrong_code_leaves_code_usable() {
        let app = setup().await;
        let (_, user) = app.auth.sign_up(CookieJar::new(), ana_sign_up()).await.unwrap();
        plant_code(&app, user.id, OtpPurpose::EmailVerification, "222333").await;

        let err = app.auth.verify_email(user.id, "000000").await.unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));

        // The stored code survives the failed attempt.
        let verified = app.auth.verify_email(user.id, "222333").await.unwrap();
        assert!(verified.email_verified);

        let remaining = app
            .otp_codes
            .find_by_user_and_purpose(user.id, OtpPurpose::EmailVerification)
            .await
            .unwrap();
        assert!(remaining.is_none());
    }

    #[tokio::test]
    async fn test_verify_email_expired_code_is_deleted() {
        let app = setup().await;
        let (_, user) = app.auth.sign_up(CookieJar::new(), ana_sign_up()).await.unwrap();

        let hash = hash_secret("222333", TEST_COST).unwrap();
        app.otp_codes
            .replace(
                user.id,
                OtpPurpose::EmailVerification,
                &hash,
                Utc::now() - Duration::minutes(1),
            )
            .await
            .unwrap();

        let err = app.auth.verify_email(user.id, "222333").await.unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));

        let remaining = app
            .otp_codes
            .find_by_user_and_purpose(user.id, OtpPurpose::EmailVerification)
            .await
            .unwrap();
        assert!(remaining.is_none());
    }

    #[tokio::test]
    async fn test_verify_email_is_noop_when_already_verified() {
        let app = setup().await;
        let (_, user) = app.auth.sign_up(CookieJar::new(), ana_sign_up()).await.unwrap();
        plant_code(&app, user.id, OtpPurpose::EmailVerification, "222333").await;
        app.auth.verify_email(user.id, "222333").await.unwrap();

        // Any code verifies once the flag is set; the store is not consulted.
        let user = app.auth.verify_email(user.id, "junk").await.unwrap();
        assert!(user.email_verified);
    }

    #[tokio::test]
    async fn test_resend_within_cooldown_is_rejected_then_replaces_code() {
        let app = setup().await;
        let (_, user) = app.auth.sign_up(CookieJar::new(), ana_sign_up()).await.unwrap();

        let err = app
            .auth
            .resend_verification_email("ana@x.com")
            .await
            .unwrap_err();
        match err {
            ApiError::TooManyRequests {
                retry_after_seconds,
                ..
            } => assert!(retry_after_seconds > 0),
            other => panic!("expected TooManyRequests, got {}", other),
        }

        let before: String = sqlx::query_scalar(
            "SELECT code_hash FROM otp_codes WHERE user_id = ? AND purpose = 'EMAIL_VERIFICATION'",
        )
        .bind(user.id)
        .fetch_one(&app.pool)
        .await
        .unwrap();

        // Age the live code past the cooldown window.
        sqlx::query("UPDATE otp_codes SET created_at = ? WHERE user_id = ?")
            .bind(Utc::now() - Duration::seconds(120))
            .bind(user.id)
            .execute(&app.pool)
            .await
            .unwrap();

        app.auth.resend_verification_email("ana@x.com").await.unwrap();

        let after: String = sqlx::query_scalar(
            "SELECT code_hash FROM otp_codes WHERE user_id = ? AND purpose = 'EMAIL_VERIFICATION'",
        )
        .bind(user.id)
        .fetch_one(&app.pool)
        .await
        .unwrap();
        assert_ne!(before, after);

        // Still exactly one live code for the pair.
        assert_eq!(
            count(
                &app.pool,
                "SELECT COUNT(*) FROM otp_codes WHERE purpose = 'EMAIL_VERIFICATION'"
            )
            .await,
            1
        );
    }

    #[tokio::test]
    async fn test_cooldown_lookup_is_read_only() {
        let app = setup().await;
        app.auth.sign_up(CookieJar::new(), ana_sign_up()).await.unwrap();

        let cooldown = app.auth.resend_cooldown("ana@x.com").await.unwrap();
        assert!(cooldown.retry_after_seconds > 0);

        // Unknown emails report zero rather than erroring.
        let cooldown = app.auth.resend_cooldown("nobody@x.com").await.unwrap();
        assert_eq!(cooldown.retry_after_seconds, 0);

        let cooldown = app.auth.reset_cooldown("ana@x.com").await.unwrap();
        assert_eq!(cooldown.retry_after_seconds, 0);
    }

    #[tokio::test]
    async fn test_forgot_password_is_silent_for_unknown_email() {
        let app = setup().await;
        app.auth.send_password_reset_email("nobody@x.com").await.unwrap();
        assert_eq!(count(&app.pool, "SELECT COUNT(*) FROM otp_codes").await, 0);
    }

    #[tokio::test]
    async fn test_forgot_password_rejects_google_only_account() {
        let app = setup().await;
        app.users
            .create(NewUser {
                name: "Bo".to_string(),
                username: "bo".to_string(),
                email: "bo@x.com".to_string(),
                password_hash: None,
                google_id: Some("g-bo".to_string()),
                avatar_url: None,
                email_verified: true,
            })
            .await
            .unwrap();

        let err = app
            .auth
            .send_password_reset_email("bo@x.com")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_reset_password_revokes_all_refresh_tokens() {
        let app = setup().await;
        let (_, user) = app.auth.sign_up(CookieJar::new(), ana_sign_up()).await.unwrap();
        let jar_b = app
            .sessions
            .create_session(CookieJar::new(), &user)
            .await
            .unwrap();
        assert_eq!(count(&app.pool, "SELECT COUNT(*) FROM refresh_tokens").await, 2);

        plant_code(&app, user.id, OtpPurpose::PasswordReset, "445566").await;

        // The two-step UI checks the code without consuming it first.
        app.auth
            .verify_password_reset_code("ana@x.com", "445566")
            .await
            .unwrap();

        app.auth
            .reset_password("ana@x.com", "445566", "N3w!Password#2")
            .await
            .unwrap();

        assert_eq!(count(&app.pool, "SELECT COUNT(*) FROM refresh_tokens").await, 0);

        let token = cookies::get_refresh_token(&jar_b).unwrap();
        let jar = cookies::set_refresh_token_cookie(CookieJar::new(), token, false);
        let (_, err) = app.sessions.refresh(jar).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));

        // Old password dead, new one live, reset code consumed.
        assert!(app
            .auth
            .sign_in(CookieJar::new(), "ana@x.com", "Str0ng!Pass#1")
            .await
            .is_err());
        app.auth
            .sign_in(CookieJar::new(), "ana@x.com", "N3w!Password#2")
            .await
            .unwrap();
        let code = app
            .otp_codes
            .find_by_user_and_purpose(user.id, OtpPurpose::PasswordReset)
            .await
            .unwrap();
        assert!(code.is_none());
    }

    #[tokio::test]
    async fn test_reset_password_rejects_wrong_code() {
        let app = setup().await;
        let (_, user) = app.auth.sign_up(CookieJar::new(), ana_sign_up()).await.unwrap();
        plant_code(&app, user.id, OtpPurpose::PasswordReset, "445566").await;

        let err = app
            .auth
            .reset_password("ana@x.com", "000000", "N3w!Password#2")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));

        // Code stays usable and no tokens were revoked.
        app.auth
            .verify_password_reset_code("ana@x.com", "445566")
            .await
            .unwrap();
        assert_eq!(count(&app.pool, "SELECT COUNT(*) FROM refresh_tokens").await, 1);
    }

    #[tokio::test]
    async fn test_sign_up_clears_stale_pending_cookies() {
        let app = setup().await;
        let token = app
            .pending
            .create_token(&google_profile("g-9", "ana@x.com"), PendingPurpose::SignUp)
            .unwrap();
        let jar = app.pending.set_cookie(CookieJar::new(), PendingPurpose::SignUp, token);

        let (jar, _) = app.auth.sign_up(jar, ana_sign_up()).await.unwrap();
        assert!(app.pending.read(&jar, PendingPurpose::SignUp).is_none());
        assert!(jar.get(COOKIE_PENDING_GOOGLE_LINK).map_or(true, |c| c.value().is_empty()));
    }
}
