//! Pending-identity broker
//!
//! A Google identity that is not yet bound to a local account travels as a
//! short-lived signed assertion in an HTTP-only cookie. Two independent slots
//! exist (SIGNUP and LINK); the purpose tag is part of the signed payload so a
//! cookie copied across slots fails verification. Nothing here touches
//! persistent storage.

use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::cookies::{
    self, COOKIE_PENDING_GOOGLE_LINK, COOKIE_PENDING_GOOGLE_SIGNUP, PENDING_GOOGLE_MAX_AGE_MINUTES,
};
use super::models::GoogleProfile;
use super::tokens::expires_in_minutes;

/// The two pending-cookie slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingPurpose {
    SignUp,
    Link,
}

impl PendingPurpose {
    pub fn cookie_name(&self) -> &'static str {
        match self {
            PendingPurpose::SignUp => COOKIE_PENDING_GOOGLE_SIGNUP,
            PendingPurpose::Link => COOKIE_PENDING_GOOGLE_LINK,
        }
    }

    fn tag(&self) -> &'static str {
        match self {
            PendingPurpose::SignUp => "SIGNUP",
            PendingPurpose::Link => "LINK",
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
struct PendingClaims {
    email: String,
    name: String,
    #[serde(rename = "googleId")]
    google_id: String,
    #[serde(rename = "avatarUrl")]
    avatar_url: Option<String>,
    purpose: String,
    exp: usize,
}

pub struct PendingGoogleService {
    jwt_secret: String,
    secure_cookies: bool,
}

impl PendingGoogleService {
    pub fn new(jwt_secret: String, secure_cookies: bool) -> Self {
        Self {
            jwt_secret,
            secure_cookies,
        }
    }

    /// Sign a pending assertion with a 10-minute TTL and the slot's purpose
    /// tag embedded in the payload.
    pub fn create_token(
        &self,
        profile: &GoogleProfile,
        purpose: PendingPurpose,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let claims = PendingClaims {
            email: profile.email.clone(),
            name: profile.name.clone(),
            google_id: profile.google_id.clone(),
            avatar_url: profile.avatar_url.clone(),
            purpose: purpose.tag().to_string(),
            exp: expires_in_minutes(PENDING_GOOGLE_MAX_AGE_MINUTES).timestamp() as usize,
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
    }

    /// Read the slot's cookie. Returns `None` if the cookie is absent, the
    /// signature or expiry fails, or the embedded purpose tag does not match
    /// the slot being read.
    pub fn read(&self, jar: &CookieJar, purpose: PendingPurpose) -> Option<GoogleProfile> {
        let token = cookies::get_cookie_value(jar, purpose.cookie_name())?;
        self.verify_token(&token, purpose)
    }

    fn verify_token(&self, token: &str, purpose: PendingPurpose) -> Option<GoogleProfile> {
        let decoded = decode::<PendingClaims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .ok()?;

        let claims = decoded.claims;

        if claims.purpose != purpose.tag() {
            debug!(
                expected = purpose.tag(),
                got = %claims.purpose,
                "Pending cookie purpose mismatch"
            );
            return None;
        }

        Some(GoogleProfile {
            email: claims.email,
            name: claims.name,
            google_id: claims.google_id,
            avatar_url: claims.avatar_url,
        })
    }

    pub fn set_cookie(&self, jar: CookieJar, purpose: PendingPurpose, token: String) -> CookieJar {
        cookies::set_pending_cookie(jar, purpose.cookie_name(), token, self.secure_cookies)
    }

    pub fn clear_cookie(&self, jar: CookieJar, purpose: PendingPurpose) -> CookieJar {
        cookies::clear_cookie(jar, purpose.cookie_name())
    }

    pub fn clear_all(&self, jar: CookieJar) -> CookieJar {
        cookies::clear_pending_cookies(jar)
    }
}
