//! Auth cookie lifecycle
//!
//! All auth cookies are HTTP-only, SameSite=Lax, path `/`, and `secure` when
//! the app runs in production. Handlers return the mutated `CookieJar` so the
//! changes land on the outgoing response.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::Duration;

pub const COOKIE_ACCESS_TOKEN: &str = "accessToken";
pub const COOKIE_REFRESH_TOKEN: &str = "refreshToken";
pub const COOKIE_PENDING_GOOGLE_SIGNUP: &str = "pendingGoogleSignup";
pub const COOKIE_PENDING_GOOGLE_LINK: &str = "pendingGoogleLink";

pub const ACCESS_TOKEN_MAX_AGE_MINUTES: i64 = 15;
pub const REFRESH_TOKEN_MAX_AGE_DAYS: i64 = 30;
pub const PENDING_GOOGLE_MAX_AGE_MINUTES: i64 = 10;

fn build_cookie(name: &'static str, value: String, max_age: Duration, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .secure(secure)
        .max_age(max_age)
        .build()
}

pub fn set_access_token_cookie(jar: CookieJar, token: String, secure: bool) -> CookieJar {
    jar.add(build_cookie(
        COOKIE_ACCESS_TOKEN,
        token,
        Duration::minutes(ACCESS_TOKEN_MAX_AGE_MINUTES),
        secure,
    ))
}

pub fn set_refresh_token_cookie(jar: CookieJar, token: String, secure: bool) -> CookieJar {
    jar.add(build_cookie(
        COOKIE_REFRESH_TOKEN,
        token,
        Duration::days(REFRESH_TOKEN_MAX_AGE_DAYS),
        secure,
    ))
}

pub fn set_pending_cookie(jar: CookieJar, name: &'static str, token: String, secure: bool) -> CookieJar {
    jar.add(build_cookie(
        name,
        token,
        Duration::minutes(PENDING_GOOGLE_MAX_AGE_MINUTES),
        secure,
    ))
}

pub fn get_cookie_value(jar: &CookieJar, name: &str) -> Option<String> {
    jar.get(name).map(|c| c.value().to_string())
}

pub fn get_refresh_token(jar: &CookieJar) -> Option<String> {
    get_cookie_value(jar, COOKIE_REFRESH_TOKEN)
}

pub fn get_access_token(jar: &CookieJar) -> Option<String> {
    get_cookie_value(jar, COOKIE_ACCESS_TOKEN)
}

pub fn clear_cookie(jar: CookieJar, name: &'static str) -> CookieJar {
    jar.remove(Cookie::build(name).path("/").build())
}

/// Clears both session cookies (access + refresh).
pub fn clear_auth_cookies(jar: CookieJar) -> CookieJar {
    let jar = clear_cookie(jar, COOKIE_ACCESS_TOKEN);
    clear_cookie(jar, COOKIE_REFRESH_TOKEN)
}

/// Clears both pending-Google cookies.
pub fn clear_pending_cookies(jar: CookieJar) -> CookieJar {
    let jar = clear_cookie(jar, COOKIE_PENDING_GOOGLE_SIGNUP);
    clear_cookie(jar, COOKIE_PENDING_GOOGLE_LINK)
}
