//! # Auth Module
//!
//! Everything the authentication and session core is made of:
//! - password and Google OAuth sign-up/sign-in
//! - access/refresh session management with HTTP-only cookies
//! - email verification and password reset via one-time codes
//! - the pending-Google cookie broker for unfinished OAuth identities
//! - AuthedUser extractor for protected routes

pub mod cookies;
pub mod extractors;
pub mod handlers;
pub mod models;
pub mod passwords;
pub mod pending;
pub mod routes;
pub mod service;
pub mod session;
pub mod store;
pub mod tokens;
pub mod validators;

#[cfg(test)]
mod tests;

pub use extractors::AuthedUser;
pub use routes::auth_routes;
