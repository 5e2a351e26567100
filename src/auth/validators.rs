// src/auth/validators.rs
//! Standalone field validators for the auth endpoints, invoked by handlers
//! before the auth services run.

use regex::Regex;
use std::sync::OnceLock;

use super::models::{GoogleSignUpCompleteRequest, ResetPasswordRequest, SignUpRequest};
use crate::common::ValidationResult;

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"))
}

fn username_charset_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9._]+$").expect("valid username regex"))
}

pub fn validate_name(result: &mut ValidationResult, name: &str) {
    let trimmed = name.trim();
    if trimmed.len() < 2 {
        result.add_error("name", "Name must be at least 2 characters");
    } else if trimmed.len() > 100 {
        result.add_error("name", "Name must be less than 100 characters");
    }
}

/// Usernames may contain letters, numbers, underscores and dots, but cannot
/// start or end with a dot or contain consecutive dots.
pub fn validate_username(result: &mut ValidationResult, username: &str) {
    if username.len() < 2 {
        result.add_error("username", "Username must be at least 2 characters");
        return;
    }
    if username.len() > 50 {
        result.add_error("username", "Username must be less than 50 characters");
        return;
    }
    if !username_charset_regex().is_match(username)
        || username.starts_with('.')
        || username.ends_with('.')
        || username.contains("..")
    {
        result.add_error(
            "username",
            "Username can contain letters, numbers, underscores and dots, but cannot start or end with a dot or contain consecutive dots",
        );
    }
}

pub fn validate_email(result: &mut ValidationResult, email: &str) {
    if email.is_empty() || email.len() > 255 || !email_regex().is_match(email) {
        result.add_error("email", "A valid email address is required");
    }
}

/// Minimum 8 characters with at least one lowercase letter, one uppercase
/// letter, one digit and one symbol.
pub fn validate_password(result: &mut ValidationResult, password: &str) {
    if password.len() < 8 {
        result.add_error("password", "Password must be at least 8 characters");
        return;
    }
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_symbol = password.chars().any(|c| !c.is_ascii_alphanumeric());

    if !(has_lower && has_upper && has_digit && has_symbol) {
        result.add_error(
            "password",
            "Password must contain a lowercase letter, an uppercase letter, a number and a symbol",
        );
    }
}

pub fn validate_sign_up(data: &SignUpRequest) -> ValidationResult {
    let mut result = ValidationResult::new();
    validate_name(&mut result, &data.name);
    validate_username(&mut result, &data.username);
    validate_email(&mut result, &data.email);
    validate_password(&mut result, &data.password);
    result
}

pub fn validate_google_sign_up_complete(data: &GoogleSignUpCompleteRequest) -> ValidationResult {
    let mut result = ValidationResult::new();
    validate_name(&mut result, &data.name);
    validate_username(&mut result, &data.username);
    result
}

pub fn validate_reset_password(data: &ResetPasswordRequest) -> ValidationResult {
    let mut result = ValidationResult::new();
    validate_email(&mut result, &data.email);
    validate_password(&mut result, &data.password);
    result
}
