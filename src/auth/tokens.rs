//! Opaque token and one-time code generation

use chrono::{DateTime, Duration, Utc};
use rand::rngs::OsRng;
use rand::{Rng, RngCore};

/// Refresh tokens: 64 random bytes, hex encoded (128 chars).
pub const REFRESH_TOKEN_BYTES: usize = 64;
/// Numeric one-time codes: 6 digits.
pub const OTP_CODE_DIGITS: u32 = 6;

/// Generate a hex-encoded opaque token from cryptographically secure
/// random bytes.
pub fn generate_hex_token(byte_length: usize) -> String {
    let mut bytes = vec![0u8; byte_length];
    OsRng.fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Generate a numeric one-time code with exactly `digits` digits.
///
/// The code is drawn from [0, 10^digits) and zero-padded, so leading zeros
/// are preserved ("004821" is a valid 6-digit code).
pub fn generate_otp_code(digits: u32) -> String {
    let max = 10u64.pow(digits);
    let code = OsRng.gen_range(0..max);
    format!("{:0width$}", code, width = digits as usize)
}

pub fn expires_in_minutes(minutes: i64) -> DateTime<Utc> {
    Utc::now() + Duration::minutes(minutes)
}

pub fn expires_in_days(days: i64) -> DateTime<Utc> {
    Utc::now() + Duration::days(days)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_hex_token_length_and_charset() {
        let token = generate_hex_token(REFRESH_TOKEN_BYTES);
        assert_eq!(token.len(), REFRESH_TOKEN_BYTES * 2);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_hex_tokens_are_unique() {
        let mut seen = HashSet::new();
        for _ in 0..100 {
            assert!(seen.insert(generate_hex_token(32)));
        }
    }

    #[test]
    fn test_otp_code_fixed_width() {
        for _ in 0..200 {
            let code = generate_otp_code(OTP_CODE_DIGITS);
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_otp_code_preserves_leading_zeros() {
        // With 3 digits a leading zero appears often enough to observe.
        let mut saw_leading_zero = false;
        for _ in 0..500 {
            let code = generate_otp_code(3);
            assert_eq!(code.len(), 3);
            if code.starts_with('0') {
                saw_leading_zero = true;
            }
        }
        assert!(saw_leading_zero);
    }

    #[test]
    fn test_expiry_helpers_are_in_the_future() {
        let now = Utc::now();
        assert!(expires_in_minutes(15) > now);
        assert!(expires_in_days(30) > expires_in_minutes(15));
    }
}
