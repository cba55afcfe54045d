//! Input validation for API requests.
//!
//! Validation functions return `Result<(), String>` so handlers can collect
//! them into field-level errors with the `ValidationErrorBuilder` from the
//! `error` module.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Regex for validating usernames (letters, digits, `_`, `.`, `-`)
    static ref USERNAME_REGEX: Regex = Regex::new(r"^[A-Za-z0-9_.-]+$").unwrap();

    /// Regex for sort field names passed through to the store. This is a
    /// charset check, not a column whitelist: unknown fields still reach
    /// the store and fail there.
    static ref SORT_FIELD_REGEX: Regex = Regex::new(r"^[A-Za-z0-9_]+$").unwrap();
}

/// The fixed punctuation set accepted (and one of which is required) in
/// passwords.
const PASSWORD_SYMBOLS: &str = "!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~";

/// Valid user roles
pub const VALID_ROLES: [&str; 2] = ["admin", "editor"];

/// Validate a username: letters, digits, underscores, dots and dashes only,
/// no spaces.
pub fn validate_username(username: &str) -> Result<(), String> {
    if username.is_empty() {
        return Err("Username is required".to_string());
    }

    if username.len() > 64 {
        return Err("Username is too long (max 64 characters)".to_string());
    }

    if username.contains(' ') || !USERNAME_REGEX.is_match(username) {
        return Err(
            "Username may only contain letters, digits, underscores, dots and dashes, without spaces"
                .to_string(),
        );
    }

    Ok(())
}

/// Validate a password: 8-128 chars, at least one uppercase letter, one
/// lowercase letter, one digit and one symbol from the fixed set, with every
/// character drawn from that alphabet.
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.len() < 8 || password.len() > 128 {
        return Err("Password must be between 8 and 128 characters".to_string());
    }

    if password
        .chars()
        .any(|c| !c.is_ascii_alphanumeric() && !PASSWORD_SYMBOLS.contains(c))
    {
        return Err("Password contains characters outside the allowed set".to_string());
    }

    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_symbol = password.chars().any(|c| PASSWORD_SYMBOLS.contains(c));

    if !has_upper {
        return Err("Password must contain at least one uppercase letter".to_string());
    }
    if !has_lower {
        return Err("Password must contain at least one lowercase letter".to_string());
    }
    if !has_digit {
        return Err("Password must contain at least one digit".to_string());
    }
    if !has_symbol {
        return Err("Password must contain at least one special character".to_string());
    }

    Ok(())
}

/// Validate a role value
pub fn validate_role(role: &str) -> Result<(), String> {
    if !VALID_ROLES.contains(&role) {
        return Err(format!(
            "Invalid role. Must be one of: {}",
            VALID_ROLES.join(", ")
        ));
    }
    Ok(())
}

/// Validate a sort field name before it is interpolated into an ORDER BY
/// clause.
pub fn validate_sort_field(field: &str) -> Result<(), String> {
    if !SORT_FIELD_REGEX.is_match(field) {
        return Err("Invalid sort field".to_string());
    }
    Ok(())
}

/// Map an `order` query value to a SQL direction. Only the literal `asc`
/// sorts ascending; anything else sorts descending.
pub fn sort_direction(order: &str) -> &'static str {
    if order == "asc" {
        "ASC"
    } else {
        "DESC"
    }
}
