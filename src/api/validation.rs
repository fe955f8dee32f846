//! Input validation for API requests.
//!
//! Validators return `Err(message)` on failure; handlers collect them with
//! `ValidationErrorBuilder` from the `error` module.

use lazy_static::lazy_static;
use regex::Regex;

/// Largest single sale accepted
const MAX_SALE_VALUE: f64 = 100_000_000.0;

const MAX_TEXT_FIELD_LEN: usize = 120;

lazy_static! {
    /// Letters, digits, spaces, dots, dashes and underscores; starts with a letter or digit
    static ref USERNAME_REGEX: Regex = Regex::new(
        r"^[\p{L}\p{N}][\p{L}\p{N} ._-]*$"
    ).unwrap();
}

/// Validate a username
pub fn validate_username(username: &str) -> Result<(), String> {
    if username.is_empty() {
        return Err("Username is required".to_string());
    }

    let length = username.chars().count();
    if length < 2 {
        return Err("Username is too short (min 2 characters)".to_string());
    }
    if length > 32 {
        return Err("Username is too long (max 32 characters)".to_string());
    }

    if username.trim() != username {
        return Err("Username must not start or end with whitespace".to_string());
    }

    if !USERNAME_REGEX.is_match(username) {
        return Err(
            "Username may only contain letters, digits, spaces, dots, dashes and underscores"
                .to_string(),
        );
    }

    Ok(())
}

/// Validate a password for a new account
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.chars().count() < 8 {
        return Err("Password must be at least 8 characters".to_string());
    }
    if password.len() > 128 {
        return Err("Password is too long (max 128 characters)".to_string());
    }
    if password.trim().is_empty() {
        return Err("Password must not be blank".to_string());
    }
    Ok(())
}

/// Validate the client name of a sale
pub fn validate_client(client: &str) -> Result<(), String> {
    if client.trim().is_empty() {
        return Err("Client is required".to_string());
    }
    if client.chars().count() > MAX_TEXT_FIELD_LEN {
        return Err(format!(
            "Client is too long (max {} characters)",
            MAX_TEXT_FIELD_LEN
        ));
    }
    Ok(())
}

/// Validate the agreement (convenio) label of a sale; may be empty
pub fn validate_agreement(agreement: &str) -> Result<(), String> {
    if agreement.chars().count() > MAX_TEXT_FIELD_LEN {
        return Err(format!(
            "Agreement is too long (max {} characters)",
            MAX_TEXT_FIELD_LEN
        ));
    }
    Ok(())
}

/// Validate a sale amount
pub fn validate_sale_value(value: f64) -> Result<(), String> {
    if !value.is_finite() {
        return Err("Value must be a number".to_string());
    }
    if value <= 0.0 {
        return Err("Value must be greater than zero".to_string());
    }
    if value > MAX_SALE_VALUE {
        return Err("Value is unrealistically large".to_string());
    }
    Ok(())
}
