//! Client-side input checks run before any request is sent.

use super::ApiError;

/// Minimum password length accepted by the login and registration forms.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Matches `^[^\s@]+@[^\s@]+\.[^\s@]+$`.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}

pub fn email(email: &str) -> Result<(), ApiError> {
    if email.trim().is_empty() {
        return Err(ApiError::Validation("Email is required.".into()));
    }
    if !is_valid_email(email) {
        return Err(ApiError::Validation("Please enter a valid email address.".into()));
    }
    Ok(())
}

pub fn password(password: &str) -> Result<(), ApiError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::Validation(format!(
            "Password must be at least {} characters long.",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

pub fn otp(otp: &str) -> Result<(), ApiError> {
    if otp.trim().is_empty() {
        return Err(ApiError::Validation("OTP is required.".into()));
    }
    Ok(())
}

pub fn name(name: &str) -> Result<(), ApiError> {
    if name.trim().is_empty() {
        return Err(ApiError::Validation("Name is required.".into()));
    }
    Ok(())
}

/// An account id is sent as a single path segment; dot segments would
/// resolve to a different route.
pub fn account_id(id: &str) -> Result<(), ApiError> {
    match id.trim() {
        "" => Err(ApiError::Validation("Account id is required.".into())),
        "." | ".." => Err(ApiError::Validation("Invalid account id.".into())),
        _ => Ok(()),
    }
}
