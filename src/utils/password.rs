use crate::error::{AppError, AppResult};
use anyhow::Context;

pub const PASSWORD_MIN_LEN: usize = 6;
pub const PASSWORD_MAX_LEN: usize = 128;

/// Length rules for a new password, counted in characters.
pub fn validate_password(password: &str) -> AppResult<()> {
    let len = password.chars().count();
    if len < PASSWORD_MIN_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {PASSWORD_MIN_LEN} characters"
        )));
    }
    if len > PASSWORD_MAX_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at most {PASSWORD_MAX_LEN} characters"
        )));
    }
    Ok(())
}

/// Check the length rules, then bcrypt-hash an account password.
pub fn hash_password(password: &str) -> AppResult<String> {
    validate_password(password)?;
    Ok(bcrypt::hash(password, bcrypt::DEFAULT_COST).context("Failed to hash password")?)
}

/// Device-only accounts store no hash and never match.
pub fn verify_password(password: &str, hash: Option<&str>) -> AppResult<bool> {
    let Some(hash) = hash else {
        return Ok(false);
    };
    Ok(bcrypt::verify(password, hash).context("Failed to verify password")?)
}
