use chrono::{DateTime, Utc};

use super::error::AuthError;
use crate::models::{Login, User};

/// Account state checks applied after the credential has been verified.
///
/// Checks run in a fixed order and the first failure wins: user present,
/// user not expired, not disabled, approved, verified, then login not
/// disabled and not expired.
pub fn check_account(login: &Login, now: DateTime<Utc>) -> Result<&User, AuthError> {
    let user = login.user.as_ref().ok_or(AuthError::UserNotFound)?;

    if user.is_expired(now) {
        return Err(AuthError::UserExpired);
    }
    if user.disabled {
        return Err(AuthError::UserDisabled);
    }
    if !user.approved {
        return Err(AuthError::UserNotApproved);
    }
    if !user.verified {
        return Err(AuthError::UserNotVerified);
    }
    if login.disabled {
        return Err(AuthError::LoginDisabled);
    }
    if login.is_expired(now) {
        return Err(AuthError::LoginExpired);
    }

    Ok(user)
}
