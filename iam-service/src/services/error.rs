use service_core::error::AppError;
use thiserror::Error;
use validator::{ValidationError, ValidationErrors};

/// Failures of the token store contract.
#[derive(Error, Debug)]
pub enum TokenStoreError {
    #[error("Invalid token")]
    InvalidToken,

    #[error("Operation not supported by this token store")]
    Unsupported,

    #[error("Token store backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

/// Outcome of a failed authentication or issuance.
///
/// Every domain variant is terminal for the request. `Repository` and
/// `TokenStore` carry infrastructure failures unchanged.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Realm not found")]
    RealmNotFound,

    #[error("Login provider not found: {0}")]
    ProviderNotFound(String),

    #[error("Login provider not implemented: {0}")]
    ProviderNotImplemented(String),

    #[error("Validation failed on {field}: {message}")]
    ValidationFailed {
        field: &'static str,
        message: &'static str,
    },

    #[error("Login not found")]
    LoginNotFound,

    #[error("Credential missing")]
    CredentialMissing,

    #[error("Credential mismatch")]
    CredentialMismatch,

    #[error("User not found")]
    UserNotFound,

    #[error("User expired")]
    UserExpired,

    #[error("User disabled")]
    UserDisabled,

    #[error("User not approved")]
    UserNotApproved,

    #[error("User not verified")]
    UserNotVerified,

    #[error("Login disabled")]
    LoginDisabled,

    #[error("Login expired")]
    LoginExpired,

    #[error("User login timestamps were not updated")]
    UpdateFailed,

    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Repository error: {0}")]
    Repository(anyhow::Error),

    #[error("Token store error: {0}")]
    TokenStore(#[source] TokenStoreError),
}

impl AuthError {
    /// Short machine-readable name, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::RealmNotFound => "realm_not_found",
            AuthError::ProviderNotFound(_) => "provider_not_found",
            AuthError::ProviderNotImplemented(_) => "provider_not_implemented",
            AuthError::ValidationFailed { .. } => "validation_failed",
            AuthError::LoginNotFound => "login_not_found",
            AuthError::CredentialMissing => "credential_missing",
            AuthError::CredentialMismatch => "credential_mismatch",
            AuthError::UserNotFound => "user_not_found",
            AuthError::UserExpired => "user_expired",
            AuthError::UserDisabled => "user_disabled",
            AuthError::UserNotApproved => "user_not_approved",
            AuthError::UserNotVerified => "user_not_verified",
            AuthError::LoginDisabled => "login_disabled",
            AuthError::LoginExpired => "login_expired",
            AuthError::UpdateFailed => "update_failed",
            AuthError::InvalidRefreshToken => "invalid_refresh_token",
            AuthError::InvalidToken => "invalid_token",
            AuthError::Repository(_) => "repository",
            AuthError::TokenStore(_) => "token_store",
        }
    }
}

impl From<TokenStoreError> for AuthError {
    fn from(err: TokenStoreError) -> Self {
        match err {
            TokenStoreError::InvalidToken => AuthError::InvalidToken,
            other => AuthError::TokenStore(other),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::ValidationFailed { field, message } => {
                let mut error = ValidationError::new("required");
                error.message = Some(message.into());
                let mut errors = ValidationErrors::new();
                errors.add(field, error);
                AppError::ValidationError(errors)
            }
            AuthError::ProviderNotFound(name) => {
                AppError::BadRequest(anyhow::anyhow!("Unknown login provider: {}", name))
            }
            AuthError::ProviderNotImplemented(name) => {
                AppError::BadRequest(anyhow::anyhow!("Login provider not supported: {}", name))
            }
            AuthError::InvalidRefreshToken => {
                AppError::AuthError(anyhow::anyhow!("Invalid refresh token"))
            }
            AuthError::InvalidToken => {
                AppError::AuthError(anyhow::anyhow!("Invalid client credentials"))
            }
            AuthError::RealmNotFound
            | AuthError::LoginNotFound
            | AuthError::CredentialMissing
            | AuthError::CredentialMismatch
            | AuthError::UserNotFound
            | AuthError::UserExpired
            | AuthError::UserDisabled
            | AuthError::UserNotApproved
            | AuthError::UserNotVerified
            | AuthError::LoginDisabled
            | AuthError::LoginExpired => AppError::AuthError(anyhow::anyhow!("Invalid credentials")),
            AuthError::UpdateFailed => AppError::DatabaseError(anyhow::anyhow!(
                "User login timestamps were not updated"
            )),
            AuthError::Repository(e) => AppError::DatabaseError(e),
            AuthError::TokenStore(e) => AppError::InternalError(anyhow::Error::new(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, response::IntoResponse};

    fn status(err: AuthError) -> StatusCode {
        AppError::from(err).into_response().status()
    }

    #[test]
    fn account_failures_share_one_status() {
        for err in [
            AuthError::RealmNotFound,
            AuthError::LoginNotFound,
            AuthError::CredentialMismatch,
            AuthError::UserDisabled,
            AuthError::LoginExpired,
        ] {
            assert_eq!(status(err), StatusCode::UNAUTHORIZED);
        }
    }

    #[test]
    fn validation_maps_to_unprocessable() {
        let err = AuthError::ValidationFailed {
            field: "username",
            message: "username is required",
        };
        assert_eq!(status(err), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn provider_errors_are_bad_requests() {
        assert_eq!(
            status(AuthError::ProviderNotFound("LDAP".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(AuthError::ProviderNotImplemented("SMS_OTP_CODE".to_string())),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn infrastructure_errors_are_internal() {
        assert_eq!(status(AuthError::UpdateFailed), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            status(AuthError::Repository(anyhow::anyhow!("connection reset"))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status(AuthError::TokenStore(TokenStoreError::Backend(anyhow::anyhow!(
                "redis down"
            )))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn invalid_token_from_store_becomes_domain_error() {
        assert!(matches!(
            AuthError::from(TokenStoreError::InvalidToken),
            AuthError::InvalidToken
        ));
        assert!(matches!(
            AuthError::from(TokenStoreError::Unsupported),
            AuthError::TokenStore(TokenStoreError::Unsupported)
        ));
    }
}
