use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::error::AuthError;
use super::repository::AccountRepository;
use crate::models::{Login, FORM_PASSWORD, SMS_OTP_CODE};
use crate::utils::PasswordHasher;

/// Credentials presented with a token request.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub username: Option<String>,
    pub password: Option<SecretString>,
    pub id_token: Option<String>,
    /// Scope requested by the caller. Informational only; granted scope
    /// always comes from role assignments.
    pub scope: Vec<String>,
}

/// Structural check run before any data access.
pub type ValidateFn = fn(&Credentials) -> Result<(), AuthError>;

/// One authentication method.
#[async_trait]
pub trait LoginProvider: Send + Sync {
    /// Registry key, upper case.
    fn name(&self) -> &'static str;

    fn validator(&self) -> Option<ValidateFn> {
        None
    }

    /// Find and verify the login for `credentials` in `realm_id`.
    /// The returned login carries its owning user when one exists.
    async fn login(&self, realm_id: Uuid, credentials: &Credentials) -> Result<Login, AuthError>;
}

fn validate_form_password(credentials: &Credentials) -> Result<(), AuthError> {
    if credentials
        .username
        .as_deref()
        .map_or(true, |u| u.trim().is_empty())
    {
        return Err(AuthError::ValidationFailed {
            field: "username",
            message: "username is required",
        });
    }

    if credentials
        .password
        .as_ref()
        .map_or(true, |p| p.expose_secret().is_empty())
    {
        return Err(AuthError::ValidationFailed {
            field: "password",
            message: "password is required",
        });
    }

    Ok(())
}

/// Username and password checked against an Argon2 hash.
pub struct FormPasswordProvider {
    repository: Arc<dyn AccountRepository>,
    hasher: PasswordHasher,
}

impl FormPasswordProvider {
    pub fn new(repository: Arc<dyn AccountRepository>, hasher: PasswordHasher) -> Self {
        Self { repository, hasher }
    }
}

#[async_trait]
impl LoginProvider for FormPasswordProvider {
    fn name(&self) -> &'static str {
        FORM_PASSWORD
    }

    fn validator(&self) -> Option<ValidateFn> {
        Some(validate_form_password)
    }

    async fn login(&self, realm_id: Uuid, credentials: &Credentials) -> Result<Login, AuthError> {
        let username = credentials.username.as_deref().unwrap_or_default();
        let password = credentials
            .password
            .as_ref()
            .ok_or(AuthError::CredentialMismatch)?;

        let login = self
            .repository
            .find_login(realm_id, FORM_PASSWORD, username)
            .await
            .map_err(AuthError::Repository)?;

        let Some(login) = login else {
            self.hasher.verify_dummy(password);
            return Err(AuthError::LoginNotFound);
        };

        let Some(stored) = login.credential.as_deref() else {
            self.hasher.verify_dummy(password);
            return Err(AuthError::CredentialMissing);
        };

        self.hasher
            .verify(password, stored)
            .map_err(|_| AuthError::CredentialMismatch)?;

        Ok(login)
    }
}

/// SMS one-time code. Registered so the name resolves, but not available.
pub struct OneTimeCodeProvider;

#[async_trait]
impl LoginProvider for OneTimeCodeProvider {
    fn name(&self) -> &'static str {
        SMS_OTP_CODE
    }

    async fn login(&self, _realm_id: Uuid, _credentials: &Credentials) -> Result<Login, AuthError> {
        Err(AuthError::ProviderNotImplemented(SMS_OTP_CODE.to_string()))
    }
}

/// Provider lookup by case-insensitive name, fixed at construction.
///
/// A name mapped to `None` is known but has no implementation.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Option<Arc<dyn LoginProvider>>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in provider.
    pub fn with_defaults(repository: Arc<dyn AccountRepository>, hasher: PasswordHasher) -> Self {
        Self::new()
            .register(Arc::new(FormPasswordProvider::new(repository, hasher)))
            .register(Arc::new(OneTimeCodeProvider))
    }

    pub fn register(mut self, provider: Arc<dyn LoginProvider>) -> Self {
        self.providers
            .insert(provider.name().to_uppercase(), Some(provider));
        self
    }

    /// Reserve `name` without an implementation.
    pub fn reserve(mut self, name: &str) -> Self {
        self.providers.insert(name.to_uppercase(), None);
        self
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn LoginProvider>, AuthError> {
        match self.providers.get(&name.to_uppercase()) {
            Some(Some(provider)) => Ok(provider.clone()),
            Some(None) => Err(AuthError::ProviderNotImplemented(name.to_string())),
            None => Err(AuthError::ProviderNotFound(name.to_string())),
        }
    }
}
