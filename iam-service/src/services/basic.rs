use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{Duration, Utc};
use secrecy::SecretString;
use std::sync::Arc;

use super::error::TokenStoreError;
use super::repository::AccountRepository;
use super::token_store::TokenStore;
use crate::models::{Token, TokenType};
use crate::utils::PasswordHasher;

/// Verify-only token store for HTTP Basic client credentials.
///
/// Every rejection surfaces as `InvalidToken` so callers cannot tell which
/// part of the credential was wrong. The reason is only logged at debug.
#[derive(Clone)]
pub struct BasicTokenStore {
    repository: Arc<dyn AccountRepository>,
    hasher: PasswordHasher,
}

/// Split a base64 `secret_key:secret_code` pair. The code may contain `:`.
pub fn parse_basic_credentials(encoded: &str) -> Option<(String, SecretString)> {
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (key, code) = decoded.split_once(':')?;
    Some((key.to_string(), SecretString::new(code.to_string())))
}

fn reject(reason: &'static str) -> TokenStoreError {
    tracing::debug!(reason, "Rejected basic credentials");
    TokenStoreError::InvalidToken
}

impl BasicTokenStore {
    pub fn new(repository: Arc<dyn AccountRepository>, hasher: PasswordHasher) -> Self {
        Self { repository, hasher }
    }

    /// Reject before any stored hash was checked, paying the same Argon2
    /// cost a real comparison would.
    fn reject_unverified(&self, secret_code: &SecretString, reason: &'static str) -> TokenStoreError {
        self.hasher.verify_dummy(secret_code);
        reject(reason)
    }
}

#[async_trait]
impl TokenStore for BasicTokenStore {
    async fn issue(&self, _token: &Token, _ttl: Duration) -> Result<String, TokenStoreError> {
        Err(TokenStoreError::Unsupported)
    }

    async fn renew(&self, _refresh_token: &str, _ttl: Duration) -> Result<String, TokenStoreError> {
        Err(TokenStoreError::Unsupported)
    }

    /// `encoded` is the credential part of the header, without the scheme.
    async fn verify(&self, encoded: &str) -> Result<Token, TokenStoreError> {
        let Some((secret_key, secret_code)) = parse_basic_credentials(encoded) else {
            return Err(self.reject_unverified(&SecretString::new(String::new()), "malformed"));
        };

        let Some(client) = self
            .repository
            .find_client_by_secret_key(&secret_key)
            .await?
        else {
            return Err(self.reject_unverified(&secret_code, "unknown_client"));
        };

        if client.disabled {
            return Err(self.reject_unverified(&secret_code, "client_disabled"));
        }

        if client.is_expired(Utc::now()) {
            return Err(self.reject_unverified(&secret_code, "client_expired"));
        }

        let Some(stored) = client.secret_code.as_deref() else {
            return Err(self.reject_unverified(&secret_code, "secret_missing"));
        };

        self.hasher
            .verify(&secret_code, stored)
            .map_err(|_| reject("secret_mismatch"))?;

        let realm = client.realm.as_ref().ok_or_else(|| reject("realm_missing"))?;

        let client_id = client.id.to_string();
        Ok(Token::new(
            TokenType::Basic,
            realm.name.clone(),
            client_id.clone(),
            client_id,
            Vec::new(),
        ))
    }

    async fn revoke(&self, _encoded: &str) -> Result<Token, TokenStoreError> {
        Err(TokenStoreError::Unsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn parses_key_and_code() {
        let (key, code) = parse_basic_credentials(&STANDARD.encode("key:code")).unwrap();
        assert_eq!(key, "key");
        assert_eq!(code.expose_secret(), "code");
    }

    #[test]
    fn splits_on_first_separator_only() {
        let (key, code) = parse_basic_credentials(&STANDARD.encode("key:co:de")).unwrap();
        assert_eq!(key, "key");
        assert_eq!(code.expose_secret(), "co:de");
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(parse_basic_credentials("%%%not-base64%%%").is_none());
        assert!(parse_basic_credentials(&STANDARD.encode("no-separator")).is_none());
        assert!(parse_basic_credentials(&STANDARD.encode([0xff, 0xfe, b':'])).is_none());
    }
}
