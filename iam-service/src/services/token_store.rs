use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fs;
use std::sync::Arc;
use uuid::Uuid;

use super::error::TokenStoreError;
use super::redis::TokenBlacklist;
use crate::config::JwtConfig;
use crate::models::{Token, TokenType};

/// Opaque issuer and verifier of encoded tokens.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Encode `token` so that it expires after `ttl`.
    async fn issue(&self, token: &Token, ttl: Duration) -> Result<String, TokenStoreError>;

    /// Exchange an encoded refresh token for a new encoded bearer token.
    async fn renew(&self, refresh_token: &str, ttl: Duration) -> Result<String, TokenStoreError>;

    async fn verify(&self, encoded: &str) -> Result<Token, TokenStoreError>;

    /// Invalidate `encoded` for the rest of its lifetime.
    async fn revoke(&self, encoded: &str) -> Result<Token, TokenStoreError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Claims {
    typ: TokenType,
    realm: String,
    cid: String,
    sub: String,
    #[serde(default)]
    scope: Vec<String>,
    jti: String,
    iss: String,
    iat: i64,
    exp: i64,
}

/// Token store backed by signed JWTs and a revocation list.
#[derive(Clone)]
pub struct JwtTokenStore {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
    issuer: String,
    blacklist: Arc<dyn TokenBlacklist>,
}

impl JwtTokenStore {
    /// RS256 store with keys loaded from the PEM files named in `config`.
    pub fn from_rsa_pem_files(
        config: &JwtConfig,
        blacklist: Arc<dyn TokenBlacklist>,
    ) -> Result<Self, anyhow::Error> {
        let private_key_pem = fs::read_to_string(&config.private_key_path).map_err(|e| {
            anyhow::anyhow!(
                "Failed to read private key from {}: {}",
                config.private_key_path,
                e
            )
        })?;

        let encoding_key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
            .map_err(|e| anyhow::anyhow!("Failed to parse private key: {}", e))?;

        let public_key_pem = fs::read_to_string(&config.public_key_path).map_err(|e| {
            anyhow::anyhow!(
                "Failed to read public key from {}: {}",
                config.public_key_path,
                e
            )
        })?;

        let decoding_key = DecodingKey::from_rsa_pem(public_key_pem.as_bytes())
            .map_err(|e| anyhow::anyhow!("Failed to parse public key: {}", e))?;

        tracing::info!(issuer = %config.issuer, "JWT token store initialized with RS256 keys");

        Ok(Self {
            encoding_key,
            decoding_key,
            algorithm: Algorithm::RS256,
            issuer: config.issuer.clone(),
            blacklist,
        })
    }

    /// HS256 store sharing one secret for signing and verification.
    pub fn from_secret(secret: &[u8], issuer: &str, blacklist: Arc<dyn TokenBlacklist>) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            algorithm: Algorithm::HS256,
            issuer: issuer.to_string(),
            blacklist,
        }
    }

    fn decode_claims(&self, encoded: &str) -> Result<Claims, TokenStoreError> {
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = 0;
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);

        decode::<Claims>(encoded, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "Rejected token");
                TokenStoreError::InvalidToken
            })
    }

    fn into_token(claims: Claims) -> Result<Token, TokenStoreError> {
        let id = Uuid::parse_str(&claims.jti).map_err(|_| TokenStoreError::InvalidToken)?;
        let expires_at: DateTime<Utc> = Utc
            .timestamp_opt(claims.exp, 0)
            .single()
            .ok_or(TokenStoreError::InvalidToken)?;

        let mut token = Token::new(claims.typ, claims.realm, claims.cid, claims.sub, claims.scope);
        token.id = Some(id);
        token.expires_at = Some(expires_at);
        Ok(token)
    }
}

#[async_trait]
impl TokenStore for JwtTokenStore {
    async fn issue(&self, token: &Token, ttl: Duration) -> Result<String, TokenStoreError> {
        if token.token_type == TokenType::Basic {
            return Err(TokenStoreError::Unsupported);
        }

        let now = Utc::now();
        let claims = Claims {
            typ: token.token_type,
            realm: token.realm.clone(),
            cid: token.client.clone(),
            sub: token.subject.clone(),
            scope: token.scope.clone(),
            jti: Uuid::new_v4().to_string(),
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };

        encode(&Header::new(self.algorithm), &claims, &self.encoding_key).map_err(|e| {
            TokenStoreError::Backend(anyhow::anyhow!("Failed to encode {} token: {}", token.token_type, e))
        })
    }

    async fn renew(&self, refresh_token: &str, ttl: Duration) -> Result<String, TokenStoreError> {
        let refresh = self.verify(refresh_token).await?;
        if refresh.token_type != TokenType::Refresh {
            return Err(TokenStoreError::InvalidToken);
        }

        // Refresh tokens are single use; a lost revocation race fails here.
        self.revoke(refresh_token).await?;

        self.issue(&refresh.with_type(TokenType::Bearer), ttl).await
    }

    async fn verify(&self, encoded: &str) -> Result<Token, TokenStoreError> {
        let token = Self::into_token(self.decode_claims(encoded)?)?;

        let jti = token.id.map(|id| id.to_string()).unwrap_or_default();
        if self.blacklist.is_blacklisted(&jti).await? {
            tracing::debug!(jti = %jti, "Rejected revoked token");
            return Err(TokenStoreError::InvalidToken);
        }

        Ok(token)
    }

    /// Only the first of any concurrent revocations succeeds.
    async fn revoke(&self, encoded: &str) -> Result<Token, TokenStoreError> {
        let token = self.verify(encoded).await?;
        let id = token.id.ok_or(TokenStoreError::InvalidToken)?;

        let remaining = token.remaining_seconds(Utc::now());
        if !self
            .blacklist
            .blacklist_token(&id.to_string(), remaining)
            .await?
        {
            tracing::debug!(jti = %id, "Token already revoked");
            return Err(TokenStoreError::InvalidToken);
        }

        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::redis::MockBlacklist;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn store() -> JwtTokenStore {
        JwtTokenStore::from_secret(b"test-secret", "iam-test", Arc::new(MockBlacklist::new()))
    }

    fn bearer() -> Token {
        Token::new(
            TokenType::Bearer,
            "users",
            "client-1",
            "user-1",
            vec!["ROLE_ADMIN".to_string(), "ROLE_SUPPORT".to_string()],
        )
    }

    #[tokio::test]
    async fn issue_then_verify_restores_fields() {
        let store = store();
        let encoded = store.issue(&bearer(), Duration::minutes(5)).await.unwrap();

        let token = store.verify(&encoded).await.unwrap();
        assert_eq!(token.token_type, TokenType::Bearer);
        assert_eq!(token.realm, "users");
        assert_eq!(token.client, "client-1");
        assert_eq!(token.subject, "user-1");
        assert_eq!(token.scope, bearer().scope);
        assert!(token.id.is_some());

        let remaining = token.remaining_seconds(Utc::now());
        assert!(remaining > 290 && remaining <= 300);
    }

    #[tokio::test]
    async fn rejects_expired_token() {
        let store = store();
        let encoded = store.issue(&bearer(), Duration::seconds(-10)).await.unwrap();
        assert!(matches!(
            store.verify(&encoded).await,
            Err(TokenStoreError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn rejects_foreign_signature_and_issuer() {
        let encoded = store().issue(&bearer(), Duration::minutes(5)).await.unwrap();

        let other_key =
            JwtTokenStore::from_secret(b"other-secret", "iam-test", Arc::new(MockBlacklist::new()));
        assert!(other_key.verify(&encoded).await.is_err());

        let other_issuer =
            JwtTokenStore::from_secret(b"test-secret", "someone-else", Arc::new(MockBlacklist::new()));
        assert!(other_issuer.verify(&encoded).await.is_err());

        assert!(store().verify("not-a-token").await.is_err());
    }

    #[tokio::test]
    async fn revoked_token_no_longer_verifies() {
        let store = store();
        let encoded = store.issue(&bearer(), Duration::minutes(5)).await.unwrap();

        let revoked = store.revoke(&encoded).await.unwrap();
        assert_eq!(revoked.subject, "user-1");
        assert!(matches!(
            store.verify(&encoded).await,
            Err(TokenStoreError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn renew_rotates_refresh_token() {
        let store = store();
        let refresh = store
            .issue(&bearer().with_type(TokenType::Refresh), Duration::hours(1))
            .await
            .unwrap();

        let renewed = store.renew(&refresh, Duration::minutes(5)).await.unwrap();
        let token = store.verify(&renewed).await.unwrap();
        assert_eq!(token.token_type, TokenType::Bearer);
        assert_eq!(token.subject, "user-1");
        assert_eq!(token.scope, bearer().scope);

        assert!(matches!(
            store.renew(&refresh, Duration::minutes(5)).await,
            Err(TokenStoreError::InvalidToken)
        ));
    }

    /// Blacklist that yields between calls like a network round trip.
    struct YieldingBlacklist(MockBlacklist);

    #[async_trait]
    impl TokenBlacklist for YieldingBlacklist {
        async fn blacklist_token(
            &self,
            token_jti: &str,
            expiry_seconds: i64,
        ) -> Result<bool, anyhow::Error> {
            tokio::task::yield_now().await;
            self.0.blacklist_token(token_jti, expiry_seconds).await
        }

        async fn is_blacklisted(&self, token_jti: &str) -> Result<bool, anyhow::Error> {
            let revoked = self.0.is_blacklisted(token_jti).await;
            tokio::task::yield_now().await;
            revoked
        }

        async fn health_check(&self) -> Result<(), anyhow::Error> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn concurrent_renewals_of_one_refresh_token_yield_one_winner() {
        let store = JwtTokenStore::from_secret(
            b"test-secret",
            "iam-test",
            Arc::new(YieldingBlacklist(MockBlacklist::new())),
        );
        let refresh = store
            .issue(&bearer().with_type(TokenType::Refresh), Duration::hours(1))
            .await
            .unwrap();

        let (first, second) = tokio::join!(
            store.renew(&refresh, Duration::minutes(5)),
            store.renew(&refresh, Duration::minutes(5)),
        );

        assert_eq!(
            [first.is_ok(), second.is_ok()].iter().filter(|ok| **ok).count(),
            1
        );
        for result in [first, second] {
            if let Err(e) = result {
                assert!(matches!(e, TokenStoreError::InvalidToken));
            }
        }
    }

    #[tokio::test]
    async fn revoking_twice_fails_the_second_time() {
        let store = store();
        let encoded = store.issue(&bearer(), Duration::minutes(5)).await.unwrap();

        assert!(store.revoke(&encoded).await.is_ok());
        assert!(matches!(
            store.revoke(&encoded).await,
            Err(TokenStoreError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn renew_requires_refresh_type() {
        let store = store();
        let access = store.issue(&bearer(), Duration::minutes(5)).await.unwrap();
        assert!(matches!(
            store.renew(&access, Duration::minutes(5)).await,
            Err(TokenStoreError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn basic_tokens_cannot_be_issued() {
        let token = bearer().with_type(TokenType::Basic);
        assert!(matches!(
            store().issue(&token, Duration::minutes(5)).await,
            Err(TokenStoreError::Unsupported)
        ));
    }

    #[test]
    fn rejects_unreadable_key_files() -> Result<(), anyhow::Error> {
        let mut garbage = NamedTempFile::new()?;
        garbage.write_all(b"not a pem")?;

        let config = JwtConfig {
            private_key_path: garbage.path().to_string_lossy().to_string(),
            public_key_path: "/nonexistent/public.pem".to_string(),
            issuer: "iam-test".to_string(),
            access_token_ttl_seconds: 60,
            refresh_token_ttl_seconds: 120,
        };

        let result = JwtTokenStore::from_rsa_pem_files(&config, Arc::new(MockBlacklist::new()));
        assert!(result.is_err());
        Ok(())
    }
}
