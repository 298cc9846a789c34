use async_trait::async_trait;
use redis::{aio::ConnectionManager, Client};
use std::collections::HashSet;
use std::sync::Mutex;

use crate::config::RedisConfig;

/// Revocation list keyed by token id. Entries expire with the token.
#[async_trait]
pub trait TokenBlacklist: Send + Sync {
    /// Claim `token_jti` for revocation. Returns `false` when it was already
    /// revoked, so only one caller ever wins the claim.
    async fn blacklist_token(&self, token_jti: &str, expiry_seconds: i64)
        -> Result<bool, anyhow::Error>;
    async fn is_blacklisted(&self, token_jti: &str) -> Result<bool, anyhow::Error>;
    async fn health_check(&self) -> Result<(), anyhow::Error>;
}

#[derive(Clone)]
pub struct RedisService {
    _client: Client,
    manager: ConnectionManager,
}

impl RedisService {
    pub async fn new(config: &RedisConfig) -> Result<Self, anyhow::Error> {
        tracing::info!(url = %config.url, "Connecting to Redis");
        let client = Client::open(config.url.clone())?;

        // Use ConnectionManager for automatic reconnection
        let manager = client.get_connection_manager().await.map_err(|e| {
            tracing::error!("Failed to get Redis connection manager: {}", e);
            anyhow::anyhow!("Failed to connect to Redis: {}", e)
        })?;

        tracing::info!("Successfully connected to Redis");

        Ok(Self {
            _client: client,
            manager,
        })
    }
}

fn blacklist_key(token_jti: &str) -> String {
    format!("iam:revoked:{}", token_jti)
}

#[async_trait]
impl TokenBlacklist for RedisService {
    async fn health_check(&self) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();
        redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Redis health check failed: {}", e))
    }

    async fn blacklist_token(
        &self,
        token_jti: &str,
        expiry_seconds: i64,
    ) -> Result<bool, anyhow::Error> {
        let mut conn = self.manager.clone();

        // NX replies nil when the key already exists.
        let reply: Option<String> = redis::cmd("SET")
            .arg(blacklist_key(token_jti))
            .arg("revoked")
            .arg("NX")
            .arg("EX")
            .arg(expiry_seconds.max(1))
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to blacklist token: {}", e))?;

        Ok(reply.is_some())
    }

    async fn is_blacklisted(&self, token_jti: &str) -> Result<bool, anyhow::Error> {
        let mut conn = self.manager.clone();

        let exists: bool = redis::cmd("EXISTS")
            .arg(blacklist_key(token_jti))
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to check blacklist: {}", e))?;

        Ok(exists)
    }
}

#[derive(Default)]
pub struct MockBlacklist {
    pub blacklisted_tokens: Mutex<HashSet<String>>,
}

impl MockBlacklist {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenBlacklist for MockBlacklist {
    async fn health_check(&self) -> Result<(), anyhow::Error> {
        Ok(())
    }

    async fn blacklist_token(
        &self,
        token_jti: &str,
        _expiry_seconds: i64,
    ) -> Result<bool, anyhow::Error> {
        let inserted = self
            .blacklisted_tokens
            .lock()
            .map_err(|e| anyhow::anyhow!("Mock blacklist mutex poisoned: {}", e))?
            .insert(token_jti.to_string());
        Ok(inserted)
    }

    async fn is_blacklisted(&self, token_jti: &str) -> Result<bool, anyhow::Error> {
        let contains = self
            .blacklisted_tokens
            .lock()
            .map_err(|e| anyhow::anyhow!("Mock blacklist mutex poisoned: {}", e))?
            .contains(token_jti);
        Ok(contains)
    }
}
