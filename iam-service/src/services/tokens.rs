use chrono::{Duration, Utc};
use std::fmt;
use std::sync::Arc;

use super::error::{AuthError, TokenStoreError};
use super::gate::check_account;
use super::metrics::record_issuance;
use super::providers::{Credentials, ProviderRegistry};
use super::repository::AccountRepository;
use super::scope::resolve_scope;
use super::token_store::TokenStore;
use crate::models::{Token, TokenType};

pub const BEARER: &str = "Bearer";

/// Progress of one issuance. Logged as `stage` when a request fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssuanceState {
    Received,
    ProviderResolved,
    CredentialVerified,
    GatePassed,
    Scoped,
    Issued,
}

impl IssuanceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssuanceState::Received => "received",
            IssuanceState::ProviderResolved => "provider_resolved",
            IssuanceState::CredentialVerified => "credential_verified",
            IssuanceState::GatePassed => "gate_passed",
            IssuanceState::Scoped => "scoped",
            IssuanceState::Issued => "issued",
        }
    }
}

impl fmt::Display for IssuanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct CreateTokenRequest {
    pub realm: String,
    pub provider: String,
    pub credentials: Credentials,
}

/// Encoded token pair handed back to the caller.
#[derive(Clone)]
pub struct IssuedTokens {
    pub token_type: &'static str,
    /// Remaining lifetime of `access_token` in seconds.
    pub expires_in: i64,
    pub access_token: String,
    pub refresh_token: String,
}

impl fmt::Debug for IssuedTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedTokens")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .finish_non_exhaustive()
    }
}

/// Exchanges user credentials for bearer and refresh tokens.
///
/// Every call is made on behalf of a machine client that already passed
/// Basic authentication; its token is passed in as `caller`.
#[derive(Clone)]
pub struct TokenService {
    repository: Arc<dyn AccountRepository>,
    providers: ProviderRegistry,
    token_store: Arc<dyn TokenStore>,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    pub fn new(
        repository: Arc<dyn AccountRepository>,
        providers: ProviderRegistry,
        token_store: Arc<dyn TokenStore>,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            repository,
            providers,
            token_store,
            access_ttl,
            refresh_ttl,
        }
    }

    pub async fn create_token(
        &self,
        caller: &Token,
        request: &CreateTokenRequest,
    ) -> Result<IssuedTokens, AuthError> {
        let mut stage = IssuanceState::Received;
        let result = self.issue_for_login(caller, request, &mut stage).await;

        match &result {
            Ok(_) => tracing::info!(
                realm = %request.realm,
                provider = %request.provider,
                client_id = %caller.subject,
                stage = %stage,
                "Token issued"
            ),
            Err(e) => log_failure(e, stage, &request.realm, &request.provider, &caller.subject),
        }
        record_issuance("create", result.is_ok());

        result
    }

    async fn issue_for_login(
        &self,
        caller: &Token,
        request: &CreateTokenRequest,
        stage: &mut IssuanceState,
    ) -> Result<IssuedTokens, AuthError> {
        require_basic(caller)?;

        let provider = self.providers.get(&request.provider)?;
        *stage = IssuanceState::ProviderResolved;

        if let Some(validate) = provider.validator() {
            validate(&request.credentials)?;
        }

        let realm = self
            .repository
            .find_realm_by_name(&request.realm)
            .await
            .map_err(AuthError::Repository)?
            .ok_or(AuthError::RealmNotFound)?;

        let login = provider.login(realm.id, &request.credentials).await?;
        *stage = IssuanceState::CredentialVerified;

        let now = Utc::now();
        let user = check_account(&login, now)?;
        *stage = IssuanceState::GatePassed;

        let scope = resolve_scope(self.repository.as_ref(), realm.id, user.id).await?;

        let rows = self
            .repository
            .update_user_login_timestamps(user.id, now)
            .await
            .map_err(AuthError::Repository)?;
        if rows != 1 {
            return Err(AuthError::UpdateFailed);
        }
        *stage = IssuanceState::Scoped;

        tracing::debug!(user_id = %user.id, scope = ?scope, "Account accepted");

        let bearer = Token::new(
            TokenType::Bearer,
            realm.name.clone(),
            caller.subject.clone(),
            user.id.to_string(),
            scope,
        );
        let access_token = self.token_store.issue(&bearer, self.access_ttl).await?;
        let refresh_token = self
            .token_store
            .issue(&bearer.with_type(TokenType::Refresh), self.refresh_ttl)
            .await?;
        *stage = IssuanceState::Issued;

        Ok(IssuedTokens {
            token_type: BEARER,
            expires_in: self.access_ttl.num_seconds(),
            access_token,
            refresh_token,
        })
    }

    /// Rotate a refresh token. Account state is not re-checked.
    pub async fn refresh_token(
        &self,
        caller: &Token,
        refresh_token: &str,
    ) -> Result<IssuedTokens, AuthError> {
        let result = self.renew(caller, refresh_token).await;

        match &result {
            Ok(_) => tracing::info!(client_id = %caller.subject, "Token refreshed"),
            Err(AuthError::TokenStore(e)) => {
                tracing::error!(client_id = %caller.subject, error = %e, "Token refresh failed")
            }
            Err(e) => tracing::warn!(
                client_id = %caller.subject,
                error_kind = e.kind(),
                "Token refresh rejected"
            ),
        }
        record_issuance("refresh", result.is_ok());

        result
    }

    async fn renew(&self, caller: &Token, refresh_token: &str) -> Result<IssuedTokens, AuthError> {
        require_basic(caller)?;

        let access_token = self
            .token_store
            .renew(refresh_token, self.access_ttl)
            .await
            .map_err(|e| match e {
                TokenStoreError::Backend(_) => AuthError::TokenStore(e),
                _ => AuthError::InvalidRefreshToken,
            })?;

        let bearer = self.token_store.verify(&access_token).await?;
        let refresh_token = self
            .token_store
            .issue(&bearer.with_type(TokenType::Refresh), self.refresh_ttl)
            .await?;

        Ok(IssuedTokens {
            token_type: BEARER,
            expires_in: bearer.remaining_seconds(Utc::now()),
            access_token,
            refresh_token,
        })
    }
}

fn require_basic(caller: &Token) -> Result<(), AuthError> {
    if caller.token_type != TokenType::Basic {
        return Err(AuthError::InvalidToken);
    }
    Ok(())
}

fn log_failure(err: &AuthError, stage: IssuanceState, realm: &str, provider: &str, client_id: &str) {
    match err {
        AuthError::Repository(e) => tracing::error!(
            realm = %realm,
            provider = %provider,
            client_id = %client_id,
            stage = %stage,
            error = %e,
            "Token issuance failed"
        ),
        AuthError::TokenStore(e) => tracing::error!(
            realm = %realm,
            provider = %provider,
            client_id = %client_id,
            stage = %stage,
            error = %e,
            "Token issuance failed"
        ),
        _ => tracing::warn!(
            realm = %realm,
            provider = %provider,
            client_id = %client_id,
            stage = %stage,
            error_kind = err.kind(),
            "Token issuance rejected"
        ),
    }
}
