use service_core::{
    axum::{
        async_trait,
        extract::{FromRequestParts, Request, State},
        http::{header, request::Parts, HeaderMap},
        middleware::Next,
        response::Response,
    },
    error::AppError,
};

use crate::{
    models::Token,
    services::{metrics::record_issuance, TokenStoreError},
    AppState,
};

/// Credential part of an `Authorization: Basic <credentials>` header.
fn basic_credentials(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, credentials) = value.split_once(' ')?;
    scheme
        .eq_ignore_ascii_case("basic")
        .then(|| credentials.trim())
}

/// Require a machine client authenticated with HTTP Basic.
///
/// On success the client's Basic token is stored in the request extensions
/// for [`AuthenticatedClient`].
pub async fn client_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(credentials) = basic_credentials(req.headers()) else {
        record_issuance("basic", false);
        return Err(AppError::AuthError(anyhow::anyhow!(
            "Invalid client credentials"
        )));
    };

    let token = match state.client_verifier.verify(credentials).await {
        Ok(token) => token,
        Err(TokenStoreError::Backend(e)) => {
            record_issuance("basic", false);
            tracing::error!(error = %e, "Failed to verify client credentials");
            return Err(AppError::DatabaseError(e));
        }
        Err(e) => {
            record_issuance("basic", false);
            tracing::warn!(error = %e, "Client authentication failed");
            return Err(AppError::AuthError(anyhow::anyhow!(
                "Invalid client credentials"
            )));
        }
    };

    record_issuance("basic", true);
    tracing::debug!(client_id = %token.subject, realm = %token.realm, "Client authenticated");

    req.extensions_mut().insert(token);

    Ok(next.run(req).await)
}

/// Extractor for the Basic token of the calling client.
pub struct AuthenticatedClient(pub Token);

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedClient
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = parts.extensions.get::<Token>().ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!(
                "Client token missing from request extensions"
            ))
        })?;

        Ok(AuthenticatedClient(token.clone()))
    }
}
