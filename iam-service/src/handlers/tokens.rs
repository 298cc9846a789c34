use service_core::{
    axum::{extract::State, http::StatusCode, response::IntoResponse, Json},
    error::AppError,
};

use crate::{
    dtos::tokens::{RefreshTokenRequest, TokenRequest, TokenResponse},
    middleware::AuthenticatedClient,
    services::CreateTokenRequest,
    utils::ValidatedJson,
    AppState,
};

// Referenced only by the `utoipa::path` attributes, which name schemas after the path as written.
#[allow(unused_imports)]
use crate::dtos::ErrorResponse;

/// Exchange user credentials for a bearer and refresh token
#[utoipa::path(
    post,
    path = "/iam/v1beta/tokens",
    request_body = TokenRequest,
    responses(
        (status = 200, description = "Tokens issued", body = TokenResponse),
        (status = 400, description = "Unknown or unsupported login provider", body = ErrorResponse),
        (status = 401, description = "Invalid client or user credentials", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse),
        (status = 429, description = "Too many requests", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Tokens",
    security(
        ("client_basic" = [])
    )
)]
pub async fn create_token(
    State(state): State<AppState>,
    AuthenticatedClient(client): AuthenticatedClient,
    ValidatedJson(req): ValidatedJson<TokenRequest>,
) -> Result<impl IntoResponse, AppError> {
    let request = CreateTokenRequest::from(req);
    let issued = state.token_service.create_token(&client, &request).await?;
    Ok((StatusCode::OK, Json(TokenResponse::from(issued))))
}

/// Rotate a refresh token and issue a new bearer token
#[utoipa::path(
    post,
    path = "/iam/v1beta/tokens/refresh",
    request_body = RefreshTokenRequest,
    responses(
        (status = 200, description = "Tokens refreshed", body = TokenResponse),
        (status = 401, description = "Invalid client credentials or refresh token", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Tokens",
    security(
        ("client_basic" = [])
    )
)]
pub async fn refresh_token(
    State(state): State<AppState>,
    AuthenticatedClient(client): AuthenticatedClient,
    ValidatedJson(req): ValidatedJson<RefreshTokenRequest>,
) -> Result<impl IntoResponse, AppError> {
    let issued = state
        .token_service
        .refresh_token(&client, &req.refresh_token)
        .await?;
    Ok((StatusCode::OK, Json(TokenResponse::from(issued))))
}
