use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::services::{CreateTokenRequest, Credentials, IssuedTokens};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct TokenRequest {
    #[validate(length(min = 1, max = 64, message = "Realm is required"))]
    #[schema(example = "users")]
    pub realm: String,

    #[validate(length(min = 1, max = 32, message = "Provider is required"))]
    #[schema(example = "FORM_PASSWORD")]
    pub provider: String,

    #[validate(length(max = 255, message = "Username is too long"))]
    #[schema(example = "alice")]
    pub username: Option<String>,

    #[schema(value_type = Option<String>, format = Password, example = "password123")]
    pub password: Option<SecretString>,

    #[schema(example = "eyJhbGciOi...")]
    pub id_token: Option<String>,

    #[serde(default)]
    #[schema(example = json!(["profile"]))]
    pub scope: Vec<String>,
}

impl From<TokenRequest> for CreateTokenRequest {
    fn from(req: TokenRequest) -> Self {
        CreateTokenRequest {
            realm: req.realm,
            provider: req.provider,
            credentials: Credentials {
                username: req.username,
                password: req.password,
                id_token: req.id_token,
                scope: req.scope,
            },
        }
    }
}

#[derive(Deserialize, Validate, ToSchema)]
pub struct RefreshTokenRequest {
    #[validate(length(min = 1, message = "Refresh token is required"))]
    #[schema(example = "eyJhbGciOi...")]
    pub refresh_token: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    #[schema(example = "Bearer")]
    pub token_type: String,
    #[schema(example = 3600)]
    pub expires_in: i64,
    pub access_token: String,
    pub refresh_token: String,
}

impl From<IssuedTokens> for TokenResponse {
    fn from(tokens: IssuedTokens) -> Self {
        TokenResponse {
            token_type: tokens.token_type.to_string(),
            expires_in: tokens.expires_in,
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
        }
    }
}
