pub mod config;
pub mod db;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use service_core::axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Json, Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    metrics::metrics_middleware,
    rate_limit::{ip_rate_limit_middleware, IpRateLimit},
    security_headers::security_headers_middleware,
    tracing::{request_id_middleware, REQUEST_ID_HEADER},
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::config::IamConfig;
use crate::services::{AccountRepository, TokenBlacklist, TokenService, TokenStore};

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        handlers::tokens::create_token,
        handlers::tokens::refresh_token,
    ),
    components(
        schemas(
            dtos::ErrorResponse,
            dtos::tokens::TokenRequest,
            dtos::tokens::RefreshTokenRequest,
            dtos::tokens::TokenResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Tokens", description = "Credential exchange and token refresh"),
        (name = "Observability", description = "Service health and monitoring"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "client_basic",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Basic).build()),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: IamConfig,
    pub repository: Arc<dyn AccountRepository>,
    pub blacklist: Arc<dyn TokenBlacklist>,
    /// Verifies `Authorization: Basic` client credentials.
    pub client_verifier: Arc<dyn TokenStore>,
    pub token_service: TokenService,
    pub token_rate_limiter: IpRateLimit,
    pub ip_rate_limiter: IpRateLimit,
}

pub fn build_router(state: AppState) -> Router {
    let token_routes = Router::new()
        .route("/iam/v1beta/tokens", post(handlers::create_token))
        .route("/iam/v1beta/tokens/refresh", post(handlers::refresh_token))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::client_auth_middleware,
        ))
        .layer(from_fn_with_state(
            state.token_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let cors = CorsLayer::new()
        .allow_origin(
            state
                .config
                .security
                .allowed_origins
                .iter()
                .filter_map(|o| match o.parse::<HeaderValue>() {
                    Ok(value) => Some(value),
                    Err(e) => {
                        tracing::error!("Invalid CORS origin '{}': {}. Skipping.", o, e);
                        None
                    }
                })
                .collect::<Vec<HeaderValue>>(),
        )
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(handlers::metrics::metrics))
        .route(
            "/.well-known/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        .merge(token_routes)
        .with_state(state.clone())
        // Global IP rate limiting
        .layer(from_fn_with_state(
            state.ip_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ))
        .layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &service_core::axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(cors)
}

/// Service health check
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
        (status = 500, description = "A dependency is unavailable")
    ),
    tag = "Observability"
)]
pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.repository.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Database health check failed");
        AppError::DatabaseError(e)
    })?;

    state.blacklist.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Redis health check failed");
        AppError::InternalError(e)
    })?;

    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
        "checks": {
            "database": "up",
            "redis": "up"
        }
    })))
}
