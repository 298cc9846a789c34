use chrono::Duration;
use iam_service::{
    build_router,
    config::IamConfig,
    db,
    services::{
        metrics::init_metrics, AccountRepository, BasicTokenStore, JwtTokenStore,
        PgAccountRepository, ProviderRegistry, RedisService, TokenBlacklist, TokenService,
    },
    utils::PasswordHasher,
    AppState,
};
use service_core::error::AppError;
use service_core::middleware::rate_limit::IpRateLimit;
use service_core::observability::init_tracing;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Load configuration - fail fast if invalid
    let config = IamConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    )?;

    init_metrics()?;

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting IAM service"
    );

    let pool = db::create_pool(&config.database)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;
    db::run_migrations(&pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;
    let repository: Arc<dyn AccountRepository> = Arc::new(PgAccountRepository::new(pool));

    let blacklist: Arc<dyn TokenBlacklist> = Arc::new(RedisService::new(&config.redis).await?);

    let hasher = PasswordHasher::new(&config.password).map_err(AppError::ConfigError)?;
    let token_store = Arc::new(
        JwtTokenStore::from_rsa_pem_files(&config.jwt, blacklist.clone())
            .map_err(AppError::ConfigError)?,
    );
    let client_verifier = Arc::new(BasicTokenStore::new(repository.clone(), hasher.clone()));

    let token_service = TokenService::new(
        repository.clone(),
        ProviderRegistry::with_defaults(repository.clone(), hasher),
        token_store,
        Duration::seconds(config.jwt.access_token_ttl_seconds),
        Duration::seconds(config.jwt.refresh_token_ttl_seconds),
    );

    let trusted_proxies = config.rate_limit.trusted_proxies.clone();
    let token_rate_limiter = IpRateLimit::new(
        config.rate_limit.token_attempts,
        config.rate_limit.token_window_seconds,
    )
    .trust_proxies(trusted_proxies.clone());
    let ip_rate_limiter = IpRateLimit::new(
        config.rate_limit.global_ip_limit,
        config.rate_limit.global_ip_window_seconds,
    )
    .trust_proxies(trusted_proxies);

    let state = AppState {
        config: config.clone(),
        repository,
        blacklist,
        client_verifier,
        token_service,
        token_rate_limiter,
        ip_rate_limiter,
    };
    let app = build_router(state);

    let addr = config.common.socket_addr();
    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    service_core::axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
