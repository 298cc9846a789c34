use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::net::IpAddr;
use std::str::FromStr;

/// Upper bound for either token lifetime: one year.
pub const MAX_TOKEN_TTL_SECONDS: i64 = 365 * 24 * 60 * 60;

#[derive(Debug, Clone)]
pub struct IamConfig {
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub jwt: JwtConfig,
    pub password: PasswordConfig,
    pub security: SecurityConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub private_key_path: String,
    pub public_key_path: String,
    pub issuer: String,
    pub access_token_ttl_seconds: i64,
    pub refresh_token_ttl_seconds: i64,
}

/// Argon2id cost parameters for newly created hashes.
#[derive(Debug, Clone)]
pub struct PasswordConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
            parallelism: 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub token_attempts: u32,
    pub token_window_seconds: u64,
    pub global_ip_limit: u32,
    pub global_ip_window_seconds: u64,
    /// Peers whose `x-forwarded-for` hop is believed. Empty means the
    /// socket address is always the client.
    pub trusted_proxies: Vec<IpAddr>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            token_attempts: 10,
            token_window_seconds: 60,
            global_ip_limit: 100,
            global_ip_window_seconds: 60,
            trusted_proxies: Vec::new(),
        }
    }
}

impl IamConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let environment = Environment::current()?;
        let is_prod = environment.is_prod();

        let config = IamConfig {
            common: common_config,
            environment: environment.clone(),
            service_name: get_env("SERVICE_NAME", Some("iam-service"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|s| !s.is_empty()),
            database: DatabaseConfig::from_env(is_prod)?,
            redis: RedisConfig {
                url: get_env("REDIS_URL", None, is_prod)?,
            },
            jwt: JwtConfig {
                private_key_path: get_env("JWT_PRIVATE_KEY_PATH", None, is_prod)?,
                public_key_path: get_env("JWT_PUBLIC_KEY_PATH", None, is_prod)?,
                issuer: get_env("JWT_ISSUER", Some("iam-service"), is_prod)?,
                access_token_ttl_seconds: parse_env("ACCESS_TOKEN_TTL_SECONDS", "3600", is_prod)?,
                refresh_token_ttl_seconds: parse_env(
                    "REFRESH_TOKEN_TTL_SECONDS",
                    "2592000",
                    is_prod,
                )?,
            },
            password: PasswordConfig::from_env(is_prod)?,
            security: SecurityConfig {
                allowed_origins: get_env("ALLOWED_ORIGINS", Some("http://localhost:3000"), is_prod)?
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            },
            rate_limit: RateLimitConfig {
                token_attempts: parse_env("RATE_LIMIT_TOKEN_ATTEMPTS", "10", is_prod)?,
                token_window_seconds: parse_env("RATE_LIMIT_TOKEN_WINDOW_SECONDS", "60", is_prod)?,
                global_ip_limit: parse_env("RATE_LIMIT_GLOBAL_IP_LIMIT", "100", is_prod)?,
                global_ip_window_seconds: parse_env(
                    "RATE_LIMIT_GLOBAL_IP_WINDOW_SECONDS",
                    "60",
                    is_prod,
                )?,
                trusted_proxies: parse_ip_list(
                    "TRUSTED_PROXIES",
                    &env::var("TRUSTED_PROXIES").unwrap_or_default(),
                )?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if self.jwt.access_token_ttl_seconds <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "ACCESS_TOKEN_TTL_SECONDS must be positive"
            )));
        }

        if self.jwt.refresh_token_ttl_seconds <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "REFRESH_TOKEN_TTL_SECONDS must be positive"
            )));
        }

        if self.jwt.access_token_ttl_seconds > MAX_TOKEN_TTL_SECONDS
            || self.jwt.refresh_token_ttl_seconds > MAX_TOKEN_TTL_SECONDS
        {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "Token TTLs must not exceed {} seconds",
                MAX_TOKEN_TTL_SECONDS
            )));
        }

        if self.jwt.refresh_token_ttl_seconds < self.jwt.access_token_ttl_seconds {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "REFRESH_TOKEN_TTL_SECONDS must not be shorter than ACCESS_TOKEN_TTL_SECONDS"
            )));
        }

        if self.password.iterations == 0 || self.password.parallelism == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PASSWORD_HASH_ITERATIONS and PASSWORD_HASH_PARALLELISM must be positive"
            )));
        }

        if self.environment == Environment::Prod
            && self.security.allowed_origins.iter().any(|o| o == "*")
        {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "Wildcard CORS origin not allowed in production"
            )));
        }

        Ok(())
    }
}

impl DatabaseConfig {
    pub fn from_env(is_prod: bool) -> Result<Self, AppError> {
        Ok(DatabaseConfig {
            url: get_env("DATABASE_URL", None, is_prod)?,
            max_connections: parse_env("DATABASE_MAX_CONNECTIONS", "10", is_prod)?,
            min_connections: parse_env("DATABASE_MIN_CONNECTIONS", "1", is_prod)?,
        })
    }
}

impl PasswordConfig {
    pub fn from_env(is_prod: bool) -> Result<Self, AppError> {
        Ok(PasswordConfig {
            memory_kib: parse_env("PASSWORD_HASH_MEMORY_KIB", "19456", is_prod)?,
            iterations: parse_env("PASSWORD_HASH_ITERATIONS", "2", is_prod)?,
            parallelism: parse_env("PASSWORD_HASH_PARALLELISM", "1", is_prod)?,
        })
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

fn parse_env<T>(key: &str, default: &str, is_prod: bool) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env(key, Some(default), is_prod)?
        .parse()
        .map_err(|e: T::Err| AppError::ConfigError(anyhow::anyhow!("Invalid {}: {}", key, e)))
}

/// Comma-separated IP addresses; blanks are skipped.
fn parse_ip_list(key: &str, value: &str) -> Result<Vec<IpAddr>, AppError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<IpAddr>().map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!("Invalid {} entry '{}': {}", key, s, e))
            })
        })
        .collect()
}

impl Environment {
    /// Read from `ENVIRONMENT`, defaulting to `dev`.
    pub fn current() -> Result<Self, AppError> {
        env::var("ENVIRONMENT")
            .unwrap_or_else(|_| "dev".to_string())
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))
    }

    pub fn is_prod(&self) -> bool {
        *self == Environment::Prod
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}
