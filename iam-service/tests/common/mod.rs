//! Shared fixtures for iam-service integration tests.
//!
//! Everything runs in memory: `MockAccountRepository`, an HS256
//! `JwtTokenStore` over `MockBlacklist`, and a cheap Argon2 cost.

#![allow(dead_code)]

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Duration;
use iam_service::{
    build_router,
    config::{
        DatabaseConfig, Environment, IamConfig, JwtConfig, PasswordConfig, RateLimitConfig,
        RedisConfig, SecurityConfig,
    },
    models::{Client, Login, Realm, Role, Token, User, FORM_PASSWORD},
    services::{
        BasicTokenStore, CreateTokenRequest, Credentials, JwtTokenStore, MockAccountRepository,
        MockBlacklist, ProviderRegistry, TokenService, TokenStore,
    },
    utils::PasswordHasher,
    AppState,
};
use secrecy::SecretString;
use service_core::axum::Router;
use service_core::middleware::rate_limit::IpRateLimit;
use std::sync::Arc;

pub const USERS_REALM: &str = "users";
pub const ADMIN_REALM: &str = "admin";
pub const CLIENT_KEY: &str = "console-key";
pub const CLIENT_CODE: &str = "console-code-0123456789";
pub const PASSWORD: &str = "correct horse battery staple";
pub const ACCESS_TTL_SECONDS: i64 = 300;
pub const REFRESH_TTL_SECONDS: i64 = 3600;

pub fn test_config() -> IamConfig {
    IamConfig {
        common: service_core::config::Config::default(),
        environment: Environment::Dev,
        service_name: "iam-service".to_string(),
        service_version: "test".to_string(),
        log_level: "debug".to_string(),
        otlp_endpoint: None,
        database: DatabaseConfig {
            url: "postgres://localhost/iam_test".to_string(),
            max_connections: 1,
            min_connections: 1,
        },
        redis: RedisConfig {
            url: "redis://localhost".to_string(),
        },
        jwt: JwtConfig {
            private_key_path: String::new(),
            public_key_path: String::new(),
            issuer: "iam-test".to_string(),
            access_token_ttl_seconds: ACCESS_TTL_SECONDS,
            refresh_token_ttl_seconds: REFRESH_TTL_SECONDS,
        },
        password: PasswordConfig {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        },
        security: SecurityConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
        },
        rate_limit: RateLimitConfig {
            token_attempts: 1000,
            token_window_seconds: 60,
            global_ip_limit: 1000,
            global_ip_window_seconds: 60,
            trusted_proxies: Vec::new(),
        },
    }
}

pub struct TestApp {
    pub config: IamConfig,
    pub repo: Arc<MockAccountRepository>,
    pub hasher: PasswordHasher,
    pub token_store: Arc<JwtTokenStore>,
    pub client_verifier: Arc<BasicTokenStore>,
    pub service: TokenService,
    pub users_realm: Realm,
    pub admin_realm: Realm,
    pub client: Client,
}

impl TestApp {
    /// Two realms and one enabled `console` client in the admin realm.
    pub fn new() -> Self {
        let config = test_config();
        let repo = Arc::new(MockAccountRepository::new());
        let hasher = PasswordHasher::new(&config.password).expect("Failed to build hasher");

        let admin_realm = Realm::new(ADMIN_REALM, "Admin", false);
        let users_realm = Realm::new(USERS_REALM, "Users", true);
        repo.add_realm(admin_realm.clone());
        repo.add_realm(users_realm.clone());

        let client = Client::new(&admin_realm, CLIENT_KEY, Some(hash(&hasher, CLIENT_CODE)));
        repo.add_client(client.clone());

        let token_store = Arc::new(JwtTokenStore::from_secret(
            b"integration-test-secret",
            &config.jwt.issuer,
            Arc::new(MockBlacklist::new()),
        ));
        let client_verifier = Arc::new(BasicTokenStore::new(repo.clone(), hasher.clone()));

        let service = TokenService::new(
            repo.clone(),
            ProviderRegistry::with_defaults(repo.clone(), hasher.clone()),
            token_store.clone(),
            Duration::seconds(config.jwt.access_token_ttl_seconds),
            Duration::seconds(config.jwt.refresh_token_ttl_seconds),
        );

        Self {
            config,
            repo,
            hasher,
            token_store,
            client_verifier,
            service,
            users_realm,
            admin_realm,
            client,
        }
    }

    /// Approved, verified user in the users realm with a form-password login.
    pub fn add_user(&self, username: &str, roles: &[&str]) -> User {
        self.add_user_with(username, roles, |_, _| {})
    }

    /// Like [`add_user`](Self::add_user), letting the caller adjust the
    /// rows before they are stored.
    pub fn add_user_with(
        &self,
        username: &str,
        roles: &[&str],
        adjust: impl FnOnce(&mut User, &mut Login),
    ) -> User {
        let mut user = User::new(self.users_realm.id);
        user.approved = true;
        user.verified = true;

        let mut login = Login::new(
            &user,
            FORM_PASSWORD,
            username,
            Some(hash(&self.hasher, PASSWORD)),
        );
        adjust(&mut user, &mut login);

        for name in roles {
            let role = Role::new(self.users_realm.id, name);
            self.repo.add_role(role.clone());
            self.repo.assign_role(role.id, user.id);
        }

        self.repo.add_user(user.clone());
        self.repo.add_login(login);
        user
    }

    pub fn add_client(&self, key: &str, code: &str, adjust: impl FnOnce(&mut Client)) -> Client {
        let mut client = Client::new(&self.admin_realm, key, Some(hash(&self.hasher, code)));
        adjust(&mut client);
        self.repo.add_client(client.clone());
        client
    }

    /// Basic token of the default `console` client.
    pub async fn caller(&self) -> Token {
        self.client_verifier
            .verify(&encode_basic(CLIENT_KEY, CLIENT_CODE))
            .await
            .expect("console client must verify")
    }

    pub fn state(&self) -> AppState {
        AppState {
            config: self.config.clone(),
            repository: self.repo.clone(),
            blacklist: Arc::new(MockBlacklist::new()),
            client_verifier: self.client_verifier.clone(),
            token_service: self.service.clone(),
            token_rate_limiter: IpRateLimit::new(
                self.config.rate_limit.token_attempts,
                self.config.rate_limit.token_window_seconds,
            ),
            ip_rate_limiter: IpRateLimit::new(
                self.config.rate_limit.global_ip_limit,
                self.config.rate_limit.global_ip_window_seconds,
            ),
        }
    }

    pub fn router(&self) -> Router {
        build_router(self.state())
    }
}

pub fn hash(hasher: &PasswordHasher, secret: &str) -> String {
    hasher
        .hash(&SecretString::new(secret.to_string()))
        .expect("Failed to hash secret")
}

pub fn encode_basic(key: &str, code: &str) -> String {
    STANDARD.encode(format!("{}:{}", key, code))
}

pub fn basic_header(key: &str, code: &str) -> String {
    format!("Basic {}", encode_basic(key, code))
}

pub fn password_request(realm: &str, username: &str, password: &str) -> CreateTokenRequest {
    CreateTokenRequest {
        realm: realm.to_string(),
        provider: FORM_PASSWORD.to_string(),
        credentials: Credentials {
            username: Some(username.to_string()),
            password: Some(SecretString::new(password.to_string())),
            ..Default::default()
        },
    }
}
