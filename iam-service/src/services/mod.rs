pub mod basic;
pub mod error;
pub mod gate;
pub mod metrics;
pub mod providers;
pub mod redis;
pub mod repository;
pub mod scope;
pub mod token_store;
pub mod tokens;

pub use basic::BasicTokenStore;
pub use error::{AuthError, TokenStoreError};
pub use gate::check_account;
pub use providers::{
    Credentials, FormPasswordProvider, LoginProvider, OneTimeCodeProvider, ProviderRegistry,
    ValidateFn,
};
pub use redis::{MockBlacklist, RedisService, TokenBlacklist};
pub use repository::{AccountRepository, MockAccountRepository, PgAccountRepository};
pub use scope::{resolve_scope, role_scope};
pub use token_store::{JwtTokenStore, TokenStore};
pub use tokens::{CreateTokenRequest, IssuanceState, IssuedTokens, TokenService};
