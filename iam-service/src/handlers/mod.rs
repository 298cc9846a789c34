pub mod metrics;
pub mod tokens;

pub use tokens::{create_token, refresh_token};
