pub mod client_auth;

pub use client_auth::{client_auth_middleware, AuthenticatedClient};
