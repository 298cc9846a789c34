pub mod password;
pub mod validation;

pub use password::{random_secret, PasswordHasher};
pub use validation::ValidatedJson;
