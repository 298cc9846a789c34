pub mod client;
pub mod login;
pub mod realm;
pub mod role;
pub mod token;
pub mod user;

pub use client::Client;
pub use login::{Login, FORM_PASSWORD, SMS_OTP_CODE};
pub use realm::Realm;
pub use role::{Role, ADMIN_ROLE};
pub use token::{Token, TokenType};
pub use user::User;
