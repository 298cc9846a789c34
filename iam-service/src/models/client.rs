use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use super::Realm;

/// Machine credential holder authenticated with HTTP Basic.
///
/// `secret_key` is the public half; `secret_code` is the PHC hash of the
/// private half.
#[derive(Clone, FromRow)]
pub struct Client {
    pub id: Uuid,
    pub realm_id: Uuid,
    pub secret_key: String,
    pub secret_code: Option<String>,
    pub description: Option<String>,
    pub disabled: bool,
    pub immutable: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[sqlx(skip)]
    pub realm: Option<Realm>,
}

impl Client {
    pub fn new(realm: &Realm, secret_key: &str, secret_code: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            realm_id: realm.id,
            secret_key: secret_key.to_string(),
            secret_code,
            description: None,
            disabled: false,
            immutable: false,
            expires_at: None,
            created_at: Utc::now(),
            realm: None,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("id", &self.id)
            .field("realm_id", &self.realm_id)
            .field("secret_key", &self.secret_key)
            .field("disabled", &self.disabled)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}
