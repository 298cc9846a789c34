use chrono::{DateTime, Utc};
use sqlx::{types::Json, FromRow};
use std::collections::HashMap;
use uuid::Uuid;

use super::User;

/// Provider name of the username/password login.
pub const FORM_PASSWORD: &str = "FORM_PASSWORD";

/// Provider name of the SMS one-time code login.
pub const SMS_OTP_CODE: &str = "SMS_OTP_CODE";

/// One credential binding of a user under one provider.
///
/// `(realm_id, provider, identifier)` is unique. `credential` holds a PHC
/// hash string and must never leave the service.
#[derive(Clone, FromRow)]
pub struct Login {
    pub id: Uuid,
    pub realm_id: Uuid,
    pub user_id: Uuid,
    pub provider: String,
    pub identifier: String,
    pub credential: Option<String>,
    pub metadata: Json<HashMap<String, String>>,
    pub disabled: bool,
    pub immutable: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[sqlx(skip)]
    pub user: Option<User>,
}

impl Login {
    pub fn new(user: &User, provider: &str, identifier: &str, credential: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            realm_id: user.realm_id,
            user_id: user.id,
            provider: provider.to_string(),
            identifier: identifier.to_string(),
            credential,
            metadata: Json(HashMap::new()),
            disabled: false,
            immutable: false,
            expires_at: None,
            created_at: Utc::now(),
            user: None,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

impl std::fmt::Debug for Login {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Login")
            .field("id", &self.id)
            .field("realm_id", &self.realm_id)
            .field("user_id", &self.user_id)
            .field("provider", &self.provider)
            .field("identifier", &self.identifier)
            .field("credential", &self.credential.as_ref().map(|_| "[REDACTED]"))
            .field("disabled", &self.disabled)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}
