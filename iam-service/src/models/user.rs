use chrono::{DateTime, Utc};
use sqlx::{types::Json, FromRow};
use std::collections::HashMap;
use uuid::Uuid;

/// A principal within a realm.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub realm_id: Uuid,
    pub display_name: Option<String>,
    pub disabled: bool,
    pub approved: bool,
    pub verified: bool,
    pub immutable: bool,
    pub attributes: Json<HashMap<String, String>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub first_login_time: Option<DateTime<Utc>>,
    pub last_active_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl User {
    /// A fresh user that has not been approved or verified yet.
    pub fn new(realm_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            realm_id,
            display_name: None,
            disabled: false,
            approved: false,
            verified: false,
            immutable: false,
            attributes: Json(HashMap::new()),
            expires_at: None,
            first_login_time: None,
            last_active_time: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}
