use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Built-in role granted to the bootstrap administrator.
pub const ADMIN_ROLE: &str = "Admin";

#[derive(Debug, Clone, FromRow)]
pub struct Role {
    pub id: Uuid,
    pub realm_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub disabled: bool,
    pub immutable: bool,
    pub created_at: DateTime<Utc>,
}

impl Role {
    pub fn new(realm_id: Uuid, name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            realm_id,
            name: name.to_string(),
            description: None,
            disabled: false,
            immutable: false,
            created_at: Utc::now(),
        }
    }
}
