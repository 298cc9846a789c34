use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Tenant boundary. Authentication never crosses realms.
#[derive(Debug, Clone, FromRow)]
pub struct Realm {
    pub id: Uuid,
    pub name: String,
    pub title: String,
    pub description: Option<String>,
    pub registration_enabled: bool,
    pub disabled: bool,
    pub immutable: bool,
    pub created_at: DateTime<Utc>,
}

impl Realm {
    pub fn new(name: &str, title: &str, registration_enabled: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            title: title.to_string(),
            description: None,
            registration_enabled,
            disabled: false,
            immutable: false,
            created_at: Utc::now(),
        }
    }
}
