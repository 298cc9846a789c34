use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Bearer,
    Refresh,
    Basic,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Bearer => "bearer",
            TokenType::Refresh => "refresh",
            TokenType::Basic => "basic",
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoded credential. Tokens are never mutated once built.
///
/// `client` is the machine client that requested the token, `subject` the
/// principal it speaks for. For Basic tokens both are the client id.
/// `id` and `expires_at` are set by the store that decoded the token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub token_type: TokenType,
    pub realm: String,
    pub client: String,
    pub subject: String,
    pub scope: Vec<String>,
    pub id: Option<Uuid>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Token {
    pub fn new(
        token_type: TokenType,
        realm: impl Into<String>,
        client: impl Into<String>,
        subject: impl Into<String>,
        scope: Vec<String>,
    ) -> Self {
        Self {
            token_type,
            realm: realm.into(),
            client: client.into(),
            subject: subject.into(),
            scope,
            id: None,
            expires_at: None,
        }
    }

    /// Same identity and scope under another type.
    pub fn with_type(&self, token_type: TokenType) -> Self {
        Self::new(
            token_type,
            self.realm.clone(),
            self.client.clone(),
            self.subject.clone(),
            self.scope.clone(),
        )
    }

    /// Whole seconds left before expiry, zero once expired or when unknown.
    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> i64 {
        self.expires_at
            .map(|at| (at - now).num_seconds().max(0))
            .unwrap_or(0)
    }
}
