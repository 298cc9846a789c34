use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

use crate::models::{Client, Login, Realm, Role, User};

/// Read access to the identity store plus the single post-login write.
///
/// `None` means "no such row"; `Err` is reserved for infrastructure failures.
#[async_trait]
pub trait AccountRepository: Send + Sync {
    async fn find_realm_by_name(&self, name: &str) -> Result<Option<Realm>, anyhow::Error>;

    /// Login for `(realm, provider, identifier)` with its owning user attached.
    async fn find_login(
        &self,
        realm_id: Uuid,
        provider: &str,
        identifier: &str,
    ) -> Result<Option<Login>, anyhow::Error>;

    /// Client for a public secret key with its owning realm attached.
    async fn find_client_by_secret_key(
        &self,
        secret_key: &str,
    ) -> Result<Option<Client>, anyhow::Error>;

    async fn list_role_names(
        &self,
        realm_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<String>, anyhow::Error>;

    /// Stamp a successful login in one transaction: `updated_at` and
    /// `last_active_time` become `now`, `first_login_time` is only set when
    /// still empty. Returns the number of rows changed; anything other than
    /// one is rolled back.
    async fn update_user_login_timestamps(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<u64, anyhow::Error>;

    async fn health_check(&self) -> Result<(), anyhow::Error>;
}

const REALM_COLUMNS: &str =
    "id, name, title, description, registration_enabled, disabled, immutable, created_at";

const USER_COLUMNS: &str = "id, realm_id, display_name, disabled, approved, verified, immutable, \
     attributes, expires_at, first_login_time, last_active_time, created_at, updated_at";

const LOGIN_COLUMNS: &str = "id, realm_id, user_id, provider, identifier, credential, metadata, \
     disabled, immutable, expires_at, created_at";

const CLIENT_COLUMNS: &str = "id, realm_id, secret_key, secret_code, description, disabled, \
     immutable, expires_at, created_at";

#[derive(Clone)]
pub struct PgAccountRepository {
    pool: PgPool,
}

impl PgAccountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>, anyhow::Error> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to load user: {}", e))?;

        Ok(user)
    }

    async fn find_realm(&self, realm_id: Uuid) -> Result<Option<Realm>, anyhow::Error> {
        let realm = sqlx::query_as::<_, Realm>(&format!(
            "SELECT {REALM_COLUMNS} FROM realms WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(realm_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to load realm: {}", e))?;

        Ok(realm)
    }
}

#[async_trait]
impl AccountRepository for PgAccountRepository {
    async fn find_realm_by_name(&self, name: &str) -> Result<Option<Realm>, anyhow::Error> {
        let realm = sqlx::query_as::<_, Realm>(&format!(
            "SELECT {REALM_COLUMNS} FROM realms WHERE name = $1 AND deleted_at IS NULL"
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to load realm by name: {}", e))?;

        Ok(realm)
    }

    async fn find_login(
        &self,
        realm_id: Uuid,
        provider: &str,
        identifier: &str,
    ) -> Result<Option<Login>, anyhow::Error> {
        let login = sqlx::query_as::<_, Login>(&format!(
            "SELECT {LOGIN_COLUMNS} FROM logins \
             WHERE realm_id = $1 AND provider = $2 AND identifier = $3 AND deleted_at IS NULL"
        ))
        .bind(realm_id)
        .bind(provider)
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to load login: {}", e))?;

        let Some(mut login) = login else {
            return Ok(None);
        };

        login.user = self
            .find_user(login.user_id)
            .await?
            .filter(|user| user.realm_id == realm_id);

        Ok(Some(login))
    }

    async fn find_client_by_secret_key(
        &self,
        secret_key: &str,
    ) -> Result<Option<Client>, anyhow::Error> {
        let client = sqlx::query_as::<_, Client>(&format!(
            "SELECT {CLIENT_COLUMNS} FROM clients WHERE secret_key = $1 AND deleted_at IS NULL"
        ))
        .bind(secret_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to load client: {}", e))?;

        let Some(mut client) = client else {
            return Ok(None);
        };

        client.realm = self.find_realm(client.realm_id).await?;

        Ok(Some(client))
    }

    async fn list_role_names(
        &self,
        realm_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<String>, anyhow::Error> {
        let names = sqlx::query_scalar::<_, String>(
            r#"
            SELECT r.name
            FROM roles r
            JOIN role_users ru ON ru.role_id = r.id
            WHERE ru.user_id = $1
              AND r.realm_id = $2
              AND r.disabled = FALSE
              AND r.deleted_at IS NULL
              AND ru.deleted_at IS NULL
            ORDER BY r.name
            "#,
        )
        .bind(user_id)
        .bind(realm_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to list role names: {}", e))?;

        Ok(names)
    }

    async fn update_user_login_timestamps(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<u64, anyhow::Error> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to begin transaction: {}", e))?;

        let rows = sqlx::query(
            r#"
            UPDATE users
            SET updated_at = $2,
                first_login_time = COALESCE(first_login_time, $2),
                last_active_time = $2
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(user_id)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to update login timestamps: {}", e))?
        .rows_affected();

        if rows != 1 {
            tx.rollback()
                .await
                .map_err(|e| anyhow::anyhow!("Failed to roll back transaction: {}", e))?;
            return Ok(rows);
        }

        tx.commit()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to commit transaction: {}", e))?;

        Ok(rows)
    }

    async fn health_check(&self) -> Result<(), anyhow::Error> {
        crate::db::health_check(&self.pool)
            .await
            .map_err(|e| anyhow::anyhow!("Database health check failed: {}", e))
    }
}

/// In-memory repository for tests and local experiments.
#[derive(Default)]
pub struct MockAccountRepository {
    realms: Mutex<Vec<Realm>>,
    users: Mutex<HashMap<Uuid, User>>,
    logins: Mutex<Vec<Login>>,
    clients: Mutex<Vec<Client>>,
    roles: Mutex<Vec<Role>>,
    role_users: Mutex<Vec<(Uuid, Uuid)>>,
    timestamp_updates: AtomicUsize,
    fail_updates: AtomicBool,
}

fn poisoned<T>(e: std::sync::PoisonError<T>) -> anyhow::Error {
    anyhow::anyhow!("Mock repository mutex poisoned: {}", e)
}

impl MockAccountRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_realm(&self, realm: Realm) {
        if let Ok(mut realms) = self.realms.lock() {
            realms.push(realm);
        }
    }

    pub fn add_user(&self, user: User) {
        if let Ok(mut users) = self.users.lock() {
            users.insert(user.id, user);
        }
    }

    pub fn add_login(&self, login: Login) {
        if let Ok(mut logins) = self.logins.lock() {
            logins.push(login);
        }
    }

    pub fn add_client(&self, client: Client) {
        if let Ok(mut clients) = self.clients.lock() {
            clients.push(client);
        }
    }

    pub fn add_role(&self, role: Role) {
        if let Ok(mut roles) = self.roles.lock() {
            roles.push(role);
        }
    }

    pub fn assign_role(&self, role_id: Uuid, user_id: Uuid) {
        if let Ok(mut role_users) = self.role_users.lock() {
            role_users.push((role_id, user_id));
        }
    }

    pub fn remove_user(&self, user_id: Uuid) {
        if let Ok(mut users) = self.users.lock() {
            users.remove(&user_id);
        }
    }

    pub fn user(&self, user_id: Uuid) -> Option<User> {
        self.users.lock().ok()?.get(&user_id).cloned()
    }

    /// Number of successful `update_user_login_timestamps` calls.
    pub fn timestamp_updates(&self) -> usize {
        self.timestamp_updates.load(Ordering::SeqCst)
    }

    /// Make every timestamp update report zero affected rows.
    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl AccountRepository for MockAccountRepository {
    async fn find_realm_by_name(&self, name: &str) -> Result<Option<Realm>, anyhow::Error> {
        let realms = self.realms.lock().map_err(poisoned)?;
        Ok(realms.iter().find(|r| r.name == name).cloned())
    }

    async fn find_login(
        &self,
        realm_id: Uuid,
        provider: &str,
        identifier: &str,
    ) -> Result<Option<Login>, anyhow::Error> {
        let login = {
            let logins = self.logins.lock().map_err(poisoned)?;
            logins
                .iter()
                .find(|l| l.realm_id == realm_id && l.provider == provider && l.identifier == identifier)
                .cloned()
        };

        let Some(mut login) = login else {
            return Ok(None);
        };

        let users = self.users.lock().map_err(poisoned)?;
        login.user = users
            .get(&login.user_id)
            .filter(|u| u.realm_id == realm_id)
            .cloned();

        Ok(Some(login))
    }

    async fn find_client_by_secret_key(
        &self,
        secret_key: &str,
    ) -> Result<Option<Client>, anyhow::Error> {
        let client = {
            let clients = self.clients.lock().map_err(poisoned)?;
            clients.iter().find(|c| c.secret_key == secret_key).cloned()
        };

        let Some(mut client) = client else {
            return Ok(None);
        };

        let realms = self.realms.lock().map_err(poisoned)?;
        client.realm = realms.iter().find(|r| r.id == client.realm_id).cloned();

        Ok(Some(client))
    }

    async fn list_role_names(
        &self,
        realm_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<String>, anyhow::Error> {
        let roles = self.roles.lock().map_err(poisoned)?;
        let role_users = self.role_users.lock().map_err(poisoned)?;

        let mut names: Vec<String> = role_users
            .iter()
            .filter(|(_, uid)| *uid == user_id)
            .filter_map(|(rid, _)| roles.iter().find(|r| r.id == *rid))
            .filter(|r| r.realm_id == realm_id && !r.disabled)
            .map(|r| r.name.clone())
            .collect();
        names.sort();

        Ok(names)
    }

    async fn update_user_login_timestamps(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<u64, anyhow::Error> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Ok(0);
        }

        let mut users = self.users.lock().map_err(poisoned)?;
        let Some(user) = users.get_mut(&user_id) else {
            return Ok(0);
        };

        user.updated_at = Some(now);
        user.first_login_time = user.first_login_time.or(Some(now));
        user.last_active_time = Some(now);
        self.timestamp_updates.fetch_add(1, Ordering::SeqCst);

        Ok(1)
    }

    async fn health_check(&self) -> Result<(), anyhow::Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FORM_PASSWORD;
    use chrono::Duration;

    fn seeded() -> (MockAccountRepository, Realm, User) {
        let repo = MockAccountRepository::new();
        let realm = Realm::new("users", "Users", true);
        let user = User::new(realm.id);
        repo.add_realm(realm.clone());
        repo.add_user(user.clone());
        repo.add_login(Login::new(&user, FORM_PASSWORD, "alice", None));
        (repo, realm, user)
    }

    #[tokio::test]
    async fn find_login_is_scoped_to_realm_and_provider() {
        let (repo, realm, user) = seeded();

        let login = repo
            .find_login(realm.id, FORM_PASSWORD, "alice")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(login.user.map(|u| u.id), Some(user.id));

        assert!(repo
            .find_login(Uuid::new_v4(), FORM_PASSWORD, "alice")
            .await
            .unwrap()
            .is_none());
        assert!(repo
            .find_login(realm.id, "SMS_OTP_CODE", "alice")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn first_login_time_is_set_once() {
        let (repo, _, user) = seeded();
        let first = Utc::now();
        let later = first + Duration::minutes(5);

        assert_eq!(repo.update_user_login_timestamps(user.id, first).await.unwrap(), 1);
        assert_eq!(repo.update_user_login_timestamps(user.id, later).await.unwrap(), 1);

        let stored = repo.user(user.id).unwrap();
        assert_eq!(stored.first_login_time, Some(first));
        assert_eq!(stored.last_active_time, Some(later));
        assert_eq!(stored.updated_at, Some(later));
        assert_eq!(repo.timestamp_updates(), 2);
    }

    #[tokio::test]
    async fn update_of_missing_user_reports_zero_rows() {
        let (repo, _, _) = seeded();
        let rows = repo
            .update_user_login_timestamps(Uuid::new_v4(), Utc::now())
            .await
            .unwrap();
        assert_eq!(rows, 0);
        assert_eq!(repo.timestamp_updates(), 0);
    }

    #[tokio::test]
    async fn role_names_skip_disabled_and_foreign_roles() {
        let (repo, realm, user) = seeded();
        let admin = Role::new(realm.id, "admin");
        let mut retired = Role::new(realm.id, "retired");
        retired.disabled = true;
        let foreign = Role::new(Uuid::new_v4(), "support");

        for role in [&admin, &retired, &foreign] {
            repo.add_role(role.clone());
            repo.assign_role(role.id, user.id);
        }

        let names = repo.list_role_names(realm.id, user.id).await.unwrap();
        assert_eq!(names, vec!["admin".to_string()]);
    }
}
