//! Bootstraps an empty identity store.
//!
//! Creates the `admin` and `users` realms, the built-in admin user with a
//! form-password login and the `console` client. Generated secrets are
//! printed once; only their hashes are stored.

use chrono::Utc;
use iam_service::{
    config::{DatabaseConfig, Environment, PasswordConfig},
    db,
    models::{Client, Login, Realm, Role, User, ADMIN_ROLE, FORM_PASSWORD},
    utils::{random_secret, PasswordHasher},
};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use sqlx::{types::Json, Postgres, Transaction};
use std::collections::HashMap;

const ADMIN_PASSWORD_LEN: usize = 16;
const CLIENT_KEY_LEN: usize = 16;
const CLIENT_CODE_LEN: usize = 32;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    service_core::observability::init_tracing("iam-seed", "info", None)?;

    let environment = Environment::current()?;
    let database = DatabaseConfig::from_env(environment.is_prod())?;
    let hasher = PasswordHasher::new(&PasswordConfig::from_env(environment.is_prod())?)
        .map_err(AppError::ConfigError)?;

    let pool = db::create_pool(&database)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;
    db::run_migrations(&pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;

    let mut tx = pool
        .begin()
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;

    let secrets = seed(&mut tx, &hasher).await.map_err(AppError::DatabaseError)?;

    tx.commit()
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;

    tracing::info!("Database seeded");
    println!("admin password:      {}", secrets.admin_password);
    println!("console secret key:  {}", secrets.client_key);
    println!("console secret code: {}", secrets.client_code);

    Ok(())
}

struct GeneratedSecrets {
    admin_password: String,
    client_key: String,
    client_code: String,
}

async fn seed(
    tx: &mut Transaction<'_, Postgres>,
    hasher: &PasswordHasher,
) -> Result<GeneratedSecrets, anyhow::Error> {
    let mut admin_realm = Realm::new("admin", "Admin", false);
    admin_realm.immutable = true;
    insert_realm(tx, &admin_realm).await?;

    let mut users_realm = Realm::new("users", "Users", true);
    users_realm.immutable = true;
    insert_realm(tx, &users_realm).await?;

    let mut admin_role = Role::new(admin_realm.id, ADMIN_ROLE);
    admin_role.immutable = true;
    admin_role.description = Some("Built-in admin role.".to_string());
    sqlx::query(
        "INSERT INTO roles (id, realm_id, name, description, immutable, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(admin_role.id)
    .bind(admin_role.realm_id)
    .bind(&admin_role.name)
    .bind(&admin_role.description)
    .bind(admin_role.immutable)
    .bind(admin_role.created_at)
    .execute(&mut **tx)
    .await?;

    let mut admin_user = User::new(admin_realm.id);
    admin_user.approved = true;
    admin_user.verified = true;
    admin_user.immutable = true;
    admin_user.display_name = Some("Admin".to_string());
    admin_user.attributes = Json(HashMap::from([(
        "profile.display_name".to_string(),
        "Admin".to_string(),
    )]));
    sqlx::query(
        "INSERT INTO users (id, realm_id, display_name, approved, verified, immutable, attributes, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(admin_user.id)
    .bind(admin_user.realm_id)
    .bind(&admin_user.display_name)
    .bind(admin_user.approved)
    .bind(admin_user.verified)
    .bind(admin_user.immutable)
    .bind(&admin_user.attributes)
    .bind(admin_user.created_at)
    .execute(&mut **tx)
    .await?;

    let admin_password = random_secret(ADMIN_PASSWORD_LEN);
    let mut admin_login = Login::new(
        &admin_user,
        FORM_PASSWORD,
        "admin",
        Some(hasher.hash(&admin_password)?),
    );
    admin_login.immutable = true;
    sqlx::query(
        "INSERT INTO logins (id, realm_id, user_id, provider, identifier, credential, metadata, immutable, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(admin_login.id)
    .bind(admin_login.realm_id)
    .bind(admin_login.user_id)
    .bind(&admin_login.provider)
    .bind(&admin_login.identifier)
    .bind(&admin_login.credential)
    .bind(&admin_login.metadata)
    .bind(admin_login.immutable)
    .bind(admin_login.created_at)
    .execute(&mut **tx)
    .await?;

    sqlx::query(
        "INSERT INTO role_users (role_id, user_id, immutable, created_at) VALUES ($1, $2, TRUE, $3)",
    )
    .bind(admin_role.id)
    .bind(admin_user.id)
    .bind(Utc::now())
    .execute(&mut **tx)
    .await?;

    let client_key = random_secret(CLIENT_KEY_LEN);
    let client_code = random_secret(CLIENT_CODE_LEN);
    let mut console = Client::new(
        &admin_realm,
        client_key.expose_secret(),
        Some(hasher.hash(&client_code)?),
    );
    console.immutable = true;
    console.description = Some("Web-based console client.".to_string());
    sqlx::query(
        "INSERT INTO clients (id, realm_id, secret_key, secret_code, description, immutable, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(console.id)
    .bind(console.realm_id)
    .bind(&console.secret_key)
    .bind(&console.secret_code)
    .bind(&console.description)
    .bind(console.immutable)
    .bind(console.created_at)
    .execute(&mut **tx)
    .await?;

    Ok(GeneratedSecrets {
        admin_password: admin_password.expose_secret().clone(),
        client_key: client_key.expose_secret().clone(),
        client_code: client_code.expose_secret().clone(),
    })
}

async fn insert_realm(
    tx: &mut Transaction<'_, Postgres>,
    realm: &Realm,
) -> Result<(), anyhow::Error> {
    sqlx::query(
        "INSERT INTO realms (id, name, title, registration_enabled, immutable, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(realm.id)
    .bind(&realm.name)
    .bind(&realm.title)
    .bind(realm.registration_enabled)
    .bind(realm.immutable)
    .bind(realm.created_at)
    .execute(&mut **tx)
    .await?;

    tracing::info!(realm = %realm.name, "Created realm");
    Ok(())
}
