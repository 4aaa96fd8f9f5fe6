use memoh_core::types::UserId;

use crate::model::{User, UserRow};
use crate::{DbError, PgPool, Result};

/// Creates a new platform account. `password_hash` is whatever the caller's
/// hashing scheme produced (`memoh-users` uses argon2); this layer never
/// sees a plaintext password.
pub async fn create(pool: &PgPool, username: &str, password_hash: &str, display_name: &str) -> Result<User> {
    let id = UserId::new();
    let row = sqlx::query_as::<_, UserRow>(
        "INSERT INTO users (id, username, password_hash, display_name)
         VALUES ($1, $2, $3, $4)
         RETURNING id, username, password_hash, display_name, created_at, updated_at",
    )
    .bind(id.as_uuid())
    .bind(username)
    .bind(password_hash)
    .bind(display_name)
    .fetch_one(pool)
    .await
    .map_err(DbError::from_write)?;
    Ok(row.into())
}

pub async fn get(pool: &PgPool, id: UserId) -> Result<User> {
    let row = sqlx::query_as::<_, UserRow>(
        "SELECT id, username, password_hash, display_name, created_at, updated_at
         FROM users WHERE id = $1",
    )
    .bind(id.as_uuid())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DbError::NotFound(format!("user {id}")))?;
    Ok(row.into())
}

pub async fn find_by_username(pool: &PgPool, username: &str) -> Result<Option<User>> {
    let row = sqlx::query_as::<_, UserRow>(
        "SELECT id, username, password_hash, display_name, created_at, updated_at
         FROM users WHERE username = $1",
    )
    .bind(username)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(Into::into))
}
