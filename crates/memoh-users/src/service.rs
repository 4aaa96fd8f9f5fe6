//! `AuthService` — backs the gateway's `POST /auth/login`. The
//! HTTP surface itself is "a thin wrapper ... not re-specified"; this is
//! the one piece of logic behind it worth factoring out of the gateway.

use chrono::{DateTime, Utc};
use memoh_db::PgPool;
use serde::{Deserialize, Serialize};

use crate::error::{Result, UserError};
use crate::token::TokenIssuer;
use crate::{password, UserId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub user_id: String,
    pub username: String,
    pub expires_at: DateTime<Utc>,
}

pub struct AuthService {
    tokens: TokenIssuer,
}

impl AuthService {
    pub fn new(jwt_secret: impl Into<String>, token_ttl_secs: i64) -> Self {
        Self { tokens: TokenIssuer::new(jwt_secret, token_ttl_secs) }
    }

    /// Verifies `username`/`password` against the stored hash and issues a
    /// bearer token. `UserError::InvalidCredentials` covers both "no such
    /// user" and "wrong password" so a caller can't distinguish the two by
    /// timing or error text.
    pub async fn login(&self, pool: &PgPool, username: &str, password: &str) -> Result<LoginResponse> {
        let user = memoh_db::users::find_by_username(pool, username)
        .await?
        .ok_or(UserError::InvalidCredentials)?;
        if !crate::password::verify(password, &user.password_hash) {
            return Err(UserError::InvalidCredentials);
        }
        let (access_token, expires_at) = self.tokens.issue(user.id, &user.username)?;
        Ok(LoginResponse {
                access_token,
                user_id: user.id.to_string(),
                username: user.username,
                expires_at,
        })
    }

    pub fn verify_token(&self, token: &str) -> Result<UserId> {
        let claims = self.tokens.verify(token)?;
        claims
        .sub
        .parse::<uuid::Uuid>()
        .map(UserId::from)
        .map_err(|e| UserError::Hash(format!("malformed subject claim: {e}")))
    }

    /// Creates the bootstrap admin account if `username` doesn't exist yet
    /// (`AuthConfig::admin_username`/`admin_password_hash`
    /// give the gateway a first-run account with no separate signup flow).
    pub async fn ensure_admin(&self, pool: &PgPool, username: &str, password_hash: &str) -> Result<()> {
        if memoh_db::users::find_by_username(pool, username).await?.is_some() {
            return Ok(());
        }
        if password_hash.is_empty() {
            tracing::warn!(username, "no admin_password_hash configured, skipping bootstrap admin creation");
            return Ok(());
        }
        memoh_db::users::create(pool, username, password_hash, username).await?;
        tracing::info!(username, "bootstrap admin account created");
        Ok(())
    }

    pub async fn register(&self, pool: &PgPool, username: &str, password: &str, display_name: &str) -> Result<UserId> {
        if memoh_db::users::find_by_username(pool, username).await?.is_some() {
            return Err(UserError::UsernameTaken(username.to_string()));
        }
        let hash = password::hash(password)?;
        let user = memoh_db::users::create(pool, username, &hash, display_name).await?;
        Ok(user.id)
    }
}
