//! HS256 JWT issuance/verification for `/auth/login` bearer tokens.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use memoh_core::types::UserId;
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub username: String,
    pub exp: i64,
}

pub struct TokenIssuer {
    secret: String,
    ttl_secs: i64,
}

impl TokenIssuer {
    pub fn new(secret: impl Into<String>, ttl_secs: i64) -> Self {
        Self { secret: secret.into(), ttl_secs }
    }

    /// Returns the signed token and its expiry, ready for the
    /// `{access_token, expires_at}` fields of the login response.
    pub fn issue(&self, user_id: UserId, username: &str) -> Result<(String, DateTime<Utc>)> {
        let expires_at = Utc::now() + Duration::seconds(self.ttl_secs);
        let claims = Claims {
            sub: user_id.to_string(),
            username: username.to_string(),
            exp: expires_at.timestamp(),
        };
        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )?;
        Ok((token, expires_at))
    }

    pub fn verify(&self, token: &str) -> Result<Claims> {
        let data = jsonwebtoken::decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(data.claims)
    }
}
