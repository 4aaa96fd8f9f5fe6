use thiserror::Error;

#[derive(Debug, Error)]
pub enum UserError {
    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("username already taken: {0}")]
    UsernameTaken(String),

    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error("token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error(transparent)]
    Db(#[from] memoh_db::DbError),
}

impl From<UserError> for memoh_core::MemohError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::InvalidCredentials => memoh_core::MemohError::AuthFailed(err.to_string()),
            UserError::UsernameTaken(_) => memoh_core::MemohError::Conflict(err.to_string()),
            UserError::Hash(_) | UserError::Token(_) => memoh_core::MemohError::Internal(err.to_string()),
            UserError::Db(e) => e.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, UserError>;
