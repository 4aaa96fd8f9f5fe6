use thiserror::Error;

/// Errors raised while routing one inbound message.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("identity resolution failed: {0}")]
    Identity(memoh_db::DbError),

    #[error("route resolution failed: {0}")]
    Route(memoh_db::DbError),

    #[error("message persistence failed after retries: {0}")]
    Persistence(memoh_db::DbError),

    #[error(transparent)]
    Db(#[from] memoh_db::DbError),
}

impl From<RouterError> for memoh_core::MemohError {
    fn from(err: RouterError) -> Self {
        match err {
            RouterError::Identity(e) | RouterError::Route(e) | RouterError::Persistence(e) | RouterError::Db(e) => e.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RouterError>;
