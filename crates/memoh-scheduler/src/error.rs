use thiserror::Error;

/// Errors raised by the scheduler subsystem.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("invalid cron pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("schedule not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Db(#[from] memoh_db::DbError),
}

impl From<SchedulerError> for memoh_core::MemohError {
    fn from(err: SchedulerError) -> Self {
        match err {
            SchedulerError::InvalidPattern { pattern, reason } => {
                memoh_core::MemohError::Validation(format!("bad cron pattern {pattern:?}: {reason}"))
            }
            SchedulerError::NotFound(msg) => memoh_core::MemohError::NotFound(msg),
            SchedulerError::Db(e) => e.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
