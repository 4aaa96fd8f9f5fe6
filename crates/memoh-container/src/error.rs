use thiserror::Error;

/// Errors raised by the container service and its `bollard` runtime.
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid spec: {0}")]
    InvalidSpec(String),

    #[error("runtime error: {0}")]
    Runtime(String),

    #[error("exec failed: {0}")]
    ExecFailed(String),

    #[error("operation timed out after {ms}ms")]
    Timeout { ms: u64 },

    #[error(transparent)]
    Db(#[from] memoh_db::DbError),
}

impl From<bollard::errors::Error> for ContainerError {
    fn from(err: bollard::errors::Error) -> Self {
        ContainerError::Runtime(err.to_string())
    }
}

impl From<ContainerError> for memoh_core::MemohError {
    fn from(err: ContainerError) -> Self {
        match err {
            ContainerError::NotFound(msg) => memoh_core::MemohError::NotFound(msg),
            ContainerError::Conflict(msg) => memoh_core::MemohError::Conflict(msg),
            ContainerError::InvalidSpec(msg) => memoh_core::MemohError::Validation(msg),
            ContainerError::Runtime(msg) => {
                memoh_core::MemohError::upstream("container-runtime", msg)
            }
            ContainerError::ExecFailed(msg) => {
                memoh_core::MemohError::upstream("container-runtime", msg)
            }
            ContainerError::Timeout { ms } => {
                memoh_core::MemohError::upstream("container-runtime", format!("timed out after {ms}ms"))
            }
            ContainerError::Db(e) => e.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ContainerError>;
