use thiserror::Error;

/// The eight error kinds of the platform-wide taxonomy.
///
/// Every crate's local error type maps into one of these via
/// [`MemohError::from`] / a `kind()` method, so the gateway's HTTP layer has
/// exactly one place that decides status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Auth,
    NotFound,
    Conflict,
    PermissionDenied,
    Upstream,
    Cancelled,
    Internal,
}

impl ErrorKind {
    /// HTTP status code this kind maps to on the request path.
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorKind::Validation => 400,
            ErrorKind::Auth => 401,
            ErrorKind::PermissionDenied => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::Cancelled => 499,
            ErrorKind::Upstream => 502,
            ErrorKind::Internal => 500,
        }
    }
}

#[derive(Debug, Error)]
pub enum MemohError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("upstream failure ({source}): {message}")]
    Upstream { source: String, message: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MemohError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MemohError::Validation(_) => ErrorKind::Validation,
            MemohError::AuthFailed(_) => ErrorKind::Auth,
            MemohError::NotFound(_) => ErrorKind::NotFound,
            MemohError::Conflict(_) => ErrorKind::Conflict,
            MemohError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            MemohError::Upstream { .. } => ErrorKind::Upstream,
            MemohError::Cancelled => ErrorKind::Cancelled,
            MemohError::Internal(_) | MemohError::Serialization(_) | MemohError::Io(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Short error code string, analogous to `SkynetError::code` — sent to
    /// clients inside `{ok:false, error}` tool results and HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            MemohError::Validation(_) => "VALIDATION_ERROR",
            MemohError::AuthFailed(_) => "AUTH_FAILED",
            MemohError::NotFound(_) => "NOT_FOUND",
            MemohError::Conflict(_) => "CONFLICT",
            MemohError::PermissionDenied(_) => "PERMISSION_DENIED",
            MemohError::Upstream { .. } => "UPSTREAM_ERROR",
            MemohError::Cancelled => "CANCELLED",
            MemohError::Internal(_) => "INTERNAL_ERROR",
            MemohError::Serialization(_) => "SERIALIZATION_ERROR",
            MemohError::Io(_) => "IO_ERROR",
        }
    }

    pub fn status_code(&self) -> u16 {
        self.kind().status_code()
    }

    pub fn upstream(source: impl Into<String>, message: impl Into<String>) -> Self {
        MemohError::Upstream {
            source: source.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MemohError>;
