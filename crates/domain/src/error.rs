/// Shared error taxonomy used across all ContextCache crates.
///
/// Business services return these typed variants; the gateway maps them to
/// HTTP status codes and sanitized bodies. No variant carries data that
/// should not leave the process (no stack traces, no digests).
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("validation: {0}")]
    Validation(String),

    #[error("authentication required")]
    AuthMissing,

    #[error("invalid credentials: {0}")]
    AuthInvalid(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("quota exceeded for {resource}")]
    QuotaExceeded { resource: String },

    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("job dispatcher unavailable: {0}")]
    DispatcherUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    /// Stable machine-readable tag used in error response bodies and CLI exit-code mapping.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation_error",
            Error::AuthMissing => "auth_missing",
            Error::AuthInvalid(_) => "auth_invalid",
            Error::Forbidden(_) => "forbidden",
            Error::NotFound(_) => "not_found",
            Error::QuotaExceeded { .. } => "quota_exceeded",
            Error::RateLimited { .. } => "rate_limited",
            Error::StorageUnavailable(_) => "storage_unavailable",
            Error::DispatcherUnavailable(_) => "dispatcher_unavailable",
            Error::Internal(_) => "internal",
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Error::StorageUnavailable(e.to_string())
    }
}

impl From<tokio_rusqlite::Error> for Error {
    fn from(e: tokio_rusqlite::Error) -> Self {
        Error::StorageUnavailable(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
