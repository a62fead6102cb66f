use thiserror::Error;

/// Error kinds shared across the orchestration core (spec §7).
#[derive(Debug, Error)]
pub enum DocForgeError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("engine failed permanently: {0}")]
    EnginePermanent(String),

    #[error("path escapes allowed root: {0}")]
    FilesystemTraversal(String),

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl DocForgeError {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidInput(_) => 400,
            Self::Unauthorized(_) => 401,
            Self::Forbidden(_) => 403,
            Self::NotFound(_) => 404,
            Self::Conflict(_) => 409,
            Self::FilesystemTraversal(_) => 403,
            Self::EnginePermanent(_) => 422,
            Self::Storage(_) => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, DocForgeError>;

/// Classification of a scheduler-observed dispatch failure (spec §4.3 / §7).
/// Not an `Error` impl — this never crosses an HTTP boundary, it only
/// decides whether `TaskStore::fail` is called with `retryable = true`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchFailure {
    /// Network error, timeout, or 5xx — worth retrying.
    Transient,
    /// 4xx, decode failure, or engine-reported permanent failure.
    Permanent,
}
