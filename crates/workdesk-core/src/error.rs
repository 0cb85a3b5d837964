use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

/// Failures of a single messaging operation.
///
/// A broadcast that reaches only part of its roster is not an error; see
/// [`crate::fanout::BroadcastReport`].
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not authorized: {0}")]
    Authorization(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("storage error: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl CoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn authorization(message: impl Into<String>) -> Self {
        Self::Authorization(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Storage failures may succeed on a second attempt; everything else is
    /// a property of the request itself.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    /// Stable machine-readable name, used in API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION",
            Self::Authorization(_) => "AUTHORIZATION",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Storage(_) => "STORAGE",
        }
    }
}
