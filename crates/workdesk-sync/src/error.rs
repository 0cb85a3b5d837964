use thiserror::Error;

/// A failed fetch or mutation. All variants are recoverable: the poller keeps
/// running and the next tick acts as the retry.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server rejected request ({status} {kind}): {message}")]
    Api {
        status: u16,
        kind: String,
        message: String,
    },

    #[error("sync loop has stopped")]
    Stopped,
}

impl SyncError {
    /// Rejections the user should see inline rather than as a sync hiccup.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Api { status, .. } if (400..500).contains(status))
    }
}
