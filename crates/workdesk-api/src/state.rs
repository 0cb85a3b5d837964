use std::sync::Arc;

use tracing::error;
use workdesk_core::{CoreResult, Messenger};

use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub messenger: Messenger,
    pub jwt_secret: String,
}

impl AppStateInner {
    pub fn new(messenger: Messenger, jwt_secret: impl Into<String>) -> AppState {
        Arc::new(Self {
            messenger,
            jwt_secret: jwt_secret.into(),
        })
    }
}

/// Run a core operation off the async runtime; SQLite calls block.
pub async fn with_messenger<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Messenger) -> CoreResult<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.messenger))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal
        })?
        .map_err(ApiError::from)
}
