pub mod conversations;
pub mod error;
pub mod messages;
pub mod middleware;
pub mod notifications;
pub mod state;

use axum::{
    Router,
    routing::{get, post},
};

pub use state::{AppState, AppStateInner};

/// Authenticated messaging routes plus an open liveness probe.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/messages", post(messages::send_message))
        .route("/messages/broadcast/retry", post(messages::retry_broadcast))
        .route("/messages/unread-count", get(messages::unread_count))
        .route("/conversations", get(conversations::list_conversations))
        .route("/conversations/{conversation_key}/messages", get(conversations::list_messages))
        .route("/conversations/{conversation_key}/read", post(conversations::mark_read))
        .route("/notifications", get(notifications::list_notifications))
        .route("/notifications/read-all", post(notifications::mark_all_read))
        .route("/notifications/unread-count", get(notifications::unread_count))
        .route("/notifications/{id}/read", post(notifications::mark_read))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
