use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use tracing::info;
use workdesk_core::Caller;
use workdesk_types::api::{CountResponse, RetryBroadcastRequest, SendMessageRequest};

use crate::error::ApiError;
use crate::state::{AppState, with_messenger};

/// POST /messages: direct send or role broadcast. A broadcast that reached
/// only part of its roster is still a 201; the summary lists the failures.
pub async fn send_message(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = with_messenger(&state, move |m| m.send_message(&caller, &req)).await?;
    let resp = outcome.into_response();

    if let Some(summary) = &resp.broadcast {
        info!(
            "Account {} broadcast {}: {} sent, {} failed",
            caller.account_id,
            summary.batch_key,
            summary.sent,
            summary.failed.len()
        );
    }

    Ok((StatusCode::CREATED, Json(resp)))
}

/// POST /messages/broadcast/retry: re-send to a previously failed subset.
pub async fn retry_broadcast(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(req): Json<RetryBroadcastRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let report = with_messenger(&state, move |m| m.retry_broadcast(&caller, &req)).await?;
    Ok(Json(report.summary()))
}

/// GET /messages/unread-count
pub async fn unread_count(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Result<impl IntoResponse, ApiError> {
    let count = with_messenger(&state, move |m| m.unread_message_count(&caller)).await?;
    Ok(Json(CountResponse { count }))
}
