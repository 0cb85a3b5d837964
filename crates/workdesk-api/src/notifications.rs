use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use workdesk_core::Caller;
use workdesk_types::api::{CountResponse, NotificationQuery};

use crate::error::ApiError;
use crate::state::{AppState, with_messenger};

/// GET /notifications?type=LEAVE&is_read=false
pub async fn list_notifications(
    State(state): State<AppState>,
    Query(query): Query<NotificationQuery>,
    Extension(caller): Extension<Caller>,
) -> Result<impl IntoResponse, ApiError> {
    let notifications =
        with_messenger(&state, move |m| m.list_notifications(&caller, &query)).await?;
    Ok(Json(notifications))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(caller): Extension<Caller>,
) -> Result<impl IntoResponse, ApiError> {
    with_messenger(&state, move |m| m.mark_notification_read(&caller, id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Result<impl IntoResponse, ApiError> {
    let count = with_messenger(&state, move |m| m.mark_all_notifications_read(&caller)).await?;
    Ok(Json(CountResponse { count }))
}

pub async fn unread_count(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Result<impl IntoResponse, ApiError> {
    let count = with_messenger(&state, move |m| m.unread_notification_count(&caller)).await?;
    Ok(Json(CountResponse { count }))
}
