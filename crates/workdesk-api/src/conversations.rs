use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use workdesk_core::Caller;
use workdesk_types::api::MarkReadResponse;

use crate::error::ApiError;
use crate::state::{AppState, with_messenger};

pub async fn list_conversations(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Result<impl IntoResponse, ApiError> {
    let conversations = with_messenger(&state, move |m| m.list_conversations(&caller)).await?;
    Ok(Json(conversations))
}

pub async fn list_messages(
    State(state): State<AppState>,
    Path(conversation_key): Path<String>,
    Extension(caller): Extension<Caller>,
) -> Result<impl IntoResponse, ApiError> {
    let messages =
        with_messenger(&state, move |m| m.list_messages(&caller, &conversation_key)).await?;
    Ok(Json(messages))
}

/// Clients call this after rendering a freshly fetched thread.
pub async fn mark_read(
    State(state): State<AppState>,
    Path(conversation_key): Path<String>,
    Extension(caller): Extension<Caller>,
) -> Result<impl IntoResponse, ApiError> {
    let updated = with_messenger(&state, move |m| {
        m.mark_conversation_read(&caller, &conversation_key)
    })
    .await?;
    Ok(Json(MarkReadResponse { updated }))
}
