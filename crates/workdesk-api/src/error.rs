use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;
use workdesk_core::CoreError;
use workdesk_types::api::ErrorBody;

/// Handler error. Core errors keep their kind; storage details stay in the log.
#[derive(Debug)]
pub enum ApiError {
    Unauthorized,
    Core(CoreError),
    Internal,
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        Self::Core(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "AUTHENTICATION",
                "missing or invalid bearer token".to_string(),
            ),
            Self::Core(CoreError::Storage(e)) => {
                error!("Storage failure: {:#}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORAGE",
                    "storage unavailable".to_string(),
                )
            }
            Self::Core(e) => {
                let status = match e {
                    CoreError::Validation(_) => StatusCode::BAD_REQUEST,
                    CoreError::Authorization(_) => StatusCode::FORBIDDEN,
                    CoreError::NotFound(_) => StatusCode::NOT_FOUND,
                    CoreError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, e.kind(), e.to_string())
            }
            Self::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL",
                "internal error".to_string(),
            ),
        };

        (
            status,
            Json(ErrorBody {
                error: kind.to_string(),
                message,
            }),
        )
            .into_response()
    }
}
