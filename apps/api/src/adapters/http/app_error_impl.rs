use crate::app_error::{AppError, ErrorCode};
use axum::Json;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Caller-side rejections are expected traffic; everything else is ours.
        match &self {
            AppError::Authenticity(_) | AppError::InvalidPayload(_) => {
                tracing::warn!(error = %self, "Request rejected")
            }
            _ => tracing::error!(error = ?self, "Request failed"),
        }

        match self {
            AppError::Authenticity(msg) => {
                error_resp(StatusCode::BAD_REQUEST, ErrorCode::InvalidSignature, Some(msg))
            }
            AppError::InvalidPayload(msg) => {
                error_resp(StatusCode::BAD_REQUEST, ErrorCode::InvalidPayload, Some(msg))
            }
            AppError::Configuration(_) => error_resp(
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorCode::ConfigurationError,
                None,
            ),
            AppError::DuplicateAccount { .. } => error_resp(
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorCode::DataIntegrityError,
                None,
            ),
            AppError::Database(_) => {
                error_resp(StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::DatabaseError, None)
            }
            AppError::Provider(_) => {
                error_resp(StatusCode::BAD_GATEWAY, ErrorCode::ProviderError, None)
            }
            AppError::NotFound => error_resp(StatusCode::NOT_FOUND, ErrorCode::NotFound, None),
            AppError::Internal(_) => {
                error_resp(StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::InternalError, None)
            }
        }
    }
}

fn error_resp(status: StatusCode, code: ErrorCode, message: Option<String>) -> Response {
    let body = match message {
        Some(msg) => serde_json::json!({ "code": code.as_str(), "message": msg }),
        None => serde_json::json!({ "code": code.as_str() }),
    };
    (status, Json(body)).into_response()
}
