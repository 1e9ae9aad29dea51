use crate::error::EngineError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

impl EngineError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            EngineError::NotFound(_) => StatusCode::NOT_FOUND,
            EngineError::ValidationError(_) => StatusCode::BAD_REQUEST,
            EngineError::InvalidState(_) | EngineError::MerchantPaymentNotConfigured(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            EngineError::InsufficientStock { .. }
            | EngineError::InvalidTransition { .. }
            | EngineError::AlreadyProcessed(_) => StatusCode::CONFLICT,
            EngineError::Forbidden(_) => StatusCode::FORBIDDEN,
            EngineError::InvalidSignature => StatusCode::UNAUTHORIZED,
            EngineError::UpstreamFailure(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // Internal details stay in the log.
        let message = if status.is_server_error() && status != StatusCode::BAD_GATEWAY {
            tracing::error!(error = %self, "Request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        let body = Json(json!({
            "error": self.code(),
            "message": message,
        }));
        (status, body).into_response()
    }
}
