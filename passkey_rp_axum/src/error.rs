use axum::Json;
use http::{Result as HttpResponse, StatusCode};
use passkey_rp::CoordinationError;
use serde_json::{Value, json};

/// Status code and `{"success": false, "error": ...}` body
pub type ErrorResponse = (StatusCode, Json<Value>);

pub(crate) fn error_response(status: StatusCode, message: impl Into<String>) -> ErrorResponse {
    (
        status,
        Json(json!({ "success": false, "error": message.into() })),
    )
}

/// Helper trait for converting errors to a standard response error format
pub trait IntoResponseError<T> {
    fn into_response_error(self) -> Result<T, ErrorResponse>;
}

/// Maps each CoordinationError variant to its HTTP status
impl<T> IntoResponseError<T> for Result<T, CoordinationError> {
    fn into_response_error(self) -> Result<T, ErrorResponse> {
        self.map_err(|e| {
            let status = match e {
                CoordinationError::Validation(_) => StatusCode::BAD_REQUEST,
                CoordinationError::SessionExpired => StatusCode::BAD_REQUEST,
                CoordinationError::VerificationFailed(_) => StatusCode::BAD_REQUEST,
                CoordinationError::LastCredential => StatusCode::BAD_REQUEST,
                CoordinationError::Conflict(_) => StatusCode::CONFLICT,
                CoordinationError::ResourceNotFound { .. } => StatusCode::NOT_FOUND,
                CoordinationError::AuthenticationFailed => StatusCode::UNAUTHORIZED,
                CoordinationError::Unauthorized => StatusCode::UNAUTHORIZED,
                CoordinationError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            // internal details stay in the logs
            let message = match e {
                CoordinationError::Internal(_) => "Internal server error".to_string(),
                other => other.to_string(),
            };
            error_response(status, message)
        })
    }
}

/// Implementation for http::Error (header construction)
impl<T> IntoResponseError<T> for HttpResponse<T> {
    fn into_response_error(self) -> Result<T, ErrorResponse> {
        self.map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
    }
}
