use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use biolink_types::ErrorBody;

use crate::app_error::{AppError, ErrorCode};

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::InvalidCredentials | AppError::InvalidSignature => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::LimitReached(_) | AppError::PremiumRequired => StatusCode::PAYMENT_REQUIRED,
            AppError::PaymentGateway(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Message safe to show the client. Database and internal details stay in the logs.
    fn public_message(self) -> Option<String> {
        match self {
            AppError::InvalidInput(msg)
            | AppError::Conflict(msg)
            | AppError::LimitReached(msg)
            | AppError::PaymentGateway(msg) => Some(msg),
            AppError::PremiumRequired => Some("Upgrade to premium to use this feature".to_string()),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, status = %status, "Request failed");
        } else {
            tracing::warn!(error = %self, status = %status, "Request failed");
        }

        let code = self.code();
        error_resp(status, code, self.public_message())
    }
}

pub fn error_resp(status: StatusCode, code: ErrorCode, message: Option<String>) -> Response {
    (status, Json(ErrorBody::new(code, message))).into_response()
}
