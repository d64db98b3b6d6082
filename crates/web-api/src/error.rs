use application::ApplicationError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                code,
                message: message.into(),
            },
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "CONFLICT", message)
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }
}

impl From<ApplicationError> for ApiError {
    fn from(error: ApplicationError) -> Self {
        use domain::DomainError;

        match error {
            ApplicationError::Domain(DomainError::InvalidRequest) => {
                ApiError::bad_request(DomainError::InvalidRequest.to_string())
            }
            ApplicationError::Domain(err @ DomainError::Banned)
            | ApplicationError::Domain(err @ DomainError::AccountDeleted) => {
                ApiError::new(StatusCode::FORBIDDEN, "FORBIDDEN", err.to_string())
            }
            ApplicationError::Domain(err @ DomainError::IdentifierInUse) => {
                ApiError::conflict(err.to_string())
            }
            ApplicationError::Domain(err @ DomainError::PermissionDenied { .. }) => {
                ApiError::new(StatusCode::FORBIDDEN, "FORBIDDEN", err.to_string())
            }
            ApplicationError::Domain(err @ DomainError::NotFound { .. }) => {
                ApiError::not_found(err.to_string())
            }
            ApplicationError::Domain(err @ DomainError::JoinFailed { .. }) => {
                ApiError::internal_server_error(err.to_string())
            }
            ApplicationError::Store(err) => ApiError::internal_server_error(err.to_string()),
        }
    }
}

impl From<domain::StoreError> for ApiError {
    fn from(error: domain::StoreError) -> Self {
        ApiError::internal_server_error(error.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
